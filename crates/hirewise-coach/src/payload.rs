//! Parsing of model output into typed payloads
//!
//! Models asked for JSON still wrap it in markdown fences now and then, and
//! sometimes quote numbers. Everything here is lenient about that and strict
//! about the rest.

use serde::de::{self, DeserializeOwned, Deserializer};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("model returned an empty payload")]
    Empty,

    #[error("malformed JSON payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Return the contents of the first markdown code fence, or the trimmed text
/// when there is none
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(open) = trimmed.find("```") else {
        return trimmed;
    };

    let after = &trimmed[open + 3..];
    // skip an info string such as ```json
    let body = match after.find('\n') {
        Some(nl) if after[..nl].trim().chars().all(|c| c.is_ascii_alphanumeric()) => &after[nl + 1..],
        _ => after.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };

    match body.find("```") {
        Some(close) => body[..close].trim(),
        None => body.trim(),
    }
}

/// Strip fences and deserialize
pub fn parse_payload<T: DeserializeOwned>(text: &str) -> Result<T, PayloadError> {
    let body = strip_code_fences(text);
    if body.is_empty() {
        return Err(PayloadError::Empty);
    }
    Ok(serde_json::from_str(body)?)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawNumber {
    Int(i64),
    Float(f64),
    Text(String),
}

/// Accept `80`, `80.4`, `"80"` or `"80%"`
pub(crate) fn lenient_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match RawNumber::deserialize(deserializer)? {
        RawNumber::Int(n) => Ok(n as f64),
        RawNumber::Float(f) => Ok(f),
        RawNumber::Text(s) => s
            .trim()
            .trim_end_matches('%')
            .trim()
            .parse::<f64>()
            .map_err(|_| de::Error::custom(format!("expected a number, got {:?}", s))),
    }
}

pub(crate) fn lenient_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = lenient_number(deserializer)?;
    if !value.is_finite() || value < 0.0 {
        return Err(de::Error::custom(format!("expected a non-negative number, got {}", value)));
    }
    Ok(value.round() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Scored {
        #[serde(deserialize_with = "lenient_u32")]
        score: u32,
    }

    #[test]
    fn test_strip_plain_text() {
        assert_eq!(strip_code_fences("  {\"a\":1}\n"), "{\"a\":1}");
    }

    #[test]
    fn test_strip_json_fence() {
        let text = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(text), "{\"a\": 1}");
    }

    #[test]
    fn test_strip_bare_fence_with_prose() {
        let text = "Here is the result:\n```\n{\"a\": 1}\n```\nGood luck!";
        assert_eq!(strip_code_fences(text), "{\"a\": 1}");
    }

    #[test]
    fn test_strip_inline_fence() {
        assert_eq!(strip_code_fences("```json{\"a\":1}```"), "{\"a\":1}");
    }

    #[test]
    fn test_parse_payload_empty() {
        let err = parse_payload::<Scored>("```json\n```").unwrap_err();
        assert!(matches!(err, PayloadError::Empty));
    }

    #[test]
    fn test_parse_payload_malformed() {
        let err = parse_payload::<Scored>("not json").unwrap_err();
        assert!(matches!(err, PayloadError::Malformed(_)));
    }

    #[test]
    fn test_lenient_score_forms() {
        for raw in ["{\"score\": 72}", "{\"score\": 71.6}", "{\"score\": \"72\"}", "{\"score\": \"72%\"}"] {
            assert_eq!(parse_payload::<Scored>(raw).unwrap(), Scored { score: 72 });
        }
        assert!(parse_payload::<Scored>("{\"score\": \"high\"}").is_err());
        assert!(parse_payload::<Scored>("{\"score\": -3}").is_err());
    }
}
