//! CV analysis, rewriting and generation

use std::str::FromStr;
use std::sync::{Arc, LazyLock};

use hirewise_core::{AiRouter, Complexity, GenerationRequest};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::clip;
use crate::error::CoachError;
use crate::payload::{lenient_u32, parse_payload};

/// CVs shorter than this are rejected before routing
pub const MIN_CV_CHARS: usize = 50;

/// CV and job description inputs are clipped to this many characters
pub const MAX_INPUT_CHARS: usize = 4000;

const ANALYSIS_TEMPERATURE: f32 = 0.2;

const ATS_SYSTEM_PROMPT: &str = r#"**IDENTITY:**
You are a **Production-Grade ATS (Applicant Tracking System)**.
Your goal is to perform a strict, objective technical evaluation of a candidate based on a specific Job Description (JD).

**LOGIC MODULES:**
1. **Pre-processing:** Extract actionable data.
2. **Semantic Analysis:** Contextualize experience (e.g., "Used Python" vs "Mastered Python").
3. **Knockout Rules (Critical):** If the candidate lacks a MANDATORY requirement (e.g., specific language, years of experience, permit), they are **automatically 'Rechazado'** (Score < 60) regardless of other skills.

**SCORING ALGORITHM (Total: 100):**
- **Hard Skills (40%):** Technical stack match (Keywords + Context).
- **Experience (25%):** Relevance of roles and years of experience vs seniority required.
- **Languages (10%):** Proficiency level match.
- **Education (10%):** Degrees and certifications.
- **Soft Skills (10%):** Communication, leadership, inferred traits.
- **Format/ATS Compatibility (5%):** Structure, clarity, standard headings.

**DECISION THRESHOLDS:**
- **0 - 59:** "Rechazado" (Does not meet minimums).
- **60 - 79:** "Preseleccionado" (Good fit, some gaps).
- **80 - 100:** "Aceptado" (Strong match, ready for interview).

**OUTPUT FORMAT (JSON ONLY):**
{
    "score": Integer (0-100),
    "match_level": "Aceptado" | "Preseleccionado" | "Rechazado",
    "summary": "Technical justification of the decision.",
    "breakdown": {
        "hard_skills": Integer (0-40),
        "experience": Integer (0-25),
        "languages": Integer (0-10),
        "education": Integer (0-10),
        "soft_skills": Integer (0-10),
        "format": Integer (0-5)
    },
    "hard_skills_analysis": {
        "missing_keywords": ["Critical Skill 1", "Skill 2"],
        "matched_keywords": ["Skill A", "Skill B"]
    },
    "experience_analysis": {
        "feedback": "Analysis of seniority and role relevance."
    },
    "killer_questions_check": {
        "passed": Boolean,
        "reason": "If failed, strictly explain which mandatory requirement was missed."
    },
    "improvement_plan": ["Specific step to move from 'Rechazado' to 'Preseleccionado' or 'Aceptado'"]
}"#;

const REWRITE_SYSTEM_PROMPT: &str = "You are a STAR Method CV rewriter. Output JSON only.";

/// ATS decision band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MatchLevel {
    #[serde(rename = "Aceptado")]
    Accepted,
    #[serde(rename = "Preseleccionado")]
    Shortlisted,
    #[serde(rename = "Rechazado")]
    Rejected,
    /// Analysis did not complete, or the model used an unknown label
    #[default]
    #[serde(rename = "Error", other)]
    Error,
}

impl MatchLevel {
    pub fn from_score(score: u32) -> Self {
        match score {
            0..=59 => Self::Rejected,
            60..=79 => Self::Shortlisted,
            _ => Self::Accepted,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreBreakdown {
    #[serde(deserialize_with = "lenient_u32")]
    pub hard_skills: u32,
    #[serde(deserialize_with = "lenient_u32")]
    pub experience: u32,
    #[serde(deserialize_with = "lenient_u32")]
    pub languages: u32,
    #[serde(deserialize_with = "lenient_u32")]
    pub education: u32,
    #[serde(deserialize_with = "lenient_u32")]
    pub soft_skills: u32,
    #[serde(deserialize_with = "lenient_u32")]
    pub format: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordAnalysis {
    pub missing_keywords: Vec<String>,
    pub matched_keywords: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperienceAnalysis {
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnockoutCheck {
    pub passed: bool,
    pub reason: Option<String>,
}

/// Structured ATS evaluation of one CV against one job description
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CvAnalysis {
    #[serde(deserialize_with = "deserialize_score")]
    pub score: u32,
    pub match_level: MatchLevel,
    pub summary: String,
    pub breakdown: Option<ScoreBreakdown>,
    pub hard_skills_analysis: KeywordAnalysis,
    pub experience_analysis: ExperienceAnalysis,
    pub killer_questions_check: Option<KnockoutCheck>,
    pub red_flags: Vec<String>,
    pub improvement_plan: Vec<String>,
}

fn deserialize_score<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    lenient_u32(deserializer).map(|s| s.min(100))
}

/// Returned when an analysis cannot be produced
pub static ANALYSIS_FALLBACK: LazyLock<CvAnalysis> = LazyLock::new(|| CvAnalysis {
    score: 0,
    match_level: MatchLevel::Error,
    summary: "Analysis failed due to technical issues.".to_string(),
    improvement_plan: vec!["Retry analysis".to_string()],
    ..CvAnalysis::default()
});

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulletImprovement {
    pub original: String,
    pub improved: String,
}

/// STAR rewrites of the weakest CV bullets
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CvRewrite {
    pub improvements: Vec<BulletImprovement>,
    pub general_advice: String,
}

/// Hiring market a generated CV is written for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Market {
    #[serde(rename = "USA")]
    Usa,
    Europe,
    #[serde(rename = "LatAm")]
    LatAm,
    #[default]
    Global,
}

impl Market {
    fn rules(&self) -> &'static str {
        match self {
            Self::Usa => {
                "USA RULES:\n\
                 1. Philosophy: \"Action + Impact\". Do not say what you did, say what you ACHIEVED.\n\
                 2. Format: Extreme brevity. Bullet points starting with strong action verbs.\n\
                 3. NO PERSONAL DATA: No photo, age, marital status, or religion.\n\
                 4. Metrics: Quantify results where possible."
            }
            Self::Europe | Self::LatAm | Self::Global => {
                "EUROPE/LATAM RULES:\n\
                 1. Philosophy: \"Competence + Responsibility\". Show technical solidity and soft skills.\n\
                 2. Format: Clear and professional structure.\n\
                 3. Personal: Include languages with levels (A1-C2)."
            }
        }
    }
}

impl std::fmt::Display for Market {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Usa => write!(f, "USA"),
            Self::Europe => write!(f, "Europe"),
            Self::LatAm => write!(f, "LatAm"),
            Self::Global => write!(f, "Global"),
        }
    }
}

impl FromStr for Market {
    type Err = CoachError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "usa" | "us" => Ok(Self::Usa),
            "europe" | "eu" => Ok(Self::Europe),
            "latam" => Ok(Self::LatAm),
            "global" | "" => Ok(Self::Global),
            other => Err(CoachError::UnknownVariant {
                what: "market",
                value: other.to_string(),
            }),
        }
    }
}

/// Input for CV generation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CvProfile {
    pub role: String,
    #[serde(default)]
    pub market: Market,
    #[serde(default)]
    pub industry: String,
    /// Free-form facts about the candidate, passed through as JSON
    #[serde(default)]
    pub raw_data: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonalInfo {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub location: String,
    pub summary: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperienceEntry {
    #[serde(deserialize_with = "lenient_u32")]
    pub id: u32,
    pub role: String,
    pub company: String,
    pub date: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EducationEntry {
    #[serde(deserialize_with = "lenient_u32")]
    pub id: u32,
    pub degree: String,
    pub school: String,
    pub date: String,
}

/// Drafted CV content
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratedCv {
    pub personal: PersonalInfo,
    pub experience: Vec<ExperienceEntry>,
    pub education: Vec<EducationEntry>,
}

/// Returned when CV generation cannot be completed
pub static GENERATED_CV_FALLBACK: LazyLock<GeneratedCv> = LazyLock::new(|| GeneratedCv {
    personal: PersonalInfo {
        name: "CV generation failed".to_string(),
        summary: "The AI service could not be reached. Please try again.".to_string(),
        ..PersonalInfo::default()
    },
    ..GeneratedCv::default()
});

/// CV services backed by the shared router
#[derive(Debug, Clone)]
pub struct CareerCoach {
    router: Arc<AiRouter>,
}

impl CareerCoach {
    pub fn new(router: Arc<AiRouter>) -> Self {
        Self { router }
    }

    /// Score a CV against a job description. Routing or parse failures
    /// degrade to [`ANALYSIS_FALLBACK`]; only a too-short CV is an error.
    pub async fn analyze_cv(
        &self,
        cv_text: &str,
        job_description: &str,
        caller_id: Option<&str>,
    ) -> Result<CvAnalysis, CoachError> {
        let chars = cv_text.chars().count();
        if chars < MIN_CV_CHARS {
            return Err(CoachError::CvTooShort {
                chars,
                min: MIN_CV_CHARS,
            });
        }

        let prompt = format!(
            "**JOB DESCRIPTION:**\n{}\n\n**CANDIDATE CV:**\n{}\n",
            clip(job_description, MAX_INPUT_CHARS),
            clip(cv_text, MAX_INPUT_CHARS)
        );
        let mut request = GenerationRequest::new(prompt)
            .with_system_instruction(ATS_SYSTEM_PROMPT)
            .with_complexity(Complexity::Hard)
            .with_temperature(ANALYSIS_TEMPERATURE)
            .json();
        if let Some(caller) = caller_id {
            request = request.with_caller(caller);
        }

        let response = match self.router.route_request(&request).await {
            Ok(response) => response,
            Err(e) => {
                warn!("CV analysis failed, returning fallback: {}", e);
                return Ok(ANALYSIS_FALLBACK.clone());
            }
        };

        match parse_payload::<CvAnalysis>(&response.text) {
            Ok(analysis) => {
                debug!(
                    "CV analysis from {}: score={}, level={:?}",
                    response.provider_id, analysis.score, analysis.match_level
                );
                Ok(analysis)
            }
            Err(e) => {
                warn!(
                    "CV analysis from {} was unparsable, returning fallback: {}",
                    response.provider_id, e
                );
                Ok(ANALYSIS_FALLBACK.clone())
            }
        }
    }

    /// Rewrite the weakest bullets with the STAR method
    pub async fn rewrite_cv(&self, cv_text: &str) -> Result<CvRewrite, CoachError> {
        if cv_text.trim().is_empty() {
            return Err(CoachError::EmptyCv);
        }

        let prompt = format!(
            r#"Role: Expert CV Writer and Career Coach.
Task: Rewrite weak bullet points in the provided CV using the STAR Method (Situation, Task, Action, Result).

Input CV:
"{}"

Instructions:
1. Identify the 3-5 weakest or most vague experience bullet points.
2. Rewrite them to be quantifiable and impact-driven.
3. Keep the tone professional and executive.

Output JSON only:
{{
    "improvements": [
        {{
            "original": "Responsible for sales in the region.",
            "improved": "Spearheaded regional sales strategy, driving a 20% revenue increase YoY."
        }}
    ],
    "general_advice": "Brief summary of changes made."
}}"#,
            clip(cv_text, MAX_INPUT_CHARS)
        );
        let request = GenerationRequest::new(prompt)
            .with_system_instruction(REWRITE_SYSTEM_PROMPT)
            .with_complexity(Complexity::Medium);

        let response = self.router.route_request(&request).await.inspect_err(|e| {
            warn!("CV rewrite failed: {}", e);
        })?;
        let rewrite: CvRewrite = parse_payload(&response.text)?;
        debug!(
            "CV rewrite from {}: {} improvement(s)",
            response.provider_id,
            rewrite.improvements.len()
        );
        Ok(rewrite)
    }

    /// Draft CV content for a target role and market. Failures degrade to
    /// [`GENERATED_CV_FALLBACK`].
    pub async fn generate_cv(&self, profile: &CvProfile) -> GeneratedCv {
        let request = GenerationRequest::new(generation_prompt(profile))
            .with_system_instruction(generation_system_prompt(profile.market))
            .with_complexity(Complexity::Hard)
            .json();

        let response = match self.router.route_request(&request).await {
            Ok(response) => response,
            Err(e) => {
                warn!("CV generation failed, returning fallback: {}", e);
                return GENERATED_CV_FALLBACK.clone();
            }
        };

        parse_payload(&response.text).unwrap_or_else(|e| {
            warn!(
                "CV generation from {} was unparsable, returning fallback: {}",
                response.provider_id, e
            );
            GENERATED_CV_FALLBACK.clone()
        })
    }
}

fn generation_system_prompt(market: Market) -> String {
    format!(
        r#"**IDENTITY:**
You are an expert Resume Writer & Career Strategist with 15 years of experience in Fortune 500 recruiting.

**OBJECTIVE:**
Draft a high-impact, professional CV content based on the user's provided data.

**MARKET CONTEXT: {market}**
{rules}

**OUTPUT FORMAT (JSON ONLY):**
Return a JSON object that matches this structure exactly:
{{
    "personal": {{
        "name": "User Name",
        "email": "email@example.com",
        "phone": "+123...",
        "location": "City, Country",
        "summary": "3-4 lines professional summary following: [Adjective] + [Title] + [Experience] + [Achievement]"
    }},
    "experience": [
        {{
            "id": 1,
            "role": "Job Title",
            "company": "Company Name",
            "date": "20XX - Present",
            "description": "• Bullet point 1 (Action + Impact)\n• Bullet point 2\n• Bullet point 3"
        }}
    ],
    "education": [
        {{ "id": 1, "degree": "Degree Name", "school": "University Name", "date": "20XX - 20XX" }}
    ]
}}"#,
        market = market,
        rules = market.rules()
    )
}

fn generation_prompt(profile: &CvProfile) -> String {
    let raw = if profile.raw_data.is_null() {
        "{}".to_string()
    } else {
        profile.raw_data.to_string()
    };
    format!(
        "**USER PROFILE:**\nTarget Role: {}\nIndustry: {}\nRaw Input / Context: {}\n\nPlease generate the CV content now.",
        profile.role,
        profile.industry,
        clip(&raw, MAX_INPUT_CHARS)
    )
}
