//! Mock interview sessions
//!
//! A session resolves its chat route once, when it starts, and every reply in
//! that session goes through the same route. Each turn starts at the route's
//! primary, so the persona only moves to a backup for a turn the primary
//! failed.

use std::str::FromStr;
use std::sync::Arc;

use hirewise_core::{AiRouter, ChatMessage, ChatRole, NormalizedResponse, RouteDecision, RouterError};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::clip;
use crate::error::CoachError;

/// CV and job description are clipped to this many characters
pub const MAX_CONTEXT_CHARS: usize = 3000;

/// Shown in place of a reply when the interviewer cannot answer
pub const INTERVIEW_FALLBACK_REPLY: &str = "Interviewer is reviewing notes... (Error)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterviewMode {
    /// Skeptical recruiter screening; feedback is held until the end
    #[default]
    Hardcore,
    /// Supportive coach that pauses to explain weak answers
    Coach,
}

impl InterviewMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hardcore => "hardcore",
            Self::Coach => "coach",
        }
    }

    fn persona(&self) -> &'static str {
        match self {
            Self::Hardcore => {
                "You are 'Alex', a strict and skeptical Senior Technical Recruiter at a top global firm. \
                 You are conducting a high-stakes screening interview."
            }
            Self::Coach => {
                "You are 'Alex', an empathetic Career Coach specializing in helping professionals land their dream job."
            }
        }
    }

    fn behavior(&self) -> &'static str {
        match self {
            Self::Hardcore => {
                "- Be professional, slightly distant, and highly critical.\n\
                 - If an answer is vague or lacks detail, interrupt (politely) and demand concrete examples using the STAR method.\n\
                 - Focus on identifying 'red flags' or inconsistencies in the CV vs. their answers.\n\
                 - Do NOT provide help, hints, or corrections during the interview. Save feedback for the end."
            }
            Self::Coach => {
                "- Be supportive, patient, and encouraging.\n\
                 - If an answer is weak, pause the mock interview to explain *why* it was weak and suggest a better approach.\n\
                 - Focus on building the candidate's confidence and fluency."
            }
        }
    }
}

impl std::fmt::Display for InterviewMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InterviewMode {
    type Err = CoachError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hardcore" | "recruiter" | "" => Ok(Self::Hardcore),
            "coach" => Ok(Self::Coach),
            other => Err(CoachError::UnknownVariant {
                what: "interview mode",
                value: other.to_string(),
            }),
        }
    }
}

/// Interviewer system prompt for a candidate and target job
pub fn system_prompt(cv_text: &str, job_description: &str, mode: InterviewMode) -> String {
    format!(
        r#"{persona}

**Core Functionality (Multilingual):**
- **Language Detection:** Detect the language the user speaks (Spanish, English, or German) and respond in that **SAME** language.
- If the user switches language, you switch with them immediately.
- **Goal:** Test their ability to communicate professionally in whichever language they choose to start with, but never force a language unless explicitly told.

**Candidate Profile (Memory):**
CV Context: "{cv}"
Job Target: "{jd}"

**Interview Guidelines:**
{behavior}

**Interaction Rules:**
1. **Start:** Introduce yourself briefly based on your active Persona ({mode}) and ask the **First Question**. This question must be specific to a potential weakness or key requirement in their CV/Job Description.
2. **Brevity:** Keep your responses short (max 2-3 sentences) to maintain a natural spoken conversation rhythm.
3. **STAR Method:** Push for Situation, Task, Action, Result. If they miss the 'Result', ask for it.
4. **Realism:** Do not use robotic phrases like "Thank you for that answer." React naturally: "Okay, moving on..." or "Interesting, but I need more on..."
5. **No AI Meta:** Never admit to being an AI, model, or text-based system. Stay in character.
6. **Voice Capable:** If the user says "I want to talk" or "speak to me", reply: "I am listening. Go ahead." Never say you are text only.
7. **Medium Agnostic:** Treat every input as part of a spoken conversation."#,
        persona = mode.persona(),
        cv = clip(cv_text, MAX_CONTEXT_CHARS),
        jd = clip(job_description, MAX_CONTEXT_CHARS),
        behavior = mode.behavior(),
        mode = mode,
    )
}

/// Starts interview sessions over the shared router
#[derive(Debug, Clone)]
pub struct InterviewCoach {
    router: Arc<AiRouter>,
}

impl InterviewCoach {
    pub fn new(router: Arc<AiRouter>) -> Self {
        Self { router }
    }

    /// Resolve the chat route for `caller_id` and fix it for the session
    pub fn start_session(
        &self,
        caller_id: Option<&str>,
        cv_text: &str,
        job_description: &str,
        mode: InterviewMode,
    ) -> InterviewSession {
        let route = self.router.get_route(caller_id);
        debug!(
            "Interview session started: mode={}, route={:?}",
            mode, route.providers
        );
        InterviewSession {
            router: Arc::clone(&self.router),
            route,
            mode,
            system_prompt: system_prompt(cv_text, job_description, mode),
        }
    }

    /// One-off reply for a stateless caller, on the default (premium) route
    pub async fn respond(
        &self,
        history: &[ChatMessage],
        cv_text: &str,
        job_description: &str,
    ) -> String {
        self.start_session(None, cv_text, job_description, InterviewMode::default())
            .reply(history)
            .await
    }
}

/// An interview pinned to one chat route
#[derive(Debug, Clone)]
pub struct InterviewSession {
    router: Arc<AiRouter>,
    route: RouteDecision,
    mode: InterviewMode,
    system_prompt: String,
}

impl InterviewSession {
    pub fn route(&self) -> &RouteDecision {
        &self.route
    }

    pub fn mode(&self) -> InterviewMode {
        self.mode
    }

    /// System prompt followed by the caller's history; system turns in the
    /// history are dropped so the persona cannot be replaced
    fn transcript(&self, history: &[ChatMessage]) -> Vec<ChatMessage> {
        std::iter::once(ChatMessage::system(self.system_prompt.clone()))
            .chain(history.iter().filter(|m| m.role != ChatRole::System).cloned())
            .collect()
    }

    /// Next interviewer turn, or the routing error
    pub async fn try_reply(&self, history: &[ChatMessage]) -> Result<NormalizedResponse, RouterError> {
        self.router.chat(&self.transcript(history), &self.route).await
    }

    /// [`try_reply`](Self::try_reply) that gives up as soon as `cancel` fires
    pub async fn try_reply_cancellable(
        &self,
        history: &[ChatMessage],
        cancel: &CancellationToken,
    ) -> Result<NormalizedResponse, RouterError> {
        self.router
            .chat_cancellable(&self.transcript(history), &self.route, cancel)
            .await
    }

    /// Next interviewer turn; failures degrade to [`INTERVIEW_FALLBACK_REPLY`]
    pub async fn reply(&self, history: &[ChatMessage]) -> String {
        match self.try_reply(history).await {
            Ok(response) => response.text,
            Err(e) => {
                warn!("Interview reply failed, returning fallback: {}", e);
                INTERVIEW_FALLBACK_REPLY.to_string()
            }
        }
    }
}
