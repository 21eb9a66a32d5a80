use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Core trait for completion providers.
///
/// The rest of the crate only needs "prompt in, text or error out"; each
/// implementation decides how it talks to its backend.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate completion for a given prompt
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Model identifier used for logging and reports
    fn model(&self) -> &str;
}

/// Request structure for LLM generation
#[derive(Debug, Clone, Default)]
pub struct LlmRequest {
    pub system: Option<String>,
    pub prompt: String,
    pub max_tokens: Option<usize>,
    pub temperature: Option<f32>,
    pub timeout_seconds: Option<u64>,
}

/// Response from LLM generation
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub usage: UsageMetadata,
    pub model: String,
}

/// Token usage metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageMetadata {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

/// Errors a provider can report. Only some of them are worth retrying.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    #[error("LLM request timed out after {0}s")]
    Timeout(u64),

    #[error("LLM transport error: {0}")]
    Transport(String),

    #[error("LLM rate limited (429): {0}")]
    RateLimited(String),

    #[error("LLM server error {status}: {body}")]
    Server { status: u16, body: String },

    /// 4xx other than 429: bad key, bad model name, bad request
    #[error("LLM API error {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("invalid LLM response: {0}")]
    InvalidResponse(String),
}

impl LlmError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LlmError::Timeout(_) | LlmError::Transport(_) | LlmError::RateLimited(_) | LlmError::Server { .. }
        )
    }
}

pub mod remote;
pub mod scripted;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(LlmError::Timeout(30).is_transient());
        assert!(LlmError::Transport("reset".into()).is_transient());
        assert!(LlmError::RateLimited("slow down".into()).is_transient());
        assert!(LlmError::Server { status: 503, body: String::new() }.is_transient());
        assert!(!LlmError::Rejected { status: 401, body: "bad key".into() }.is_transient());
        assert!(!LlmError::InvalidResponse("no choices".into()).is_transient());
    }
}
