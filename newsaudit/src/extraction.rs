//! Resilient structured-extraction client.
//!
//! One call = render template, ask the provider (retrying transient faults),
//! repair markdown fences, parse a JSON object, check required fields.
//! Malformed or incomplete output is never retried: the model answered, it
//! just answered badly.

use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::ExtractionError;
use crate::llm::{LlmError, LlmProvider, LlmRequest};
use crate::prompt::PromptTemplate;

/// Attempt budget and exponential backoff between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, first one included
    pub max_attempts: u32,
    /// Wait before the second attempt; doubles for each one after
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait before `attempt` (1-based). Zero for the first attempt.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let factor = 2u32.saturating_pow(attempt - 2);
        self.base_delay.saturating_mul(factor)
    }
}

/// Per-instance request settings. Endpoint and credential live in the provider.
#[derive(Debug, Clone, Default)]
pub struct ExtractionConfig {
    pub system_prompt: Option<String>,
    pub max_tokens: Option<usize>,
    pub temperature: Option<f32>,
    pub timeout_seconds: Option<u64>,
    pub retry: RetryPolicy,
}

pub struct ExtractionClient {
    provider: Arc<dyn LlmProvider>,
    config: ExtractionConfig,
}

impl ExtractionClient {
    pub fn new(provider: Arc<dyn LlmProvider>, config: ExtractionConfig) -> Self {
        Self { provider, config }
    }

    pub fn model(&self) -> &str {
        self.provider.model()
    }

    /// Render `template`, call the model and return the parsed object.
    pub async fn extract(
        &self,
        template: &PromptTemplate,
        variables: &[(&str, &str)],
        schema_fields: &[&str],
    ) -> Result<Map<String, Value>, ExtractionError> {
        let prompt = template.render(variables)?;
        let raw = self.complete_with_retry(prompt).await?;
        parse_structured(&raw, schema_fields)
    }

    async fn complete_with_retry(&self, prompt: String) -> Result<String, ExtractionError> {
        let policy = self.config.retry;
        let max_attempts = policy.max_attempts.max(1);
        let mut last_error: Option<LlmError> = None;

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                let backoff = policy.delay_before(attempt);
                info!(
                    model = %self.model(),
                    attempt,
                    max_attempts,
                    ?backoff,
                    "retrying completion"
                );
                tokio::time::sleep(backoff).await;
            }

            let request = LlmRequest {
                system: self.config.system_prompt.clone(),
                prompt: prompt.clone(),
                max_tokens: self.config.max_tokens,
                temperature: self.config.temperature,
                timeout_seconds: self.config.timeout_seconds,
            };

            match self.provider.generate(request).await {
                Ok(response) => {
                    debug!(model = %response.model, attempt, "completion ok");
                    return Ok(response.content);
                }
                Err(e) if e.is_transient() => {
                    warn!(model = %self.model(), attempt, %e, "transient completion failure");
                    last_error = Some(e);
                }
                Err(e) => {
                    warn!(model = %self.model(), attempt, %e, "completion rejected, not retrying");
                    return Err(ExtractionError::Unavailable {
                        attempts: attempt,
                        reason: e.to_string(),
                    });
                }
            }
        }

        Err(ExtractionError::Unavailable {
            attempts: max_attempts,
            reason: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no attempt made".to_string()),
        })
    }
}

/// Strip a surrounding markdown code fence, whatever its language tag.
///
/// Only applies when the (trimmed) text starts with a fence marker: the first
/// line goes, and the last line goes too if it is the closing fence.
pub fn repair_fences(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }

    let lines: Vec<&str> = trimmed.lines().collect();
    let mut body = &lines[1..];
    if let Some(last) = body.last() {
        if last.trim_start().starts_with("```") {
            body = &body[..body.len() - 1];
        }
    }
    body.join("\n")
}

/// Fence repair, JSON parse and required-field check on a raw model answer.
pub fn parse_structured(raw: &str, schema_fields: &[&str]) -> Result<Map<String, Value>, ExtractionError> {
    let repaired = repair_fences(raw);

    let value: Value = serde_json::from_str(&repaired)
        .map_err(|e| ExtractionError::malformed(format!("not valid JSON ({}): {}", e, preview(&repaired))))?;

    let object = match value {
        Value::Object(map) => map,
        other => {
            return Err(ExtractionError::malformed(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            )))
        }
    };

    let missing: Vec<String> = schema_fields
        .iter()
        .filter(|field| !object.contains_key(**field))
        .map(|field| field.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ExtractionError::IncompleteOutput { missing });
    }

    Ok(object)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn preview(text: &str) -> String {
    const MAX: usize = 120;
    if text.chars().count() <= MAX {
        text.to_string()
    } else {
        format!("{}...", text.chars().take(MAX).collect::<String>())
    }
}
