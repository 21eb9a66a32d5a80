//! Deterministic in-process provider.
//!
//! Replies are picked in this order: the first rule whose needle occurs in the
//! prompt, then the next queued reply, then the fallback. Every call is counted,
//! which is what the retry and pipeline tests assert on.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{LlmError, LlmProvider, LlmRequest, LlmResponse, UsageMetadata};

type Reply = Result<String, LlmError>;

#[derive(Debug, Default)]
pub struct ScriptedProvider {
    model: String,
    rules: Vec<(String, Reply)>,
    queue: Mutex<VecDeque<Reply>>,
    fallback: Option<Reply>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    /// Always answer `reply` when nothing more specific matches
    pub fn with_fallback(mut self, reply: Reply) -> Self {
        self.fallback = Some(reply);
        self
    }

    /// Answer `reply` every time the prompt contains `needle`
    pub fn with_rule(mut self, needle: impl Into<String>, reply: Reply) -> Self {
        self.rules.push((needle.into(), reply));
        self
    }

    /// Queue a one-shot reply
    pub fn push_reply(self, reply: Reply) -> Self {
        if let Ok(mut queue) = self.queue.lock() {
            queue.push_back(reply);
        }
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompts received so far, in call order
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl LlmProvider for ScriptedProvider {
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(request.prompt.clone());
        }

        let ruled = self
            .rules
            .iter()
            .find(|(needle, _)| request.prompt.contains(needle.as_str()))
            .map(|(_, reply)| reply.clone());
        let queued = || self.queue.lock().ok().and_then(|mut q| q.pop_front());

        let reply = ruled
            .or_else(queued)
            .or_else(|| self.fallback.clone())
            .unwrap_or_else(|| Err(LlmError::InvalidResponse("no scripted reply left".to_string())))?;

        Ok(LlmResponse {
            content: reply,
            usage: UsageMetadata::default(),
            model: self.model.clone(),
        })
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(prompt: &str) -> LlmRequest {
        LlmRequest {
            prompt: prompt.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn rules_beat_queue_and_queue_beats_fallback() {
        let provider = ScriptedProvider::new("stub")
            .with_rule("special", Ok("ruled".into()))
            .push_reply(Ok("queued".into()))
            .with_fallback(Ok("fallback".into()));

        assert_eq!(provider.generate(request("a special prompt")).await.unwrap().content, "ruled");
        assert_eq!(provider.generate(request("plain")).await.unwrap().content, "queued");
        assert_eq!(provider.generate(request("plain")).await.unwrap().content, "fallback");
        assert_eq!(provider.call_count(), 3);
        assert_eq!(provider.prompts()[0], "a special prompt");
    }

    #[tokio::test]
    async fn exhausted_script_is_an_error() {
        let provider = ScriptedProvider::new("stub");
        let err = provider.generate(request("x")).await.unwrap_err();
        assert!(!err.is_transient());
    }
}
