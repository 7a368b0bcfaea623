//! Fake LLM provider for testing.
//!
//! Replies are scripted up front, so tests can exercise retry behaviour and the
//! pipelines without network access or API costs.

use super::{LlmError, LlmProvider};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// A fake LLM provider for testing.
///
/// Scripted replies are consumed in order. Once the script is empty the default
/// reply is returned, or an error if there is none.
#[derive(Debug, Default)]
pub struct FakeProvider {
    script: Mutex<VecDeque<Result<String, LlmError>>>,
    default_reply: Option<String>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl FakeProvider {
    /// Always answer with `reply`.
    pub fn with_reply(reply: &str) -> Self {
        Self {
            default_reply: Some(reply.to_string()),
            ..Self::default()
        }
    }

    /// Answer with each entry of `replies` in turn.
    pub fn scripted(replies: Vec<Result<String, LlmError>>) -> Self {
        Self {
            script: Mutex::new(replies.into()),
            ..Self::default()
        }
    }

    /// Number of `generate` calls so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every prompt received, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl LlmProvider for FakeProvider {
    async fn generate(&self, _model: &str, prompt: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(prompt.to_string());

        let scripted = self
            .script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front();

        match (scripted, &self.default_reply) {
            (Some(reply), _) => reply,
            (None, Some(reply)) => Ok(reply.clone()),
            (None, None) => Err(LlmError::RequestFailed(format!(
                "FakeProvider: no reply configured for prompt (first 100 chars): {}",
                prompt.chars().take(100).collect::<String>()
            ))),
        }
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_then_default() {
        let provider = FakeProvider {
            default_reply: Some("fallback".to_string()),
            ..FakeProvider::scripted(vec![Ok("first".to_string())])
        };

        assert_eq!(provider.generate("m", "a").await.unwrap(), "first");
        assert_eq!(provider.generate("m", "b").await.unwrap(), "fallback");
        assert_eq!(provider.call_count(), 2);
        assert_eq!(provider.prompts(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_unconfigured_is_an_error() {
        let provider = FakeProvider::default();
        let err = provider.generate("m", "hello").await.unwrap_err();
        assert!(matches!(err, LlmError::RequestFailed(msg) if msg.contains("hello")));
    }
}
