//! Model client for prompt completion.
//!
//! Providers implement [`LlmProvider`] and only know how to make one request.
//! [`ModelClient`] wraps a provider with the bounded retry policy used for every
//! model call in the pipelines.

mod fake;
mod gemini;

pub use fake::FakeProvider;
pub use gemini::{GeminiProvider, DEFAULT_BASE_URL};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::result::WithError;
use crate::retry::{
    any_of, http_status_retryable, keyword_retryable, linear_backoff, with_retry, Fault, RetryPolicy,
    RetryPredicate,
};
use crate::InsightError;

pub const MAX_RETRIES: u32 = 3;
pub const INITIAL_DELAY: Duration = Duration::from_millis(1000);
const RETRYABLE_STATUSES: &[u16] = &[429, 500, 503];
const RETRYABLE_KEYWORDS: &[&str] = &["rate", "timeout", "network"];

/// Error type for LLM operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LlmError {
    #[error("API request failed: {0}")]
    RequestFailed(String),

    #[error("Request timeout: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("API returned error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("No response text received from the model")]
    EmptyResponse,

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

impl Fault for LlmError {
    fn status_code(&self) -> Option<u16> {
        match self {
            LlmError::ApiError { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// A single-shot text generation backend.
#[async_trait]
pub trait LlmProvider: Send + Sync + fmt::Debug {
    /// Send `prompt` to `model` and return the generated text.
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, LlmError>;

    fn provider_name(&self) -> &'static str;
}

/// User-facing model names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum LlmModel {
    #[default]
    GeminiFlashLite,
    GeminiFlash,
}

impl LlmModel {
    /// Identifier sent to the API
    pub fn api_id(&self) -> &'static str {
        match self {
            LlmModel::GeminiFlashLite => "gemini-flash-lite-latest",
            LlmModel::GeminiFlash => "gemini-flash-latest",
        }
    }
}

/// Text returned by a successful model call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelReply {
    pub text: String,
}

/// The retry policy for model calls: linear backoff, retrying rate limits,
/// server errors, network trouble and empty replies.
pub fn default_policy(max_retries: u32, initial_delay: Duration) -> RetryPolicy<LlmError> {
    let empty_reply: RetryPredicate<LlmError> =
        Arc::new(|fault: &LlmError| matches!(fault, LlmError::EmptyResponse));

    RetryPolicy::new(
        max_retries,
        linear_backoff(initial_delay),
        any_of(vec![
            http_status_retryable(RETRYABLE_STATUSES),
            keyword_retryable(RETRYABLE_KEYWORDS),
            empty_reply,
        ]),
    )
    .with_on_retry(Arc::new(move |fault: &LlmError, attempt: u32, delay: Duration| {
        tracing::warn!(
            attempt = attempt + 1,
            max_retries,
            delay_ms = delay.as_millis() as u64,
            error = %fault,
            "Model call failed, retrying"
        );
    }))
}

/// Provider plus retry policy
#[derive(Clone)]
pub struct ModelClient {
    provider: Arc<dyn LlmProvider>,
    policy: RetryPolicy<LlmError>,
}

impl fmt::Debug for ModelClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelClient")
            .field("provider", &self.provider.provider_name())
            .field("policy", &self.policy)
            .finish()
    }
}

impl ModelClient {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            policy: default_policy(MAX_RETRIES, INITIAL_DELAY),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy<LlmError>) -> Self {
        self.policy = policy;
        self
    }

    /// Call `model` with `prompt`, retrying transient faults.
    pub async fn call(&self, model: &str, prompt: &str) -> WithError<ModelReply> {
        tracing::debug!(model, provider = self.provider.provider_name(), "Calling model");

        with_retry(
            || async {
                let text = self.provider.generate(model, prompt).await?;
                if text.trim().is_empty() {
                    return Err(LlmError::EmptyResponse);
                }
                Ok(ModelReply { text })
            },
            &self.policy,
            |fault| InsightError::Model(fault.to_string()),
        )
        .await
    }
}

/// One-off Gemini call with the default retry policy
pub async fn call_model(api_key: &str, model_id: &str, prompt: &str) -> WithError<ModelReply> {
    let provider = GeminiProvider::new(api_key.to_string());
    ModelClient::new(Arc::new(provider)).call(model_id, prompt).await
}
