//! Bounded retry with pluggable backoff and transient-fault classification.
//!
//! A [`RetryPolicy`] keeps three independent concerns apart:
//! - how long to wait before the next attempt ([`DelayStrategy`])
//! - which faults are worth retrying ([`RetryPredicate`])
//! - what to observe on each retry (the optional `on_retry` hook)
//!
//! Attempt counters live inside a single [`with_retry`] call, so one policy can be
//! shared by any number of call sites.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::result::WithError;

/// Maps a zero-based attempt index to the pause before the next attempt.
pub type DelayStrategy = Arc<dyn Fn(u32) -> Duration + Send + Sync>;

/// Decides whether a fault is transient.
pub type RetryPredicate<F> = Arc<dyn Fn(&F) -> bool + Send + Sync>;

/// Observer invoked with `(fault, attempt, delay)` right before sleeping.
pub type RetryHook<F> = Arc<dyn Fn(&F, u32, Duration) + Send + Sync>;

/// A fault raised by a retried operation.
///
/// The message is used for keyword classification; `status_code` lets transport
/// errors expose an HTTP status without string matching.
pub trait Fault: fmt::Display {
    fn status_code(&self) -> Option<u16> {
        None
    }
}

impl Fault for String {}

impl Fault for anyhow::Error {}

/// Retry configuration for one kind of operation.
pub struct RetryPolicy<F> {
    /// Retries after the first attempt. `0` means a single attempt.
    pub max_retries: u32,
    pub delay: DelayStrategy,
    pub is_transient: RetryPredicate<F>,
    pub on_retry: Option<RetryHook<F>>,
}

impl<F> Clone for RetryPolicy<F> {
    fn clone(&self) -> Self {
        Self {
            max_retries: self.max_retries,
            delay: Arc::clone(&self.delay),
            is_transient: Arc::clone(&self.is_transient),
            on_retry: self.on_retry.clone(),
        }
    }
}

impl<F> fmt::Debug for RetryPolicy<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("has_on_retry", &self.on_retry.is_some())
            .finish()
    }
}

/// Per-call overrides merged on top of a shared default policy.
pub struct RetryOverrides<F> {
    pub max_retries: Option<u32>,
    pub delay: Option<DelayStrategy>,
    pub is_transient: Option<RetryPredicate<F>>,
    pub on_retry: Option<RetryHook<F>>,
}

impl<F> Default for RetryOverrides<F> {
    fn default() -> Self {
        Self {
            max_retries: None,
            delay: None,
            is_transient: None,
            on_retry: None,
        }
    }
}

impl<F> RetryPolicy<F> {
    pub fn new(max_retries: u32, delay: DelayStrategy, is_transient: RetryPredicate<F>) -> Self {
        Self {
            max_retries,
            delay,
            is_transient,
            on_retry: None,
        }
    }

    pub fn with_on_retry(mut self, hook: RetryHook<F>) -> Self {
        self.on_retry = Some(hook);
        self
    }

    /// Build a new policy from `self` with every provided override applied.
    pub fn merge(&self, overrides: RetryOverrides<F>) -> Self {
        Self {
            max_retries: overrides.max_retries.unwrap_or(self.max_retries),
            delay: overrides.delay.unwrap_or_else(|| Arc::clone(&self.delay)),
            is_transient: overrides
                .is_transient
                .unwrap_or_else(|| Arc::clone(&self.is_transient)),
            on_retry: overrides.on_retry.or_else(|| self.on_retry.clone()),
        }
    }
}

/// `base * (attempt + 1)`
pub fn linear_backoff(base: Duration) -> DelayStrategy {
    Arc::new(move |attempt| base.saturating_mul(attempt.saturating_add(1)))
}

pub fn constant_delay(delay: Duration) -> DelayStrategy {
    Arc::new(move |_| delay)
}

/// Transient when the fault carries one of `statuses`, either as a structured
/// status code or inside its message.
pub fn http_status_retryable<F: Fault + 'static>(statuses: &[u16]) -> RetryPredicate<F> {
    let statuses = statuses.to_vec();
    Arc::new(move |fault: &F| {
        if let Some(code) = fault.status_code() {
            return statuses.contains(&code);
        }
        let message = fault.to_string();
        statuses.iter().any(|code| message.contains(&code.to_string()))
    })
}

/// Transient when the fault message contains any keyword as a whole word
/// (case-insensitive), so `rate` matches "rate limit" but not "generateContent".
pub fn keyword_retryable<F: Fault + 'static>(keywords: &[&str]) -> RetryPredicate<F> {
    let keywords: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).collect();
    Arc::new(move |fault: &F| {
        let message = fault.to_string().to_lowercase();
        message
            .split(|c: char| !c.is_alphanumeric())
            .any(|word| keywords.iter().any(|keyword| keyword == word))
    })
}

/// Logical OR over several predicates.
pub fn any_of<F: 'static>(predicates: Vec<RetryPredicate<F>>) -> RetryPredicate<F> {
    Arc::new(move |fault: &F| predicates.iter().any(|predicate| predicate(fault)))
}

/// Run `operation` until it succeeds, the fault is not transient, or the retry
/// budget is spent. The final fault is converted with `format_error`.
pub async fn with_retry<T, F, E, Op, Fut, Fmt>(
    mut operation: Op,
    policy: &RetryPolicy<F>,
    format_error: Fmt,
) -> WithError<T, E>
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, F>>,
    Fmt: FnOnce(F) -> E,
{
    let mut attempt: u32 = 0;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(fault) => {
                if attempt >= policy.max_retries || !(policy.is_transient)(&fault) {
                    return Err(format_error(fault));
                }

                let delay = (policy.delay)(attempt);
                if let Some(hook) = &policy.on_retry {
                    hook(&fault, attempt, delay);
                }

                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
