//! Per-row execution controls: retry with exponential backoff.
//!
//! The per-attempt time bound is applied by `Pipeline::run_bounded`, which
//! knows the stage an attempt was in when it ran out of time.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::error::PipelineError;

/// Retry policy for transient pipeline failures.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum number of retries (0 = no retries, run once).
    pub max_retries: u32,
    /// Base delay for exponential backoff between retries (milliseconds).
    pub backoff_base_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            backoff_base_ms: 250,
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_retries(max_retries: u32, backoff_base_ms: u64) -> Self {
        Self {
            max_retries,
            backoff_base_ms,
        }
    }

    /// Delay after failed attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.backoff_base_ms.saturating_mul(factor))
    }
}

/// Run `op`, retrying transient failures. Template failures are returned
/// immediately.
pub async fn run_with_policy<F, Fut>(policy: &RetryPolicy, op: F) -> Result<String, PipelineError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<String, PipelineError>>,
{
    let max_attempts = policy.max_retries + 1;
    let mut attempt = 1;

    loop {
        let err = match op().await {
            Ok(prediction) => return Ok(prediction),
            Err(err) => err,
        };

        if attempt >= max_attempts || !err.is_transient() {
            return Err(err);
        }

        let delay = policy.delay_for(attempt);
        debug!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "retrying row");
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn generation_error() -> PipelineError {
        PipelineError::Generation {
            input: "x".to_string(),
            cause: "503".to_string(),
        }
    }

    #[test]
    fn default_policy_never_retries() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 0);
        assert_eq!(policy.backoff_base_ms, 250);
    }

    #[test]
    fn backoff_doubles() {
        let policy = RetryPolicy::with_retries(3, 100);
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
    }

    #[test]
    fn policy_deserializes_with_defaults() {
        let policy: RetryPolicy = serde_json::from_str(r#"{"max_retries": 2}"#).unwrap();
        assert_eq!(policy, RetryPolicy::with_retries(2, 250));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_is_retried() {
        let calls = AtomicU32::new(0);
        let out = run_with_policy(&RetryPolicy::with_retries(2, 10), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(generation_error())
                } else {
                    Ok("ok".to_string())
                }
            }
        })
        .await;

        assert_eq!(out.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_are_bounded() {
        let calls = AtomicU32::new(0);
        let out = run_with_policy(&RetryPolicy::with_retries(2, 10), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(generation_error()) }
        })
        .await;

        assert_eq!(out.unwrap_err(), generation_error());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn template_failure_is_not_retried() {
        let calls = AtomicU32::new(0);
        let out = run_with_policy(&RetryPolicy::with_retries(3, 10), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(PipelineError::Template {
                    input: "x".to_string(),
                    cause: "bad".to_string(),
                })
            }
        })
        .await;

        assert!(matches!(out, Err(PipelineError::Template { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retrieval_failure_is_retried() {
        let calls = AtomicU32::new(0);
        let out = run_with_policy(&RetryPolicy::with_retries(1, 0), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(PipelineError::retrieval_timeout("x", Duration::from_secs(1)))
                } else {
                    Ok("ok".to_string())
                }
            }
        })
        .await;

        assert_eq!(out.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
