use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Error taxonomy for activities (spec §7). Workflows branch on
/// `retryable` and on the `ProviderLimitReached` variant specifically,
/// since that one carries its own resume delay rather than using the
/// generic retry backoff.
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum ActivityError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("provider account disconnected")]
    AccountDisconnected,

    #[error("transient provider error: {0}")]
    Transient(String),

    #[error("provider rate/connection limit reached, retry after {retry_after_hours}h")]
    ProviderLimitReached { retry_after_hours: i64 },

    #[error("{entity} not found")]
    NotFound { entity: String },

    #[error("unknown action type: {0}")]
    UnknownActionType(String),
}

impl ActivityError {
    #[must_use]
    pub fn retryable(&self) -> bool {
        match self {
            Self::Validation(_)
            | Self::AccountDisconnected
            | Self::UnknownActionType(_) => false,
            Self::Transient(_) | Self::ProviderLimitReached { .. } | Self::NotFound { .. } => true,
        }
    }
}

/// Retry policy shared by all activities: initial 1s, backoff x2, capped at
/// 30s, at most `max_attempts` tries. `ProviderLimitReached` is handled by
/// the caller (it carries its own wait) and is never passed through this
/// policy's retry loop.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub backoff_factor: u32,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            backoff_factor: 2,
            max_delay: Duration::from_secs(30),
            max_attempts: 3,
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let multiplier = self.backoff_factor.saturating_pow(attempt.min(16));
        self.initial_delay
            .saturating_mul(multiplier)
            .min(self.max_delay)
    }

    /// Runs `op`, retrying non-retryable-excluded failures per policy.
    /// Stops immediately on a non-retryable error.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, ActivityError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, ActivityError>>,
    {
        let mut attempt = 0u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if !err.retryable() => {
                    tracing::error!(error = %err, "activity failed non-retryably");
                    return Err(err);
                }
                Err(err) if attempt + 1 >= self.max_attempts => {
                    tracing::error!(error = %err, attempt, "activity exhausted retry budget");
                    return Err(err);
                }
                Err(err) => {
                    let delay = self.delay_for_attempt(attempt);
                    tracing::warn!(error = %err, attempt, delay_ms = %delay.as_millis(), "retrying activity");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_not_retryable() {
        assert!(!ActivityError::Validation("bad url".into()).retryable());
    }

    #[test]
    fn account_disconnected_is_not_retryable() {
        assert!(!ActivityError::AccountDisconnected.retryable());
    }

    #[test]
    fn unknown_action_type_is_not_retryable() {
        assert!(!ActivityError::UnknownActionType("frobnicate".into()).retryable());
    }

    #[test]
    fn transient_and_limit_errors_are_retryable() {
        assert!(ActivityError::Transient("timeout".into()).retryable());
        assert!(ActivityError::ProviderLimitReached { retry_after_hours: 24 }.retryable());
        assert!(ActivityError::NotFound { entity: "lead".into() }.retryable());
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for_attempt(10), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn run_stops_immediately_on_non_retryable() {
        let policy = RetryPolicy::default();
        let calls = std::sync::atomic::AtomicU32::new(0);
        let result: Result<(), ActivityError> = policy
            .run(|| {
                calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                async { Err(ActivityError::Validation("bad".into())) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn run_retries_up_to_max_attempts() {
        let policy = RetryPolicy {
            initial_delay: Duration::from_millis(1),
            backoff_factor: 2,
            max_delay: Duration::from_millis(4),
            max_attempts: 3,
        };
        let calls = std::sync::atomic::AtomicU32::new(0);
        let result: Result<(), ActivityError> = policy
            .run(|| {
                calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                async { Err(ActivityError::Transient("timeout".into())) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn run_succeeds_after_transient_failure() {
        let policy = RetryPolicy {
            initial_delay: Duration::from_millis(1),
            backoff_factor: 2,
            max_delay: Duration::from_millis(4),
            max_attempts: 3,
        };
        let calls = std::sync::atomic::AtomicU32::new(0);
        let result = policy
            .run(|| {
                let n = calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(ActivityError::Transient("flaky".into()))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 42);
    }
}
