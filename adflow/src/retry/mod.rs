//! Retry policies with capped exponential backoff and jitter.
//!
//! The engine retries transient collaborator failures under a
//! [`RetryPolicy`]: the delay before retry `n` is
//! `min(initial_interval * backoff_coefficient^n, max_interval)` scaled by
//! a jitter factor uniformly sampled in `[0.5, 1.0]`. Retryability is
//! decided by the structured error kind
//! ([`ProviderError::is_retryable`]); non-retryable failures short-circuit
//! on the first attempt and the last error always propagates verbatim.

use crate::providers::ProviderError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backoff and attempt-limit configuration for a stage contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub initial_interval: Duration,
    /// Cap on the computed delay.
    pub max_interval: Duration,
    /// Total invocations allowed (including the first).
    pub max_attempts: u32,
    /// Multiplier applied per retry.
    pub backoff_coefficient: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

impl RetryPolicy {
    /// The default policy for ordinary collaborator calls.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(30),
            max_attempts: 3,
            backoff_coefficient: 2.0,
        }
    }

    /// Policy for rate-limited, latency-variable external calls.
    ///
    /// Slower growth and more attempts than [`standard`](Self::standard).
    #[must_use]
    pub fn long_running_external_call() -> Self {
        Self {
            initial_interval: Duration::from_secs(2),
            max_interval: Duration::from_secs(120),
            max_attempts: 5,
            backoff_coefficient: 1.5,
        }
    }

    /// Sets the total attempt limit.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the delay before the first retry.
    #[must_use]
    pub fn with_initial_interval(mut self, interval: Duration) -> Self {
        self.initial_interval = interval;
        self
    }

    /// Sets the delay cap.
    #[must_use]
    pub fn with_max_interval(mut self, interval: Duration) -> Self {
        self.max_interval = interval;
        self
    }

    /// Sets the per-retry multiplier.
    #[must_use]
    pub fn with_backoff_coefficient(mut self, coefficient: f64) -> Self {
        self.backoff_coefficient = coefficient;
        self
    }

    /// Computes the un-jittered delay before retry `retry_index`.
    #[must_use]
    pub fn delay_for(&self, retry_index: u32) -> Duration {
        let factor = self.backoff_coefficient.powi(retry_index.min(i32::MAX as u32) as i32);
        let raw = self.initial_interval.as_secs_f64() * factor;
        Duration::from_secs_f64(raw.min(self.max_interval.as_secs_f64()))
    }

    /// Computes the jittered delay before retry `retry_index`.
    #[must_use]
    pub fn jittered_delay(&self, retry_index: u32) -> Duration {
        let jitter = rand::thread_rng().gen_range(0.5..=1.0);
        self.delay_for(retry_index).mul_f64(jitter)
    }
}

/// Runs a collaborator call under the given policy.
///
/// The call receives the zero-based attempt number. Retryable failures
/// sleep the jittered backoff delay between attempts; non-retryable
/// failures return immediately. With `max_attempts = N` the call is
/// invoked exactly N times before the last error is returned verbatim.
pub async fn retry_provider_call<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut call: F,
) -> Result<T, ProviderError>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = Result<T, ProviderError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt: u32 = 0;

    loop {
        match call(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                attempt += 1;
                if !err.is_retryable() {
                    tracing::debug!(
                        operation,
                        error = %err,
                        "Non-retryable failure, giving up immediately"
                    );
                    return Err(err);
                }
                if attempt >= max_attempts {
                    tracing::debug!(
                        operation,
                        attempts = attempt,
                        error = %err,
                        "Retries exhausted"
                    );
                    return Err(err);
                }
                let delay = policy.jittered_delay(attempt - 1);
                tracing::debug!(
                    operation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Retrying after transient failure"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn fast(policy: RetryPolicy) -> RetryPolicy {
        policy
            .with_initial_interval(Duration::from_millis(1))
            .with_max_interval(Duration::from_millis(5))
    }

    #[test]
    fn test_standard_policy() {
        let policy = RetryPolicy::standard();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.initial_interval, Duration::from_secs(1));
        assert!((policy.backoff_coefficient - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_long_running_policy_grows_slower() {
        let standard = RetryPolicy::standard();
        let long = RetryPolicy::long_running_external_call();
        assert!(long.max_attempts > standard.max_attempts);
        assert!(long.backoff_coefficient < standard.backoff_coefficient);
    }

    #[test]
    fn test_delay_doubles_then_caps() {
        let policy = RetryPolicy::standard();
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        // 2^10 seconds would exceed the 30s cap.
        assert_eq!(policy.delay_for(10), Duration::from_secs(30));
    }

    #[test]
    fn test_jitter_stays_in_half_to_full_band() {
        let policy = RetryPolicy::standard();
        let base = policy.delay_for(3);
        for _ in 0..100 {
            let jittered = policy.jittered_delay(3);
            assert!(jittered >= base.mul_f64(0.5));
            assert!(jittered <= base);
        }
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let policy = fast(RetryPolicy::standard());
        let calls = AtomicUsize::new(0);

        let result = retry_provider_call(&policy, "test", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, ProviderError>(42) }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failures() {
        let policy = fast(RetryPolicy::standard()).with_max_attempts(5);
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        let result = retry_provider_call(&policy, "test", move |_| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ProviderError::overloaded("busy"))
                } else {
                    Ok(7)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_invokes_exactly_max_attempts() {
        for max_attempts in 1..=5u32 {
            let policy = fast(RetryPolicy::standard()).with_max_attempts(max_attempts);
            let calls = Arc::new(AtomicUsize::new(0));

            let counter = calls.clone();
            let result: Result<(), _> = retry_provider_call(&policy, "test", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(ProviderError::rate_limited("always failing")) }
            })
            .await;

            let err = result.unwrap_err();
            assert_eq!(err.message, "always failing");
            assert_eq!(
                calls.load(Ordering::SeqCst),
                max_attempts as usize,
                "max_attempts = {max_attempts}"
            );
        }
    }

    #[tokio::test]
    async fn test_non_retryable_invoked_exactly_once() {
        let policy = fast(RetryPolicy::standard()).with_max_attempts(5);
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        let result: Result<(), _> = retry_provider_call(&policy, "test", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(ProviderError::invalid_input("malformed config")) }
        })
        .await;

        assert!(!result.unwrap_err().is_retryable());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_error_propagates_verbatim() {
        let policy = fast(RetryPolicy::standard()).with_max_attempts(3);
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        let result: Result<(), _> = retry_provider_call(&policy, "test", move |_| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move { Err(ProviderError::server_error(format!("failure #{n}"))) }
        })
        .await;

        assert_eq!(result.unwrap_err().message, "failure #2");
    }
}
