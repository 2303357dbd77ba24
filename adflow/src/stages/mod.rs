//! Stage contracts: timeout and retry discipline around collaborator calls.
//!
//! A [`StageContract`] names a unit of pipeline work and declares its
//! per-attempt timeout and retry policy. Stages must be safely retryable:
//! the contract re-invokes the wrapped call on transient failures and
//! attempt timeouts, and fails fast on validation-class errors.

use crate::providers::ProviderError;
use crate::retry::{retry_provider_call, RetryPolicy};
use futures::stream::StreamExt;
use std::future::Future;
use std::time::Duration;

/// Execution discipline for one named stage.
#[derive(Debug, Clone)]
pub struct StageContract {
    /// Stage name used in logs and error messages.
    pub name: &'static str,
    /// Per-attempt timeout.
    pub timeout: Duration,
    /// Retry policy applied across attempts.
    pub retry: RetryPolicy,
}

impl StageContract {
    /// Creates a contract.
    #[must_use]
    pub fn new(name: &'static str, timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            name,
            timeout,
            retry,
        }
    }

    /// Runs a collaborator call under this contract.
    ///
    /// Each attempt is bounded by the contract timeout; an elapsed timeout
    /// counts as a retryable `Timeout` failure. After retries exhaust the
    /// last error is returned verbatim.
    pub async fn run<T, F, Fut>(&self, mut call: F) -> Result<T, ProviderError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let name = self.name;
        let timeout = self.timeout;
        retry_provider_call(&self.retry, name, |attempt| {
            let fut = call(attempt);
            async move {
                match tokio::time::timeout(timeout, fut).await {
                    Ok(result) => result,
                    Err(_) => Err(ProviderError::timeout(format!(
                        "{name} attempt exceeded {}s",
                        timeout.as_secs()
                    ))),
                }
            }
        })
        .await
    }
}

/// Maps items through an async function with a bounded worker pool.
///
/// At most `concurrency` futures run at once and the output order matches
/// the input order, so fan-out stages keep per-item results keyed to their
/// item. Per-item retry isolation is the caller's concern: wrap each call
/// in a [`StageContract::run`].
pub async fn map_bounded<I, T, F, Fut>(
    items: Vec<I>,
    concurrency: usize,
    f: F,
) -> Vec<Result<T, ProviderError>>
where
    F: FnMut(I) -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    futures::stream::iter(items)
        .map(f)
        .buffered(concurrency.max(1))
        .collect()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn fast_retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::standard()
            .with_max_attempts(max_attempts)
            .with_initial_interval(Duration::from_millis(1))
            .with_max_interval(Duration::from_millis(2))
    }

    #[tokio::test]
    async fn test_contract_passes_through_success() {
        let contract = StageContract::new("extraction", Duration::from_secs(5), fast_retry(3));

        let result = contract.run(|_| async { Ok::<_, ProviderError>("profile") }).await;
        assert_eq!(result.unwrap(), "profile");
    }

    #[tokio::test(start_paused = true)]
    async fn test_contract_times_out_and_retries() {
        let contract = StageContract::new("matching", Duration::from_millis(50), fast_retry(3));
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        let result: Result<(), _> = contract
            .run(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(())
                }
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.kind, crate::providers::ProviderErrorKind::Timeout);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_contract_fails_fast_on_validation_errors() {
        let contract = StageContract::new("generation", Duration::from_secs(5), fast_retry(5));
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        let result: Result<(), _> = contract
            .run(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(ProviderError::malformed_response("truncated output")) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_map_bounded_preserves_input_order() {
        let items: Vec<u64> = (0..8).collect();

        let results = map_bounded(items, 3, |n| async move {
            // Later items finish earlier; order must still hold.
            tokio::time::sleep(Duration::from_millis(8 - n)).await;
            Ok::<_, ProviderError>(n * 10)
        })
        .await;

        let values: Vec<u64> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(values, vec![0, 10, 20, 30, 40, 50, 60, 70]);
    }

    #[tokio::test]
    async fn test_map_bounded_caps_concurrency() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let items: Vec<usize> = (0..16).collect();
        let (in_flight_ref, peak_ref) = (in_flight.clone(), peak.clone());

        let results = map_bounded(items, 4, move |_| {
            let in_flight = in_flight_ref.clone();
            let peak = peak_ref.clone();
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, ProviderError>(())
            }
        })
        .await;

        assert_eq!(results.len(), 16);
        assert!(peak.load(Ordering::SeqCst) <= 4);
    }

    #[tokio::test]
    async fn test_map_bounded_keeps_per_item_errors_isolated() {
        let items: Vec<u32> = vec![1, 2, 3];

        let results = map_bounded(items, 2, |n| async move {
            if n == 2 {
                Err(ProviderError::server_error("item 2 failed"))
            } else {
                Ok(n)
            }
        })
        .await;

        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert!(results[2].is_ok());
    }
}
