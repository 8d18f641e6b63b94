//! Bounded retry with a fixed delay table.

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{instrument, warn};

use crate::error::{Error, Result};

/// Delay table used when none is configured: 1m, 10m, 30m, 1h, 12h, 24h, 48h.
pub const DEFAULT_DELAYS_SECS: [u64; 7] = [60, 600, 1800, 3600, 43_200, 86_400, 172_800];

/// Retries allowed after the first attempt when none is configured.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Delay after the n-th failed attempt; the last entry repeats
    pub delays: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            delays: DEFAULT_DELAYS_SECS
                .iter()
                .map(|s| Duration::from_secs(*s))
                .collect(),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delays: Vec<Duration>) -> Self {
        Self { max_retries, delays }
    }

    /// Total attempts including the first.
    pub fn attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay after failed attempt `attempt` (zero-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.delays
            .get(attempt as usize)
            .or_else(|| self.delays.last())
            .copied()
            .unwrap_or(Duration::ZERO)
    }
}

/// Run `op` until it succeeds or the policy is exhausted.
///
/// Every error is retried the same way. There is no sleep after the final
/// failed attempt.
pub async fn with_retry<F, Fut, T>(policy: &RetryPolicy, operation: &str, op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    with_retry_cancellable(policy, operation, &CancellationToken::new(), op).await
}

/// [`with_retry`] that aborts with [`Error::Cancelled`] as soon as `token`
/// fires, interrupting either the running attempt or the sleep.
#[instrument(skip(policy, token, op), fields(max_retries = policy.max_retries))]
pub async fn with_retry_cancellable<F, Fut, T>(
    policy: &RetryPolicy,
    operation: &str,
    token: &CancellationToken,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = policy.attempts();
    let mut attempt = 0;

    loop {
        let result = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(Error::cancelled(operation)),
            result = op() => result,
        };

        let err = match result {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        attempt += 1;
        if attempt >= attempts {
            warn!(operation, attempt, error = %err, "Final attempt failed");
            return Err(Error::RetriesExhausted {
                operation: operation.to_string(),
                attempts,
                last: Box::new(err),
            });
        }

        let delay = policy.delay_for(attempt - 1);
        warn!(
            operation,
            attempt,
            delay_secs = delay.as_secs(),
            error = %err,
            "Attempt failed, retrying"
        );

        tokio::select! {
            biased;
            _ = token.cancelled() => return Err(Error::cancelled(operation)),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn flaky(calls: &AtomicU32, failures: u32) -> impl Future<Output = Result<u32>> + '_ {
        async move {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < failures {
                Err(Error::transport("upsert", format!("failure {}", n)))
            } else {
                Ok(n)
            }
        }
    }

    #[test]
    fn test_delay_table() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.attempts(), 4);
        assert_eq!(policy.delay_for(0), Duration::from_secs(60));
        assert_eq!(policy.delay_for(6), Duration::from_secs(172_800));
        assert_eq!(policy.delay_for(50), Duration::from_secs(172_800));
        assert_eq!(RetryPolicy::new(1, vec![]).delay_for(0), Duration::ZERO);
    }

    #[test]
    fn test_attempts_saturate() {
        assert_eq!(RetryPolicy::new(u32::MAX, vec![]).attempts(), u32::MAX);
        assert_eq!(RetryPolicy::new(0, vec![]).attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_max_retries_failures() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        let value = with_retry(&policy, "upsert", || flaky(&calls, policy.max_retries))
            .await
            .unwrap();

        assert_eq!(value, 3);
        assert_eq!(calls.load(Ordering::SeqCst), policy.max_retries + 1);
        assert_eq!(started.elapsed(), Duration::from_secs(60 + 600 + 1800));
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_exhausts_with_last_error() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        let err = with_retry(&policy, "delete", || flaky(&calls, u32::MAX))
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        match &err {
            Error::RetriesExhausted {
                operation,
                attempts,
                last,
            } => {
                assert_eq!(operation, "delete");
                assert_eq!(*attempts, 4);
                assert!(
                    matches!(last.as_ref(), Error::Transport { message, .. } if message == "failure 3")
                );
            }
            other => panic!("unexpected error: {:?}", other),
        }
        // No sleep after the last attempt.
        assert_eq!(started.elapsed(), Duration::from_secs(60 + 600 + 1800));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_sleep() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);
        let token = CancellationToken::new();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(30)).await;
            canceller.cancel();
        });

        let started = Instant::now();
        let err = with_retry_cancellable(&policy, "upsert", &token, || flaky(&calls, u32::MAX))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Cancelled { ref operation } if operation == "upsert"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_already_cancelled_never_runs() {
        let token = CancellationToken::new();
        token.cancel();
        let calls = AtomicU32::new(0);

        let err = with_retry_cancellable(&RetryPolicy::default(), "query", &token, || {
            flaky(&calls, 0)
        })
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Cancelled { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
