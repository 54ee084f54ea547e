use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::error::ProviderError;

/// Timeout and bounded-retry policy applied to every provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallPolicy {
    pub timeout: Duration,
    pub max_retries: u32,
    pub base_backoff: Duration,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 2,
            base_backoff: Duration::from_millis(500),
        }
    }
}

impl CallPolicy {
    /// A policy with near-zero delays, for tests.
    #[must_use]
    pub fn fast() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            max_retries: 2,
            base_backoff: Duration::from_millis(1),
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let exp = self
            .base_backoff
            .saturating_mul(2_u32.saturating_pow(attempt));
        let cap = u64::try_from(exp.as_millis()).unwrap_or(u64::MAX).min(250);
        let jitter = if cap == 0 {
            0
        } else {
            rand::rng().random_range(0..=cap)
        };
        exp + Duration::from_millis(jitter)
    }
}

/// Run a provider call under the policy: each try is capped by the timeout,
/// transient failures back off and retry, permanent failures return at once.
///
/// # Errors
///
/// Returns the last transient error once retries are exhausted, or the first
/// permanent error encountered.
pub async fn with_policy<T, F, Fut>(policy: CallPolicy, mut op: F) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut last = ProviderError::Unavailable("no attempt was made".into());
    for attempt in 0..=policy.max_retries {
        match tokio::time::timeout(policy.timeout, op()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(err)) if err.is_transient() => last = err,
            Ok(Err(err)) => return Err(err),
            Err(_) => last = ProviderError::Timeout,
        }
        if attempt < policy.max_retries {
            let delay = policy.backoff(attempt);
            warn!(attempt, error = %last, delay_ms = delay.as_millis() as u64, "provider call failed, backing off");
            tokio::time::sleep(delay).await;
        }
    }
    Err(last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn transient_failures_retry_until_success() {
        let calls = AtomicU32::new(0);
        let result = with_policy(CallPolicy::fast(), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ProviderError::RateLimited)
                } else {
                    Ok("done")
                }
            }
        })
        .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_failures_do_not_retry() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_policy(CallPolicy::fast(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ProviderError::Auth) }
        })
        .await;

        assert_eq!(result, Err(ProviderError::Auth));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausted_retries_return_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_policy(CallPolicy::fast(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ProviderError::Unavailable("warming up".into())) }
        })
        .await;

        assert!(matches!(result, Err(ProviderError::Unavailable(_))));
        // initial try plus max_retries
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
