//! Fixed-delay retry for transient provider failures.

use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

use planloop_core::config::Config;

use crate::ProviderError;

/// Attempt budget and the pause between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, counting the first. Never less than 1.
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.retry_attempts(),
            Duration::from_millis(config.retry_delay_ms()),
        )
    }
}

/// Run `attempt` until it succeeds, fails permanently, or the budget is spent.
///
/// The closure receives the 1-based attempt number. An overload that is still
/// failing on the last attempt becomes [`ProviderError::Overloaded`]; any
/// other final error is returned as-is.
pub async fn retry_transient<T, F, Fut>(
    policy: &RetryPolicy,
    mut attempt: F,
) -> Result<T, ProviderError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut n = 0;
    loop {
        n += 1;
        match attempt(n).await {
            Ok(value) => {
                if n > 1 {
                    info!(attempt = n, "Completion succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if e.is_retryable() && n < policy.max_attempts => {
                warn!(
                    attempt = n,
                    max_attempts = policy.max_attempts,
                    delay_ms = policy.delay.as_millis() as u64,
                    %e,
                    "Transient provider failure, retrying"
                );
                tokio::time::sleep(policy.delay).await;
            }
            Err(e) if e.is_overloaded() => {
                return Err(ProviderError::Overloaded { attempts: n });
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1))
    }

    fn overloaded() -> Result<&'static str, ProviderError> {
        Err(ProviderError::Status {
            status: 529,
            body: "Overloaded".into(),
        })
    }

    async fn run_script(
        policy: RetryPolicy,
        script: Vec<Result<&'static str, ProviderError>>,
    ) -> (Result<&'static str, ProviderError>, u32) {
        let calls = Arc::new(AtomicU32::new(0));
        let script = Arc::new(Mutex::new(VecDeque::from(script)));
        let result = retry_transient(&policy, |_| {
            let calls = calls.clone();
            let script = script.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                let next = script.lock().unwrap().pop_front();
                next.unwrap_or(Ok("script exhausted"))
            }
        })
        .await;
        (result, calls.load(Ordering::SeqCst))
    }

    #[tokio::test]
    async fn test_overload_then_success() {
        let (result, calls) =
            run_script(fast_policy(3), vec![overloaded(), overloaded(), Ok("done")]).await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn test_overload_exhausts_budget() {
        let (result, calls) = run_script(
            fast_policy(3),
            vec![overloaded(), overloaded(), overloaded(), Ok("never")],
        )
        .await;
        assert!(matches!(
            result,
            Err(ProviderError::Overloaded { attempts: 3 })
        ));
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let (result, calls) = run_script(
            fast_policy(3),
            vec![
                Err(ProviderError::Status {
                    status: 401,
                    body: "invalid x-api-key".into(),
                }),
                Ok("never"),
            ],
        )
        .await;
        assert!(matches!(
            result,
            Err(ProviderError::Status { status: 401, .. })
        ));
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_single_attempt_policy() {
        let (result, calls) = run_script(fast_policy(0), vec![overloaded()]).await;
        assert!(matches!(
            result,
            Err(ProviderError::Overloaded { attempts: 1 })
        ));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_policy_from_config() {
        let config = Config::default();
        let policy = RetryPolicy::from_config(&config);
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay, Duration::from_secs(5));
    }
}
