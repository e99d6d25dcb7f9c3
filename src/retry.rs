//! Fixed-delay retry with an overall deadline

use crate::error::{ClusterError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Delay between attempts and total time allowed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryOption {
    /// Pause between two attempts
    pub delay: Duration,
    /// Give up once this much time has passed since the first attempt
    pub timeout: Duration,
}

impl Default for RetryOption {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(1),
            timeout: Duration::from_secs(60),
        }
    }
}

/// Outcome of one attempt that did not hit a hard error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt {
    /// The condition holds
    Done,
    /// Not yet, with a reason kept for diagnostics
    Pending(String),
}

/// Run `op` until it reports [`Attempt::Done`]
///
/// The first attempt runs immediately. A hard error from `op` is returned at
/// once. When the deadline passes while attempts are still pending the call
/// fails with [`ClusterError::RetryTimeout`] carrying the last reason. The
/// last attempt is made at the deadline, never after it.
pub async fn retry<F, Fut>(mut op: F, opt: RetryOption) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Attempt>>,
{
    let deadline = Instant::now() + opt.timeout;

    loop {
        let reason = match op().await? {
            Attempt::Done => return Ok(()),
            Attempt::Pending(reason) => reason,
        };

        let now = Instant::now();
        if now >= deadline {
            return Err(ClusterError::RetryTimeout {
                timeout: opt.timeout,
                last: reason,
            });
        }

        tokio::time::sleep(opt.delay.min(deadline - now)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn opt(delay_ms: u64, timeout_ms: u64) -> RetryOption {
        RetryOption {
            delay: Duration::from_millis(delay_ms),
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_third_attempt() {
        let calls = Arc::new(AtomicUsize::new(0));
        let started = Instant::now();

        let counter = calls.clone();
        let result = retry(
            || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 2 {
                        Ok(Attempt::Done)
                    } else {
                        Ok(Attempt::Pending("not yet".to_string()))
                    }
                }
            },
            opt(100, 10_000),
        )
        .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hard_error_is_not_retried() {
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        let result = retry(
            || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(ClusterError::Internal("boom".to_string()))
                }
            },
            opt(100, 10_000),
        )
        .await;

        assert!(matches!(result, Err(ClusterError::Internal(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_bounded() {
        let started = Instant::now();

        let result = retry(
            || async { Ok(Attempt::Pending("port closed".to_string())) },
            opt(300, 1_000),
        )
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(err.to_string().contains("port closed"));

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(1_000));
        assert!(elapsed <= Duration::from_millis(1_300));
    }
}
