//! Bounded retry for the reads that gate ingestion startup.
//!
//! Writes are never retried here; a failed write drops the event and is
//! logged at the pipeline boundary instead.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use log::warn;

/// Fixed-delay retry: up to `max_attempts` tries, sleeping `delay` between
/// them, returning the last error when all attempts fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(500),
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

    pub async fn run<T, E, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt >= self.max_attempts => return Err(err),
                Err(err) => {
                    warn!(
                        "{label} attempt {attempt}/{} failed, retrying: {err}",
                        self.max_attempts
                    );
                    tokio::time::sleep(self.delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn succeeds_once_the_operation_recovers() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::default();

        let result = policy
            .run("flaky read", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err("not yet")
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_the_last_attempt() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(500));

        let result: Result<(), &str> = policy
            .run("doomed read", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("still down") }
            })
            .await;

        assert_eq!(result, Err("still down"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn a_single_attempt_policy_never_sleeps() {
        let policy = RetryPolicy::new(1, Duration::from_secs(3600));
        let result: Result<u32, &str> = policy.run("one shot", || async { Ok(7) }).await;
        assert_eq!(result, Ok(7));
    }
}
