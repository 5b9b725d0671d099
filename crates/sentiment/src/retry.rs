//! Fixed-wait retry.
//!
//! Every attempt after a failure is preceded by the same wait. Whether a failure is worth
//! another attempt is decided by a predicate supplied per call; the last error is returned
//! once attempts run out or the predicate says no.

use std::{fmt::Display, future::Future, time::Duration};
use tracing::warn;

/// Bounded retry with a constant wait between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            wait: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// `max_attempts` counts the first call; values below 1 are raised to 1.
    pub fn new(max_attempts: u32, wait: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            wait,
        }
    }

    /// Total attempts, first call included.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Wait between attempts.
    pub fn wait(&self) -> Duration {
        self.wait
    }

    /// Run `op` until it succeeds, fails with an error `retryable` rejects, or attempts
    /// are exhausted.
    pub async fn run<T, E, F, Fut, P>(&self, operation: &str, retryable: P, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: Display,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_attempts && retryable(&e) => {
                    warn!(
                        operation,
                        attempt,
                        max_attempts = self.max_attempts,
                        "Attempt failed, retrying in {:?}: {}",
                        self.wait,
                        e
                    );
                    tokio::time::sleep(self.wait).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
