use std::future::Future;
use std::time::Duration;

use log::warn;

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(300),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            ..Default::default()
        }
    }

    /// Delay to wait after the given number of failed attempts.
    pub fn delay_for(&self, failed_attempts: u32) -> Duration {
        let exp = failed_attempts.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1 << exp).min(self.max_delay)
    }

    pub fn exhausted(&self, failed_attempts: u32) -> bool {
        failed_attempts >= self.max_attempts
    }

    /// Runs `op` until it succeeds or the attempt budget is spent, returning
    /// the last error in the latter case.
    pub async fn run<T, E, F, Fut>(&self, what: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut failed = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    failed += 1;
                    if self.exhausted(failed) {
                        warn!("{} failed after {} attempts: {}", what, failed, e);
                        return Err(e);
                    }
                    let delay = self.delay_for(failed);
                    warn!("{} failed (attempt {}), retrying in {:?}: {}", what, failed, delay, e);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
