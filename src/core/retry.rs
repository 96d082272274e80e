use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// How often and how patiently a failing operation is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retry attempts after the first run (total runs = 1 + retries)
    pub retries: usize,
    /// Delay before the first retry
    pub delay: Duration,
    /// Multiplier applied to the delay after every retry
    pub backoff: u32,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            retries: 0,
            delay: Duration::ZERO,
            backoff: 1,
        }
    }

    /// Delay to wait after the given failed attempt (1 based).
    pub fn delay_after(&self, attempt: usize) -> Duration {
        let exponent = u32::try_from(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.delay
            .saturating_mul(self.backoff.max(1).saturating_pow(exponent))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            delay: Duration::from_millis(500),
            backoff: 2,
        }
    }
}

/// The last error of an operation that ran out of attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exhausted<E> {
    pub error: E,
    pub attempts: usize,
}

/// Retries an async operation with exponential backoff
///
/// # Parameters
/// - `operation`: Closure returning a future
/// - `policy`: Number of retries and delays between them
/// - `should_retry`: Decides whether an error is worth another attempt
///
/// # Returns
/// Either the successful result or the last error with the number of attempts made
pub async fn with_retry<F, Fut, T, E, P>(
    mut operation: F,
    policy: &RetryPolicy,
    should_retry: P,
) -> Result<T, Exhausted<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    P: Fn(&E) -> bool,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(err) => {
                if attempt > policy.retries || !should_retry(&err) {
                    debug!("Giving up after attempt {}: {}", attempt, err);
                    return Err(Exhausted {
                        error: err,
                        attempts: attempt,
                    });
                }
                let delay = policy.delay_after(attempt);
                warn!(
                    "Attempt {}/{} failed: {}. Retrying in {:?}...",
                    attempt,
                    policy.retries + 1,
                    err,
                    delay
                );
                attempt += 1;
                tokio::time::sleep(delay).await;
            }
        }
    }
}
