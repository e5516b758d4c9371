//! Retry logic with exponential backoff
//!
//! Annotation attempts that fail with a retryable error are repeated after an
//! exponentially growing delay, up to a fixed number of attempts. Each retry is
//! announced through a hook so callers can surface "retrying in Ns" notices.
//!
//! # Example
//!
//! ```no_run
//! use caption_batch::retry::{IsRetryable, with_retry};
//! use caption_batch::config::RetryConfig;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Throttled,
//!     Broken,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{:?}", self)
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Throttled)
//!     }
//! }
//!
//! # async fn example() -> Result<(), MyError> {
//! let config = RetryConfig::default();
//! let value = with_retry(
//!     &config,
//!     |_attempt| async { Ok::<_, MyError>(42) },
//!     |notice| async move { println!("retry {} in {:?}", notice.retry, notice.delay) },
//! )
//! .await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::AnnotateError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
pub trait IsRetryable {
    /// Returns true if the operation should be attempted again
    fn is_retryable(&self) -> bool;
}

/// Only throttling is worth waiting out; everything else fails the item.
impl IsRetryable for AnnotateError {
    fn is_retryable(&self) -> bool {
        matches!(self, AnnotateError::RateLimited { .. })
    }
}

/// Announcement of an upcoming retry
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryNotice {
    /// Retry number, 1-based (retry 1 precedes attempt 2)
    pub retry: u32,
    /// Delay before the next attempt
    pub delay: Duration,
    /// Display form of the error that triggered the retry
    pub error: String,
}

/// Backoff delay before retry number `retry` (1-based), without jitter
///
/// `initial_delay * backoff_multiplier^(retry - 1)`, capped at `max_delay`.
/// A product that overflows or is not a number falls back to `max_delay`.
pub fn backoff_delay(config: &RetryConfig, retry: u32) -> Duration {
    let exponent = i32::try_from(retry.saturating_sub(1)).unwrap_or(i32::MAX);
    let secs = config.initial_delay.as_secs_f64() * config.backoff_multiplier.powi(exponent);
    let capped = secs.min(config.max_delay.as_secs_f64());
    Duration::try_from_secs_f64(capped)
        .map_or(config.max_delay, |delay| delay.min(config.max_delay))
}

/// Execute an async operation, retrying retryable failures with exponential backoff
///
/// `operation` receives the 1-based attempt number. `on_retry` runs before each
/// backoff sleep. At most `config.max_attempts` attempts are made; the last
/// error is returned when they are exhausted or when a failure is not retryable.
pub async fn with_retry<F, Fut, T, E, H, HFut>(
    config: &RetryConfig,
    mut operation: F,
    mut on_retry: H,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
    H: FnMut(RetryNotice) -> HFut,
    HFut: Future<Output = ()>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation(attempt).await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(attempts = attempt, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                let retry = attempt;
                let delay = if config.jitter {
                    add_jitter(backoff_delay(config, retry))
                } else {
                    backoff_delay(config, retry)
                };

                tracing::warn!(
                    error = %e,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Operation failed, retrying"
                );

                on_retry(RetryNotice {
                    retry,
                    delay,
                    error: e.to_string(),
                })
                .await;

                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(
                        error = %e,
                        attempts = attempt,
                        "Operation failed after all retry attempts exhausted"
                    );
                } else {
                    tracing::error!(error = %e, "Operation failed with non-retryable error");
                }
                return Err(e);
            }
        }
    }
}

/// Render a delay the way users read it: "5s", "2.5s"
pub fn format_delay(delay: Duration) -> String {
    if delay.subsec_millis() == 0 {
        format!("{}s", delay.as_secs())
    } else {
        format!("{:.1}s", delay.as_secs_f64())
    }
}

/// Add random jitter to a delay
///
/// The actual delay lands between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::try_from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor)).unwrap_or(delay)
}
