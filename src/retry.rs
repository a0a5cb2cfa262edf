//! Retry logic for transient API failures
//!
//! The metadata client wraps every request in [`with_retry`]. Whether an error
//! warrants another attempt is decided by [`IsRetryable`]; the delay schedule
//! comes from [`RetryConfig`].
//!
//! # Example
//!
//! ```no_run
//! use civitai_dl::retry::{IsRetryable, with_retry};
//! use civitai_dl::config::RetryConfig;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Throttled,
//!     Fatal,
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
//! let result = with_retry(&config, || async {
//!     Ok::<_, MyError>(())
//! }).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::Error;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// HTTP 429 Too Many Requests
pub const STATUS_TOO_MANY_REQUESTS: u16 = 429;

/// Non-standard status Civitai answers with while overloaded
pub const STATUS_PLATFORM_OVERLOADED: u16 = 514;

/// Trait for errors that can be classified as retryable or not
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

/// Whether an HTTP status signals throttling rather than a real failure
pub fn is_transient_status(status: u16) -> bool {
    matches!(status, STATUS_TOO_MANY_REQUESTS | STATUS_PLATFORM_OVERLOADED)
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Api { status, .. } => is_transient_status(*status),
            Error::Network(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status()
                        .map(|s| is_transient_status(s.as_u16()))
                        .unwrap_or(false)
            }
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::Interrupted
            ),
            // RPC and backend failures are never retried here
            Error::Rpc { .. } => false,
            Error::Download(_) => false,
            Error::Config { .. } => false,
            Error::Serialization(_) | Error::Yaml(_) => false,
            Error::ExternalTool(_) => false,
            Error::Other(_) => false,
        }
    }
}

/// Execute an async operation, retrying while its error is retryable
///
/// The delay starts at `initial_delay`, is multiplied by `backoff_multiplier`
/// after every retry and capped at `max_delay`. Returns the first success or
/// the last error once `max_attempts` retries are used up.
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!(attempts = attempt + 1, "Request succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < config.max_attempts => {
                attempt += 1;

                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = delay.as_millis(),
                    "Request failed, retrying"
                );

                let wait = if config.jitter {
                    add_jitter(delay)
                } else {
                    delay
                };
                tokio::time::sleep(wait).await;

                let next_delay =
                    Duration::from_secs_f64(delay.as_secs_f64() * config.backoff_multiplier);
                delay = next_delay.min(config.max_delay);
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(
                        error = %e,
                        attempts = attempt + 1,
                        "Request failed after all retry attempts exhausted"
                    );
                }
                return Err(e);
            }
        }
    }
}

/// Jitter is uniform between 0% and 100% of the delay.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}
