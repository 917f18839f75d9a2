use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

// ============================================================================
// Exponential Backoff Retry Strategy
// ============================================================================
//
// Used for the follow-up steps of a checkout that must not be folded back
// into the transaction: clearing the cart, releasing reserved stock.
//
// ============================================================================

#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Maximum number of attempts, the first one included
    pub max_attempts: u32,
    pub initial_delay: Duration,
    /// Ceiling for any single wait
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Stock increments that undo a reservation: more attempts, longer ceiling
    pub fn for_compensation() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }

    fn backoff(&self) -> Backoff {
        Backoff {
            next: self.initial_delay,
            multiplier: self.multiplier,
            ceiling: self.max_delay,
        }
    }
}

/// Waits between attempts: `initial_delay`, then multiplied up to the ceiling
struct Backoff {
    next: Duration,
    multiplier: f64,
    ceiling: Duration,
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let current = self.next.min(self.ceiling);
        self.next = self.next.mul_f64(self.multiplier).min(self.ceiling);
        Some(current)
    }
}

#[derive(Debug)]
pub enum RetryResult<T, E> {
    Success(T),
    /// Every attempt failed; carries the last error
    Failed(E),
    /// The error was not worth retrying
    PermanentFailure(E),
}

impl<T, E> RetryResult<T, E> {
    pub fn into_result(self) -> Result<T, E> {
        match self {
            RetryResult::Success(value) => Ok(value),
            RetryResult::Failed(err) | RetryResult::PermanentFailure(err) => Err(err),
        }
    }
}

/// Errors that tell whether another attempt could succeed
pub trait IsTransient {
    fn is_transient(&self) -> bool;
}

/// Retry every failure until `max_attempts` is reached.
///
/// `operation` receives the 1-based attempt number.
pub async fn retry_with_backoff<F, Fut, T, E>(config: RetryConfig, operation: F) -> RetryResult<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    drive(config, operation, |_| true).await
}

/// Like `retry_with_backoff`, but gives up at once on a permanent error.
pub async fn retry_on_transient<F, Fut, T, E>(config: RetryConfig, operation: F) -> RetryResult<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display + IsTransient,
{
    drive(config, operation, |e: &E| e.is_transient()).await
}

async fn drive<F, Fut, T, E>(
    config: RetryConfig,
    mut operation: F,
    retryable: impl Fn(&E) -> bool,
) -> RetryResult<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut waits = config.backoff();
    let mut attempt = 0;

    loop {
        attempt += 1;

        let error = match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(attempt = attempt, "Succeeded after retry");
                }
                return RetryResult::Success(value);
            }
            Err(error) => error,
        };

        if !retryable(&error) {
            tracing::error!(error = %error, "Permanent failure, not retrying");
            return RetryResult::PermanentFailure(error);
        }
        if attempt >= config.max_attempts {
            tracing::error!(attempts = attempt, error = %error, "Giving up");
            return RetryResult::Failed(error);
        }

        let wait = waits.next().unwrap_or(config.max_delay);
        tracing::warn!(
            attempt = attempt,
            error = %error,
            delay_ms = wait.as_millis() as u64,
            "Attempt failed, backing off"
        );
        sleep(wait).await;
    }
}
