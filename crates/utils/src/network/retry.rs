use std::future::Future;
use std::time::Duration;
use storegate_core::{
    Error, DEFAULT_JITTER_FACTOR, DEFAULT_MAX_BACKOFF_MS, DEFAULT_MAX_RETRIES,
    DEFAULT_MIN_BACKOFF_MS,
};
use tokio::time::sleep;
use tracing::{debug, warn};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries allowed after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub min_backoff: Duration,
    /// Upper bound for the computed delay, before jitter
    pub max_backoff: Duration,
    /// Jitter added on top of the delay, as a fraction of it
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            min_backoff: Duration::from_millis(DEFAULT_MIN_BACKOFF_MS),
            max_backoff: Duration::from_millis(DEFAULT_MAX_BACKOFF_MS),
            jitter_factor: DEFAULT_JITTER_FACTOR,
        }
    }
}

impl RetryConfig {
    /// Configuration that never retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }
}

/// Whether a failed attempt is worth repeating
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Retryable,
    Fatal,
}

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep for the delay, then try again
    Retry(Duration),
    /// Hand the error to the caller
    Settle,
}

/// Trait for determining if an error is retryable
pub trait RetryableError {
    /// Classify this error
    fn classification(&self) -> Classification;

    /// Delay requested by the remote side, if any
    fn retry_hint(&self) -> Option<Duration> {
        None
    }
}

impl RetryableError for Error {
    fn classification(&self) -> Classification {
        match self {
            Error::NetworkFailure { .. }
            | Error::Timeout { .. }
            | Error::RateLimited { .. }
            | Error::ServerError { .. } => Classification::Retryable,
            _ => Classification::Fatal,
        }
    }

    fn retry_hint(&self) -> Option<Duration> {
        self.retry_after()
    }
}

/// Classified retry with exponential backoff and jitter
#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Classify a failed attempt
    pub fn classify<E: RetryableError>(&self, error: &E) -> Classification {
        error.classification()
    }

    /// Delay before retry number `attempt` (1-based), without jitter
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.config
            .min_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.config.max_backoff)
    }

    /// Delay before retry number `attempt` (1-based), jitter included
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let delay = self.base_delay(attempt);
        let factor = self.config.jitter_factor.max(0.0);
        if factor == 0.0 {
            return delay;
        }
        delay + delay.mul_f64(factor * rand::random::<f64>())
    }

    /// Decide what follows failed attempt number `attempt` (1-based)
    pub fn decide<E: RetryableError>(&self, attempt: u32, error: &E) -> RetryDecision {
        if attempt > self.config.max_retries {
            return RetryDecision::Settle;
        }
        match self.classify(error) {
            Classification::Fatal => RetryDecision::Settle,
            Classification::Retryable => RetryDecision::Retry(
                error
                    .retry_hint()
                    .unwrap_or_else(|| self.next_delay(attempt)),
            ),
        }
    }
}

/// Run `operation` until it succeeds or the policy settles
///
/// The closure receives the 1-based attempt number. Retries sleep for the
/// delay chosen by [`RetryPolicy::decide`].
pub async fn retry_async<F, Fut, T, E>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> std::result::Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: RetryableError + std::fmt::Display,
{
    let mut attempt = 1u32;

    loop {
        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(operation = %operation_name, attempt, "retry_succeeded");
                }
                return Ok(value);
            }
            Err(error) => match policy.decide(attempt, &error) {
                RetryDecision::Retry(delay) => {
                    warn!(
                        operation = %operation_name,
                        attempt,
                        max_retries = policy.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "retrying_after_failure"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                RetryDecision::Settle => {
                    debug!(operation = %operation_name, attempt, error = %error, "retry_settled");
                    return Err(error);
                }
            },
        }
    }
}
