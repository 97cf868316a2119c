//! Request-level retry for chunk PUTs and finalize.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use vidup_transfer::{ProgressObserver, RetryEvent, RetryOperation};

use crate::transport::TransportError;

/// Attempts per request.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// How often and how fast a failed request is retried.
///
/// The default retries immediately. A non-zero `initial_delay` turns on
/// capped exponential backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first. Treated as at least 1.
    pub max_attempts: u32,
    /// Pause after the first failure.
    pub initial_delay: Duration,
    /// Backoff cap.
    pub max_delay: Duration,
    /// Multiplier applied per further failure.
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay: Duration::ZERO,
            max_delay: Duration::from_secs(10),
            backoff_factor: 2.0,
        }
    }
}

impl RetryPolicy {
    /// `max_attempts` back-to-back attempts with no pause.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Pause after failed attempt `attempt` (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if self.initial_delay.is_zero() {
            return Duration::ZERO;
        }
        let exp = attempt.saturating_sub(1).min(63) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.backoff_factor.powi(exp);
        Duration::from_secs_f64(secs.min(self.max_delay.as_secs_f64()))
    }

    pub(crate) fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Why [`with_retry`] gave up.
#[derive(Debug)]
pub(crate) enum RetryFailure {
    Exhausted {
        attempts: u32,
        source: TransportError,
    },
    Cancelled,
}

/// Runs `call` until it succeeds, the budget runs out, or `cancel` fires.
///
/// Every failed attempt that will be retried is logged and reported to
/// `observer`. Cancellation is raced against the in-flight request and
/// against any backoff pause.
pub(crate) async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: RetryOperation,
    observer: &dyn ProgressObserver,
    cancel: &CancellationToken,
    mut call: F,
) -> Result<T, RetryFailure>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, TransportError>>,
{
    let max_attempts = policy.attempts();
    let mut attempt = 1;

    loop {
        if cancel.is_cancelled() {
            return Err(RetryFailure::Cancelled);
        }

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RetryFailure::Cancelled),
            r = call() => r,
        };

        let err = match result {
            Ok(value) => {
                if attempt > 1 {
                    debug!(%operation, attempt, "succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        if attempt >= max_attempts {
            return Err(RetryFailure::Exhausted {
                attempts: attempt,
                source: err,
            });
        }

        warn!(%operation, attempt, max_attempts, error = %err, "attempt failed, retrying");
        observer.on_retry(&RetryEvent {
            operation,
            attempt,
            max_attempts,
            error: err.to_string(),
        });

        let delay = policy.delay_for_attempt(attempt);
        if !delay.is_zero() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RetryFailure::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
        attempt += 1;
    }
}
