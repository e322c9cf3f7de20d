//! Step execution with retry and exponential backoff.
//!
//! Every call that crosses a process boundary (decision provider, record
//! service, callback registration) runs through [`execute_step`]. A step is
//! attempted until it succeeds, fails with a non-retriable error, hits the
//! attempt cap, or would outlive the expiration window.
//!
//! ```text
//! attempt 1 ──fail──▶ sleep 1s ──▶ attempt 2 ──fail──▶ sleep 2s ──▶ ... (cap 60s)
//!     │                                  │
//!     └─ NonRetriable ─▶ stop            └─ attempts == max ─▶ RetriesExhausted
//! ```

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Failure of one step attempt, or of the whole step once retries stop
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StepError {
    /// Network or endpoint failure; retried under the step's policy
    #[error("Transport error: {0}")]
    Transport(String),

    /// A single attempt exceeded its start-to-close budget
    #[error("Attempt timed out after {0:?}")]
    Timeout(Duration),

    /// Well-formed answer that must not be retried (e.g. `DISAPPROVED`)
    #[error("Non-retriable failure: {0}")]
    NonRetriable(String),

    #[error("Gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}

impl StepError {
    /// Reason string matched against [`RetryPolicy::non_retriable_reasons`]
    pub fn reason(&self) -> &str {
        match self {
            StepError::Transport(reason) => reason,
            StepError::Timeout(_) => "TIMEOUT",
            StepError::NonRetriable(reason) => reason,
            StepError::RetriesExhausted { .. } => "RETRIES_EXHAUSTED",
        }
    }
}

/// Retry policy of one step
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Delay before the second attempt
    pub initial_interval: Duration,
    /// Multiplier applied to the delay after each failed attempt
    pub backoff_coefficient: f64,
    /// Upper bound of a single delay
    pub maximum_interval: Duration,
    /// No attempt is started once this much time has passed since the first
    pub expiration_interval: Duration,
    /// Attempt cap; 0 means unlimited (bounded by the expiration window)
    pub maximum_attempts: u32,
    /// Failure reasons that stop the step immediately
    pub non_retriable_reasons: Vec<String>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            backoff_coefficient: 2.0,
            maximum_interval: Duration::from_secs(60),
            expiration_interval: Duration::from_secs(5 * 60),
            maximum_attempts: 10,
            non_retriable_reasons: Vec::new(),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn with_maximum_attempts(mut self, attempts: u32) -> Self {
        self.maximum_attempts = attempts;
        self
    }

    #[must_use]
    pub fn with_non_retriable<I, S>(mut self, reasons: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.non_retriable_reasons
            .extend(reasons.into_iter().map(Into::into));
        self
    }

    /// Delay after the given failed attempt (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.initial_interval.as_secs_f64() * self.backoff_coefficient.powi(exponent);
        let capped = secs.min(self.maximum_interval.as_secs_f64());
        if capped.is_finite() && capped >= 0.0 {
            Duration::from_secs_f64(capped)
        } else {
            self.maximum_interval
        }
    }

    pub fn is_retriable(&self, error: &StepError) -> bool {
        match error {
            StepError::NonRetriable(_) | StepError::RetriesExhausted { .. } => false,
            other => !self
                .non_retriable_reasons
                .iter()
                .any(|reason| reason == other.reason()),
        }
    }
}

/// Options of one step: per-attempt budget plus retry policy
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StepOptions {
    /// Per-attempt budget; `None` lets an attempt run until it finishes
    pub start_to_close: Option<Duration>,
    pub retry: RetryPolicy,
}

impl StepOptions {
    pub fn new(start_to_close: Option<Duration>, retry: RetryPolicy) -> Self {
        Self {
            start_to_close,
            retry,
        }
    }
}

/// Run `step` under `options`, retrying retriable failures.
///
/// `step` is invoked once per attempt. Non-retriable failures are returned
/// as is; a step that runs out of attempts or time returns
/// [`StepError::RetriesExhausted`] carrying the last failure.
pub async fn execute_step<T, F, Fut>(
    name: &str,
    options: &StepOptions,
    mut step: F,
) -> Result<T, StepError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StepError>>,
{
    let policy = &options.retry;
    let started = Instant::now();
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        let outcome = match options.start_to_close {
            Some(budget) => match tokio::time::timeout(budget, step()).await {
                Ok(result) => result,
                Err(_) => Err(StepError::Timeout(budget)),
            },
            None => step().await,
        };

        let error = match outcome {
            Ok(value) => {
                if attempt > 1 {
                    debug!(step = name, attempt, "Step succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        if !policy.is_retriable(&error) {
            warn!(step = name, attempt, error = %error, "Step failed with non-retriable error");
            return Err(error);
        }

        if policy.maximum_attempts > 0 && attempt >= policy.maximum_attempts {
            warn!(step = name, attempt, error = %error, "Step reached maximum attempts");
            return Err(StepError::RetriesExhausted {
                attempts: attempt,
                last: error.to_string(),
            });
        }

        let delay = policy.backoff(attempt);
        if started.elapsed() + delay >= policy.expiration_interval {
            warn!(step = name, attempt, error = %error, "Step retry window expired");
            return Err(StepError::RetriesExhausted {
                attempts: attempt,
                last: error.to_string(),
            });
        }

        warn!(
            step = name,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Step attempt failed, retrying"
        );
        tokio::time::sleep(delay).await;
    }
}
