//! Retry primitive with exponential backoff and jitter

use graphsearch_core::config::LlmConfig;
use graphsearch_core::error::InvocationError;
use rand::random;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Backoff schedule and attempt bound for one invocation
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    /// Fraction of the delay randomized in both directions
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&LlmConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            initial_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_delay: Duration::from_secs(config.retry_max_delay_secs),
            multiplier: 2.0,
            jitter: config.retry_jitter,
        }
    }

    /// Policy without any waiting between attempts
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: 1.0,
            jitter: 0.0,
        }
    }

    /// Delay before the retry following failed attempt number `attempt` (zero based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let jitter_factor = 1.0 + (random::<f64>() - 0.5) * 2.0 * self.jitter;
        let jittered = (base * jitter_factor).max(0.0);
        let clamped = jittered.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(clamped)
    }
}

/// Bookkeeping for a single invocation's attempts
#[derive(Debug)]
pub struct RetryState {
    pub attempt_number: u32,
    started: Instant,
    pub last_error: Option<InvocationError>,
}

impl RetryState {
    fn new() -> Self {
        Self {
            attempt_number: 0,
            started: Instant::now(),
            last_error: None,
        }
    }

    pub fn elapsed_since_first_attempt(&self) -> Duration {
        self.started.elapsed()
    }

    /// Error reported once every attempt has failed.
    ///
    /// A rate limit stays a rate limit; anything else becomes a service error
    /// so callers never see a bare timeout for an exhausted invocation.
    fn exhausted(self) -> InvocationError {
        let attempts = self.attempt_number;
        let elapsed = self.started.elapsed();
        match self.last_error {
            Some(InvocationError::RateLimited(msg)) => InvocationError::RateLimited(format!(
                "gave up after {attempts} attempts in {elapsed:?}: {msg}"
            )),
            Some(other) => InvocationError::permanent(format!(
                "gave up after {attempts} attempts in {elapsed:?}: {other}"
            )),
            None => InvocationError::permanent(format!("no attempt made in {elapsed:?}")),
        }
    }
}

/// Run `op` until it succeeds, fails permanently, or the policy runs out of attempts.
///
/// Permanent errors (`ParseError`, non-transient `ServiceError`) are returned
/// unchanged after the attempt that produced them.
pub async fn attempt<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, InvocationError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, InvocationError>>,
{
    let mut state = RetryState::new();

    while state.attempt_number < policy.max_attempts {
        state.attempt_number += 1;
        match op().await {
            Ok(value) => {
                if state.attempt_number > 1 {
                    debug!(
                        "Invocation succeeded on attempt {}/{} after {:?}",
                        state.attempt_number,
                        policy.max_attempts,
                        state.elapsed_since_first_attempt()
                    );
                }
                return Ok(value);
            }
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) => {
                if state.attempt_number < policy.max_attempts {
                    let backoff = policy.delay_for_attempt(state.attempt_number - 1);
                    warn!(
                        "Invocation attempt {}/{} failed: {e}. Retrying in {backoff:?}",
                        state.attempt_number, policy.max_attempts
                    );
                    state.last_error = Some(e);
                    tokio::time::sleep(backoff).await;
                } else {
                    warn!(
                        "Invocation attempt {}/{} failed: {e}. No attempts left",
                        state.attempt_number, policy.max_attempts
                    );
                    state.last_error = Some(e);
                }
            }
        }
    }

    Err(state.exhausted())
}
