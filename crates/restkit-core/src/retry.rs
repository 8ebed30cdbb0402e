//! Exponential-backoff retry for a single logical operation.
//!
//! [`RetryStrategy`] holds the process-wide knobs and produces the delay
//! schedule; [`RetryCoordinator`] drives one operation through it.
//!
//! # Delay schedule
//!
//! `delay(attempt) = min(max_delay, min_delay * 2^(attempt - 1))`, optionally
//! jittered. Jittered delays are clamped to `max_delay` as well.
//!
//! # Rate-limit precedence
//!
//! When the failed attempt carries a server hint (see
//! [`Retryable::retry_after`]), the coordinator waits for the longer of the
//! hint and the computed delay. The hint may exceed `max_delay`: the remote
//! knows its own window better than our schedule does.
//!
//! # Ownership
//!
//! Exactly one layer may retry a given request. [`crate::Transport`] owns a
//! coordinator; nothing that calls the transport (the batch executor included)
//! retries again.

use std::{future::Future, time::Duration};

use backon::{BackoffBuilder, ExponentialBuilder, Retryable as _};
use tracing::{debug, instrument, warn};

use crate::{config::RetryConfig, error::Retryable};

/// Backoff configuration shared by every request of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryStrategy {
    /// Total number of invocations, first attempt included.
    max_attempts: usize,
    min_delay: Duration,
    max_delay: Duration,
    jitter: bool,
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryStrategy {
    /// Creates a strategy without jitter.
    ///
    /// `max_attempts` counts total invocations; `0` behaves like `1`. A
    /// `min_delay` above `max_delay` is lowered to `max_delay`.
    pub fn new(max_attempts: usize, min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            min_delay: min_delay.min(max_delay),
            max_delay,
            jitter: false,
        }
    }

    /// Builds a strategy from the `[retry]` config section.
    pub fn from_config(config: &RetryConfig) -> Self {
        let strategy = Self::new(
            config.attempts,
            Duration::from_millis(config.min_delay_ms),
            Duration::from_millis(config.max_delay_ms),
        );
        if config.jitter {
            strategy.with_jitter()
        } else {
            strategy
        }
    }

    /// A strategy that never retries.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    /// Randomizes each delay upward (still capped at `max_delay`).
    #[must_use]
    pub fn with_jitter(mut self) -> Self {
        self.jitter = true;
        self
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Un-jittered delay inserted after the given (1-based) failed attempt.
    pub fn delay(&self, attempt: usize) -> Duration {
        let attempt = attempt.max(1);
        ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(attempt)
            .build()
            .nth(attempt - 1)
            .unwrap_or(self.max_delay)
    }

    /// Delay to use when the failed attempt carried a server hint.
    ///
    /// The longer of the two wins.
    pub fn rate_limit_delay(computed: Duration, hint: Option<Duration>) -> Duration {
        hint.map_or(computed, |hint| hint.max(computed))
    }

    fn backoff(&self) -> ExponentialBuilder {
        let builder = ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_attempts - 1);
        if self.jitter {
            builder.with_jitter()
        } else {
            builder
        }
    }
}

/// Runs an operation under a [`RetryStrategy`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryCoordinator {
    strategy: RetryStrategy,
}

impl RetryCoordinator {
    pub fn new(strategy: RetryStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> &RetryStrategy {
        &self.strategy
    }

    /// Invokes `op` until it succeeds, fails terminally, or attempts run out.
    ///
    /// `target` names the request in log output.
    ///
    /// # Errors
    ///
    /// Returns the error of the last attempt, unchanged, when it is terminal
    /// or when `max_attempts` invocations have failed.
    #[instrument(skip_all, fields(request = %target))]
    pub async fn execute_with_retry<T, E, F, Fut>(&self, target: &str, op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + std::fmt::Display,
    {
        let max_delay = self.strategy.max_delay;
        let mut attempt: usize = 1;

        let result = op
            .retry(self.strategy.backoff())
            .when(|err: &E| err.is_retryable())
            .adjust(|err: &E, computed| {
                computed.map(|delay| {
                    RetryStrategy::rate_limit_delay(delay.min(max_delay), err.retry_after())
                })
            })
            .notify(|err: &E, delay| {
                warn!(
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "request failed, retrying"
                );
                attempt += 1;
            })
            .await;

        if let Err(err) = &result {
            if err.is_retryable() {
                warn!(attempt, error = %err, "retry attempts exhausted");
            } else {
                debug!(attempt, error = %err, "terminal error, not retrying");
            }
        }
        result
    }
}
