use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

/// Blocking delay between attempts. Injected so retries can be tested
/// without real sleeping.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, delay: Duration);
}

/// Records every requested delay instead of sleeping.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, delay: Duration) {
        self.delays.lock().unwrap_or_else(|p| p.into_inner()).push(delay);
    }
}

/// How an operation failed, as classified by the operation itself.
#[derive(Debug)]
pub enum Attempt<E> {
    /// Transient; eligible for another try. `retry_after` is a server hint
    /// (e.g. a `Retry-After` header) that raises the delay for this retry.
    Retryable { error: E, retry_after: Option<Duration> },
    /// Non-transient; stops immediately.
    Fatal(E),
}

impl<E> Attempt<E> {
    pub fn retryable(error: E) -> Self {
        Attempt::Retryable { error, retry_after: None }
    }

    pub fn fatal(error: E) -> Self {
        Attempt::Fatal(error)
    }
}

#[derive(Debug, Error)]
pub enum RetryError<E: fmt::Debug + fmt::Display> {
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },
    #[error("fatal error on attempt {attempt}: {error}")]
    Fatal { attempt: u32, error: E },
}

impl<E: fmt::Debug + fmt::Display> RetryError<E> {
    /// Number of times the operation was invoked.
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. } => *attempts,
            RetryError::Fatal { attempt, .. } => *attempt,
        }
    }

    pub fn into_inner(self) -> E {
        match self {
            RetryError::Exhausted { last, .. } => last,
            RetryError::Fatal { error, .. } => error,
        }
    }
}

/// Per-invocation bookkeeping handed to the operation. Never outlives one
/// [`RetryPolicy::execute`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryState {
    /// 1-based number of the attempt being made.
    pub attempt: u32,
    pub max_attempts: u32,
    pub backoff_seconds: u64,
}

/// Exponential backoff: after failed attempt `n` the delay is
/// `base_backoff * 2^(n-1)`, never more than `max_delay`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_backoff: Duration,
    max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

impl RetryPolicy {
    /// `max_attempts` is raised to at least 1 and `base_backoff` to at least
    /// one second.
    pub fn new(max_attempts: u32, base_backoff: Duration) -> Self {
        let base_backoff = base_backoff.max(Duration::from_secs(1));
        Self {
            max_attempts: max_attempts.max(1),
            base_backoff,
            max_delay: Self::DEFAULT_MAX_DELAY.max(base_backoff),
        }
    }

    pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

    /// Caps every sleep, server hints included. Never below `base_backoff`.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay.max(self.base_backoff);
        self
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_backoff(&self) -> Duration {
        self.base_backoff
    }

    /// Delay applied after failed attempt `attempt` (1-based). Saturates
    /// instead of overflowing.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_backoff.checked_mul(factor).unwrap_or(Duration::MAX)
    }

    pub fn execute<T, E, F>(&self, sleeper: &dyn Sleeper, mut op: F) -> Result<T, RetryError<E>>
    where
        E: fmt::Debug + fmt::Display,
        F: FnMut(&RetryState) -> Result<T, Attempt<E>>,
    {
        let mut state = RetryState {
            attempt: 0,
            max_attempts: self.max_attempts,
            backoff_seconds: self.base_backoff.as_secs(),
        };

        loop {
            state.attempt += 1;
            let (error, retry_after) = match op(&state) {
                Ok(value) => return Ok(value),
                Err(Attempt::Fatal(error)) => {
                    return Err(RetryError::Fatal { attempt: state.attempt, error });
                }
                Err(Attempt::Retryable { error, retry_after }) => (error, retry_after),
            };

            if state.attempt >= self.max_attempts {
                return Err(RetryError::Exhausted { attempts: state.attempt, last: error });
            }

            let delay = self
                .delay_for(state.attempt)
                .max(retry_after.unwrap_or_default())
                .min(self.max_delay);
            state.backoff_seconds = delay.as_secs();
            warn!(
                attempt = state.attempt,
                max_attempts = self.max_attempts,
                delay_secs = delay.as_secs(),
                "attempt failed: {error}; retrying"
            );
            sleeper.sleep(delay);
        }
    }
}
