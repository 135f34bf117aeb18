use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::action::{ActionError, RetryRequested};

const DEFAULT_RETRIES: u32 = 3;
const DEFAULT_INITIAL_BACKOFF_MS: u64 = 500;

/// Generic terminal error returned by [`DoublingBackoff::raise`] once all
/// retries have been used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("gave up after {retries} retries")]
pub struct RetriesExhausted {
    pub retries: u32,
}

/// Error loading a [`BackoffConfig`].
#[derive(Debug, Error)]
#[error("invalid backoff configuration")]
pub struct ConfigError {
    #[from]
    source: toml::de::Error,
}

/// Retry settings for a [`DoublingBackoff`].
///
/// ```toml
/// retries = 5
/// initial-backoff-ms = 100
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct BackoffConfig {
    pub retries: u32,
    pub initial_backoff_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            retries: DEFAULT_RETRIES,
            initial_backoff_ms: DEFAULT_INITIAL_BACKOFF_MS,
        }
    }
}

impl BackoffConfig {
    /// Parse settings from a TOML document. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the document is not valid TOML or contains
    /// unknown keys or values of the wrong type.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(input)?)
    }
}

/// Produces a fixed number of retry requests with doubling backoff, then
/// terminal errors forever after.
///
/// Actions own one of these and call it from their failure path:
///
/// ```
/// use actionqueue::{Action, ActionError, DoublingBackoff};
///
/// struct Flaky {
///     backoff: DoublingBackoff,
/// }
///
/// impl Action for Flaky {
///     type Error = std::io::Error;
///
///     fn execute(&mut self) -> Result<(), ActionError<Self::Error>> {
///         let err = std::io::Error::other("service unavailable");
///         Err(self.backoff.raise_with(err))
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct DoublingBackoff {
    max_retries: u32,
    executed_retries: u32,
    current_backoff: Duration,
}

impl Default for DoublingBackoff {
    fn default() -> Self {
        Self::from_config(BackoffConfig::default())
    }
}

impl DoublingBackoff {
    #[must_use]
    pub const fn new(max_retries: u32, initial_backoff: Duration) -> Self {
        Self {
            max_retries,
            executed_retries: 0,
            current_backoff: initial_backoff,
        }
    }

    #[must_use]
    pub const fn from_config(config: BackoffConfig) -> Self {
        Self::new(
            config.retries,
            Duration::from_millis(config.initial_backoff_ms),
        )
    }

    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    #[must_use]
    pub const fn retries_used(&self) -> u32 {
        self.executed_retries
    }

    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.executed_retries >= self.max_retries
    }

    fn next_retry(&mut self) -> Option<RetryRequested> {
        if self.is_exhausted() {
            return None;
        }
        let backoff = self.current_backoff;
        self.executed_retries += 1;
        self.current_backoff = backoff.saturating_mul(2);
        Some(RetryRequested::new(backoff))
    }

    /// Next retry request, or `error` once retries are used up.
    pub fn raise_with<E>(&mut self, error: E) -> ActionError<E> {
        match self.next_retry() {
            Some(retry) => ActionError::Retry(retry),
            None => ActionError::Fatal(error),
        }
    }

    /// Next retry request, or [`RetriesExhausted`] once retries are used up.
    pub fn raise<E: From<RetriesExhausted>>(&mut self) -> ActionError<E> {
        let exhausted = RetriesExhausted {
            retries: self.max_retries,
        };
        self.raise_with(exhausted).map_fatal(E::from)
    }
}
