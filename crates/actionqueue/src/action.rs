use std::time::Duration;

/// A unit of work that can be executed and rolled back.
///
/// Actions carry whatever state they need to undo their own side effects.
/// The queue passes no context: anything an action depends on must be
/// captured when it is constructed.
///
/// Both operations may ask the driving queue to try again later by returning
/// [`ActionError::Retry`]. Any other failure is terminal for the action.
pub trait Action {
    /// Error type for terminal failures.
    type Error;

    /// Human-readable name for logging and error messages.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Perform the action's side effect.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::Retry`] to be called again after a backoff, or
    /// [`ActionError::Fatal`] if the action cannot complete.
    fn execute(&mut self) -> Result<(), ActionError<Self::Error>>;

    /// Undo the side effect of a previous [`execute`](Action::execute).
    ///
    /// Called at most once per queue lifecycle, and only for actions whose
    /// `execute` was attempted. The attempt may have failed, so implementations
    /// should tolerate partially applied effects.
    ///
    /// The default implementation is a no-op, suitable for actions without
    /// side effects.
    ///
    /// # Errors
    ///
    /// Same contract as `execute`.
    fn rollback(&mut self) -> Result<(), ActionError<Self::Error>> {
        Ok(())
    }
}

/// Request to re-run an operation after waiting for `backoff`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryRequested {
    backoff: Duration,
}

impl RetryRequested {
    #[must_use]
    pub const fn new(backoff: Duration) -> Self {
        Self { backoff }
    }

    #[must_use]
    pub const fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    /// How long the queue waits before the next attempt.
    #[must_use]
    pub const fn backoff(&self) -> Duration {
        self.backoff
    }

    #[must_use]
    pub fn millis(&self) -> u64 {
        u64::try_from(self.backoff.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Failure signalled by an [`Action`] operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionError<E> {
    /// Recoverable: the queue sleeps for the backoff and calls the operation again.
    Retry(RetryRequested),
    /// Terminal: the operation is not retried.
    Fatal(E),
}

impl<E> ActionError<E> {
    #[must_use]
    pub const fn retry_after_ms(ms: u64) -> Self {
        Self::Retry(RetryRequested::from_millis(ms))
    }

    #[must_use]
    pub const fn fatal(error: E) -> Self {
        Self::Fatal(error)
    }

    #[must_use]
    pub const fn is_retry(&self) -> bool {
        matches!(self, Self::Retry(_))
    }

    /// Convert the terminal error, leaving retry requests untouched.
    pub fn map_fatal<F>(self, f: impl FnOnce(E) -> F) -> ActionError<F> {
        match self {
            Self::Retry(retry) => ActionError::Retry(retry),
            Self::Fatal(error) => ActionError::Fatal(f(error)),
        }
    }
}

impl<E> From<RetryRequested> for ActionError<E> {
    fn from(retry: RetryRequested) -> Self {
        Self::Retry(retry)
    }
}
