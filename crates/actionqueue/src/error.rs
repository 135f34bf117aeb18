use std::fmt::Debug;

use thiserror::Error;

use crate::lifecycle::IllegalTransition;

/// An action whose rollback failed terminally.
#[derive(Debug, Error)]
#[error("rollback failed for action '{action}' at position {index}")]
pub struct RollbackFailure<E> {
    /// Name of the action.
    pub action: String,
    /// Position of the action in the queue.
    pub index: usize,
    /// The error returned by the action's rollback.
    #[source]
    pub error: E,
}

/// Error from [`ActionQueue::execute`](crate::ActionQueue::execute).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QueueError<E: Debug> {
    /// An action failed terminally. Later actions were not attempted.
    #[error("action '{action}' at position {index} failed")]
    ActionFailed {
        /// Name of the action that failed.
        action: String,
        /// Position of the action in the queue.
        index: usize,
        /// The error that caused the action to fail.
        #[source]
        source: E,
    },

    /// The queue was used out of order.
    #[error(transparent)]
    Lifecycle(#[from] IllegalTransition),
}

impl<E: Debug> QueueError<E> {
    /// The failing action's error, if an action failed.
    #[must_use]
    pub fn action_error(&self) -> Option<&E> {
        match self {
            Self::ActionFailed { source, .. } => Some(source),
            Self::Lifecycle(_) => None,
        }
    }

    /// Whether this is a usage error rather than an action failure.
    #[must_use]
    pub const fn is_lifecycle(&self) -> bool {
        matches!(self, Self::Lifecycle(_))
    }
}

/// Outcome of [`ActionQueue::rollback`](crate::ActionQueue::rollback).
///
/// Every executed action has had its rollback attempted. Failures are
/// listed in the order they were attempted (reverse queue order).
#[derive(Debug)]
#[must_use]
pub struct RollbackReport<E> {
    pub(crate) attempted: usize,
    pub(crate) failures: Vec<RollbackFailure<E>>,
}

impl<E> RollbackReport<E> {
    /// Number of actions whose rollback was attempted.
    pub fn attempted(&self) -> usize {
        self.attempted
    }

    pub fn failures(&self) -> &[RollbackFailure<E>] {
        &self.failures
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn into_failures(self) -> Vec<RollbackFailure<E>> {
        self.failures
    }
}
