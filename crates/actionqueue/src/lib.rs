//! Ordered execution of compensable actions.
//!
//! An [`ActionQueue`] runs a sequence of [`Action`]s in the order they were
//! added. If one fails, the caller rolls the queue back, which undoes every
//! attempted action in reverse order. Actions can ask to be retried after a
//! backoff; [`DoublingBackoff`] produces a bounded series of such requests.

mod action;
mod audit;
mod backoff;
mod error;
mod lifecycle;
mod queue;
mod sleeper;

pub use action::{Action, ActionError, RetryRequested};
pub use audit::{ActionRecord, ActionStatus, QueueAuditLog};
pub use backoff::{BackoffConfig, ConfigError, DoublingBackoff, RetriesExhausted};
pub use error::{QueueError, RollbackFailure, RollbackReport};
pub use lifecycle::{IllegalTransition, Lifecycle, QueueState, Transition};
pub use queue::{ActionQueue, execute_with_retries};
pub use sleeper::{Sleeper, ThreadSleeper};
