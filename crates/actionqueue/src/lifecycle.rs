//! Lifecycle rules for an [`ActionQueue`](crate::ActionQueue).
//!
//! ```text
//! Init
//!  |
//!  | <-\
//!  v   |
//! Add -/
//!  |
//!  v
//! Execute -> ExecuteComplete
//!  |            |
//!  v            |
//! Rollback <----/
//!  |
//!  v
//! RollbackComplete
//! ```
//!
//! One or more adds, one execute, at most one rollback. Rolling back after a
//! successful execute is allowed.

use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueueState {
    #[default]
    Init,
    Add,
    Execute,
    ExecuteComplete,
    Rollback,
    RollbackComplete,
}

impl QueueState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Add => "add",
            Self::Execute => "execute",
            Self::ExecuteComplete => "execute-complete",
            Self::Rollback => "rollback",
            Self::RollbackComplete => "rollback-complete",
        }
    }

    /// Compute the state reached by taking `transition` from `self`.
    ///
    /// # Errors
    ///
    /// Returns [`IllegalTransition`] if the transition is not allowed from
    /// this state.
    pub const fn apply(self, transition: Transition) -> Result<Self, IllegalTransition> {
        match (self, transition) {
            (Self::Init | Self::Add, Transition::Add) => Ok(Self::Add),
            (Self::Add, Transition::Execute) => Ok(Self::Execute),
            (Self::Execute, Transition::ExecuteComplete) => Ok(Self::ExecuteComplete),
            (Self::Execute | Self::ExecuteComplete, Transition::Rollback) => Ok(Self::Rollback),
            (Self::Rollback, Transition::RollbackComplete) => Ok(Self::RollbackComplete),
            (from, transition) => Err(IllegalTransition { from, transition }),
        }
    }

    /// No transition leaves this state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::RollbackComplete)
    }
}

impl fmt::Display for QueueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Add,
    Execute,
    ExecuteComplete,
    Rollback,
    RollbackComplete,
}

impl Transition {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Execute => "execute",
            Self::ExecuteComplete => "execute-complete",
            Self::Rollback => "rollback",
            Self::RollbackComplete => "rollback-complete",
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The queue API was driven out of order.
///
/// This is a programming error in the caller, not a failure of any action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal action queue transition '{transition}' from state '{from}'")]
pub struct IllegalTransition {
    pub from: QueueState,
    pub transition: Transition,
}

/// Current state of a queue, guarded by [`QueueState::apply`].
#[derive(Debug, Default)]
pub struct Lifecycle {
    state: QueueState,
}

impl Lifecycle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn state(&self) -> QueueState {
        self.state
    }

    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    fn transition(&mut self, transition: Transition) -> Result<(), IllegalTransition> {
        let next = self.state.apply(transition)?;
        tracing::debug!(from = %self.state, to = %next, "action queue transition");
        self.state = next;
        Ok(())
    }

    /// # Errors
    ///
    /// Fails unless the state is `Init` or `Add`.
    pub fn enter_add(&mut self) -> Result<(), IllegalTransition> {
        self.transition(Transition::Add)
    }

    /// # Errors
    ///
    /// Fails unless the state is `Add`.
    pub fn enter_execute(&mut self) -> Result<(), IllegalTransition> {
        self.transition(Transition::Execute)
    }

    /// # Errors
    ///
    /// Fails unless the state is `Execute`.
    pub fn enter_execute_complete(&mut self) -> Result<(), IllegalTransition> {
        self.transition(Transition::ExecuteComplete)
    }

    /// # Errors
    ///
    /// Fails unless the state is `Execute` or `ExecuteComplete`.
    pub fn enter_rollback(&mut self) -> Result<(), IllegalTransition> {
        self.transition(Transition::Rollback)
    }

    /// # Errors
    ///
    /// Fails unless the state is `Rollback`.
    pub fn enter_rollback_complete(&mut self) -> Result<(), IllegalTransition> {
        self.transition(Transition::RollbackComplete)
    }
}
