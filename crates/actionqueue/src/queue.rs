use std::fmt::Debug;

use tracing::{debug, info, warn};

use crate::action::{Action, ActionError};
use crate::audit::QueueAuditLog;
use crate::error::{QueueError, RollbackFailure, RollbackReport};
use crate::lifecycle::{IllegalTransition, Lifecycle, QueueState};
use crate::sleeper::{Sleeper, ThreadSleeper};

/// An ordered list of actions that are executed front to back and rolled
/// back in reverse.
///
/// A queue is used once: add actions, call [`execute`](Self::execute), and
/// call [`rollback`](Self::rollback) if the side effects should be undone.
/// Calling these out of order returns [`IllegalTransition`].
///
/// Operations that return [`ActionError::Retry`] are called again after
/// sleeping for the requested backoff. The queue does not limit the number
/// of retries; actions bound their own retries, typically with a
/// [`DoublingBackoff`](crate::DoublingBackoff).
pub struct ActionQueue<E, S = ThreadSleeper> {
    actions: Vec<Box<dyn Action<Error = E>>>,
    executed: Vec<usize>,
    lifecycle: Lifecycle,
    sleeper: S,
    audit_log: QueueAuditLog,
}

impl<E: Debug> ActionQueue<E> {
    #[must_use]
    pub fn new() -> Self {
        Self::with_sleeper(ThreadSleeper)
    }
}

impl<E: Debug> Default for ActionQueue<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Debug, S: Sleeper> ActionQueue<E, S> {
    /// Create a queue that waits out retry backoffs with `sleeper`.
    pub fn with_sleeper(sleeper: S) -> Self {
        Self {
            actions: Vec::new(),
            executed: Vec::new(),
            lifecycle: Lifecycle::new(),
            sleeper,
            audit_log: QueueAuditLog::new(),
        }
    }

    /// Append an action. Actions execute in the order they were added.
    ///
    /// # Errors
    ///
    /// Returns [`IllegalTransition`] once `execute` has been called.
    pub fn add(
        &mut self,
        action: impl Action<Error = E> + 'static,
    ) -> Result<(), IllegalTransition> {
        self.add_boxed(Box::new(action))
    }

    /// Append an already boxed action.
    ///
    /// # Errors
    ///
    /// Returns [`IllegalTransition`] once `execute` has been called.
    pub fn add_boxed(
        &mut self,
        action: Box<dyn Action<Error = E>>,
    ) -> Result<(), IllegalTransition> {
        self.lifecycle.enter_add()?;
        debug!(action = action.name(), index = self.actions.len(), "action added");
        self.actions.push(action);
        Ok(())
    }

    /// Execute every action in order, stopping at the first terminal failure.
    ///
    /// Each action is recorded as executed before it is attempted, so a
    /// later [`rollback`](Self::rollback) also reaches the action that
    /// failed. Actions after the failing one are never attempted.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::ActionFailed`] with the first terminal action
    /// error; the queue can then be rolled back. Returns
    /// [`QueueError::Lifecycle`] if no action was added or the queue was
    /// already executed.
    pub fn execute(&mut self) -> Result<(), QueueError<E>> {
        self.lifecycle.enter_execute()?;
        info!(actions = self.actions.len(), "executing action queue");

        for (index, action) in self.actions.iter_mut().enumerate() {
            let name = action.name().to_string();
            self.executed.push(index);
            self.audit_log.record_start(&name, index);
            debug!(action = %name, index, "executing action");

            let (result, retries) = retry_loop(&self.sleeper, &mut **action, |a| a.execute());
            match result {
                Ok(()) => self.audit_log.record_executed(retries),
                Err(source) => {
                    self.audit_log.record_failure(retries);
                    warn!(action = %name, index, retries, error = ?source, "action failed");
                    return Err(QueueError::ActionFailed {
                        action: name,
                        index,
                        source,
                    });
                }
            }
        }

        self.lifecycle.enter_execute_complete()?;
        info!(actions = self.executed.len(), "action queue executed");
        Ok(())
    }

    /// Roll back every executed action in reverse order.
    ///
    /// A terminal rollback failure does not stop the pass: every executed
    /// action gets exactly one rollback attempt, and failures are collected
    /// into the returned report.
    ///
    /// # Errors
    ///
    /// Returns [`IllegalTransition`] if `execute` was never called or the
    /// queue was already rolled back.
    pub fn rollback(&mut self) -> Result<RollbackReport<E>, IllegalTransition> {
        self.lifecycle.enter_rollback()?;
        info!(actions = self.executed.len(), "rolling back action queue");

        let mut failures = Vec::new();
        for &index in self.executed.iter().rev() {
            let action = &mut self.actions[index];
            let name = action.name().to_string();
            debug!(action = %name, index, "rolling back action");

            let (result, retries) = retry_loop(&self.sleeper, &mut **action, |a| a.rollback());
            match result {
                Ok(()) => self.audit_log.record_rolled_back(index, retries),
                Err(error) => {
                    self.audit_log.record_rollback_failed(index, retries);
                    warn!(action = %name, index, retries, ?error, "rollback failed");
                    failures.push(RollbackFailure {
                        action: name,
                        index,
                        error,
                    });
                }
            }
        }

        self.lifecycle.enter_rollback_complete()?;
        info!(
            actions = self.executed.len(),
            failures = failures.len(),
            "action queue rolled back"
        );
        Ok(RollbackReport {
            attempted: self.executed.len(),
            failures,
        })
    }

    #[must_use]
    pub fn state(&self) -> QueueState {
        self.lifecycle.state()
    }

    /// Number of actions added.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Number of actions attempted by `execute`, including one that failed.
    #[must_use]
    pub fn executed_len(&self) -> usize {
        self.executed.len()
    }

    #[must_use]
    pub fn audit_log(&self) -> &QueueAuditLog {
        &self.audit_log
    }
}

/// Call `operation` on `action` until it stops requesting retries.
///
/// Each [`ActionError::Retry`] sleeps for the requested backoff before the
/// next call. There is no limit on the number of retries.
///
/// Returns the number of retries taken on success.
///
/// # Errors
///
/// Returns the terminal error of the first call that fails with
/// [`ActionError::Fatal`].
pub fn execute_with_retries<A, S>(
    sleeper: &S,
    action: &mut A,
    operation: impl FnMut(&mut A) -> Result<(), ActionError<A::Error>>,
) -> Result<u32, A::Error>
where
    A: Action + ?Sized,
    S: Sleeper + ?Sized,
{
    let (result, retries) = retry_loop(sleeper, action, operation);
    result.map(|()| retries)
}

fn retry_loop<A, S>(
    sleeper: &S,
    action: &mut A,
    mut operation: impl FnMut(&mut A) -> Result<(), ActionError<A::Error>>,
) -> (Result<(), A::Error>, u32)
where
    A: Action + ?Sized,
    S: Sleeper + ?Sized,
{
    let mut retries: u32 = 0;
    loop {
        match operation(&mut *action) {
            Ok(()) => return (Ok(()), retries),
            Err(ActionError::Fatal(error)) => return (Err(error), retries),
            Err(ActionError::Retry(retry)) => {
                retries = retries.saturating_add(1);
                debug!(
                    action = action.name(),
                    retries,
                    backoff_ms = retry.millis(),
                    "retry requested"
                );
                sleeper.sleep(retry.backoff());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;
    use std::time::Duration;

    use super::*;

    #[derive(Default)]
    struct RecordingSleeper {
        slept: RefCell<Vec<Duration>>,
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, duration: Duration) {
            self.slept.borrow_mut().push(duration);
        }
    }

    #[derive(Debug, PartialEq, thiserror::Error)]
    #[error("{0}")]
    struct TestError(String);

    struct Scripted {
        calls: Rc<Cell<u32>>,
        script: Vec<Result<(), ActionError<TestError>>>,
    }

    impl Action for Scripted {
        type Error = TestError;

        fn name(&self) -> &str {
            "scripted"
        }

        fn execute(&mut self) -> Result<(), ActionError<Self::Error>> {
            self.calls.set(self.calls.get() + 1);
            if self.script.is_empty() {
                Ok(())
            } else {
                self.script.remove(0)
            }
        }
    }

    fn scripted(script: Vec<Result<(), ActionError<TestError>>>) -> (Scripted, Rc<Cell<u32>>) {
        let calls = Rc::new(Cell::new(0));
        let action = Scripted {
            calls: Rc::clone(&calls),
            script,
        };
        (action, calls)
    }

    #[test]
    fn retry_loop_retries_once_per_retry_request() -> anyhow::Result<()> {
        let sleeper = RecordingSleeper::default();
        let (mut action, calls) = scripted(vec![
            Err(ActionError::retry_after_ms(10)),
            Err(ActionError::retry_after_ms(20)),
            Err(ActionError::retry_after_ms(30)),
        ]);

        let retries = execute_with_retries(&sleeper, &mut action, |a| a.execute())?;

        assert_eq!(retries, 3);
        assert_eq!(calls.get(), 4);
        assert_eq!(
            *sleeper.slept.borrow(),
            vec![
                Duration::from_millis(10),
                Duration::from_millis(20),
                Duration::from_millis(30)
            ]
        );
        Ok(())
    }

    #[test]
    fn retry_loop_propagates_terminal_error_unchanged() {
        let sleeper = RecordingSleeper::default();
        let (mut action, calls) = scripted(vec![
            Err(ActionError::retry_after_ms(5)),
            Err(ActionError::fatal(TestError("boom".into()))),
        ]);

        let result = execute_with_retries(&sleeper, &mut action, |a| a.execute());

        assert_eq!(result, Err(TestError("boom".into())));
        assert_eq!(calls.get(), 2);
        assert_eq!(sleeper.slept.borrow().len(), 1);
    }

    #[test]
    fn retry_loop_works_through_trait_objects() -> anyhow::Result<()> {
        let sleeper = RecordingSleeper::default();
        let (action, calls) = scripted(vec![Err(ActionError::retry_after_ms(0))]);
        let mut boxed: Box<dyn Action<Error = TestError>> = Box::new(action);

        let retries = execute_with_retries(&sleeper, &mut *boxed, |a| a.execute())?;

        assert_eq!(retries, 1);
        assert_eq!(calls.get(), 2);
        Ok(())
    }

    #[test]
    fn new_queue_is_empty_and_in_init() {
        let queue: ActionQueue<TestError> = ActionQueue::new();
        assert!(queue.is_empty());
        assert_eq!(queue.len(), 0);
        assert_eq!(queue.state(), QueueState::Init);
        assert_eq!(queue.executed_len(), 0);
    }

    #[test]
    fn execute_without_add_is_a_lifecycle_error() {
        let mut queue: ActionQueue<TestError, _> =
            ActionQueue::with_sleeper(RecordingSleeper::default());
        let err = queue.execute().expect_err("execute before add must fail");
        assert!(err.is_lifecycle());
        assert_eq!(queue.state(), QueueState::Init);
    }

    #[test]
    fn failed_execute_leaves_queue_in_execute_state() -> anyhow::Result<()> {
        let mut queue = ActionQueue::with_sleeper(RecordingSleeper::default());
        let (ok, _) = scripted(vec![]);
        let (bad, _) = scripted(vec![Err(ActionError::fatal(TestError("nope".into())))]);
        queue.add(ok)?;
        queue.add(bad)?;

        let err = queue.execute().expect_err("second action fails");

        assert!(matches!(
            err,
            QueueError::ActionFailed { index: 1, ref action, .. } if action == "scripted"
        ));
        assert_eq!(queue.state(), QueueState::Execute);
        assert_eq!(queue.executed_len(), 2);

        let report = queue.rollback()?;
        assert_eq!(report.attempted(), 2);
        assert!(report.is_clean());
        assert_eq!(queue.state(), QueueState::RollbackComplete);
        Ok(())
    }

    #[test]
    fn successful_execute_completes() -> anyhow::Result<()> {
        let sleeper = RecordingSleeper::default();
        let mut queue = ActionQueue::with_sleeper(&sleeper);
        let (action, calls) = scripted(vec![Err(ActionError::retry_after_ms(1))]);
        queue.add(action)?;

        queue.execute()?;

        assert_eq!(queue.state(), QueueState::ExecuteComplete);
        assert_eq!(calls.get(), 2);
        assert_eq!(*sleeper.slept.borrow(), vec![Duration::from_millis(1)]);
        assert_eq!(queue.audit_log().records()[0].retries, 1);
        Ok(())
    }
}
