use std::time::Instant;

/// Status of an action in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ActionStatus {
    /// Execution is in progress or completed successfully.
    Executed,
    /// Execution failed terminally.
    Failed,
    /// The action was rolled back successfully.
    RolledBack,
    /// The action's rollback failed terminally.
    RollbackFailed,
}

/// Record of one attempted action.
#[derive(Debug)]
pub struct ActionRecord {
    /// Name of the action.
    pub name: String,
    /// Position of the action in the queue.
    pub index: usize,
    /// Current status.
    pub status: ActionStatus,
    /// Retries consumed by `execute` and `rollback` together.
    pub retries: u32,
    /// When the action started executing.
    pub started_at: Instant,
    /// When the latest operation on the action finished.
    pub completed_at: Option<Instant>,
}

/// Audit log of the actions a queue attempted, in execution order.
#[derive(Debug, Default)]
pub struct QueueAuditLog {
    records: Vec<ActionRecord>,
}

impl QueueAuditLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_start(&mut self, name: &str, index: usize) {
        self.records.push(ActionRecord {
            name: name.to_string(),
            index,
            status: ActionStatus::Executed,
            retries: 0,
            started_at: Instant::now(),
            completed_at: None,
        });
    }

    pub(crate) fn record_executed(&mut self, retries: u32) {
        self.finish_last(ActionStatus::Executed, retries);
    }

    pub(crate) fn record_failure(&mut self, retries: u32) {
        self.finish_last(ActionStatus::Failed, retries);
    }

    fn finish_last(&mut self, status: ActionStatus, retries: u32) {
        if let Some(record) = self.records.last_mut() {
            record.status = status;
            record.retries += retries;
            record.completed_at = Some(Instant::now());
        }
    }

    pub(crate) fn record_rolled_back(&mut self, index: usize, retries: u32) {
        self.finish(index, ActionStatus::RolledBack, retries);
    }

    pub(crate) fn record_rollback_failed(&mut self, index: usize, retries: u32) {
        self.finish(index, ActionStatus::RollbackFailed, retries);
    }

    fn finish(&mut self, index: usize, status: ActionStatus, retries: u32) {
        if let Some(record) = self.records.iter_mut().find(|r| r.index == index) {
            record.status = status;
            record.retries += retries;
            record.completed_at = Some(Instant::now());
        }
    }

    #[must_use]
    pub fn records(&self) -> &[ActionRecord] {
        &self.records
    }

    /// One line per action, e.g. `↩ create_bucket (2 retries)`.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();
        for record in &self.records {
            let status = match record.status {
                ActionStatus::Executed => "✓",
                ActionStatus::Failed => "✗",
                ActionStatus::RolledBack => "↩",
                ActionStatus::RollbackFailed => "⚠",
            };
            match record.retries {
                0 => lines.push(format!("{status} {}", record.name)),
                1 => lines.push(format!("{status} {} (1 retry)", record.name)),
                n => lines.push(format!("{status} {} ({n} retries)", record.name)),
            }
        }
        lines.join("\n")
    }
}
