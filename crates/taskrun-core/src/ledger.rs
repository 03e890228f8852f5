//! Per-run result ledger.
//!
//! The ledger is the only shared mutable state touched by task units. Writes
//! are insert-if-absent and the count is the number of distinct keys held, so
//! it can only grow while the ledger lives. Nothing here is persisted: a fresh
//! process starts every run from zero.

use crate::error::TaskError;
use crate::task::{RunId, TaskId, TaskResult};
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tracing::{debug, error};

#[derive(Debug)]
pub struct ResultLedger {
    run_id: RunId,
    entries: Mutex<HashMap<TaskId, TaskResult>>,
}

impl ResultLedger {
    pub fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// Store the result for `task_id`. A second write for the same id is
    /// rejected with `DuplicateRecord` and leaves the stored value untouched.
    pub fn record(&self, task_id: TaskId, output: impl Into<String>) -> Result<(), TaskError> {
        let mut entries = self.entries.lock();
        match entries.entry(task_id) {
            Entry::Occupied(_) => {
                error!(
                    "run {}: duplicate result for task {}; was the task invoked twice?",
                    self.run_id, task_id
                );
                Err(TaskError::DuplicateRecord { task_id })
            }
            Entry::Vacant(slot) => {
                slot.insert(TaskResult {
                    task_id,
                    output: output.into(),
                    recorded_at: Utc::now(),
                });
                debug!("run {}: recorded task {} ({} total)", self.run_id, task_id, entries.len());
                Ok(())
            }
        }
    }

    /// Run-scoped `record`: fails with `RunMismatch` for a foreign run id.
    pub fn record_for(
        &self,
        run_id: &RunId,
        task_id: TaskId,
        output: impl Into<String>,
    ) -> Result<(), TaskError> {
        self.check_run(run_id)?;
        self.record(task_id, output)
    }

    /// Number of recorded results.
    pub fn count(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn count_for(&self, run_id: &RunId) -> Result<usize, TaskError> {
        self.check_run(run_id)?;
        Ok(self.count())
    }

    pub fn get(&self, task_id: TaskId) -> Option<TaskResult> {
        self.entries.lock().get(&task_id).cloned()
    }

    pub fn contains(&self, task_id: TaskId) -> bool {
        self.entries.lock().contains_key(&task_id)
    }

    /// All results, ordered by task id.
    pub fn snapshot(&self) -> Vec<TaskResult> {
        let mut results: Vec<TaskResult> = self.entries.lock().values().cloned().collect();
        results.sort_by_key(|r| r.task_id);
        results
    }

    fn check_run(&self, run_id: &RunId) -> Result<(), TaskError> {
        if *run_id != self.run_id {
            return Err(TaskError::RunMismatch {
                expected: self.run_id.clone(),
                actual: run_id.clone(),
            });
        }
        Ok(())
    }
}
