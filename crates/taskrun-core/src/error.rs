use crate::task::{RunId, TaskId};
use std::time::Duration;
use thiserror::Error;

/// Failures raised by an execution context while running a batch.
#[derive(Error, Debug)]
pub enum ContextError {
    #[error("Batch did not complete within {0:?}")]
    Timeout(Duration),

    #[error("Unknown batch handle: {0}")]
    UnknownBatch(String),

    #[error("Process error: {0}")]
    Process(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures of a single task unit or a ledger write.
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("Task {task_id} timed out after {timeout:?}")]
    Timeout { task_id: TaskId, timeout: Duration },

    #[error("Task {task_id}: command {command_index} produced no output")]
    MissingOutput { task_id: TaskId, command_index: usize },

    #[error("Task {task_id} already has a recorded result")]
    DuplicateRecord { task_id: TaskId },

    #[error("Ledger belongs to run {expected}, got {actual}")]
    RunMismatch { expected: RunId, actual: RunId },

    #[error("Task {0} has an empty command batch")]
    EmptyBatch(TaskId),

    #[error("Task {task_id}: execution context failed: {source}")]
    Context {
        task_id: TaskId,
        #[source]
        source: ContextError,
    },
}

impl TaskError {
    /// Integrity violations that must halt the task chain instead of being retried.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TaskError::MissingOutput { .. }
                | TaskError::DuplicateRecord { .. }
                | TaskError::RunMismatch { .. }
                | TaskError::EmptyBatch(_)
        )
    }

    pub fn task_id(&self) -> Option<TaskId> {
        match self {
            TaskError::Timeout { task_id, .. }
            | TaskError::MissingOutput { task_id, .. }
            | TaskError::DuplicateRecord { task_id }
            | TaskError::Context { task_id, .. } => Some(*task_id),
            TaskError::EmptyBatch(task_id) => Some(*task_id),
            TaskError::RunMismatch { .. } => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("No execution contexts available")]
    NoContexts,

    #[error("Integrity violation: {0}")]
    Integrity(#[source] TaskError),
}
