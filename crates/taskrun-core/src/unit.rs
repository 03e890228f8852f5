use crate::command::CommandBatch;
use crate::context::ExecutionContext;
use crate::error::{ContextError, TaskError};
use crate::ledger::ResultLedger;
use crate::task::{TaskId, TaskOutput};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// One unit of work: a task id, the batch to run for it, and the ledger the
/// result goes into. `invoke` consumes the unit, so it runs at most once.
#[derive(Debug)]
pub struct TaskUnit {
    task_id: TaskId,
    batch: CommandBatch,
    timeout: Duration,
    ledger: Arc<ResultLedger>,
}

impl TaskUnit {
    pub fn new(
        task_id: TaskId,
        batch: CommandBatch,
        timeout: Duration,
        ledger: Arc<ResultLedger>,
    ) -> Self {
        Self {
            task_id,
            batch,
            timeout,
            ledger,
        }
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    pub fn batch(&self) -> &CommandBatch {
        &self.batch
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run the batch on `ctx` and record the last command's stdout.
    ///
    /// Nothing is written to the ledger unless the batch completed in time
    /// and the result-bearing command produced output. Dropping the returned
    /// future before it resolves records nothing either: the ledger write is
    /// the last, synchronous step.
    pub async fn invoke(self, ctx: &mut dyn ExecutionContext) -> Result<TaskOutput, TaskError> {
        let task_id = self.task_id;
        let result_index = self
            .batch
            .result_index()
            .ok_or(TaskError::EmptyBatch(task_id))?;
        let context_err = |source: ContextError| TaskError::Context { task_id, source };

        debug!(
            "Task {} submitting {} command(s) to {}",
            task_id,
            self.batch.len(),
            ctx.name()
        );
        let handle = ctx.submit(self.batch).await.map_err(context_err)?;

        // Bound the wait ourselves too, so a context that ignores the timeout
        // cannot stall the unit.
        let outcomes = match tokio::time::timeout(self.timeout, ctx.wait(handle, self.timeout)).await
        {
            Err(_) | Ok(Err(ContextError::Timeout(_))) => {
                return Err(TaskError::Timeout {
                    task_id,
                    timeout: self.timeout,
                })
            }
            Ok(Err(e)) => return Err(context_err(e)),
            Ok(Ok(outcomes)) => outcomes,
        };

        let output = outcomes
            .into_iter()
            .find(|o| o.index == result_index)
            .and_then(|o| o.stdout)
            .ok_or(TaskError::MissingOutput {
                task_id,
                command_index: result_index,
            })?;

        self.ledger.record(task_id, output.clone())?;
        info!("{} -> {}", task_id, output);

        Ok(TaskOutput { task_id, output })
    }
}
