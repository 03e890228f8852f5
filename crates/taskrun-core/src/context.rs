use crate::command::{BatchHandle, CommandBatch, CommandOutcome};
use crate::error::ContextError;
use std::time::Duration;

/// A remote (or local) environment that runs command batches.
/// Owned by the engine and lent to one task unit at a time.
#[async_trait::async_trait]
pub trait ExecutionContext: Send {
    /// Name of this context instance (from config).
    fn name(&self) -> &str;

    /// Submit a batch for execution. Returns as soon as the batch is accepted.
    async fn submit(&mut self, batch: CommandBatch) -> Result<BatchHandle, ContextError>;

    /// Wait for a submitted batch. Returns the ordered outcomes, or
    /// `ContextError::Timeout` once `timeout` elapses.
    async fn wait(
        &mut self,
        handle: BatchHandle,
        timeout: Duration,
    ) -> Result<Vec<CommandOutcome>, ContextError>;
}
