use chrono::Utc;
use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;
use taskrun_core::command::{BatchHandle, Command, CommandBatch, CommandOutcome, Payload};
use taskrun_core::config::ContextConfig;
use taskrun_core::error::ContextError;
use taskrun_core::ExecutionContext;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

type BatchResult = Result<Vec<CommandOutcome>, ContextError>;

/// Spawned batch that is aborted when dropped, wherever it is held: in the
/// pending map or inside a `wait` future the caller gave up on.
struct BatchJob(JoinHandle<BatchResult>);

impl Drop for BatchJob {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Local context: runs each batch command through the configured shell on
/// the host machine, one after another, in a background tokio task.
pub struct LocalContext {
    config: ContextConfig,
    payload: Payload,
    batches: HashMap<BatchHandle, BatchJob>,
}

impl LocalContext {
    pub fn new(config: ContextConfig, payload: Payload) -> Self {
        // Nothing to provision locally; the payload is only kept for reporting.
        info!("Local context {} ready (payload {})", config.name, payload);
        Self {
            config,
            payload,
            batches: HashMap::new(),
        }
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Batches submitted but not yet waited on.
    pub fn pending(&self) -> usize {
        self.batches.len()
    }
}

#[async_trait::async_trait]
impl ExecutionContext for LocalContext {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn submit(&mut self, batch: CommandBatch) -> Result<BatchHandle, ContextError> {
        if let Some(dir) = self.config.workdir.as_deref() {
            if !std::path::Path::new(dir).is_dir() {
                return Err(ContextError::Config(format!(
                    "workdir '{}' of context {} does not exist",
                    dir, self.config.name
                )));
            }
        }

        let handle = BatchHandle::new();
        debug!(
            "Local context {}: batch {} with {} command(s)",
            self.config.name,
            handle,
            batch.len()
        );
        let config = self.config.clone();
        let job = BatchJob(tokio::spawn(async move { run_batch(&config, batch).await }));
        self.batches.insert(handle.clone(), job);
        Ok(handle)
    }

    async fn wait(
        &mut self,
        handle: BatchHandle,
        timeout: Duration,
    ) -> Result<Vec<CommandOutcome>, ContextError> {
        let mut job = self
            .batches
            .remove(&handle)
            .ok_or_else(|| ContextError::UnknownBatch(handle.to_string()))?;

        match tokio::time::timeout(timeout, &mut job.0).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(ContextError::Process(format!("batch {} failed: {}", handle, e))),
            Err(_) => {
                warn!(
                    "Local context {}: batch {} exceeded {:?}, aborting",
                    self.config.name, handle, timeout
                );
                Err(ContextError::Timeout(timeout))
            }
        }
    }
}

/// Run commands in order, stopping at the first one that fails. Commands
/// after a failure get no outcome.
async fn run_batch(
    config: &ContextConfig,
    batch: CommandBatch,
) -> Result<Vec<CommandOutcome>, ContextError> {
    let mut outcomes = Vec::with_capacity(batch.len());

    for (index, command) in batch.commands().iter().enumerate() {
        let outcome = run_command(config, index, command).await?;
        let failed = !outcome.succeeded();
        if failed {
            warn!(
                "Local context {}: command {} ('{}') exited with {:?}",
                config.name, index, command, outcome.exit_code
            );
        }
        outcomes.push(outcome);
        if failed {
            break;
        }
    }

    Ok(outcomes)
}

async fn run_command(
    config: &ContextConfig,
    index: usize,
    command: &Command,
) -> Result<CommandOutcome, ContextError> {
    let started_at = Utc::now();
    let Command::Run { command: line } = command;
    debug!("Local exec: {}", line);

    let mut process = tokio::process::Command::new(config.shell_binary());
    process
        .arg("-c")
        .arg(line)
        .envs(&config.env)
        .stdin(Stdio::null())
        .kill_on_drop(true);
    if let Some(dir) = config.workdir.as_deref() {
        process.current_dir(dir);
    }

    let output = process
        .output()
        .await
        .map_err(|e| ContextError::Process(format!("Failed to spawn '{}': {}", line, e)))?;

    Ok(CommandOutcome::from_output(
        index,
        command.clone(),
        &output.stdout,
        &output.stderr,
        output.status.code(),
        started_at,
    ))
}
