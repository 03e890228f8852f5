#![allow(dead_code)]

use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use taskrun_core::command::{BatchHandle, CommandBatch, CommandOutcome};
use taskrun_core::error::ContextError;
use taskrun_core::ExecutionContext;

/// What a scripted batch does when waited on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Script {
    /// One stdout per command that ran (may be fewer than the batch length).
    Outputs(Vec<Option<String>>),
    /// Never completes.
    Hang,
    /// Context reports `ContextError::Timeout` itself.
    TimedOut,
    /// Context fails with a process error.
    Fail(String),
}

pub type Responder = Arc<dyn Fn(&CommandBatch) -> Script + Send + Sync>;

/// Shared counters across every context built from the same `Probe`.
#[derive(Debug, Default)]
pub struct Probe {
    pub submitted: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

/// In-memory execution context driven by a responder closure.
pub struct ScriptedContext {
    name: String,
    delay: Duration,
    respond: Responder,
    pending: HashMap<BatchHandle, CommandBatch>,
    probe: Arc<Probe>,
}

impl ScriptedContext {
    pub fn new(name: &str, respond: Responder) -> Self {
        Self {
            name: name.to_string(),
            delay: Duration::ZERO,
            respond,
            pending: HashMap::new(),
            probe: Arc::new(Probe::default()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_probe(mut self, probe: Arc<Probe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn boxed(self) -> Box<dyn ExecutionContext> {
        Box::new(self)
    }
}

#[async_trait::async_trait]
impl ExecutionContext for ScriptedContext {
    fn name(&self) -> &str {
        &self.name
    }

    async fn submit(&mut self, batch: CommandBatch) -> Result<BatchHandle, ContextError> {
        self.probe.submitted.fetch_add(1, Ordering::SeqCst);
        let handle = BatchHandle::new();
        self.pending.insert(handle.clone(), batch);
        Ok(handle)
    }

    async fn wait(
        &mut self,
        handle: BatchHandle,
        timeout: Duration,
    ) -> Result<Vec<CommandOutcome>, ContextError> {
        let batch = self
            .pending
            .remove(&handle)
            .ok_or_else(|| ContextError::UnknownBatch(handle.to_string()))?;

        let now = self.probe.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.probe.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let result = self.run(&batch, timeout).await;
        self.probe.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

impl ScriptedContext {
    async fn run(
        &self,
        batch: &CommandBatch,
        timeout: Duration,
    ) -> Result<Vec<CommandOutcome>, ContextError> {
        tokio::time::sleep(self.delay).await;
        match (self.respond)(batch) {
            Script::Hang => std::future::pending().await,
            Script::TimedOut => Err(ContextError::Timeout(timeout)),
            Script::Fail(msg) => Err(ContextError::Process(msg)),
            Script::Outputs(stdouts) => Ok(stdouts
                .into_iter()
                .zip(batch.commands().iter().cloned())
                .enumerate()
                .map(|(index, (stdout, command))| CommandOutcome {
                    index,
                    command,
                    stdout,
                    stderr: None,
                    exit_code: Some(0),
                    started_at: Utc::now(),
                    finished_at: Utc::now(),
                })
                .collect()),
        }
    }
}

/// Parse N out of the hello-world result command `echo -n $((N * 7))`.
pub fn hello_world_id(batch: &CommandBatch) -> Option<u64> {
    batch
        .commands()
        .last()?
        .description()
        .strip_prefix("echo -n $((")?
        .strip_suffix(" * 7))")?
        .parse()
        .ok()
}

/// Behaves like a shell running the hello-world batch.
pub fn hello_world() -> Responder {
    Arc::new(|batch| match hello_world_id(batch) {
        Some(n) => Script::Outputs(vec![None, Some((n * 7).to_string())]),
        None => Script::Fail("unexpected batch".into()),
    })
}

/// Hello-world behaviour, except the given task ids follow `script`.
pub fn hello_world_except(ids: &'static [u64], script: Script) -> Responder {
    let base = hello_world();
    Arc::new(move |batch| match hello_world_id(batch) {
        Some(n) if ids.contains(&n) => script.clone(),
        _ => base(batch),
    })
}

pub fn always(script: Script) -> Responder {
    Arc::new(move |_| script.clone())
}

pub fn pool(count: usize, respond: Responder) -> Vec<Box<dyn ExecutionContext>> {
    (0..count)
        .map(|i| ScriptedContext::new(&format!("ctx-{}", i), respond.clone()).boxed())
        .collect()
}
