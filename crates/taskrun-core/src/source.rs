use crate::command::{Command, CommandBatch, Payload};
use crate::ledger::ResultLedger;
use crate::task::{RunId, TaskId, TaskResult};
use crate::unit::TaskUnit;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Lazy, possibly infinite sequence of task units. `None` means no more work.
pub type TaskStream = Box<dyn Iterator<Item = TaskUnit> + Send>;

/// A module the engine can run: a payload, a task stream per run, and a
/// result count per run.
pub trait TaskSource: Send + Sync {
    /// Short name used to pick the source from the CLI.
    fn name(&self) -> &str;

    fn payload(&self) -> &Payload;

    /// Start (or continue) producing units for `run_id`.
    fn produce(&self, run_id: &RunId) -> TaskStream;

    /// Results recorded so far for `run_id`. Never decreases within a run.
    fn count(&self, run_id: &RunId) -> usize;

    /// Recorded results for `run_id`, for reporting. Sources that keep
    /// results elsewhere may leave this empty.
    fn results(&self, _run_id: &RunId) -> Vec<TaskResult> {
        Vec::new()
    }
}

/// Ledger and id allocator for one run.
#[derive(Debug, Clone)]
pub struct RunSlot {
    pub ledger: Arc<ResultLedger>,
    next_id: Arc<AtomicU64>,
}

impl RunSlot {
    fn new(run_id: RunId) -> Self {
        Self {
            ledger: Arc::new(ResultLedger::new(run_id)),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Allocate the next id unless `limit` ids have already been handed out.
    pub fn allocate_within(&self, limit: Option<u64>) -> Option<TaskId> {
        self.next_id
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| match limit {
                Some(l) if n >= l => None,
                _ => Some(n + 1),
            })
            .ok()
            .map(TaskId)
    }

    /// Ids handed out so far.
    pub fn allocated(&self) -> u64 {
        self.next_id.load(Ordering::Relaxed)
    }
}

/// Per-run state owned by a task source.
#[derive(Debug, Default)]
pub struct RunRegistry {
    runs: Mutex<HashMap<RunId, RunSlot>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot for `run_id`, created on first use.
    pub fn open(&self, run_id: &RunId) -> RunSlot {
        self.runs
            .lock()
            .entry(run_id.clone())
            .or_insert_with(|| RunSlot::new(run_id.clone()))
            .clone()
    }

    pub fn ledger(&self, run_id: &RunId) -> Option<Arc<ResultLedger>> {
        self.runs.lock().get(run_id).map(|slot| slot.ledger.clone())
    }

    pub fn count(&self, run_id: &RunId) -> usize {
        self.ledger(run_id).map(|l| l.count()).unwrap_or(0)
    }

    pub fn results(&self, run_id: &RunId) -> Vec<TaskResult> {
        self.ledger(run_id).map(|l| l.snapshot()).unwrap_or_default()
    }
}

const HELLO_WORLD_IMAGE: &str = "9a3b5d67b0b27746283cb5f287c13eab1beaa12d92a9f536b747c7ae";
const HELLO_WORLD_TIMEOUT: Duration = Duration::from_secs(5);

/// Demo source: task `i` sleeps a second and prints `i * 7`.
#[derive(Debug)]
pub struct HelloWorldSource {
    payload: Payload,
    timeout: Duration,
    limit: Option<u64>,
    runs: RunRegistry,
}

impl HelloWorldSource {
    pub fn new() -> Self {
        Self {
            payload: Payload::from_image_hash(HELLO_WORLD_IMAGE),
            timeout: HELLO_WORLD_TIMEOUT,
            limit: None,
            runs: RunRegistry::new(),
        }
    }

    /// Stop after `limit` units per run instead of producing forever.
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn ledger(&self, run_id: &RunId) -> Option<Arc<ResultLedger>> {
        self.runs.ledger(run_id)
    }

    pub fn batch_for(task_id: TaskId) -> CommandBatch {
        CommandBatch::new(vec![
            Command::run("sleep 1"),
            Command::run(format!("echo -n $(({} * 7))", task_id.0)),
        ])
    }
}

impl Default for HelloWorldSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskSource for HelloWorldSource {
    fn name(&self) -> &str {
        "hello-world"
    }

    fn payload(&self) -> &Payload {
        &self.payload
    }

    fn produce(&self, run_id: &RunId) -> TaskStream {
        let slot = self.runs.open(run_id);
        let timeout = self.timeout;
        let limit = self.limit;
        info!(
            "hello-world: producing tasks for run {} (limit: {})",
            run_id,
            limit.map(|l| l.to_string()).unwrap_or_else(|| "none".into())
        );

        Box::new(std::iter::from_fn(move || {
            let task_id = slot.allocate_within(limit)?;
            Some(TaskUnit::new(
                task_id,
                Self::batch_for(task_id),
                timeout,
                slot.ledger.clone(),
            ))
        }))
    }

    fn count(&self, run_id: &RunId) -> usize {
        self.runs.count(run_id)
    }

    fn results(&self, run_id: &RunId) -> Vec<TaskResult> {
        self.runs.results(run_id)
    }
}
