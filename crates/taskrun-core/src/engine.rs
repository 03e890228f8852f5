//! Reference dispatch loop.
//!
//! Pulls units from a [`TaskSource`] and hands each one an idle
//! [`ExecutionContext`]. A unit owns its context until it finishes; the
//! context then goes back to the idle pool. Completions arrive in any order.

use crate::context::ExecutionContext;
use crate::error::{EngineError, TaskError};
use crate::source::TaskSource;
use crate::task::{RunId, TaskOutput};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Stop pulling new units after this many were dispatched.
    pub max_tasks: Option<usize>,
    /// Stop pulling new units once the source reports this many results.
    pub target_results: Option<usize>,
    /// Stop the run on `MissingOutput` / `DuplicateRecord`.
    pub halt_on_integrity_error: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_tasks: None,
            target_results: None,
            halt_on_integrity_error: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Exhausted,
    MaxTasks,
    TargetReached,
    IntegrityError,
    Shutdown,
    ContextsLost,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Exhausted => write!(f, "exhausted"),
            StopReason::MaxTasks => write!(f, "max_tasks"),
            StopReason::TargetReached => write!(f, "target_reached"),
            StopReason::IntegrityError => write!(f, "integrity_error"),
            StopReason::Shutdown => write!(f, "shutdown"),
            StopReason::ContextsLost => write!(f, "contexts_lost"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunSummary {
    pub run_id: RunId,
    pub dispatched: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// `source.count(run_id)` when the run ended.
    pub results: usize,
    pub stop_reason: StopReason,
}

type Finished = (Box<dyn ExecutionContext>, Result<TaskOutput, TaskError>);

#[derive(Debug, Default)]
struct Tally {
    dispatched: usize,
    succeeded: usize,
    failed: usize,
    cancelled: usize,
}

impl Tally {
    /// Count one joined unit and return its context to the pool. Returns the
    /// error when it is an integrity violation.
    fn settle(
        &mut self,
        joined: Result<Finished, JoinError>,
        idle: &mut Vec<Box<dyn ExecutionContext>>,
        run_id: &RunId,
    ) -> Option<TaskError> {
        match joined {
            Ok((ctx, Ok(_))) => {
                idle.push(ctx);
                self.succeeded += 1;
                None
            }
            Ok((ctx, Err(e))) if e.is_fatal() => {
                idle.push(ctx);
                self.failed += 1;
                error!("Run {}: {}", run_id, e);
                Some(e)
            }
            Ok((ctx, Err(e))) => {
                idle.push(ctx);
                self.failed += 1;
                warn!("Run {}: {}", run_id, e);
                None
            }
            Err(e) if e.is_cancelled() => {
                self.cancelled += 1;
                None
            }
            Err(e) => {
                self.failed += 1;
                error!("Run {}: task panicked, dropping its context: {}", run_id, e);
                None
            }
        }
    }
}

pub struct Engine {
    contexts: Vec<Box<dyn ExecutionContext>>,
    options: EngineOptions,
}

impl Engine {
    pub fn new(contexts: Vec<Box<dyn ExecutionContext>>, options: EngineOptions) -> Self {
        Self { contexts, options }
    }

    /// Contexts currently idle in the pool.
    pub fn contexts(&self) -> usize {
        self.contexts.len()
    }

    /// Run until the source is exhausted or a limit is hit.
    pub async fn run(
        &mut self,
        source: &dyn TaskSource,
        run_id: &RunId,
    ) -> Result<RunSummary, EngineError> {
        self.run_until(source, run_id, std::future::pending()).await
    }

    /// Like [`run`](Self::run), but aborts every in-flight unit once
    /// `shutdown` resolves. Aborted units record nothing.
    pub async fn run_until<F>(
        &mut self,
        source: &dyn TaskSource,
        run_id: &RunId,
        shutdown: F,
    ) -> Result<RunSummary, EngineError>
    where
        F: Future<Output = ()>,
    {
        let mut idle = std::mem::take(&mut self.contexts);
        if idle.is_empty() {
            return Err(EngineError::NoContexts);
        }

        info!(
            "Run {}: source '{}' with payload {} on {} context(s)",
            run_id,
            source.name(),
            source.payload(),
            idle.len()
        );

        let mut stream = source.produce(run_id);
        let mut in_flight: JoinSet<Finished> = JoinSet::new();
        let mut stop: Option<StopReason> = None;
        let mut integrity: Option<TaskError> = None;
        let mut tally = Tally::default();
        tokio::pin!(shutdown);

        loop {
            while stop.is_none() {
                if let Some(reason) = self.limit_reached(source, run_id, tally.dispatched) {
                    info!("Run {}: {}, no new tasks", run_id, reason);
                    stop = Some(reason);
                    break;
                }
                let Some(mut ctx) = idle.pop() else {
                    break;
                };
                match stream.next() {
                    Some(unit) => {
                        tally.dispatched += 1;
                        debug!("Dispatching task {} to {}", unit.task_id(), ctx.name());
                        in_flight.spawn(async move {
                            let result = unit.invoke(ctx.as_mut()).await;
                            (ctx, result)
                        });
                    }
                    None => {
                        info!("Run {}: task source exhausted", run_id);
                        idle.push(ctx);
                        stop = Some(StopReason::Exhausted);
                    }
                }
            }

            if in_flight.is_empty() {
                break;
            }

            tokio::select! {
                _ = &mut shutdown => {
                    warn!(
                        "Run {}: shutdown requested, aborting {} in-flight task(s)",
                        run_id,
                        in_flight.len()
                    );
                    in_flight.abort_all();
                    // Units that finished before the abort landed still count.
                    while let Some(joined) = in_flight.join_next().await {
                        if let Some(e) = tally.settle(joined, &mut idle, run_id) {
                            if self.options.halt_on_integrity_error {
                                integrity.get_or_insert(e);
                            }
                        }
                    }
                    stop = Some(StopReason::Shutdown);
                    break;
                }
                Some(joined) = in_flight.join_next() => {
                    if let Some(e) = tally.settle(joined, &mut idle, run_id) {
                        if self.options.halt_on_integrity_error {
                            stop = Some(StopReason::IntegrityError);
                            integrity.get_or_insert(e);
                        }
                    }
                    debug!("Run {}: {} result(s) so far", run_id, source.count(run_id));
                }
            }
        }

        self.contexts = idle;

        let summary = RunSummary {
            run_id: run_id.clone(),
            dispatched: tally.dispatched,
            succeeded: tally.succeeded,
            failed: tally.failed,
            cancelled: tally.cancelled,
            results: source.count(run_id),
            stop_reason: stop.unwrap_or(StopReason::ContextsLost),
        };
        info!(
            "Run {} finished ({}): {} dispatched, {} succeeded, {} failed, {} cancelled, {} result(s)",
            run_id,
            summary.stop_reason,
            summary.dispatched,
            summary.succeeded,
            summary.failed,
            summary.cancelled,
            summary.results
        );

        match integrity {
            Some(e) => Err(EngineError::Integrity(e)),
            None => Ok(summary),
        }
    }

    fn limit_reached(
        &self,
        source: &dyn TaskSource,
        run_id: &RunId,
        dispatched: usize,
    ) -> Option<StopReason> {
        if self.options.max_tasks.is_some_and(|max| dispatched >= max) {
            return Some(StopReason::MaxTasks);
        }
        if self
            .options
            .target_results
            .is_some_and(|target| source.count(run_id) >= target)
        {
            return Some(StopReason::TargetReached);
        }
        None
    }
}
