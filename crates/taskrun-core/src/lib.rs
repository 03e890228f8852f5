pub mod command;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod source;
pub mod task;
pub mod unit;

pub use command::{BatchHandle, Command, CommandBatch, CommandOutcome, Payload};
pub use config::Config;
pub use context::ExecutionContext;
pub use engine::{Engine, EngineOptions, RunSummary, StopReason};
pub use error::{ContextError, EngineError, TaskError};
pub use ledger::ResultLedger;
pub use source::{HelloWorldSource, RunRegistry, TaskSource, TaskStream};
pub use task::{RunId, TaskId, TaskOutput, TaskResult};
pub use unit::TaskUnit;
