use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque runnable-environment descriptor. Resolved by the execution runtime,
/// forwarded unmodified by everything in this crate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Payload {
    ImageHash(String),
}

impl Payload {
    pub fn from_image_hash(hash: impl Into<String>) -> Self {
        Payload::ImageHash(hash.into())
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::ImageHash(hash) => write!(f, "image:{}", hash),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Shell command line, run through `sh -c` by the context.
    Run { command: String },
}

impl Command {
    pub fn run(command: impl Into<String>) -> Self {
        Command::Run {
            command: command.into(),
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Command::Run { command } => command,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Ordered commands submitted together. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandBatch {
    commands: Vec<Command>,
}

impl CommandBatch {
    pub fn new(commands: Vec<Command>) -> Self {
        Self { commands }
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Index of the command whose stdout is the task's result.
    pub fn result_index(&self) -> Option<usize> {
        self.commands.len().checked_sub(1)
    }
}

impl FromIterator<Command> for CommandBatch {
    fn from_iter<I: IntoIterator<Item = Command>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// One entry per command that ran in a batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandOutcome {
    pub index: usize,
    pub command: Command,
    /// `None` when the command wrote nothing to stdout.
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub exit_code: Option<i32>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl CommandOutcome {
    /// Build an outcome from raw captured bytes; empty streams become `None`.
    pub fn from_output(
        index: usize,
        command: Command,
        stdout: &[u8],
        stderr: &[u8],
        exit_code: Option<i32>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            index,
            command,
            stdout: non_empty(stdout),
            stderr: non_empty(stderr),
            exit_code,
            started_at,
            finished_at: Utc::now(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }
}

fn non_empty(bytes: &[u8]) -> Option<String> {
    if bytes.is_empty() {
        None
    } else {
        Some(String::from_utf8_lossy(bytes).into_owned())
    }
}

/// Returned by `submit`, consumed by `wait`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BatchHandle(pub String);

impl BatchHandle {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for BatchHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
