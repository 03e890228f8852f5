use crate::error::ContextError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration.
/// Loaded from ~/.config/taskrun/config.yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub contexts: Vec<ContextConfig>,
    #[serde(default)]
    pub defaults: Defaults,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    pub name: String,
    #[serde(rename = "type", default)]
    pub context_type: ContextType,
    /// Working directory for every command in a batch.
    #[serde(default)]
    pub workdir: Option<String>,
    /// Shell used to run `Command::Run` lines, falling back to "sh".
    #[serde(default)]
    pub shell: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContextType {
    #[default]
    Local,
}

impl std::fmt::Display for ContextType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContextType::Local => write!(f, "local"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Defaults {
    #[serde(default = "default_batch_timeout_secs")]
    pub batch_timeout_secs: u64,
    /// Anonymous local contexts to create when none are configured.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            batch_timeout_secs: default_batch_timeout_secs(),
            concurrency: default_concurrency(),
        }
    }
}

impl Defaults {
    pub fn batch_timeout(&self) -> Duration {
        Duration::from_secs(self.batch_timeout_secs)
    }
}

fn default_batch_timeout_secs() -> u64 {
    5
}

fn default_concurrency() -> usize {
    4
}

impl Config {
    /// Load config from the default path (~/.config/taskrun/config.yaml).
    pub fn load_default() -> anyhow::Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::empty())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> anyhow::Result<Self> {
        let config: Config = serde_yaml::from_str(contents)?;
        Ok(config)
    }

    /// Default config file path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("/etc"))
            .join("taskrun")
            .join("config.yaml")
    }

    /// Empty config with no contexts.
    pub fn empty() -> Self {
        Self {
            contexts: Vec::new(),
            defaults: Defaults::default(),
        }
    }

    /// Find a context config by name.
    pub fn find_context(&self, name: &str) -> Option<&ContextConfig> {
        self.contexts.iter().find(|c| c.name == name)
    }

    /// Find contexts matching all given labels.
    pub fn find_by_labels(&self, labels: &[String]) -> Vec<&ContextConfig> {
        self.contexts
            .iter()
            .filter(|c| labels.iter().all(|l| c.labels.contains(l)))
            .collect()
    }

    /// Contexts for a run: the named ones, else those carrying every label,
    /// else everything configured, else `concurrency` anonymous local ones.
    pub fn select_contexts(
        &self,
        names: &[String],
        labels: &[String],
        concurrency: usize,
    ) -> Result<Vec<ContextConfig>, ContextError> {
        if !names.is_empty() {
            return names
                .iter()
                .map(|name| {
                    self.find_context(name)
                        .cloned()
                        .ok_or_else(|| ContextError::Config(format!("Context not found: {}", name)))
                })
                .collect();
        }

        if !labels.is_empty() {
            let matched: Vec<ContextConfig> =
                self.find_by_labels(labels).into_iter().cloned().collect();
            if matched.is_empty() {
                return Err(ContextError::Config(format!(
                    "No context has all labels: {}",
                    labels.join(", ")
                )));
            }
            return Ok(matched);
        }

        if !self.contexts.is_empty() {
            return Ok(self.contexts.clone());
        }

        Ok((0..concurrency)
            .map(|i| ContextConfig::local(format!("local-{}", i)))
            .collect())
    }
}

impl ContextConfig {
    /// Anonymous local context with no overrides.
    pub fn local(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            context_type: ContextType::Local,
            workdir: None,
            shell: None,
            labels: Vec::new(),
            env: HashMap::new(),
        }
    }

    /// Get the shell binary, falling back to "sh".
    pub fn shell_binary(&self) -> &str {
        self.shell.as_deref().unwrap_or("sh")
    }
}
