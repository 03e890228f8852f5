use std::time::Duration;
use taskrun_core::config::{Config, ContextConfig, ContextType};
use taskrun_core::error::ContextError;
use taskrun_core::{ExecutionContext, HelloWorldSource, Payload, TaskSource};
use taskrun_local::LocalContext;

/// Built-in task sources, by CLI name.
pub const SOURCES: &[(&str, &str)] = &[(
    "hello-world",
    "sleeps 1s, then prints task_id * 7 (infinite unless --limit)",
)];

/// Create a task source by name.
pub fn create_source(
    name: &str,
    limit: Option<u64>,
    timeout: Duration,
) -> anyhow::Result<Box<dyn TaskSource>> {
    match name {
        "hello-world" => {
            let mut source = HelloWorldSource::new().with_timeout(timeout);
            if let Some(limit) = limit {
                source = source.with_limit(limit);
            }
            Ok(Box::new(source))
        }
        other => anyhow::bail!(
            "Unknown task source '{}' (run `taskrun sources` to list them)",
            other
        ),
    }
}

/// Create the context pool selected by name, label, or the config defaults.
pub fn create_contexts(
    config: &Config,
    names: &[String],
    labels: &[String],
    concurrency: usize,
    payload: &Payload,
) -> Result<Vec<Box<dyn ExecutionContext>>, ContextError> {
    Ok(config
        .select_contexts(names, labels, concurrency)?
        .into_iter()
        .map(|c| create_context_from_config(c, payload))
        .collect())
}

/// Create a context from a ContextConfig.
pub fn create_context_from_config(
    context_config: ContextConfig,
    payload: &Payload,
) -> Box<dyn ExecutionContext> {
    match context_config.context_type {
        ContextType::Local => Box::new(LocalContext::new(context_config, payload.clone())),
    }
}
