use crate::dispatch;
use chrono::Utc;
use serde::Serialize;
use std::time::Duration;
use taskrun_core::config::Config;
use taskrun_core::{Engine, EngineError, EngineOptions, RunId, RunSummary, TaskResult};
use tracing::warn;

pub struct RunArgs {
    pub source: String,
    pub limit: Option<u64>,
    pub max_tasks: Option<usize>,
    pub target_results: Option<usize>,
    pub concurrency: Option<usize>,
    pub contexts: Vec<String>,
    pub labels: Vec<String>,
    pub timeout: Option<u64>,
    pub keep_going: bool,
    pub json: bool,
}

#[derive(Serialize)]
struct RunReport<'a> {
    summary: &'a RunSummary,
    results: &'a [TaskResult],
}

pub async fn run(config: &Config, args: RunArgs) -> anyhow::Result<()> {
    let timeout = args
        .timeout
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.defaults.batch_timeout());
    let source = dispatch::create_source(&args.source, args.limit, timeout)?;

    let concurrency = args.concurrency.unwrap_or(config.defaults.concurrency);
    let contexts = dispatch::create_contexts(
        config,
        &args.contexts,
        &args.labels,
        concurrency,
        source.payload(),
    )?;

    let options = EngineOptions {
        max_tasks: args.max_tasks,
        target_results: args.target_results,
        halt_on_integrity_error: !args.keep_going,
    };
    let mut engine = Engine::new(contexts, options);

    let run_id = RunId::new();
    let started = Utc::now();
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let summary = match engine.run_until(source.as_ref(), &run_id, shutdown).await {
        Ok(summary) => summary,
        Err(EngineError::Integrity(e)) => {
            anyhow::bail!("Run {} halted: {}", run_id, e)
        }
        Err(e) => return Err(e.into()),
    };

    let results = source.results(&run_id);

    if args.json {
        let report = RunReport {
            summary: &summary,
            results: &results,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&summary, started);
        for r in &results {
            println!("   {:>6} -> {}", r.task_id, r.output);
        }
    }

    Ok(())
}

fn print_summary(summary: &RunSummary, started: chrono::DateTime<Utc>) {
    println!("Run:        {}", summary.run_id);
    println!("   Started:    {}", started.to_rfc3339());
    println!("   Elapsed:    {}s", (Utc::now() - started).num_seconds());
    println!("   Stopped:    {}", summary.stop_reason);
    println!("   Dispatched: {}", summary.dispatched);
    println!("   Succeeded:  {}", summary.succeeded);
    println!("   Failed:     {}", summary.failed);
    println!("   Cancelled:  {}", summary.cancelled);
    println!("   Results:    {}", summary.results);
}
