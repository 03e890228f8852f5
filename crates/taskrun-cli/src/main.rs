use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod dispatch;

#[derive(Parser)]
#[command(name = "taskrun")]
#[command(about = "Run task sources against a pool of execution contexts", long_about = None)]
struct Cli {
    /// Debug-level logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a task source until it is exhausted, a limit is hit, or Ctrl-C
    Run {
        /// Task source name
        #[arg(short, long, default_value = "hello-world")]
        source: String,

        /// Make the source finite: produce at most this many tasks
        #[arg(long)]
        limit: Option<u64>,

        /// Stop dispatching after this many tasks
        #[arg(long)]
        max_tasks: Option<usize>,

        /// Stop dispatching once this many results are recorded
        #[arg(long)]
        target_results: Option<usize>,

        /// Anonymous local contexts to use when none are configured
        #[arg(short, long)]
        concurrency: Option<usize>,

        /// Use only these configured contexts
        #[arg(long = "context")]
        contexts: Vec<String>,

        /// Use only configured contexts carrying all of these labels
        #[arg(long = "label")]
        labels: Vec<String>,

        /// Batch timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Keep running after MissingOutput / DuplicateRecord
        #[arg(long)]
        keep_going: bool,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// List configured execution contexts
    Contexts {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// List built-in task sources
    Sources,

    /// Show or initialize the config file
    Config {
        /// Print the config path only
        #[arg(long)]
        path: bool,

        /// Write a sample config
        #[arg(long)]
        init: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    use Commands::*;

    match cli.command {
        Run {
            source,
            limit,
            max_tasks,
            target_results,
            concurrency,
            contexts,
            labels,
            timeout,
            keep_going,
            json,
        } => {
            let config = commands::load_config()?;
            let args = commands::run::RunArgs {
                source,
                limit,
                max_tasks,
                target_results,
                concurrency,
                contexts,
                labels,
                timeout,
                keep_going,
                json,
            };
            commands::run(&config, args).await?;
        }
        Contexts { json } => {
            let config = commands::load_config()?;
            commands::contexts(&config, json).await?;
        }
        Sources => {
            commands::sources().await?;
        }
        Config { path, init } => {
            commands::config(path, init).await?;
        }
    }

    Ok(())
}
