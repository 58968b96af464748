use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use snapreport_core::{QueryStatus, TriggerEvent};
use snapreport_runner::{Config, Pipeline, RunOutcome};

#[derive(Parser)]
#[command(name = "snapreport", version)]
struct Cli {
    /// Config file (default: ./snapreport.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the pipeline once for a trigger event
    Run {
        /// Trigger event JSON file, or `-` for stdin (default: generated id)
        #[arg(long)]
        event: Option<String>,
        /// Build the report and envelope but do not send it
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },

    /// List the queries a run executes, in report order
    Queries,

    /// Print the effective configuration
    Config,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = Config::load(cli.config.as_deref())?;

    match cli.cmd {
        Command::Run { event, dry_run } => {
            let event = read_event(event.as_deref())?;
            let pipeline = Pipeline::open(cfg)?;
            let outcome = pipeline.run_once(&event, dry_run);
            println!("{}", serde_json::to_string_pretty(&summary(&outcome))?);
            if dry_run {
                if let Some(env) = &outcome.envelope {
                    println!("{}", serde_json::to_string_pretty(env)?);
                }
            }
            outcome.into_result()?;
        }
        Command::Queries => {
            let catalog = cfg.load_catalog()?;
            for (i, q) in catalog.iter().enumerate() {
                println!("{}. {} - {}", i + 1, q.name, q.label);
                println!("   {}", q.sql);
            }
        }
        Command::Config => {
            print!("{}", cfg.to_toml_string()?);
        }
    }

    Ok(())
}

fn read_event(arg: Option<&str>) -> Result<TriggerEvent> {
    let raw = match arg {
        None => return Ok(TriggerEvent::generated()),
        Some("-") => {
            let mut s = String::new();
            std::io::stdin().read_to_string(&mut s).context("read event from stdin")?;
            s
        }
        Some(path) => std::fs::read_to_string(Path::new(path)).with_context(|| format!("read {path}"))?,
    };
    TriggerEvent::from_json(&raw).context("parse trigger event")
}

fn summary(outcome: &RunOutcome) -> serde_json::Value {
    let queries: Vec<_> = outcome
        .queries
        .iter()
        .map(|q| match &q.status {
            QueryStatus::Rendered { bytes } => json!({ "name": q.name, "status": "rendered", "bytes": bytes }),
            QueryStatus::Failed { error } => json!({ "name": q.name, "status": "failed", "error": error }),
        })
        .collect();
    json!({
        "run_id": outcome.run_id.as_str(),
        "correlation_id": outcome.correlation_id.as_str(),
        "state": outcome.state().as_str(),
        "trail": outcome.trail.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
        "queries": queries,
        "snapshot_sha256": outcome.snapshot_digest,
        "report_sha256": outcome.report_digest,
        "dispatched": outcome.dispatched,
        "started_at_unix": outcome.started_at_unix,
        "elapsed_ms": outcome.elapsed_ms as u64,
        "error": outcome.error.as_ref().map(|e| json!({ "kind": e.kind(), "message": e.to_string() })),
    })
}
