use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fleet::Fleet;
use serde_json::json;
use solo_common::observability::{LogConfig, LogFormat, init_logging};
use solo_config::{LogFormatSetting, LoggingConfig, SoloConfig, SoloConfigLoader};
use std::{path::PathBuf, time::Duration};
use tracing::{info, warn};

mod bench;
mod fleet;

#[derive(Debug, Parser)]
#[command(name = "solo", version, about = "Run single-owner state actors from configuration")]
struct Cli {
    /// Configuration file; may be absent when `SOLO__*` variables supply everything
    #[arg(long, short, env = "SOLO_CONFIG", default_value = "solo.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Drive concurrent callers against every configured actor and report the results
    Bench {
        /// Concurrent callers per actor
        #[arg(long, default_value_t = 100)]
        callers: usize,
        /// Operations issued by each caller
        #[arg(long, default_value_t = 10)]
        ops: usize,
    },
    /// Report the state of every configured actor without changing it
    Inspect,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let cfg = SoloConfigLoader::new()
        .with_optional_file(&cli.config)
        .load()
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;

    if let Some(path) = init_logging(log_config(&cfg.logging))? {
        eprintln!("logging to {}", path.display());
    }

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all().thread_name("solo-worker");
    if let Some(threads) = cfg.runtime.worker_threads {
        builder.worker_threads(threads.max(1));
    }
    let runtime = builder.build().context("building the tokio runtime")?;

    let grace = Duration::from_millis(cfg.runtime.shutdown_grace_ms);
    let result = runtime.block_on(run(cli.command, &cfg));
    runtime.shutdown_timeout(grace);
    result
}

async fn run(command: Command, cfg: &SoloConfig) -> Result<()> {
    let fleet = Fleet::build(cfg)?;
    if fleet.is_empty() {
        warn!("no enabled actors configured");
    }

    let report = match command {
        Command::Bench { callers, ops } => {
            info!(callers, ops, "bench.start");
            let runs = bench::run(&fleet, callers, ops).await;
            fleet
                .inspect()
                .await
                .map(|state| json!({ "bench": runs, "state": state }))
        }
        Command::Inspect => fleet.inspect().await.map(|state| json!({ "state": state })),
    };

    // Stop the fleet even when the report failed, so no loop outlives the runtime.
    let stopped = fleet.shutdown().await;
    let report = report?;
    stopped?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn log_config(cfg: &LoggingConfig) -> LogConfig {
    LogConfig {
        app_name: "solo",
        to_file: cfg.dir.is_some(),
        log_dir: cfg.dir.as_ref().map(PathBuf::from),
        emit_stderr: cfg.stderr,
        format: match cfg.format {
            LogFormatSetting::Text => LogFormat::Text,
            LogFormatSetting::Json => LogFormat::Json,
        },
        default_filter: cfg.filter.clone(),
    }
}
