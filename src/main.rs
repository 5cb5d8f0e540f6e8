//! Impression Engine
//!
//! Turns web-server access logs into deduplicated view counts:
//! - Access-log tailing, parsing, and filtering
//! - Sliding-window deduplication per (subject, tenant, client)
//! - Series enrichment from the metadata service
//! - Batched writes to InfluxDB

mod config;
mod tail;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{AppConfig, DEFAULT_CONFIG_PATH};
use crate::tail::{LogTailer, TailOptions};
use engine_core::{AccessLogParser, Error, ExitStatus};
use influx_client::InfluxSink;
use metadata_client::Enricher;
use pipeline::{Pipeline, PipelineSummary};
use telemetry::{health, init_tracing, Metrics};

/// Count unique views from an access log and write them to InfluxDB.
#[derive(Debug, Parser)]
#[command(name = "impression-engine", version, about)]
struct Cli {
    /// Configuration file
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CONFIG_PATH)]
    config_file: PathBuf,

    /// Read the log from the start instead of the current end
    #[arg(long)]
    from_beginning: bool,

    /// Stop at the end of the log and flush, instead of waiting for more lines
    #[arg(long)]
    no_follow: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(ExitStatus::InvalidCommandLine.code())
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    // Load .env file if present
    dotenvy::dotenv().ok();

    match run(cli).await {
        Ok(summary) => {
            info!(
                events = summary.events,
                evictions = summary.evictions,
                records_written = summary.records_written,
                "Shutdown complete"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            let status = e
                .downcast_ref::<Error>()
                .map(Error::exit_status)
                .unwrap_or(ExitStatus::Unknown);
            if tracing::dispatcher::has_been_set() {
                error!(exit_status = status.code(), "{:#}", e);
            } else {
                eprintln!("impression-engine: {:#}", e);
            }
            ExitCode::from(status.code())
        }
    }
}

async fn run(cli: Cli) -> Result<PipelineSummary> {
    let config = crate::config::load(&cli.config_file)?;

    let tracing_config = config.logging.clone().with_env_overrides();
    init_tracing(&tracing_config).map_err(|e| Error::LogConfiguration(e.to_string()))?;

    info!("Starting Impression Engine v{}", env!("CARGO_PKG_VERSION"));
    info!(
        config_file = %cli.config_file.display(),
        log_file = %config.log_file.display(),
        view_interval = %config.view_interval,
        metadata = config.metadata.is_some(),
        "Loaded configuration"
    );

    let metrics = Arc::new(Metrics::new());
    let result = run_pipeline(&cli, &config, metrics.clone()).await;

    metrics.snapshot().log();
    let report = health().report();
    info!(status = ?report.status, "Final health");

    result
}

async fn run_pipeline(
    cli: &Cli,
    config: &AppConfig,
    metrics: Arc<Metrics>,
) -> Result<PipelineSummary> {
    let parser = AccessLogParser::new(&config.access_log)?;

    let sink = InfluxSink::new(config.influxdb.clone())?;
    if !influx_client::health::check_connection(sink.client()).await {
        warn!("InfluxDB isn't reachable yet, continuing");
    }

    let enricher = Arc::new(Enricher::new(config.metadata.clone(), metrics.clone())?);

    let tailer = LogTailer::open(
        &config.log_file,
        parser,
        config.event_filter(),
        TailOptions {
            from_beginning: cli.from_beginning,
            follow: !cli.no_follow,
            ..Default::default()
        },
        metrics.clone(),
    )
    .await?;

    let pipeline = Pipeline::new(
        config.pipeline.clone(),
        config.view_interval.as_duration(),
        enricher,
        Arc::new(sink),
        metrics,
    );

    let (tx, rx) = mpsc::channel(pipeline.config().input_buffer_size);
    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_shutdown(cancel.clone()));

    let (summary, lines) = tokio::try_join!(pipeline.run(rx), tailer.run(tx, cancel))
        .context("Pipeline aborted")?;

    info!(lines, "Input exhausted");
    Ok(summary)
}

/// Cancel `token` on Ctrl+C or SIGTERM. Cancelling stops the tailer,
/// which lets the pipeline drain.
async fn cancel_on_shutdown(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
    token.cancel();
}
