use anyhow::Context;
use clap::Parser;
use govex::adapters::{start_api_server, PostgresLedger};
use govex::cli::{Cli, Commands};
use govex::coordination::shutdown_signal;
use govex::error::GovexError;
use govex::execution::{ExecutionEngine, TickReport, TickRequest};
use std::sync::Arc;
use tokio::time::{Duration, MissedTickBehavior};
use tracing::{error, info, warn};

mod main_runtime;

use main_runtime::{build_engine, init_logging, load_config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config))?;
    init_logging(&config.logging);

    match cli.command {
        Commands::Tick(args) => {
            let engine = build_engine(config, args.memory).await?;
            let report = engine.run_tick(args.to_request()).await?;
            print_report(&report)?;
        }
        Commands::Preflight { memory } => {
            let engine = build_engine(config, memory).await?;
            let report = engine
                .run_tick(TickRequest {
                    preflight: true,
                    ..Default::default()
                })
                .await?;
            print_report(&report)?;
            if let Some(checks) = report.preflight.as_ref().filter(|c| !c.passed) {
                return Err(GovexError::PreflightFailed(checks.failure_summary()).into());
            }
        }
        Commands::Run {
            interval_secs,
            memory,
        } => {
            let engine = build_engine(config, memory).await?;
            run_scheduled(engine, Duration::from_secs(interval_secs.max(1))).await;
        }
        Commands::Serve { port, memory } => {
            let host = config.server.host.clone();
            let port = port.unwrap_or(config.server.port);
            let engine = build_engine(config, memory).await?;
            start_api_server(engine, &host, port, shutdown_signal()).await?;
        }
        Commands::Migrate => {
            let store = PostgresLedger::new(&config.database.url, config.database.max_connections)
                .await
                .context("connecting to the order ledger")?;
            store.migrate().await?;
            info!("Migrations applied");
        }
    }

    Ok(())
}

fn print_report(report: &TickReport) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

/// Tick on a fixed interval until Ctrl-C / SIGTERM. A failed tick is logged
/// and the schedule continues.
async fn run_scheduled(engine: Arc<ExecutionEngine>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    info!(interval_secs = every.as_secs(), "Scheduler started");
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Scheduler stopping");
                break;
            }
            _ = interval.tick() => {
                match engine.run_tick(TickRequest::default()).await {
                    Ok(report) => {
                        if let Some(reason) = &report.aborted {
                            warn!(tick_id = %report.tick_id, %reason, "Tick aborted early");
                        }
                        info!(tick_id = %report.tick_id, counts = ?report.status_counts(), "Scheduled tick done");
                    }
                    Err(e) => error!(error = %e, "Scheduled tick failed"),
                }
            }
        }
    }
}
