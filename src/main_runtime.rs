use std::sync::Arc;

use govex::adapters::{MemoryLedger, PostgresLedger};
use govex::config::{AppConfig, LoggingConfig};
use govex::domain::StubSignalSource;
use govex::error::{GovexError, Result};
use govex::exchange::build_broker_client;
use govex::execution::ExecutionEngine;
use govex::persistence::OrderLedger;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

pub fn load_config(dir: &str) -> Result<AppConfig> {
    let config = AppConfig::load_from(dir)?;
    if let Err(problems) = config.validate() {
        return Err(GovexError::Validation(problems.join("; ")));
    }
    Ok(config)
}

/// Assemble the engine. `memory` swaps PostgreSQL for the in-process ledger.
pub async fn build_engine(config: AppConfig, memory: bool) -> Result<Arc<ExecutionEngine>> {
    let ledger: Arc<dyn OrderLedger> = if memory {
        warn!("Using in-memory ledger; nothing will be persisted");
        Arc::new(MemoryLedger::new())
    } else {
        let store =
            PostgresLedger::new(&config.database.url, config.database.max_connections).await?;
        store.migrate().await?;
        Arc::new(store)
    };

    let broker = build_broker_client(&config)?;
    info!(
        environment = %config.execution.environment,
        pairs = ?config.execution.pairs,
        roster = ?config.agents.roster,
        "Execution engine ready"
    );

    Ok(Arc::new(ExecutionEngine::new(
        config,
        ledger,
        broker,
        Arc::new(StubSignalSource),
    )))
}

pub fn init_logging(logging: &LoggingConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("{},govex=debug,sqlx=warn", logging.level))
    });

    // GOVEX_LOG_DIR wins over logging.dir; no directory means console only.
    let log_dir = std::env::var("GOVEX_LOG_DIR")
        .ok()
        .or_else(|| logging.dir.clone());

    // `tracing_appender::rolling::daily` panics if it cannot create the
    // first file, so check writability up front.
    let file_layer = log_dir.as_ref().and_then(|dir| {
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!("Warning: Could not create log directory {dir} ({e}), file logging disabled");
            return None;
        }
        let probe = std::path::Path::new(dir).join(".govex_write_test");
        match std::fs::OpenOptions::new().create(true).append(true).open(&probe) {
            Ok(_) => {
                let _ = std::fs::remove_file(&probe);
                let appender = tracing_appender::rolling::daily(dir, "govex.log");
                let (writer, guard) = tracing_appender::non_blocking(appender);
                // Lives as long as the process.
                Box::leak(Box::new(guard));
                Some(
                    tracing_subscriber::fmt::layer()
                        .with_writer(writer)
                        .with_ansi(false)
                        .with_target(true),
                )
            }
            Err(e) => {
                eprintln!("Warning: Could not write to log directory {dir} ({e}), file logging disabled");
                None
            }
        }
    });

    let (json_layer, text_layer) = if logging.json {
        (
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true),
            ),
            None,
        )
    } else {
        (
            None,
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            ),
        )
    };

    let file_logging_enabled = file_layer.is_some();
    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .with(file_layer)
        .init();

    if let (true, Some(dir)) = (file_logging_enabled, log_dir) {
        eprintln!("Logging to: {dir}/govex.log");
    }
}
