use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::execution::TickRequest;

#[derive(Parser)]
#[command(name = "govex")]
#[command(author = "Govex Team")]
#[command(version)]
#[command(about = "Governed long-only FX execution engine", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding default.toml and environment overlays
    #[arg(short, long, default_value = "config", env = "GOVEX_CONFIG_DIR", global = true)]
    pub config: String,
}

#[derive(Debug, Clone, Default, clap::Args)]
pub struct TickArgs {
    /// Process exactly one candidate, bypassing the session budget and discovery
    #[arg(long)]
    pub force: bool,
    /// Trade this pair (e.g. EUR_USD) instead of the signal's choice
    #[arg(long)]
    pub pair: Option<String>,
    /// Requested direction; only "long" is accepted
    #[arg(long)]
    pub direction: Option<String>,
    /// Re-deliver an earlier tick id
    #[arg(long)]
    pub tick_id: Option<Uuid>,
    /// Use the in-memory ledger instead of PostgreSQL
    #[arg(long)]
    pub memory: bool,
}

impl TickArgs {
    pub fn to_request(&self) -> TickRequest {
        TickRequest {
            force: self.force,
            pair: self.pair.clone(),
            direction: self.direction.clone(),
            preflight: false,
            tick_id: self.tick_id,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a single tick and print the JSON report
    Tick(TickArgs),
    /// Run the live preflight checks only; exits non-zero on failure
    Preflight {
        #[arg(long)]
        memory: bool,
    },
    /// Run ticks on a fixed interval until interrupted
    Run {
        #[arg(long, default_value = "300")]
        interval_secs: u64,
        #[arg(long)]
        memory: bool,
    },
    /// Serve the HTTP invocation API
    Serve {
        /// Overrides server.port
        #[arg(long)]
        port: Option<u16>,
        #[arg(long)]
        memory: bool,
    },
    /// Apply database migrations
    Migrate,
}
