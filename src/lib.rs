pub mod adapters;
pub mod api;
pub mod cli;
pub mod config;
pub mod coordination;
pub mod domain;
pub mod error;
pub mod exchange;
pub mod execution;
pub mod governance;
pub mod persistence;
pub mod safety;

pub use config::AppConfig;
pub use coordination::{shutdown_signal, CircuitBreakerRecord, CircuitBreakerView, CircuitState};
pub use error::{BrokerError, GovexError, Result};
pub use execution::{ExecutionEngine, TickReport, TickRequest};
pub use governance::{GovernanceSnapshot, GovernanceState};
pub use persistence::{InsertOutcome, OrderLedger};
