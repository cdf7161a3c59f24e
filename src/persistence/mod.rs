//! Persistence layer: the order ledger contract shared by the Postgres and
//! in-memory implementations in `adapters`.

pub mod ledger;

pub use ledger::{InsertOutcome, OrderLedger};
