//! Order ledger contract.
//!
//! The ledger is the only write surface of the engine. Rows are inserted in a
//! pending (`submitted` / `shadow_eval`) or terminal state and finalized at
//! most once; afterwards only late fill/close details may be attached.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::coordination::CircuitBreakerRecord;
use crate::domain::{CloseDetails, Environment, NewOrder, OrderFinalization, OrderRecord, OrderStatus};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// Another row already holds the idempotency key
    Duplicate,
}

#[async_trait]
pub trait OrderLedger: Send + Sync {
    /// Newest-first orders for `environment`, at most `limit` rows.
    async fn recent_orders(&self, environment: Environment, limit: i64) -> Result<Vec<OrderRecord>>;

    /// Newest-first filled orders for `environment` (open or closed), used
    /// for agent aggregates.
    async fn filled_orders(&self, environment: Environment, limit: i64) -> Result<Vec<OrderRecord>>;

    async fn insert_order(&self, order: &NewOrder) -> Result<InsertOutcome>;

    /// Move a pending row to its terminal status. Returns false when the row
    /// was already terminal (or missing) and nothing changed.
    async fn finalize_order(
        &self,
        id: Uuid,
        status: OrderStatus,
        details: &OrderFinalization,
    ) -> Result<bool>;

    /// Most recent fill time on `pair`
    async fn last_fill_on_pair(
        &self,
        pair: &str,
        environment: Environment,
    ) -> Result<Option<DateTime<Utc>>>;

    /// Executed short trades (any environment) since `since`
    async fn count_short_fills_since(&self, since: DateTime<Utc>) -> Result<i64>;

    /// Circuit-breaker records that have not expired at `now`
    async fn active_circuit_breakers(&self, now: DateTime<Utc>) -> Result<Vec<CircuitBreakerRecord>>;

    /// Attach exit details to the filled row carrying the broker trade id.
    /// Returns false when no open filled row matched.
    async fn attach_close(&self, close: &CloseDetails) -> Result<bool>;
}
