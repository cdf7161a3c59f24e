//! In-process order ledger.
//!
//! Same contract as [`PostgresLedger`](super::PostgresLedger): unique
//! idempotency keys, single terminal transition, newest-first reads. Used for
//! dry runs without a database and by the integration tests.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::coordination::CircuitBreakerRecord;
use crate::domain::{
    CloseDetails, Direction, Environment, NewOrder, OrderFinalization, OrderRecord, OrderStatus,
};
use crate::error::Result;
use crate::persistence::{InsertOutcome, OrderLedger};

#[derive(Default)]
struct Inner {
    /// Insertion order; reads sort newest-first
    orders: Vec<OrderRecord>,
    breakers: Vec<CircuitBreakerRecord>,
}

#[derive(Clone, Default)]
pub struct MemoryLedger {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load historical rows as-is (including short trades from before the
    /// long-only cutover).
    pub async fn seed(&self, orders: impl IntoIterator<Item = OrderRecord>) {
        self.inner.write().await.orders.extend(orders);
    }

    pub async fn trip_circuit_breaker(&self, record: CircuitBreakerRecord) {
        self.inner.write().await.breakers.push(record);
    }

    /// Every row, newest first
    pub async fn all_orders(&self) -> Vec<OrderRecord> {
        let mut orders = self.inner.read().await.orders.clone();
        sort_newest_first(&mut orders);
        orders
    }
}

fn sort_newest_first(orders: &mut [OrderRecord]) {
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

fn fill_time(o: &OrderRecord) -> DateTime<Utc> {
    o.filled_at.unwrap_or(o.created_at)
}

#[async_trait]
impl OrderLedger for MemoryLedger {
    async fn recent_orders(&self, environment: Environment, limit: i64) -> Result<Vec<OrderRecord>> {
        let mut orders: Vec<OrderRecord> = self
            .inner
            .read()
            .await
            .orders
            .iter()
            .filter(|o| o.environment == environment)
            .cloned()
            .collect();
        sort_newest_first(&mut orders);
        orders.truncate(limit.max(0) as usize);
        Ok(orders)
    }

    async fn filled_orders(&self, environment: Environment, limit: i64) -> Result<Vec<OrderRecord>> {
        let mut orders: Vec<OrderRecord> = self
            .inner
            .read()
            .await
            .orders
            .iter()
            .filter(|o| o.environment == environment && o.status == OrderStatus::Filled)
            .cloned()
            .collect();
        orders.sort_by_key(|o| std::cmp::Reverse(fill_time(o)));
        orders.truncate(limit.max(0) as usize);
        Ok(orders)
    }

    async fn insert_order(&self, order: &NewOrder) -> Result<InsertOutcome> {
        let mut inner = self.inner.write().await;
        if let Some(key) = &order.idempotency_key {
            if inner
                .orders
                .iter()
                .any(|o| o.idempotency_key.as_deref() == Some(key.as_str()))
            {
                return Ok(InsertOutcome::Duplicate);
            }
        }
        inner.orders.push(order.clone().into_record());
        Ok(InsertOutcome::Inserted)
    }

    async fn finalize_order(
        &self,
        id: Uuid,
        status: OrderStatus,
        details: &OrderFinalization,
    ) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let Some(order) = inner
            .orders
            .iter_mut()
            .find(|o| o.id == id && !o.status.is_terminal())
        else {
            return Ok(false);
        };

        order.status = status;
        if details.filled_units.is_some() {
            order.filled_units = details.filled_units;
        }
        if details.entry_price.is_some() {
            order.entry_price = details.entry_price;
        }
        if details.filled_at.is_some() {
            order.filled_at = details.filled_at;
        }
        if details.slippage_pips.is_some() {
            order.slippage_pips = details.slippage_pips;
        }
        if details.fill_latency_ms.is_some() {
            order.fill_latency_ms = details.fill_latency_ms;
        }
        if details.execution_quality.is_some() {
            order.execution_quality = details.execution_quality;
        }
        if details.spread_at_entry.is_some() {
            order.spread_at_entry = details.spread_at_entry;
        }
        if details.broker_order_id.is_some() {
            order.broker_order_id = details.broker_order_id.clone();
        }
        if details.broker_trade_id.is_some() {
            order.broker_trade_id = details.broker_trade_id.clone();
        }
        if details.error_message.is_some() {
            order.error_message = details.error_message.clone();
        }
        Ok(true)
    }

    async fn last_fill_on_pair(
        &self,
        pair: &str,
        environment: Environment,
    ) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .inner
            .read()
            .await
            .orders
            .iter()
            .filter(|o| o.pair == pair && o.environment == environment && o.status == OrderStatus::Filled)
            .map(fill_time)
            .max())
    }

    async fn count_short_fills_since(&self, since: DateTime<Utc>) -> Result<i64> {
        Ok(self
            .inner
            .read()
            .await
            .orders
            .iter()
            .filter(|o| {
                o.direction == Direction::Short
                    && o.status == OrderStatus::Filled
                    && fill_time(o) >= since
            })
            .count() as i64)
    }

    async fn active_circuit_breakers(&self, now: DateTime<Utc>) -> Result<Vec<CircuitBreakerRecord>> {
        Ok(self
            .inner
            .read()
            .await
            .breakers
            .iter()
            .filter(|b| b.is_active(now))
            .cloned()
            .collect())
    }

    async fn attach_close(&self, close: &CloseDetails) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let mut matched = false;
        for order in inner.orders.iter_mut().filter(|o| {
            o.status == OrderStatus::Filled
                && o.exit_price.is_none()
                && o.broker_trade_id.as_deref() == Some(close.broker_trade_id.as_str())
        }) {
            order.exit_price = Some(close.exit_price);
            order.closed_at = Some(close.closed_at);
            matched = true;
        }
        Ok(matched)
    }
}
