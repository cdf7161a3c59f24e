use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::coordination::CircuitBreakerRecord;
use crate::domain::{
    CloseDetails, Direction, Environment, NewOrder, OrderFinalization, OrderRecord, OrderStatus,
};
use crate::error::{GovexError, Result};
use crate::persistence::{InsertOutcome, OrderLedger};

const ORDER_COLUMNS: &str = r#"
    id, pair, direction, requested_units, filled_units, status, confidence, agent_id,
    environment, created_at, filled_at, closed_at, entry_price, exit_price, slippage_pips,
    fill_latency_ms, spread_at_entry, execution_quality, session_label, regime_label,
    gate_result, gate_reasons, governance_payload, idempotency_key, broker_order_id,
    broker_trade_id, error_message
"#;

/// PostgreSQL order ledger
#[derive(Clone)]
pub struct PostgresLedger {
    pool: PgPool,
}

impl PostgresLedger {
    /// Connect a new pool
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Run migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations completed");
        Ok(())
    }

    fn map_order(row: &PgRow) -> Result<OrderRecord> {
        let direction: String = row.try_get("direction")?;
        let status: String = row.try_get("status")?;
        let environment: String = row.try_get("environment")?;

        Ok(OrderRecord {
            id: row.try_get("id")?,
            pair: row.try_get("pair")?,
            direction: Direction::try_from(direction.as_str()).map_err(GovexError::Internal)?,
            requested_units: row.try_get("requested_units")?,
            filled_units: row.try_get("filled_units")?,
            status: OrderStatus::try_from(status.as_str()).map_err(GovexError::Internal)?,
            confidence: row.try_get("confidence")?,
            agent_id: row.try_get("agent_id")?,
            environment: Environment::try_from(environment.as_str()).map_err(GovexError::Internal)?,
            created_at: row.try_get("created_at")?,
            filled_at: row.try_get("filled_at")?,
            closed_at: row.try_get("closed_at")?,
            entry_price: row.try_get("entry_price")?,
            exit_price: row.try_get("exit_price")?,
            slippage_pips: row.try_get("slippage_pips")?,
            fill_latency_ms: row.try_get("fill_latency_ms")?,
            spread_at_entry: row.try_get("spread_at_entry")?,
            execution_quality: row.try_get("execution_quality")?,
            session_label: row.try_get("session_label")?,
            regime_label: row.try_get("regime_label")?,
            gate_result: row.try_get("gate_result")?,
            gate_reasons: row.try_get("gate_reasons")?,
            governance_payload: row.try_get("governance_payload")?,
            idempotency_key: row.try_get("idempotency_key")?,
            broker_order_id: row.try_get("broker_order_id")?,
            broker_trade_id: row.try_get("broker_trade_id")?,
            error_message: row.try_get("error_message")?,
        })
    }
}

#[async_trait]
impl OrderLedger for PostgresLedger {
    #[instrument(skip(self))]
    async fn recent_orders(&self, environment: Environment, limit: i64) -> Result<Vec<OrderRecord>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE environment = $1 ORDER BY created_at DESC LIMIT $2"
        );
        let rows = sqlx::query(&sql)
            .bind(environment.as_str())
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::map_order).collect()
    }

    #[instrument(skip(self))]
    async fn filled_orders(&self, environment: Environment, limit: i64) -> Result<Vec<OrderRecord>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE environment = $1 AND status = 'filled' \
             ORDER BY COALESCE(filled_at, created_at) DESC LIMIT $2"
        );
        let rows = sqlx::query(&sql)
            .bind(environment.as_str())
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::map_order).collect()
    }

    #[instrument(skip(self, order), fields(id = %order.id, pair = %order.pair, status = %order.status))]
    async fn insert_order(&self, order: &NewOrder) -> Result<InsertOutcome> {
        let result = sqlx::query(
            r#"
            INSERT INTO orders (
                id, pair, direction, requested_units, status, confidence, agent_id, environment,
                created_at, spread_at_entry, session_label, regime_label, gate_result,
                gate_reasons, governance_payload, idempotency_key, error_message
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(order.id)
        .bind(&order.pair)
        .bind(order.direction().as_str())
        .bind(order.requested_units)
        .bind(order.status.as_str())
        .bind(order.confidence)
        .bind(&order.agent_id)
        .bind(order.environment.as_str())
        .bind(order.created_at)
        .bind(order.spread_at_entry)
        .bind(&order.session_label)
        .bind(&order.regime_label)
        .bind(&order.gate_result)
        .bind(&order.gate_reasons)
        .bind(&order.governance_payload)
        .bind(&order.idempotency_key)
        .bind(&order.error_message)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                debug!("Order row inserted");
                Ok(InsertOutcome::Inserted)
            }
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                warn!(key = ?order.idempotency_key, "Idempotency key already present");
                Ok(InsertOutcome::Duplicate)
            }
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self, details))]
    async fn finalize_order(
        &self,
        id: Uuid,
        status: OrderStatus,
        details: &OrderFinalization,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE orders SET
                status = $2,
                filled_units = COALESCE($3, filled_units),
                entry_price = COALESCE($4, entry_price),
                filled_at = COALESCE($5, filled_at),
                slippage_pips = COALESCE($6, slippage_pips),
                fill_latency_ms = COALESCE($7, fill_latency_ms),
                execution_quality = COALESCE($8, execution_quality),
                spread_at_entry = COALESCE($9, spread_at_entry),
                broker_order_id = COALESCE($10, broker_order_id),
                broker_trade_id = COALESCE($11, broker_trade_id),
                error_message = COALESCE($12, error_message)
            WHERE id = $1 AND status IN ('submitted', 'shadow_eval')
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(details.filled_units)
        .bind(details.entry_price)
        .bind(details.filled_at)
        .bind(details.slippage_pips)
        .bind(details.fill_latency_ms)
        .bind(details.execution_quality)
        .bind(details.spread_at_entry)
        .bind(&details.broker_order_id)
        .bind(&details.broker_trade_id)
        .bind(&details.error_message)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn last_fill_on_pair(
        &self,
        pair: &str,
        environment: Environment,
    ) -> Result<Option<DateTime<Utc>>> {
        let row = sqlx::query(
            r#"
            SELECT MAX(COALESCE(filled_at, created_at)) AS last_fill
            FROM orders
            WHERE pair = $1 AND environment = $2 AND status = 'filled'
            "#,
        )
        .bind(pair)
        .bind(environment.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("last_fill")?)
    }

    async fn count_short_fills_since(&self, since: DateTime<Utc>) -> Result<i64> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS n
            FROM orders
            WHERE direction = 'short' AND status = 'filled'
              AND COALESCE(filled_at, created_at) >= $1
            "#,
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("n")?)
    }

    async fn active_circuit_breakers(&self, now: DateTime<Utc>) -> Result<Vec<CircuitBreakerRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT pair, reason, tripped_at, expires_at
            FROM circuit_breakers
            WHERE expires_at > $1 AND tripped_at <= $1
            ORDER BY tripped_at DESC
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| {
                Ok(CircuitBreakerRecord {
                    pair: r.try_get("pair")?,
                    reason: r.try_get("reason")?,
                    tripped_at: r.try_get("tripped_at")?,
                    expires_at: r.try_get("expires_at")?,
                })
            })
            .collect()
    }

    #[instrument(skip(self))]
    async fn attach_close(&self, close: &CloseDetails) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE orders SET exit_price = $2, closed_at = $3
            WHERE broker_trade_id = $1 AND status = 'filled' AND exit_price IS NULL
            "#,
        )
        .bind(&close.broker_trade_id)
        .bind(close.exit_price)
        .bind(close.closed_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
