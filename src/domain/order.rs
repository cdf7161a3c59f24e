use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::instrument::pips_between;

/// Trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Long => "long",
            Direction::Short => "short",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Direction {
    type Error = String;

    fn try_from(raw: &str) -> Result<Self, Self::Error> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "long" | "buy" => Ok(Direction::Long),
            "short" | "sell" => Ok(Direction::Short),
            other => Err(format!("unknown direction '{other}'")),
        }
    }
}

/// Broker account the engine is pointed at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Paper,
    Live,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Paper => "paper",
            Environment::Live => "live",
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, Environment::Live)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Environment {
    type Error = String;

    fn try_from(raw: &str) -> Result<Self, Self::Error> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "paper" | "practice" | "demo" => Ok(Environment::Paper),
            "live" | "real" => Ok(Environment::Live),
            other => Err(format!("unknown environment '{other}'")),
        }
    }
}

/// Order lifecycle status.
///
/// `Submitted` and `ShadowEval` are the only non-terminal states; every other
/// status is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    #[serde(rename = "submitted")]
    Submitted,
    #[serde(rename = "shadow_eval")]
    ShadowEval,
    #[serde(rename = "filled")]
    Filled,
    #[serde(rename = "rejected")]
    Rejected,
    #[serde(rename = "blocked")]
    Blocked,
    #[serde(rename = "pair-banned")]
    PairBanned,
    #[serde(rename = "pair-restricted")]
    PairRestricted,
    #[serde(rename = "discovery_blocked")]
    DiscoveryBlocked,
    #[serde(rename = "gated")]
    Gated,
    #[serde(rename = "deduped")]
    Deduped,
    #[serde(rename = "idempotency_conflict")]
    IdempotencyConflict,
    #[serde(rename = "db_error")]
    DbError,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 12] = [
        OrderStatus::Submitted,
        OrderStatus::ShadowEval,
        OrderStatus::Filled,
        OrderStatus::Rejected,
        OrderStatus::Blocked,
        OrderStatus::PairBanned,
        OrderStatus::PairRestricted,
        OrderStatus::DiscoveryBlocked,
        OrderStatus::Gated,
        OrderStatus::Deduped,
        OrderStatus::IdempotencyConflict,
        OrderStatus::DbError,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Submitted => "submitted",
            OrderStatus::ShadowEval => "shadow_eval",
            OrderStatus::Filled => "filled",
            OrderStatus::Rejected => "rejected",
            OrderStatus::Blocked => "blocked",
            OrderStatus::PairBanned => "pair-banned",
            OrderStatus::PairRestricted => "pair-restricted",
            OrderStatus::DiscoveryBlocked => "discovery_blocked",
            OrderStatus::Gated => "gated",
            OrderStatus::Deduped => "deduped",
            OrderStatus::IdempotencyConflict => "idempotency_conflict",
            OrderStatus::DbError => "db_error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Submitted | OrderStatus::ShadowEval)
    }

    /// Statuses that represent an actual attempt at the broker
    pub fn is_execution_attempt(&self) -> bool {
        matches!(self, OrderStatus::Filled | OrderStatus::Rejected)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for OrderStatus {
    type Error = String;

    fn try_from(raw: &str) -> Result<Self, Self::Error> {
        OrderStatus::ALL
            .into_iter()
            .find(|s| s.as_str() == raw.trim())
            .ok_or_else(|| format!("unknown order status '{raw}'"))
    }
}

/// A persisted order row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: Uuid,
    pub pair: String,
    pub direction: Direction,
    pub requested_units: i64,
    pub filled_units: Option<i64>,
    pub status: OrderStatus,
    pub confidence: f64,
    pub agent_id: String,
    pub environment: Environment,
    pub created_at: DateTime<Utc>,
    pub filled_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub entry_price: Option<Decimal>,
    pub exit_price: Option<Decimal>,
    /// Adverse slippage at fill, in pips
    pub slippage_pips: Option<f64>,
    pub fill_latency_ms: Option<i64>,
    /// Spread at entry, in pips
    pub spread_at_entry: Option<f64>,
    /// 0-100
    pub execution_quality: Option<f64>,
    pub session_label: Option<String>,
    pub regime_label: Option<String>,
    pub gate_result: Option<String>,
    pub gate_reasons: Vec<String>,
    pub governance_payload: serde_json::Value,
    pub idempotency_key: Option<String>,
    pub broker_order_id: Option<String>,
    pub broker_trade_id: Option<String>,
    pub error_message: Option<String>,
}

impl OrderRecord {
    /// A filled order with a known exit
    pub fn is_closed(&self) -> bool {
        self.status == OrderStatus::Filled && self.entry_price.is_some() && self.exit_price.is_some()
    }

    /// Realised pips for a closed trade
    pub fn pips(&self) -> Option<f64> {
        match (self.entry_price, self.exit_price) {
            (Some(entry), Some(exit)) if self.status == OrderStatus::Filled => {
                Some(pips_between(&self.pair, self.direction, entry, exit))
            }
            _ => None,
        }
    }
}

/// Insert payload for a new order row.
///
/// There is no direction field: the engine only ever writes long orders, and
/// the ledger stamps `Direction::Long` from [`NewOrder::direction`].
#[derive(Debug, Clone, Serialize)]
pub struct NewOrder {
    pub id: Uuid,
    pub pair: String,
    pub requested_units: i64,
    pub status: OrderStatus,
    pub confidence: f64,
    pub agent_id: String,
    pub environment: Environment,
    pub created_at: DateTime<Utc>,
    pub spread_at_entry: Option<f64>,
    pub session_label: Option<String>,
    pub regime_label: Option<String>,
    pub gate_result: Option<String>,
    pub gate_reasons: Vec<String>,
    pub governance_payload: serde_json::Value,
    pub idempotency_key: Option<String>,
    pub error_message: Option<String>,
}

impl NewOrder {
    pub const fn direction(&self) -> Direction {
        Direction::Long
    }

    pub fn into_record(self) -> OrderRecord {
        OrderRecord {
            id: self.id,
            direction: Direction::Long,
            pair: self.pair,
            requested_units: self.requested_units,
            filled_units: None,
            status: self.status,
            confidence: self.confidence,
            agent_id: self.agent_id,
            environment: self.environment,
            created_at: self.created_at,
            filled_at: None,
            closed_at: None,
            entry_price: None,
            exit_price: None,
            slippage_pips: None,
            fill_latency_ms: None,
            spread_at_entry: self.spread_at_entry,
            execution_quality: None,
            session_label: self.session_label,
            regime_label: self.regime_label,
            gate_result: self.gate_result,
            gate_reasons: self.gate_reasons,
            governance_payload: self.governance_payload,
            idempotency_key: self.idempotency_key,
            broker_order_id: None,
            broker_trade_id: None,
            error_message: self.error_message,
        }
    }
}

/// The single terminal transition of a submitted/shadow row
#[derive(Debug, Clone, Default)]
pub struct OrderFinalization {
    pub filled_units: Option<i64>,
    pub entry_price: Option<Decimal>,
    pub filled_at: Option<DateTime<Utc>>,
    pub slippage_pips: Option<f64>,
    pub fill_latency_ms: Option<i64>,
    pub execution_quality: Option<f64>,
    pub spread_at_entry: Option<f64>,
    pub broker_order_id: Option<String>,
    pub broker_trade_id: Option<String>,
    pub error_message: Option<String>,
}

/// Late-arriving close of a filled trade
#[derive(Debug, Clone)]
pub struct CloseDetails {
    pub broker_trade_id: String,
    pub exit_price: Decimal,
    pub closed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_round_trip() {
        for status in OrderStatus::ALL {
            assert_eq!(OrderStatus::try_from(status.as_str()).unwrap(), status);
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }

    #[test]
    fn only_submitted_and_shadow_are_open() {
        let open: Vec<_> = OrderStatus::ALL
            .into_iter()
            .filter(|s| !s.is_terminal())
            .collect();
        assert_eq!(open, vec![OrderStatus::Submitted, OrderStatus::ShadowEval]);
    }

    #[test]
    fn new_orders_are_always_long() {
        let order = NewOrder {
            id: Uuid::new_v4(),
            pair: "EUR_USD".into(),
            requested_units: 1000,
            status: OrderStatus::Submitted,
            confidence: 70.0,
            agent_id: "a".into(),
            environment: Environment::Paper,
            created_at: Utc::now(),
            spread_at_entry: None,
            session_label: None,
            regime_label: None,
            gate_result: None,
            gate_reasons: vec![],
            governance_payload: serde_json::Value::Null,
            idempotency_key: None,
            error_message: None,
        };
        assert_eq!(order.direction(), Direction::Long);
        assert_eq!(order.into_record().direction, Direction::Long);
    }
}
