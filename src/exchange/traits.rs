use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::Environment;
use crate::error::BrokerError;

pub type BrokerResult<T> = std::result::Result<T, BrokerError>;

/// Market order for `units` of `instrument`. Units are always positive: the
/// engine only buys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketOrderRequest {
    pub instrument: String,
    pub units: i64,
    /// Sent as the client extension id so broker-side records can be matched
    pub client_order_id: Option<String>,
}

/// Validated fill returned by the broker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerFill {
    pub order_id: String,
    pub trade_id: Option<String>,
    pub instrument: String,
    pub units: i64,
    pub price: Decimal,
    pub time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub balance: Decimal,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub instrument: String,
    pub bid: Decimal,
    pub ask: Decimal,
    pub tradeable: bool,
    pub time: DateTime<Utc>,
}

impl PriceQuote {
    pub fn spread_pips(&self) -> f64 {
        crate::domain::spread_pips(&self.instrument, self.bid, self.ask)
    }
}

/// A broker-side trade that has been closed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub trade_id: String,
    pub instrument: String,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub closed_at: DateTime<Utc>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BrokerClient: Send + Sync {
    fn environment(&self) -> Environment;

    async fn submit_market_order(&self, request: &MarketOrderRequest) -> BrokerResult<BrokerFill>;

    async fn account_summary(&self) -> BrokerResult<AccountSummary>;

    async fn pricing(&self, instruments: &[String]) -> BrokerResult<Vec<PriceQuote>>;

    async fn closed_trades(&self, limit: u32) -> BrokerResult<Vec<ClosedTrade>>;
}
