//! OANDA v20 REST adapter.
//!
//! Only the four calls the engine needs: market orders, account summary,
//! pricing and closed trades. Every response is treated as untrusted and
//! validated before it is turned into a domain type.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::domain::Environment;
use crate::error::{BrokerError, GovexError, Result};
use crate::exchange::{
    AccountSummary, BrokerClient, BrokerFill, BrokerResult, ClosedTrade, MarketOrderRequest,
    PriceQuote,
};

#[derive(Clone)]
pub struct OandaClient {
    http: Client,
    base_url: String,
    account_id: String,
    environment: Environment,
}

impl OandaClient {
    pub fn new(
        base_url: &str,
        account_id: &str,
        api_token: &str,
        environment: Environment,
        timeout: Duration,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", api_token.trim()))
            .map_err(|e| GovexError::Validation(format!("invalid broker token header: {}", e)))?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .user_agent("govex/0.1")
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| GovexError::Internal(format!("failed to build broker HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            account_id: account_id.to_string(),
            environment,
        })
    }

    fn account_path(&self, suffix: &str) -> String {
        format!("/v3/accounts/{}{}", self.account_id, suffix)
    }

    async fn request_json(
        &self,
        method: Method,
        path: &str,
        query: Option<&[(&str, String)]>,
        body: Option<Value>,
    ) -> BrokerResult<Value> {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.http.request(method.clone(), &url);
        if let Some(query) = query {
            req = req.query(query);
        }
        if let Some(body) = body {
            req = req.json(&body);
        }

        let resp = req.send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            warn!(%method, path, status = status.as_u16(), "Broker request failed");
            return Err(BrokerError::from_status(status.as_u16(), &text));
        }
        if text.trim().is_empty() {
            return Err(BrokerError::InvalidResponse(format!(
                "{} {} returned an empty body",
                method, path
            )));
        }

        serde_json::from_str(&text)
            .map_err(|e| BrokerError::InvalidResponse(format!("invalid JSON from broker: {}", e)))
    }
}

fn pick_str<'a>(root: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|key| root.get(*key).and_then(|v| v.as_str()))
}

fn parse_decimalish(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(s) => Decimal::from_str_exact(s.trim()).ok(),
        Value::Number(n) => Decimal::from_str_exact(&n.to_string()).ok(),
        _ => None,
    }
}

fn pick_decimal(root: &Value, keys: &[&str]) -> Option<Decimal> {
    keys.iter().find_map(|key| root.get(*key).and_then(parse_decimalish))
}

fn parse_time(root: &Value, keys: &[&str]) -> Option<DateTime<Utc>> {
    pick_str(root, keys)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
}

fn invalid(msg: impl Into<String>) -> BrokerError {
    BrokerError::InvalidResponse(msg.into())
}

/// Turn an order-create response into a fill, or the broker's reason for not
/// filling.
pub fn parse_order_response(request: &MarketOrderRequest, root: &Value) -> BrokerResult<BrokerFill> {
    if let Some(cancel) = root.get("orderCancelTransaction") {
        let reason = pick_str(cancel, &["reason"]).unwrap_or("UNKNOWN").to_string();
        if reason.eq_ignore_ascii_case("MARKET_HALTED") {
            return Err(BrokerError::MarketHalted(reason));
        }
        return Err(BrokerError::OrderCancelled { reason });
    }

    let fill = root
        .get("orderFillTransaction")
        .ok_or_else(|| invalid("response has neither a fill nor a cancel transaction"))?;

    let instrument = pick_str(fill, &["instrument"]).unwrap_or_default();
    if !instrument.eq_ignore_ascii_case(&request.instrument) {
        return Err(invalid(format!(
            "fill instrument '{}' does not match order '{}'",
            instrument, request.instrument
        )));
    }

    let price = pick_decimal(fill, &["price"])
        .or_else(|| fill.get("tradeOpened").and_then(|t| pick_decimal(t, &["price"])))
        .ok_or_else(|| invalid("fill without a price"))?;
    if price <= Decimal::ZERO {
        return Err(invalid(format!("non-positive fill price {}", price)));
    }

    let units = pick_str(fill, &["units"])
        .and_then(|u| u.trim().parse::<f64>().ok())
        .map(|u| u.round() as i64)
        .ok_or_else(|| invalid("fill without units"))?;
    if units <= 0 {
        return Err(invalid(format!("fill units {} are not a long fill", units)));
    }
    if units != request.units {
        warn!(requested = request.units, filled = units, "Partial or adjusted fill");
    }

    let order_id = pick_str(fill, &["orderID", "id"])
        .ok_or_else(|| invalid("fill without an order id"))?
        .to_string();
    let trade_id = fill
        .get("tradeOpened")
        .and_then(|t| pick_str(t, &["tradeID"]))
        .map(str::to_string);

    Ok(BrokerFill {
        order_id,
        trade_id,
        instrument: request.instrument.clone(),
        units,
        price,
        time: parse_time(fill, &["time"]).unwrap_or_else(Utc::now),
    })
}

pub fn parse_account_summary(root: &Value) -> BrokerResult<AccountSummary> {
    let account = root.get("account").ok_or_else(|| invalid("missing account object"))?;
    let balance = pick_decimal(account, &["balance", "NAV"])
        .ok_or_else(|| invalid("account summary without a balance"))?;
    Ok(AccountSummary {
        balance,
        currency: pick_str(account, &["currency"]).unwrap_or("USD").to_string(),
    })
}

/// Quotes with a missing or crossed book are dropped.
pub fn parse_pricing(root: &Value) -> BrokerResult<Vec<PriceQuote>> {
    let prices = root
        .get("prices")
        .and_then(|v| v.as_array())
        .ok_or_else(|| invalid("pricing response without prices"))?;

    let mut out = Vec::with_capacity(prices.len());
    for p in prices {
        let Some(instrument) = pick_str(p, &["instrument"]) else {
            continue;
        };
        let top = |side: &str| {
            p.get(side)
                .and_then(|v| v.as_array())
                .and_then(|levels| levels.first())
                .and_then(|lvl| pick_decimal(lvl, &["price"]))
        };
        let bid = top("bids").or_else(|| pick_decimal(p, &["closeoutBid"]));
        let ask = top("asks").or_else(|| pick_decimal(p, &["closeoutAsk"]));
        let (Some(bid), Some(ask)) = (bid, ask) else {
            debug!(instrument, "Quote without both sides");
            continue;
        };
        if bid <= Decimal::ZERO || ask < bid {
            warn!(instrument, %bid, %ask, "Discarding crossed or empty quote");
            continue;
        }
        out.push(PriceQuote {
            instrument: instrument.to_string(),
            bid,
            ask,
            tradeable: p.get("tradeable").and_then(|v| v.as_bool()).unwrap_or(false),
            time: parse_time(p, &["time"]).unwrap_or_else(Utc::now),
        });
    }
    Ok(out)
}

pub fn parse_closed_trades(root: &Value) -> BrokerResult<Vec<ClosedTrade>> {
    let trades = root
        .get("trades")
        .and_then(|v| v.as_array())
        .ok_or_else(|| invalid("trades response without trades"))?;

    Ok(trades
        .iter()
        .filter_map(|t| {
            Some(ClosedTrade {
                trade_id: pick_str(t, &["id"])?.to_string(),
                instrument: pick_str(t, &["instrument"])?.to_string(),
                entry_price: pick_decimal(t, &["price"])?,
                exit_price: pick_decimal(t, &["averageClosePrice"])?,
                closed_at: parse_time(t, &["closeTime"])?,
            })
        })
        .collect())
}

#[async_trait]
impl BrokerClient for OandaClient {
    fn environment(&self) -> Environment {
        self.environment
    }

    async fn submit_market_order(&self, request: &MarketOrderRequest) -> BrokerResult<BrokerFill> {
        if request.units <= 0 {
            return Err(BrokerError::Permanent(format!(
                "refusing non-long order of {} units",
                request.units
            )));
        }

        let mut order = json!({
            "type": "MARKET",
            "instrument": request.instrument,
            "units": request.units.to_string(),
            "timeInForce": "FOK",
            "positionFill": "DEFAULT",
        });
        if let Some(id) = &request.client_order_id {
            order["clientExtensions"] = json!({ "id": id, "tag": "govex" });
        }

        let root = self
            .request_json(
                Method::POST,
                &self.account_path("/orders"),
                None,
                Some(json!({ "order": order })),
            )
            .await?;
        parse_order_response(request, &root)
    }

    async fn account_summary(&self) -> BrokerResult<AccountSummary> {
        let root = self
            .request_json(Method::GET, &self.account_path("/summary"), None, None)
            .await?;
        parse_account_summary(&root)
    }

    async fn pricing(&self, instruments: &[String]) -> BrokerResult<Vec<PriceQuote>> {
        if instruments.is_empty() {
            return Ok(Vec::new());
        }
        let query = [("instruments", instruments.join(","))];
        let root = self
            .request_json(Method::GET, &self.account_path("/pricing"), Some(&query), None)
            .await?;
        parse_pricing(&root)
    }

    async fn closed_trades(&self, limit: u32) -> BrokerResult<Vec<ClosedTrade>> {
        let query = [("state", "CLOSED".to_string()), ("count", limit.to_string())];
        let root = self
            .request_json(Method::GET, &self.account_path("/trades"), Some(&query), None)
            .await?;
        parse_closed_trades(&root)
    }
}
