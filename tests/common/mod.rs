//! Shared fixtures: a scripted broker, scripted signals and a seeded ledger.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use govex::adapters::MemoryLedger;
use govex::config::AppConfig;
use govex::domain::{
    pip_size, Direction, Environment, OrderRecord, OrderStatus, Regime, Signal, SignalSource,
};
use govex::error::BrokerError;
use govex::exchange::{
    AccountSummary, BrokerClient, BrokerFill, BrokerResult, ClosedTrade, MarketOrderRequest,
    PriceQuote,
};
use govex::execution::ExecutionEngine;
use govex::persistence::OrderLedger;

pub const ROSTER: [&str; 3] = ["momentum-1", "breakout-2", "meanrev-3"];

/// Tuesday 2026-03-03 09:30 UTC, London open
pub fn london_open() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 3, 9, 30, 0).unwrap()
}

/// Saturday 2026-03-07 12:00 UTC
pub fn saturday() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 7, 12, 0, 0).unwrap()
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default_config();
    config.execution.pairs = ["EUR_USD", "GBP_USD", "USD_JPY", "AUD_USD", "USD_CAD"]
        .iter()
        .map(|p| p.to_string())
        .collect();
    config.execution.submit_delay_ms = 0;
    config.execution.retry_backoff_ms = 0;
    config.execution.rng_seed = Some(7);
    config.agents.roster = ROSTER.iter().map(|a| a.to_string()).collect();
    config
}

pub fn quote(instrument: &str, bid: Decimal, ask: Decimal) -> PriceQuote {
    PriceQuote {
        instrument: instrument.to_string(),
        bid,
        ask,
        tradeable: true,
        time: london_open(),
    }
}

pub fn default_quotes() -> Vec<PriceQuote> {
    vec![
        quote("EUR_USD", dec!(1.08500), dec!(1.08508)),
        quote("GBP_USD", dec!(1.26500), dec!(1.26512)),
        quote("USD_JPY", dec!(150.000), dec!(150.010)),
        quote("AUD_USD", dec!(0.65500), dec!(0.65510)),
        quote("USD_CAD", dec!(1.35000), dec!(1.35014)),
    ]
}

/// Broker double: fills at the quoted ask unless a scripted failure is queued.
pub struct ScriptedBroker {
    environment: Environment,
    balance: Option<Decimal>,
    quotes: Vec<PriceQuote>,
    failures: Mutex<VecDeque<BrokerError>>,
    submitted: Mutex<Vec<MarketOrderRequest>>,
    closed: Vec<ClosedTrade>,
    fill_offset: Decimal,
    next_id: AtomicU64,
}

impl ScriptedBroker {
    pub fn paper() -> Self {
        Self {
            environment: Environment::Paper,
            balance: Some(dec!(10000)),
            quotes: default_quotes(),
            failures: Mutex::new(VecDeque::new()),
            submitted: Mutex::new(Vec::new()),
            closed: Vec::new(),
            fill_offset: Decimal::ZERO,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn live() -> Self {
        Self {
            environment: Environment::Live,
            ..Self::paper()
        }
    }

    /// Queue errors returned by the next submissions, in order
    pub fn failing_with(self, errors: Vec<BrokerError>) -> Self {
        *self.failures.lock().unwrap() = errors.into();
        self
    }

    pub fn without_balance(mut self) -> Self {
        self.balance = None;
        self
    }

    pub fn with_closed(mut self, closed: Vec<ClosedTrade>) -> Self {
        self.closed = closed;
        self
    }

    /// Fill this far above the quoted ask
    pub fn filling_above_ask(mut self, offset: Decimal) -> Self {
        self.fill_offset = offset;
        self
    }

    pub fn submitted(&self) -> Vec<MarketOrderRequest> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl BrokerClient for ScriptedBroker {
    fn environment(&self) -> Environment {
        self.environment
    }

    async fn submit_market_order(&self, request: &MarketOrderRequest) -> BrokerResult<BrokerFill> {
        self.submitted.lock().unwrap().push(request.clone());
        if let Some(err) = self.failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let price = self
            .quotes
            .iter()
            .find(|q| q.instrument == request.instrument)
            .map(|q| q.ask)
            .unwrap_or(dec!(1))
            + self.fill_offset;
        Ok(BrokerFill {
            order_id: format!("O{id}"),
            trade_id: Some(format!("T{id}")),
            instrument: request.instrument.clone(),
            units: request.units,
            price,
            time: london_open(),
        })
    }

    async fn account_summary(&self) -> BrokerResult<AccountSummary> {
        match self.balance {
            Some(balance) => Ok(AccountSummary {
                balance,
                currency: "USD".to_string(),
            }),
            None => Err(BrokerError::Transient {
                status: 503,
                message: "summary unavailable".to_string(),
            }),
        }
    }

    async fn pricing(&self, instruments: &[String]) -> BrokerResult<Vec<PriceQuote>> {
        Ok(self
            .quotes
            .iter()
            .filter(|q| instruments.contains(&q.instrument))
            .cloned()
            .collect())
    }

    async fn closed_trades(&self, _limit: u32) -> BrokerResult<Vec<ClosedTrade>> {
        Ok(self.closed.clone())
    }
}

/// Hands out queued signals in order, then nothing.
#[derive(Default)]
pub struct ScriptedSignals {
    queue: Mutex<VecDeque<Signal>>,
}

impl ScriptedSignals {
    pub fn new(signals: Vec<Signal>) -> Self {
        Self {
            queue: Mutex::new(signals.into()),
        }
    }
}

impl SignalSource for ScriptedSignals {
    fn propose(&self, _agent_id: &str, _pairs: &[String], _rng: &mut dyn rand::RngCore) -> Option<Signal> {
        self.queue.lock().unwrap().pop_front()
    }
}

pub fn long(pair: &str, regime: Regime) -> Signal {
    Signal {
        pair: pair.to_string(),
        direction: Direction::Long,
        confidence: 80.0,
        regime,
        composite_score: 0.8,
    }
}

/// Closed trade on the paper account
pub fn closed_trade(
    agent: &str,
    pair: &str,
    direction: Direction,
    pips: f64,
    session: &str,
    created_at: DateTime<Utc>,
) -> OrderRecord {
    let entry = if pip_size(pair) > 0.001 {
        dec!(150.000)
    } else {
        dec!(1.10000)
    };
    let signed = match direction {
        Direction::Long => pips,
        Direction::Short => -pips,
    };
    let delta = Decimal::from_f64_retain(signed * pip_size(pair))
        .unwrap_or_default()
        .round_dp(5);
    OrderRecord {
        id: Uuid::new_v4(),
        pair: pair.to_string(),
        direction,
        requested_units: 1000,
        filled_units: Some(1000),
        status: OrderStatus::Filled,
        confidence: 70.0,
        agent_id: agent.to_string(),
        environment: Environment::Paper,
        created_at,
        filled_at: Some(created_at),
        closed_at: Some(created_at + Duration::minutes(20)),
        entry_price: Some(entry),
        exit_price: Some(entry + delta),
        slippage_pips: Some(0.1),
        fill_latency_ms: Some(150),
        spread_at_entry: Some(0.0),
        execution_quality: Some(80.0),
        session_label: Some(session.to_string()),
        regime_label: None,
        gate_result: Some("PASS".to_string()),
        gate_reasons: vec![],
        governance_payload: serde_json::Value::Null,
        idempotency_key: None,
        broker_order_id: None,
        broker_trade_id: None,
        error_message: None,
    }
}

/// Healthy history: every roster agent is tier A, governance is NORMAL,
/// and AUD_USD is banned by an old losing streak from a retired agent.
pub fn healthy_history() -> Vec<OrderRecord> {
    const PAIRS: [&str; 3] = ["EUR_USD", "GBP_USD", "USD_JPY"];
    const SESSIONS: [&str; 3] = ["london-open", "ny-overlap", "asian"];

    let newest = london_open() - Duration::days(1);
    let mut rows = Vec::new();
    let mut age = 0;
    for k in 0..12 {
        for agent in ROSTER {
            let pips = if k % 4 == 3 { -5.0 } else { 10.0 };
            let at = newest - Duration::minutes(30 * age);
            rows.push(closed_trade(agent, PAIRS[k % 3], Direction::Long, pips, SESSIONS[k % 3], at));
            age += 1;
        }
    }
    for _ in 0..5 {
        let at = newest - Duration::minutes(30 * age);
        rows.push(closed_trade("legacy-9", "AUD_USD", Direction::Long, -10.0, "asian", at));
        age += 1;
    }
    rows
}

/// 25 trailing closed trades, 8 winners, net -120 pips, all from one agent
pub fn losing_history() -> Vec<OrderRecord> {
    let newest = london_open() - Duration::hours(2);
    (0..25)
        .map(|i| {
            // 8 x +10 and 17 losers summing to -200
            let pips = if i % 3 == 0 && i < 24 {
                10.0
            } else if i == 24 {
                -8.0
            } else {
                -12.0
            };
            closed_trade(
                "momentum-1",
                "EUR_USD",
                Direction::Long,
                pips,
                "london-open",
                newest - Duration::minutes(30 * i as i64),
            )
        })
        .collect()
}

pub struct Harness {
    pub ledger: Arc<MemoryLedger>,
    pub broker: Arc<ScriptedBroker>,
    pub engine: ExecutionEngine,
}

pub async fn harness(
    config: AppConfig,
    history: Vec<OrderRecord>,
    broker: ScriptedBroker,
    signals: Vec<Signal>,
    now: DateTime<Utc>,
) -> Harness {
    let ledger = Arc::new(MemoryLedger::new());
    ledger.seed(history).await;
    let broker = Arc::new(broker);
    let engine = ExecutionEngine::new(
        config,
        ledger.clone() as Arc<dyn OrderLedger>,
        broker.clone() as Arc<dyn BrokerClient>,
        Arc::new(ScriptedSignals::new(signals)),
    )
    .with_clock(Arc::new(move || now));
    Harness {
        ledger,
        broker,
        engine,
    }
}

/// Rows written after the seed, newest first
pub async fn new_rows(ledger: &MemoryLedger, since: DateTime<Utc>) -> Vec<OrderRecord> {
    ledger
        .all_orders()
        .await
        .into_iter()
        .filter(|o| o.created_at >= since)
        .collect()
}
