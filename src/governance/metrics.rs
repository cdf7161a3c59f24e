//! Rolling trade metrics over a trailing window of the order ledger.
//!
//! Pure functions only. Input is most-recent-first, as the ledger returns it.

use serde::{Deserialize, Serialize};

use crate::domain::{OrderRecord, OrderStatus};

/// Fewer filled orders than this yields neutral metrics.
pub const MIN_FILLED_FOR_METRICS: usize = 3;
/// Profit factor reported when there are wins but no losses
pub const PROFIT_FACTOR_CAP: f64 = 10.0;

const DRIFT_RECENT_READINGS: usize = 5;
const DRIFT_RATIO: f64 = 1.4;
const NEUTRAL_QUALITY: f64 = 50.0;

/// Running totals over a set of closed-trade pip results
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeTally {
    pub trades: u32,
    pub wins: u32,
    pub net_pips: f64,
    pub gross_profit: f64,
    /// Positive number
    pub gross_loss: f64,
    sum_sq: f64,
}

impl TradeTally {
    pub fn from_pips<I: IntoIterator<Item = f64>>(pips: I) -> Self {
        let mut tally = Self::default();
        for p in pips {
            tally.push(p);
        }
        tally
    }

    pub fn push(&mut self, pips: f64) {
        if !pips.is_finite() {
            return;
        }
        self.trades += 1;
        self.net_pips += pips;
        self.sum_sq += pips * pips;
        if pips > 0.0 {
            self.wins += 1;
            self.gross_profit += pips;
        } else {
            self.gross_loss += -pips;
        }
    }

    pub fn win_rate(&self) -> f64 {
        if self.trades == 0 {
            return 0.0;
        }
        self.wins as f64 / self.trades as f64
    }

    pub fn expectancy(&self) -> f64 {
        if self.trades == 0 {
            return 0.0;
        }
        self.net_pips / self.trades as f64
    }

    pub fn profit_factor(&self) -> f64 {
        if self.gross_loss > 1e-12 {
            self.gross_profit / self.gross_loss
        } else if self.gross_profit > 0.0 {
            PROFIT_FACTOR_CAP
        } else {
            0.0
        }
    }

    /// Per-trade mean over sample standard deviation
    pub fn sharpe(&self) -> f64 {
        if self.trades < 2 {
            return 0.0;
        }
        let n = self.trades as f64;
        let mean = self.net_pips / n;
        let variance = ((self.sum_sq - n * mean * mean) / (n - 1.0)).max(0.0);
        let std_dev = variance.sqrt();
        if std_dev > 1e-9 {
            mean / std_dev
        } else {
            0.0
        }
    }
}

/// Metrics for one trailing window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowMetrics {
    pub window: usize,
    /// Filled orders in the window
    pub filled: usize,
    /// Filled orders with a known exit
    pub closed: usize,
    pub win_rate: f64,
    /// Net pips per closed trade
    pub expectancy: f64,
    pub net_pips: f64,
    /// Net pips after charging each closed trade its entry spread
    pub friction_adjusted_net_pips: f64,
    pub profit_factor: f64,
    pub sharpe: f64,
    pub capture_ratio: f64,
    pub rejection_rate: f64,
    pub avg_slippage_pips: f64,
    pub slippage_drift: bool,
    /// Mean execution-quality score, 0-100
    pub avg_quality: f64,
    /// True when the window was too sparse and defaults were returned
    pub neutral: bool,
}

impl WindowMetrics {
    pub fn neutral(window: usize, filled: usize, rejection_rate: f64) -> Self {
        Self {
            window,
            filled,
            closed: 0,
            win_rate: 0.5,
            expectancy: 0.0,
            net_pips: 0.0,
            friction_adjusted_net_pips: 0.0,
            profit_factor: 1.0,
            sharpe: 0.0,
            capture_ratio: capture_ratio(0.5, NEUTRAL_QUALITY),
            rejection_rate,
            avg_slippage_pips: 0.0,
            slippage_drift: false,
            avg_quality: NEUTRAL_QUALITY,
            neutral: true,
        }
    }
}

/// Blend of win rate and execution quality, 0.0-1.0
pub fn capture_ratio(win_rate: f64, avg_quality: f64) -> f64 {
    (0.6 * win_rate + 0.4 * (avg_quality / 100.0)).clamp(0.0, 1.0)
}

/// Compute metrics over the first `window` execution attempts (filled or
/// rejected) of a most-recent-first history.
pub fn compute_window(history: &[OrderRecord], window: usize) -> WindowMetrics {
    let attempts: Vec<&OrderRecord> = history
        .iter()
        .filter(|o| o.status.is_execution_attempt())
        .take(window)
        .collect();

    let filled: Vec<&OrderRecord> = attempts
        .iter()
        .copied()
        .filter(|o| o.status == OrderStatus::Filled)
        .collect();
    let rejected = attempts.len() - filled.len();
    let rejection_rate = if attempts.is_empty() {
        0.0
    } else {
        rejected as f64 / attempts.len() as f64
    };

    if filled.len() < MIN_FILLED_FOR_METRICS {
        return WindowMetrics::neutral(window, filled.len(), rejection_rate);
    }

    let closed: Vec<(&OrderRecord, f64)> = filled
        .iter()
        .filter_map(|o| o.pips().map(|p| (*o, p)))
        .collect();
    let tally = TradeTally::from_pips(closed.iter().map(|(_, p)| *p));

    let (win_rate, expectancy, profit_factor) = if tally.trades == 0 {
        (0.5, 0.0, 1.0)
    } else {
        (tally.win_rate(), tally.expectancy(), tally.profit_factor())
    };

    let spread_paid: f64 = closed
        .iter()
        .map(|(o, _)| o.spread_at_entry.unwrap_or(0.0).max(0.0))
        .sum();

    let qualities: Vec<f64> = filled.iter().filter_map(|o| o.execution_quality).collect();
    let avg_quality = mean(&qualities).unwrap_or(NEUTRAL_QUALITY);

    let slippage: Vec<f64> = filled.iter().filter_map(|o| o.slippage_pips).collect();

    WindowMetrics {
        window,
        filled: filled.len(),
        closed: closed.len(),
        win_rate,
        expectancy,
        net_pips: tally.net_pips,
        friction_adjusted_net_pips: tally.net_pips - spread_paid,
        profit_factor,
        sharpe: tally.sharpe(),
        capture_ratio: capture_ratio(win_rate, avg_quality),
        rejection_rate,
        avg_slippage_pips: mean(&slippage).unwrap_or(0.0),
        slippage_drift: slippage_drift(&slippage),
        avg_quality,
        neutral: false,
    }
}

/// Recent slippage (5 newest readings) running hot relative to the rest of
/// the window. Needs at least one older reading to compare against.
pub fn slippage_drift(readings_newest_first: &[f64]) -> bool {
    if readings_newest_first.len() <= DRIFT_RECENT_READINGS {
        return false;
    }
    let (recent, older) = readings_newest_first.split_at(DRIFT_RECENT_READINGS);
    match (mean(recent), mean(older)) {
        (Some(r), Some(o)) => r > 0.0 && r > DRIFT_RATIO * o,
        _ => false,
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use crate::domain::{Direction, Environment, OrderRecord, OrderStatus};

    /// A closed long EUR_USD trade that made `pips`; `age` orders back in time.
    pub fn closed_trade(agent: &str, pair: &str, pips: f64, age: i64) -> OrderRecord {
        let pip = crate::domain::pip_size(pair);
        let entry = if pip > 0.001 {
            Decimal::new(150_000, 3)
        } else {
            Decimal::new(110_000, 5)
        };
        let delta = Decimal::from_f64_retain(pips * pip).unwrap_or_default().round_dp(5);
        let created = Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap() - Duration::minutes(age * 15);
        OrderRecord {
            id: Uuid::new_v4(),
            pair: pair.to_string(),
            direction: Direction::Long,
            requested_units: 1000,
            filled_units: Some(1000),
            status: OrderStatus::Filled,
            confidence: 70.0,
            agent_id: agent.to_string(),
            environment: Environment::Paper,
            created_at: created,
            filled_at: Some(created),
            closed_at: Some(created + Duration::minutes(10)),
            entry_price: Some(entry),
            exit_price: Some(entry + delta),
            slippage_pips: Some(0.1),
            fill_latency_ms: Some(120),
            spread_at_entry: Some(0.0),
            execution_quality: Some(80.0),
            session_label: Some("london-open".to_string()),
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

    pub fn rejected(agent: &str, pair: &str, age: i64) -> OrderRecord {
        let mut o = closed_trade(agent, pair, 0.0, age);
        o.status = OrderStatus::Rejected;
        o.filled_units = None;
        o.entry_price = None;
        o.exit_price = None;
        o.slippage_pips = None;
        o.execution_quality = None;
        o
    }

    /// Most-recent-first history from a list of pip results.
    pub fn history(agent: &str, pair: &str, pips: &[f64]) -> Vec<OrderRecord> {
        pips.iter()
            .enumerate()
            .map(|(i, p)| closed_trade(agent, pair, *p, i as i64))
            .collect()
    }
}
