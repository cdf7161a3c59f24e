//! Per-pair capital allocation from trailing closed trades on each pair.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::metrics::TradeTally;
use crate::domain::OrderRecord;

/// Closed trades per pair considered by the allocator
pub const PAIR_WINDOW: usize = 50;

const BAN_MIN_TRADES: u32 = 5;
const RESTRICT_MIN_TRADES: u32 = 3;
const RESTRICTED_MULTIPLIER_CAP: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairStats {
    pub pair: String,
    pub closed_trades: u32,
    pub wins: u32,
    pub win_rate: f64,
    pub expectancy: f64,
    pub sharpe: f64,
    /// Mean execution quality, 0-100 (None when no scores were recorded)
    pub avg_quality: Option<f64>,
}

impl PairStats {
    /// Stats over the newest `PAIR_WINDOW` closed trades on `pair`.
    pub fn from_history(pair: &str, history: &[OrderRecord]) -> Self {
        let closed: Vec<&OrderRecord> = history
            .iter()
            .filter(|o| o.pair == pair && o.is_closed())
            .take(PAIR_WINDOW)
            .collect();

        let tally = TradeTally::from_pips(closed.iter().filter_map(|o| o.pips()));
        let qualities: Vec<f64> = closed.iter().filter_map(|o| o.execution_quality).collect();
        let avg_quality = if qualities.is_empty() {
            None
        } else {
            Some(qualities.iter().sum::<f64>() / qualities.len() as f64)
        };

        Self {
            pair: pair.to_string(),
            closed_trades: tally.trades,
            wins: tally.wins,
            win_rate: tally.win_rate(),
            expectancy: tally.expectancy(),
            sharpe: tally.sharpe(),
            avg_quality,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairAllocation {
    pub pair: String,
    pub closed_trades: u32,
    pub win_rate: f64,
    pub expectancy: f64,
    pub sharpe: f64,
    pub banned: bool,
    pub restricted: bool,
    pub capital_multiplier: f64,
    pub reasons: Vec<String>,
}

pub fn allocate(stats: &PairStats) -> PairAllocation {
    let mut reasons = Vec::new();
    let n = stats.closed_trades;

    let banned = n >= BAN_MIN_TRADES && (stats.expectancy < -2.0 || stats.win_rate < 0.30);
    if banned {
        reasons.push(format!(
            "banned: {} trades, expectancy {:.2}p, win rate {:.0}%",
            n,
            stats.expectancy,
            stats.win_rate * 100.0
        ));
    }

    let poor_quality = stats.avg_quality.map(|q| q < 40.0).unwrap_or(false);
    let restricted = !banned
        && n >= RESTRICT_MIN_TRADES
        && (stats.expectancy < -0.5 || stats.win_rate < 0.40 || poor_quality);
    if restricted {
        reasons.push(format!(
            "restricted: expectancy {:.2}p, win rate {:.0}%, quality {}",
            stats.expectancy,
            stats.win_rate * 100.0,
            stats
                .avg_quality
                .map(|q| format!("{q:.0}"))
                .unwrap_or_else(|| "n/a".into())
        ));
    }

    let base: f64 = if stats.sharpe > 1.5 && stats.win_rate > 0.65 {
        1.5
    } else if stats.sharpe > 1.0 && stats.win_rate > 0.55 {
        1.25
    } else if stats.expectancy < 0.0 {
        0.7
    } else {
        1.0
    };

    let capital_multiplier = if banned {
        0.0
    } else if restricted {
        base.min(RESTRICTED_MULTIPLIER_CAP)
    } else {
        base
    };

    PairAllocation {
        pair: stats.pair.clone(),
        closed_trades: n,
        win_rate: stats.win_rate,
        expectancy: stats.expectancy,
        sharpe: stats.sharpe,
        banned,
        restricted,
        capital_multiplier,
        reasons,
    }
}

/// Allocation for every tradeable pair, keyed by pair.
pub fn allocate_pairs(pairs: &[String], history: &[OrderRecord]) -> BTreeMap<String, PairAllocation> {
    pairs
        .iter()
        .map(|pair| (pair.clone(), allocate(&PairStats::from_history(pair, history))))
        .collect()
}
