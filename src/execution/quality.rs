//! Execution-quality score recorded on every fill.

use crate::domain::profile;

const SLIPPAGE_PENALTY_PER_PIP: f64 = 20.0;
const LATENCY_FREE_MS: i64 = 250;
const LATENCY_MS_PER_POINT: f64 = 25.0;
const LATENCY_MAX_PENALTY: f64 = 30.0;
const SPREAD_PENALTY_PER_PIP: f64 = 10.0;

/// 0-100. Favourable slippage is not rewarded.
pub fn execution_quality(pair: &str, slippage_pips: f64, latency_ms: i64, spread_pips: Option<f64>) -> f64 {
    let slippage = slippage_pips.max(0.0) * SLIPPAGE_PENALTY_PER_PIP;
    let latency = ((latency_ms - LATENCY_FREE_MS).max(0) as f64 / LATENCY_MS_PER_POINT)
        .min(LATENCY_MAX_PENALTY);
    let spread = spread_pips
        .map(|s| (s - profile(pair).baseline_spread_pips).max(0.0) * SPREAD_PENALTY_PER_PIP)
        .unwrap_or(0.0);

    let score = 100.0 - slippage - latency - spread;
    if score.is_finite() {
        score.clamp(0.0, 100.0)
    } else {
        0.0
    }
}
