//! Static instrument profiles and pip arithmetic.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Direction;

/// Coarse realised-volatility bucket used for the expected-move estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolatilityClass {
    Low,
    Medium,
    High,
}

impl VolatilityClass {
    /// Typical favourable excursion in pips for one holding period
    pub fn expected_move_pips(&self) -> f64 {
        match self {
            VolatilityClass::Low => 4.0,
            VolatilityClass::Medium => 6.0,
            VolatilityClass::High => 9.0,
        }
    }

    /// 0.0-1.0 scale compared against a session's volatility tolerance
    pub fn intensity(&self) -> f64 {
        match self {
            VolatilityClass::Low => 0.4,
            VolatilityClass::Medium => 0.7,
            VolatilityClass::High => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstrumentProfile {
    pub pip_size: f64,
    /// Typical spread during liquid hours, in pips
    pub baseline_spread_pips: f64,
    pub volatility: VolatilityClass,
    /// Stop-distance multiplier relative to the 8-pip base stop
    pub atr_multiplier: f64,
    /// Approximate value of one pip per unit, in account currency
    pub pip_value_per_unit: f64,
}

const STANDARD_PIP: f64 = 0.0001;
const JPY_PIP: f64 = 0.01;

pub fn is_jpy_quoted(pair: &str) -> bool {
    pair.trim().to_ascii_uppercase().ends_with("JPY")
}

/// Pip size for an instrument: 0.01 for JPY-quoted pairs, 0.0001 otherwise.
pub fn pip_size(pair: &str) -> f64 {
    if is_jpy_quoted(pair) {
        JPY_PIP
    } else {
        STANDARD_PIP
    }
}

pub fn profile(pair: &str) -> InstrumentProfile {
    use VolatilityClass::*;

    let p = |spread: f64, vol: VolatilityClass, atr: f64, pip_value: f64| InstrumentProfile {
        pip_size: pip_size(pair),
        baseline_spread_pips: spread,
        volatility: vol,
        atr_multiplier: atr,
        pip_value_per_unit: pip_value,
    };

    match pair.trim().to_ascii_uppercase().as_str() {
        "EUR_USD" => p(0.8, Low, 1.0, 0.0001),
        "GBP_USD" => p(1.2, Medium, 1.2, 0.0001),
        "AUD_USD" => p(1.0, Low, 1.0, 0.0001),
        "NZD_USD" => p(1.5, Medium, 1.1, 0.0001),
        "USD_JPY" => p(1.0, Medium, 1.1, 0.000067),
        "USD_CAD" => p(1.4, Medium, 1.1, 0.000073),
        "USD_CHF" => p(1.5, Low, 1.0, 0.00011),
        "EUR_JPY" => p(1.6, High, 1.3, 0.000067),
        "GBP_JPY" => p(2.5, High, 1.5, 0.000067),
        "AUD_JPY" => p(1.8, High, 1.3, 0.000067),
        "EUR_GBP" => p(1.4, Low, 0.9, 0.00013),
        "EUR_AUD" => p(2.2, Medium, 1.2, 0.000065),
        other if is_jpy_quoted(other) => p(2.0, High, 1.3, 0.000067),
        _ => p(2.0, Medium, 1.2, 0.0001),
    }
}

/// Signed pip distance from entry to exit, positive when the trade made money.
pub fn pips_between(pair: &str, direction: Direction, entry: Decimal, exit: Decimal) -> f64 {
    let delta = (exit - entry).to_f64().unwrap_or(0.0);
    let raw = delta / pip_size(pair);
    match direction {
        Direction::Long => raw,
        Direction::Short => -raw,
    }
}

/// Adverse slippage of a fill against the quote it was priced from, in pips.
///
/// Positive means the fill was worse than quoted: a long paying above the
/// quote, a short selling below it.
pub fn slippage_pips(pair: &str, direction: Direction, quoted: Decimal, filled: Decimal) -> f64 {
    pips_between(pair, direction, quoted, filled)
}

/// Bid/ask spread expressed in pips
pub fn spread_pips(pair: &str, bid: Decimal, ask: Decimal) -> f64 {
    ((ask - bid).to_f64().unwrap_or(0.0) / pip_size(pair)).max(0.0)
}
