//! Position sizing.
//!
//! Risk-based base size scaled by every governance layer, then clamped into
//! the hard unit band.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::profile;

pub const MIN_UNITS: i64 = 500;
pub const MAX_UNITS: i64 = 5000;

const RISK_PER_TRADE: f64 = 0.005;
const REFERENCE_CONFIDENCE: f64 = 80.0;
const BASE_STOP_PIPS: f64 = 8.0;

/// The multipliers each layer contributes to the final size
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizeMultipliers {
    pub governance: f64,
    pub pair: f64,
    pub session: f64,
    pub agent: f64,
    pub discovery: f64,
}

impl SizeMultipliers {
    pub fn product(&self) -> f64 {
        self.governance * self.pair * self.session * self.agent * self.discovery
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizeDecision {
    pub base_units: f64,
    pub multipliers: SizeMultipliers,
    pub units: i64,
    /// True when the clamp changed the scaled size
    pub clamped: bool,
}

pub fn size(pair: &str, balance: Decimal, confidence: f64, multipliers: SizeMultipliers) -> SizeDecision {
    let instrument = profile(pair);
    let balance = balance.to_f64().unwrap_or(0.0);

    let risk = balance * RISK_PER_TRADE * (confidence / REFERENCE_CONFIDENCE);
    let stop_pips = BASE_STOP_PIPS * instrument.atr_multiplier;
    let base_units = risk / (stop_pips * instrument.pip_value_per_unit);

    let scaled = base_units * multipliers.product();
    let units = clamp_units(scaled);

    SizeDecision {
        base_units,
        multipliers,
        units,
        clamped: !scaled.is_finite() || scaled.round() as i64 != units,
    }
}

/// Clamp into [MIN_UNITS, MAX_UNITS]. Zero, negative or non-finite sizes
/// fall to the minimum.
pub fn clamp_units(raw: f64) -> i64 {
    if !raw.is_finite() || raw <= 0.0 {
        return MIN_UNITS;
    }
    (raw.round() as i64).clamp(MIN_UNITS, MAX_UNITS)
}
