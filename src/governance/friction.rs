//! Pre-trade admission gate: expected move must cover trading cost K times.

use serde::{Deserialize, Serialize};

use super::session::{Session, SessionBudget};
use crate::domain::profile;

/// Spread volatility as a fraction of the mean (baseline) spread
const SPREAD_VOLATILITY_FRACTION: f64 = 0.25;
const SLIPPAGE_ALLOWANCE_PIPS: f64 = 0.2;
const LATENCY_ALLOWANCE_PIPS: f64 = 0.1;
/// Current spread beyond this multiple of baseline is reported as widened
const SPREAD_WIDENED_FACTOR: f64 = 1.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GateVerdict {
    Pass,
    Throttle,
}

impl GateVerdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            GateVerdict::Pass => "PASS",
            GateVerdict::Throttle => "THROTTLE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrictionCheck {
    pub verdict: GateVerdict,
    pub expected_move_pips: f64,
    pub friction_pips: f64,
    pub ratio: f64,
    pub required_k: f64,
    pub reasons: Vec<String>,
}

impl FrictionCheck {
    pub fn passed(&self) -> bool {
        self.verdict == GateVerdict::Pass
    }
}

fn session_move_scale(session: Session) -> f64 {
    match session {
        Session::LondonOpen => 1.3,
        Session::NyOverlap => 1.15,
        _ => 0.85,
    }
}

/// Expected favourable move in pips for `pair` during `session`.
pub fn expected_move_pips(pair: &str, session: Session) -> f64 {
    profile(pair).volatility.expected_move_pips() * session_move_scale(session)
}

/// All-in cost of a round trip in pips.
pub fn friction_pips(pair: &str, budget: &SessionBudget) -> f64 {
    let baseline = profile(pair).baseline_spread_pips;
    baseline * budget.friction_multiplier
        + baseline * SPREAD_VOLATILITY_FRACTION
        + SLIPPAGE_ALLOWANCE_PIPS
        + LATENCY_ALLOWANCE_PIPS
}

/// Run the gate. `current_spread_pips` is the live spread when a quote is
/// available; it only contributes reasons, the verdict is the ratio test.
pub fn check(
    pair: &str,
    budget: &SessionBudget,
    required_k: f64,
    current_spread_pips: Option<f64>,
) -> FrictionCheck {
    let instrument = profile(pair);
    let expected = expected_move_pips(pair, budget.session);
    let friction = friction_pips(pair, budget);
    let ratio = if friction > 0.0 { expected / friction } else { f64::INFINITY };

    let mut reasons = Vec::new();
    let verdict = if ratio >= required_k {
        GateVerdict::Pass
    } else {
        reasons.push(format!(
            "friction ratio {ratio:.2} below required {required_k:.2} (move {expected:.1}p / cost {friction:.2}p)"
        ));
        GateVerdict::Throttle
    };

    if budget.session == Session::Rollover {
        reasons.push(format!(
            "rollover spread penalty x{:.1}",
            budget.friction_multiplier
        ));
    }
    if let Some(spread) = current_spread_pips {
        if spread > instrument.baseline_spread_pips * SPREAD_WIDENED_FACTOR {
            reasons.push(format!(
                "spread widened to {spread:.1}p (baseline {:.1}p)",
                instrument.baseline_spread_pips
            ));
        }
    }
    if instrument.volatility.intensity() > budget.volatility_tolerance {
        reasons.push(format!(
            "volatility above {} tolerance",
            budget.session
        ));
    }

    FrictionCheck {
        verdict,
        expected_move_pips: expected,
        friction_pips: friction,
        ratio,
        required_k,
        reasons,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn liquid_major_passes_in_london() {
        let budget = Session::LondonOpen.budget();
        let c = check("EUR_USD", &budget, 3.0, Some(0.8));
        assert!(c.passed(), "{c:?}");
        assert!((c.friction_pips - 1.3).abs() < 1e-9);
        assert!((c.expected_move_pips - 5.2).abs() < 1e-9);
    }

    #[test]
    fn halt_k_throttles_everything() {
        for session in Session::ALL {
            let c = check("EUR_USD", &session.budget(), 10.0, None);
            assert_eq!(c.verdict, GateVerdict::Throttle);
            assert!(!c.reasons.is_empty());
        }
    }

    #[test]
    fn ratio_at_k_is_inclusive() {
        let budget = Session::NyOverlap.budget();
        let ratio = check("USD_JPY", &budget, 0.0, None).ratio;

        assert!(check("USD_JPY", &budget, ratio, None).passed());
        let just_above = ratio * (1.0 + 1e-12);
        assert!(!check("USD_JPY", &budget, just_above, None).passed());
    }

    #[test]
    fn rollover_and_wide_spread_add_reasons() {
        let budget = Session::Rollover.budget();
        let c = check("GBP_JPY", &budget, 3.0, Some(6.0));
        assert_eq!(c.verdict, GateVerdict::Throttle);
        assert!(c.reasons.iter().any(|r| r.contains("rollover")));
        assert!(c.reasons.iter().any(|r| r.contains("widened")));
        assert!(c.reasons.iter().any(|r| r.contains("volatility")));
    }
}
