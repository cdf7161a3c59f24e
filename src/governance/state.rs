//! Governance state machine.
//!
//! The system risk posture is a pure function of three trailing windows
//! (20/50/200 execution attempts). There is no stored "previous state":
//! every tick re-derives it from the ledger, so recovery happens as soon as
//! the windows stop meeting a trigger.

use serde::{Deserialize, Serialize};

use super::metrics::{compute_window, WindowMetrics};
use super::session::Session;
use crate::domain::OrderRecord;

pub const SHORT_WINDOW: usize = 20;
pub const MEDIUM_WINDOW: usize = 50;
pub const LONG_WINDOW: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GovernanceState {
    Normal,
    Defensive,
    Throttled,
    Halt,
}

impl GovernanceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            GovernanceState::Normal => "NORMAL",
            GovernanceState::Defensive => "DEFENSIVE",
            GovernanceState::Throttled => "THROTTLED",
            GovernanceState::Halt => "HALT",
        }
    }

    pub fn config(&self) -> GovernanceConfig {
        match self {
            GovernanceState::Normal => GovernanceConfig {
                density_multiplier: 1.0,
                sizing_multiplier: 1.0,
                friction_k: 3.0,
                pair_mode: PairRestrictionMode::BannedOnly,
                aggressiveness: SessionWeights {
                    rollover: 0.0,
                    asian: 0.6,
                    london_open: 1.0,
                    ny_overlap: 1.0,
                    late_ny: 0.7,
                },
                live_submissions: true,
                recovery: vec![],
            },
            GovernanceState::Defensive => GovernanceConfig {
                density_multiplier: 0.75,
                sizing_multiplier: 0.7,
                friction_k: 3.5,
                pair_mode: PairRestrictionMode::ExcludeRestricted,
                aggressiveness: SessionWeights {
                    rollover: 0.0,
                    asian: 0.4,
                    london_open: 0.9,
                    ny_overlap: 0.9,
                    late_ny: 0.5,
                },
                live_submissions: true,
                recovery: vec![
                    "20-trade win rate >= 55%".into(),
                    "50-trade expectancy >= 0.5 pips".into(),
                    "20-trade rejection rate <= 25%".into(),
                    "no slippage drift".into(),
                    "200-trade capture ratio >= 40%".into(),
                ],
            },
            GovernanceState::Throttled => GovernanceConfig {
                density_multiplier: 0.5,
                sizing_multiplier: 0.4,
                friction_k: 5.0,
                pair_mode: PairRestrictionMode::ExcludeRestricted,
                aggressiveness: SessionWeights {
                    rollover: 0.0,
                    asian: 0.2,
                    london_open: 0.7,
                    ny_overlap: 0.7,
                    late_ny: 0.3,
                },
                live_submissions: true,
                recovery: vec![
                    "20-trade win rate >= 45%".into(),
                    "50-trade expectancy >= -0.5 pips".into(),
                    "no slippage drift while quality < 50".into(),
                    "20-trade capture ratio >= 30%".into(),
                ],
            },
            GovernanceState::Halt => GovernanceConfig {
                density_multiplier: 0.5,
                sizing_multiplier: 0.0,
                friction_k: 10.0,
                pair_mode: PairRestrictionMode::TopPairsOnly,
                aggressiveness: SessionWeights {
                    rollover: 0.0,
                    asian: 0.2,
                    london_open: 0.5,
                    ny_overlap: 0.5,
                    late_ny: 0.2,
                },
                live_submissions: false,
                recovery: vec![
                    "20-trade win rate >= 35% or expectancy >= -2 pips".into(),
                    "50-trade friction-adjusted net >= -50 pips".into(),
                    "20-trade rejection rate <= 60% or quality >= 35".into(),
                ],
            },
        }
    }
}

impl std::fmt::Display for GovernanceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which pairs remain tradeable under a governance state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairRestrictionMode {
    /// Only banned pairs are refused
    BannedOnly,
    /// Banned and restricted pairs are refused
    ExcludeRestricted,
    /// Only unrestricted pairs with a capital multiplier of at least 1.0
    TopPairsOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionWeights {
    pub rollover: f64,
    pub asian: f64,
    pub london_open: f64,
    pub ny_overlap: f64,
    pub late_ny: f64,
}

impl SessionWeights {
    pub fn get(&self, session: Session) -> f64 {
        match session {
            Session::Rollover => self.rollover,
            Session::Asian => self.asian,
            Session::LondonOpen => self.london_open,
            Session::NyOverlap => self.ny_overlap,
            Session::LateNy => self.late_ny,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GovernanceConfig {
    pub density_multiplier: f64,
    pub sizing_multiplier: f64,
    /// Required expected-move / friction ratio
    pub friction_k: f64,
    pub pair_mode: PairRestrictionMode,
    /// Per-session aggressiveness, 0.0-1.0
    pub aggressiveness: SessionWeights,
    /// Whether orders may reach the broker; false means shadow evaluation only
    pub live_submissions: bool,
    /// What has to hold again for the next tick to leave this state
    pub recovery: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GovernanceWindows {
    pub short: WindowMetrics,
    pub medium: WindowMetrics,
    pub long: WindowMetrics,
}

impl GovernanceWindows {
    pub fn from_history(history: &[OrderRecord]) -> Self {
        Self {
            short: compute_window(history, SHORT_WINDOW),
            medium: compute_window(history, MEDIUM_WINDOW),
            long: compute_window(history, LONG_WINDOW),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GovernanceSnapshot {
    pub state: GovernanceState,
    pub reasons: Vec<String>,
    pub config: GovernanceConfig,
    pub windows: GovernanceWindows,
}

impl GovernanceSnapshot {
    pub fn from_history(history: &[OrderRecord]) -> Self {
        evaluate(GovernanceWindows::from_history(history))
    }
}

/// Evaluate the state top-down; the first state with a matching trigger wins.
pub fn evaluate(windows: GovernanceWindows) -> GovernanceSnapshot {
    let (state, reasons) = classify(&windows.short, &windows.medium, &windows.long);
    GovernanceSnapshot {
        state,
        reasons,
        config: state.config(),
        windows,
    }
}

fn classify(
    w20: &WindowMetrics,
    w50: &WindowMetrics,
    w200: &WindowMetrics,
) -> (GovernanceState, Vec<String>) {
    let pct = |x: f64| x * 100.0;

    let mut halt = Vec::new();
    if w20.win_rate < 0.35 && w20.expectancy < -2.0 {
        halt.push(format!(
            "20-trade win rate {:.0}% < 35% with expectancy {:.2}p < -2p",
            pct(w20.win_rate),
            w20.expectancy
        ));
    }
    if w50.friction_adjusted_net_pips < -50.0 {
        halt.push(format!(
            "50-trade friction-adjusted net {:.1}p < -50p",
            w50.friction_adjusted_net_pips
        ));
    }
    if w20.rejection_rate > 0.60 && w20.avg_quality < 35.0 {
        halt.push(format!(
            "20-trade rejection rate {:.0}% > 60% with execution quality {:.0} < 35",
            pct(w20.rejection_rate),
            w20.avg_quality
        ));
    }
    if !halt.is_empty() {
        return (GovernanceState::Halt, halt);
    }

    let mut throttled = Vec::new();
    if w20.win_rate < 0.45 {
        throttled.push(format!("20-trade win rate {:.0}% < 45%", pct(w20.win_rate)));
    }
    if w50.expectancy < -0.5 {
        throttled.push(format!("50-trade expectancy {:.2}p < -0.5p", w50.expectancy));
    }
    if w20.slippage_drift && w20.avg_quality < 50.0 {
        throttled.push(format!(
            "slippage drift with execution quality {:.0} < 50",
            w20.avg_quality
        ));
    }
    if w20.capture_ratio < 0.30 {
        throttled.push(format!(
            "20-trade capture ratio {:.0}% < 30%",
            pct(w20.capture_ratio)
        ));
    }
    if !throttled.is_empty() {
        return (GovernanceState::Throttled, throttled);
    }

    let mut defensive = Vec::new();
    if w20.win_rate < 0.55 {
        defensive.push(format!("20-trade win rate {:.0}% < 55%", pct(w20.win_rate)));
    }
    if w50.expectancy < 0.5 {
        defensive.push(format!("50-trade expectancy {:.2}p < 0.5p", w50.expectancy));
    }
    if w20.rejection_rate > 0.25 {
        defensive.push(format!(
            "20-trade rejection rate {:.0}% > 25%",
            pct(w20.rejection_rate)
        ));
    }
    if w20.slippage_drift {
        defensive.push("slippage drift detected".to_string());
    }
    if w200.capture_ratio < 0.40 {
        defensive.push(format!(
            "200-trade capture ratio {:.0}% < 40%",
            pct(w200.capture_ratio)
        ));
    }
    if !defensive.is_empty() {
        return (GovernanceState::Defensive, defensive);
    }

    (GovernanceState::Normal, vec![])
}
