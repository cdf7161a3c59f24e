//! Candidate trade signals.
//!
//! Signal generation is not the engine's job; agents "want" a pair and a
//! direction and the engine decides whether and how much. The stub source
//! below stands in for the agents and draws everything from the injected RNG.

use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use super::Direction;

/// Market regime label attached by the enrichment service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Regime {
    Trending,
    Ranging,
    Breakout,
    Ignition,
    Compression,
    Unknown,
}

impl Regime {
    pub fn as_str(&self) -> &'static str {
        match self {
            Regime::Trending => "trending",
            Regime::Ranging => "ranging",
            Regime::Breakout => "breakout",
            Regime::Ignition => "ignition",
            Regime::Compression => "compression",
            Regime::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Regime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub pair: String,
    pub direction: Direction,
    /// 0-100
    pub confidence: f64,
    pub regime: Regime,
    /// 0.0-1.0 composite score from the enrichment service
    pub composite_score: f64,
}

pub trait SignalSource: Send + Sync {
    /// Propose a signal for `agent_id` over the tradeable `pairs`.
    fn propose(&self, agent_id: &str, pairs: &[String], rng: &mut dyn RngCore) -> Option<Signal>;
}

/// Randomised stand-in for agent signal generation. Always long.
#[derive(Debug, Clone, Default)]
pub struct StubSignalSource;

impl SignalSource for StubSignalSource {
    fn propose(&self, _agent_id: &str, pairs: &[String], rng: &mut dyn RngCore) -> Option<Signal> {
        const REGIMES: [Regime; 5] = [
            Regime::Trending,
            Regime::Ranging,
            Regime::Breakout,
            Regime::Ignition,
            Regime::Compression,
        ];

        let pair = pairs.choose(rng)?.clone();
        let regime = *REGIMES.choose(rng)?;
        Some(Signal {
            pair,
            direction: Direction::Long,
            confidence: rng.gen_range(55.0..90.0),
            regime,
            composite_score: rng.gen_range(0.2..0.95),
        })
    }
}
