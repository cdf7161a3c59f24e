//! Agent tier resolution.
//!
//! Classifies every agent from its lifetime closed-trade stats. An agent
//! whose short side is destructive is not banned outright: its long-only
//! half is re-scored and may be redeployed with shorts blocked.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::metrics::TradeTally;
use crate::domain::{Direction, OrderRecord};

pub const CONSTRAINT_BLOCK_SHORT: &str = "block_direction:short";
pub const CONSTRAINT_LONG_ONLY: &str = "long_only";

const SHORT_DESTRUCTIVE_NET_PIPS: f64 = -500.0;
const SHORT_DESTRUCTIVE_MIN_TRADES: u32 = 50;
const MIN_SESSION_COVERAGE: u32 = 3;

/// Aggregate closed-trade stats for one agent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentStats {
    pub agent_id: String,
    pub all: TradeTally,
    pub long: TradeTally,
    pub short: TradeTally,
    /// Distinct trading sessions the agent has closed trades in
    pub sessions_covered: u32,
}

impl AgentStats {
    pub fn empty(agent_id: &str) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            ..Default::default()
        }
    }

    /// Aggregate closed trades per agent. Output is sorted by agent id.
    pub fn aggregate(records: &[OrderRecord]) -> Vec<AgentStats> {
        let mut by_agent: BTreeMap<&str, (AgentStats, BTreeSet<&str>)> = BTreeMap::new();

        for record in records {
            let Some(pips) = record.pips() else {
                continue;
            };
            let (stats, sessions) = by_agent
                .entry(record.agent_id.as_str())
                .or_insert_with(|| (AgentStats::empty(&record.agent_id), BTreeSet::new()));
            stats.all.push(pips);
            match record.direction {
                Direction::Long => stats.long.push(pips),
                Direction::Short => stats.short.push(pips),
            }
            if let Some(session) = record.session_label.as_deref() {
                sessions.insert(session);
            }
        }

        by_agent
            .into_values()
            .map(|(mut stats, sessions)| {
                stats.sessions_covered = sessions.len() as u32;
                stats
            })
            .collect()
    }

    pub fn short_side_destructive(&self) -> bool {
        self.short.trades > SHORT_DESTRUCTIVE_MIN_TRADES
            && self.short.net_pips < SHORT_DESTRUCTIVE_NET_PIPS
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RawTier {
    A,
    B,
    C,
    D,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectiveTier {
    #[serde(rename = "A")]
    A,
    #[serde(rename = "B-Rescued")]
    BRescued,
    #[serde(rename = "B-Promotable")]
    BPromotable,
    #[serde(rename = "B-Shadow")]
    BShadow,
    #[serde(rename = "C")]
    C,
    #[serde(rename = "D")]
    D,
}

impl EffectiveTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            EffectiveTier::A => "A",
            EffectiveTier::BRescued => "B-Rescued",
            EffectiveTier::BPromotable => "B-Promotable",
            EffectiveTier::BShadow => "B-Shadow",
            EffectiveTier::C => "C",
            EffectiveTier::D => "D",
        }
    }

    fn executable(&self) -> bool {
        matches!(
            self,
            EffectiveTier::A | EffectiveTier::BRescued | EffectiveTier::BPromotable
        )
    }
}

impl std::fmt::Display for EffectiveTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentState {
    Deploy,
    Reduced,
    Shadow,
    Disabled,
}

/// Metrics shown alongside the tier, long-only when the short side was isolated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDisplayMetrics {
    pub trades: u32,
    pub win_rate: f64,
    pub expectancy: f64,
    pub profit_factor: f64,
    pub net_pips: f64,
    pub sessions_covered: u32,
    pub long_only: bool,
}

impl AgentDisplayMetrics {
    fn from_tally(t: &TradeTally, sessions_covered: u32, long_only: bool) -> Self {
        Self {
            trades: t.trades,
            win_rate: t.win_rate(),
            expectancy: t.expectancy(),
            profit_factor: t.profit_factor(),
            net_pips: t.net_pips,
            sessions_covered,
            long_only,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub agent_id: String,
    pub raw_tier: RawTier,
    pub effective_tier: EffectiveTier,
    pub deployment: DeploymentState,
    pub size_multiplier: f64,
    pub can_execute: bool,
    pub constraints: Vec<String>,
    pub metrics: AgentDisplayMetrics,
}

impl AgentSnapshot {
    /// Weight for the random agent draw. Never zero, so an agent without a
    /// positive edge keeps a small chance of being picked.
    pub fn selection_score(&self) -> f64 {
        let raw = self.metrics.expectancy * self.metrics.profit_factor * self.size_multiplier;
        if raw.is_finite() {
            raw.max(0.01)
        } else {
            0.01
        }
    }
}

pub fn raw_tier(stats: &AgentStats) -> RawTier {
    let expectancy = stats.all.expectancy();
    let pf = stats.all.profit_factor();
    let net = stats.all.net_pips;

    if expectancy > 0.0 && pf >= 1.10 && stats.sessions_covered >= MIN_SESSION_COVERAGE {
        RawTier::A
    } else if net > -1000.0 && pf >= 0.90 {
        RawTier::B
    } else if net > -1500.0 {
        RawTier::C
    } else {
        RawTier::D
    }
}

/// Resolve one agent into its operating snapshot.
pub fn resolve(stats: &AgentStats) -> AgentSnapshot {
    let raw = raw_tier(stats);
    // Every agent is long-only at the engine level.
    let mut constraints = vec![CONSTRAINT_LONG_ONLY.to_string()];
    let mut metrics = AgentDisplayMetrics::from_tally(&stats.all, stats.sessions_covered, false);

    let (effective, deployment, size) = match raw {
        RawTier::A => (EffectiveTier::A, DeploymentState::Deploy, 1.0),
        RawTier::B if stats.short_side_destructive() => {
            constraints.push(CONSTRAINT_BLOCK_SHORT.to_string());
            metrics = AgentDisplayMetrics::from_tally(&stats.long, stats.sessions_covered, true);
            classify_long_only(&stats.long)
        }
        RawTier::B => {
            if stats.all.expectancy() > 0.0 && stats.all.profit_factor() >= 1.1 {
                (EffectiveTier::BPromotable, DeploymentState::Deploy, 1.0)
            } else {
                (EffectiveTier::BShadow, DeploymentState::Shadow, 0.0)
            }
        }
        RawTier::C => (EffectiveTier::C, DeploymentState::Disabled, 0.0),
        RawTier::D => (EffectiveTier::D, DeploymentState::Disabled, 0.0),
    };

    let can_execute = effective.executable()
        && matches!(deployment, DeploymentState::Deploy | DeploymentState::Reduced)
        && size > 0.0;

    AgentSnapshot {
        agent_id: stats.agent_id.clone(),
        raw_tier: raw,
        effective_tier: effective,
        deployment,
        size_multiplier: size,
        can_execute,
        constraints,
        metrics,
    }
}

fn classify_long_only(long: &TradeTally) -> (EffectiveTier, DeploymentState, f64) {
    let exp = long.expectancy();
    let pf = long.profit_factor();
    if pf >= 1.3 && exp > 0.4 {
        (EffectiveTier::BPromotable, DeploymentState::Deploy, 1.0)
    } else if exp > 0.0 && pf >= 1.2 {
        (EffectiveTier::BRescued, DeploymentState::Reduced, 0.35)
    } else {
        (EffectiveTier::BShadow, DeploymentState::Shadow, 0.0)
    }
}

/// Resolve the whole roster. Agents in `roster` without history still get a
/// snapshot (from empty stats); agents with history outside the roster are kept.
pub fn resolve_roster(stats: &[AgentStats], roster: &[String]) -> Vec<AgentSnapshot> {
    let mut by_id: BTreeMap<String, AgentStats> = stats
        .iter()
        .map(|s| (s.agent_id.clone(), s.clone()))
        .collect();
    for agent in roster {
        by_id
            .entry(agent.clone())
            .or_insert_with(|| AgentStats::empty(agent));
    }
    by_id.values().map(resolve).collect()
}
