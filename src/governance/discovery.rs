//! Discovery-risk overlay.
//!
//! A declarative table of curated trade contexts. Destructive contexts block
//! the candidate outright; known-edge contexts get a size boost; everything
//! else is traded at reduced size. The overlay only scales the final size and
//! never feeds back into governance gates.

use serde::{Deserialize, Serialize};

use super::session::Session;
use crate::domain::{Direction, Regime};

/// Crosses with a history of destroying capital
const DESTRUCTIVE_CROSSES: [&str; 3] = ["GBP_JPY", "EUR_GBP", "AUD_JPY"];

/// (session, regime, pair) triples with a demonstrated long-side edge
const EDGE_CONTEXTS: [(Session, Regime, &str); 5] = [
    (Session::LondonOpen, Regime::Trending, "EUR_USD"),
    (Session::LondonOpen, Regime::Breakout, "GBP_USD"),
    (Session::NyOverlap, Regime::Trending, "EUR_USD"),
    (Session::NyOverlap, Regime::Trending, "USD_JPY"),
    (Session::Asian, Regime::Ranging, "AUD_USD"),
];

const IGNITION_MIN_COMPOSITE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscoveryLabel {
    Blocked,
    EdgeBoost,
    Reduced,
    Normal,
    Bypassed,
}

impl DiscoveryLabel {
    pub fn multiplier(&self) -> f64 {
        match self {
            DiscoveryLabel::Blocked => 0.0,
            DiscoveryLabel::EdgeBoost => 1.35,
            DiscoveryLabel::Reduced => 0.55,
            DiscoveryLabel::Normal | DiscoveryLabel::Bypassed => 1.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DiscoveryLabel::Blocked => "BLOCKED",
            DiscoveryLabel::EdgeBoost => "EDGE_BOOST",
            DiscoveryLabel::Reduced => "REDUCED",
            DiscoveryLabel::Normal => "NORMAL",
            DiscoveryLabel::Bypassed => "BYPASSED",
        }
    }
}

/// Everything a rule may look at
#[derive(Debug, Clone)]
pub struct DiscoveryContext<'a> {
    pub session: Session,
    pub regime: Regime,
    pub pair: &'a str,
    pub direction: Direction,
    pub agent_id: &'a str,
    pub spread_pips: Option<f64>,
    pub composite_score: f64,
}

type Predicate = Box<dyn Fn(&DiscoveryContext<'_>) -> bool + Send + Sync>;

pub struct DiscoveryRule {
    pub name: String,
    pub label: DiscoveryLabel,
    predicate: Predicate,
}

impl DiscoveryRule {
    pub fn new(
        name: impl Into<String>,
        label: DiscoveryLabel,
        predicate: impl Fn(&DiscoveryContext<'_>) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            label,
            predicate: Box::new(predicate),
        }
    }

    pub fn matches(&self, ctx: &DiscoveryContext<'_>) -> bool {
        (self.predicate)(ctx)
    }
}

impl std::fmt::Debug for DiscoveryRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryRule")
            .field("name", &self.name)
            .field("label", &self.label)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryOutcome {
    pub label: DiscoveryLabel,
    pub multiplier: f64,
    /// Name of the rule that fired, if any
    pub rule: Option<String>,
}

/// Ordered rule table; the first matching rule wins.
#[derive(Debug)]
pub struct DiscoveryRules {
    rules: Vec<DiscoveryRule>,
    fallback: DiscoveryLabel,
}

impl DiscoveryRules {
    /// Curated table. `blocked_agents` and `max_spread_pips` come from config.
    pub fn curated(blocked_agents: &[String], max_spread_pips: f64) -> Self {
        let blocked_agents = blocked_agents.to_vec();
        let mut rules = vec![
            DiscoveryRule::new("destructive_cross", DiscoveryLabel::Blocked, |c| {
                DESTRUCTIVE_CROSSES.iter().any(|p| *p == c.pair)
            }),
            DiscoveryRule::new("blocked_agent", DiscoveryLabel::Blocked, move |c| {
                blocked_agents.iter().any(|a| a == c.agent_id)
            }),
            DiscoveryRule::new("rollover_session", DiscoveryLabel::Blocked, |c| {
                c.session == Session::Rollover
            }),
            DiscoveryRule::new("spread_too_wide", DiscoveryLabel::Blocked, move |c| {
                c.spread_pips.map(|s| s > max_spread_pips).unwrap_or(false)
            }),
            DiscoveryRule::new("weak_ignition", DiscoveryLabel::Blocked, |c| {
                c.regime == Regime::Ignition && c.composite_score < IGNITION_MIN_COMPOSITE
            }),
        ];

        for (session, regime, pair) in EDGE_CONTEXTS {
            rules.push(DiscoveryRule::new(
                format!("edge:{session}:{regime}:{pair}"),
                DiscoveryLabel::EdgeBoost,
                move |c| {
                    c.session == session
                        && c.regime == regime
                        && c.pair == pair
                        && c.direction == Direction::Long
                },
            ));
        }

        Self {
            rules,
            fallback: DiscoveryLabel::Reduced,
        }
    }

    pub fn rules(&self) -> &[DiscoveryRule] {
        &self.rules
    }

    /// Classify a candidate. Forced runs bypass the overlay.
    pub fn classify(&self, ctx: &DiscoveryContext<'_>, force: bool) -> DiscoveryOutcome {
        if force {
            return DiscoveryOutcome {
                label: DiscoveryLabel::Bypassed,
                multiplier: DiscoveryLabel::Bypassed.multiplier(),
                rule: None,
            };
        }

        match self.rules.iter().find(|r| r.matches(ctx)) {
            Some(rule) => DiscoveryOutcome {
                label: rule.label,
                multiplier: rule.label.multiplier(),
                rule: Some(rule.name.clone()),
            },
            None => DiscoveryOutcome {
                label: self.fallback,
                multiplier: self.fallback.multiplier(),
                rule: None,
            },
        }
    }
}
