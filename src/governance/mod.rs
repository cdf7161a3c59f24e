//! Execution governance layers.
//!
//! Leaves first: rolling metrics feed the agent tiers and the governance
//! state; pair allocation and the session table set capital; the friction
//! gate, discovery overlay and sizer act per candidate.

pub mod discovery;
pub mod friction;
pub mod metrics;
pub mod pair;
pub mod session;
pub mod sizing;
pub mod state;
pub mod tier;

pub use discovery::{DiscoveryContext, DiscoveryLabel, DiscoveryOutcome, DiscoveryRule, DiscoveryRules};
pub use friction::{FrictionCheck, GateVerdict};
pub use metrics::{compute_window, TradeTally, WindowMetrics};
pub use pair::{allocate, allocate_pairs, PairAllocation, PairStats};
pub use session::{market_closed, Session, SessionBudget};
pub use sizing::{SizeDecision, SizeMultipliers, MAX_UNITS, MIN_UNITS};
pub use state::{
    GovernanceConfig, GovernanceSnapshot, GovernanceState, GovernanceWindows, PairRestrictionMode,
};
pub use tier::{
    resolve_roster, AgentSnapshot, AgentStats, DeploymentState, EffectiveTier, RawTier,
    CONSTRAINT_BLOCK_SHORT, CONSTRAINT_LONG_ONLY,
};
