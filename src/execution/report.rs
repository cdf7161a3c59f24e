//! Structured tick summary returned to callers.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::coordination::CircuitBreakerRecord;
use crate::domain::{Direction, Environment, OrderStatus};
use crate::governance::{
    AgentSnapshot, DiscoveryLabel, GovernanceConfig, GovernanceState, PairAllocation, Session,
    SessionBudget,
};
use crate::safety::PreflightReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceSource {
    Broker,
    Fallback,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub environment: Environment,
    pub session: Session,
    pub budget: SessionBudget,
    /// Candidates this tick was allowed to evaluate
    pub candidate_budget: u32,
    pub balance: Decimal,
    pub balance_source: BalanceSource,
    pub pairs: Vec<String>,
    pub dedup_window_secs: i64,
    pub max_retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceSummary {
    pub state: GovernanceState,
    pub reasons: Vec<String>,
    pub config: GovernanceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateOutcome {
    pub index: usize,
    pub agent_id: String,
    pub pair: String,
    pub direction: Direction,
    pub status: OrderStatus,
    /// Ledger row id; None when nothing could be written
    pub order_id: Option<Uuid>,
    pub units: i64,
    pub discovery: Option<DiscoveryLabel>,
    pub reasons: Vec<String>,
    pub fill_price: Option<Decimal>,
    pub broker_attempts: u32,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickReport {
    pub tick_id: Uuid,
    pub forced: bool,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub execution: ExecutionSummary,
    pub governance: GovernanceSummary,
    pub agents: Vec<AgentSnapshot>,
    pub pair_allocations: Vec<PairAllocation>,
    pub circuit_breakers: Vec<CircuitBreakerRecord>,
    pub preflight: Option<PreflightReport>,
    pub reconciled_closes: u32,
    pub candidates: Vec<CandidateOutcome>,
    /// Why no candidates were evaluated
    pub skipped: Option<String>,
    /// Why candidate processing stopped early
    pub aborted: Option<String>,
}

impl TickReport {
    pub fn status_counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for c in &self.candidates {
            *counts.entry(c.status.as_str()).or_insert(0) += 1;
        }
        counts
    }

    pub fn count(&self, status: OrderStatus) -> usize {
        self.candidates.iter().filter(|c| c.status == status).count()
    }

    pub fn filled(&self) -> usize {
        self.count(OrderStatus::Filled)
    }
}
