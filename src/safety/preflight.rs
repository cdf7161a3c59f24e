//! Live preflight gate.
//!
//! Runs before any real-money tick. Every check must pass or live submission
//! is refused for the whole tick.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::governance::AgentSnapshot;
use crate::persistence::OrderLedger;
use crate::error::Result;

pub const MIN_ELIGIBLE_AGENTS: usize = 1;
pub const MIN_ELIGIBLE_ROSTER_AGENTS: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreflightCheck {
    pub name: String,
    pub passed: bool,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreflightReport {
    pub passed: bool,
    pub checks: Vec<PreflightCheck>,
}

impl PreflightReport {
    pub fn failures(&self) -> Vec<&PreflightCheck> {
        self.checks.iter().filter(|c| !c.passed).collect()
    }

    /// One-line summary of the failed checks
    pub fn failure_summary(&self) -> String {
        self.failures()
            .iter()
            .map(|c| format!("{}: {}", c.name, c.detail))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Evaluate the checks from already-fetched inputs.
pub fn evaluate(
    short_fills_since_cutover: i64,
    cutover: DateTime<Utc>,
    agents: &[AgentSnapshot],
    roster: &[String],
) -> PreflightReport {
    let eligible: Vec<&AgentSnapshot> = agents.iter().filter(|a| a.can_execute).collect();
    let eligible_in_roster = eligible
        .iter()
        .filter(|a| roster.iter().any(|r| r == &a.agent_id))
        .count();

    let checks = vec![
        PreflightCheck {
            name: "no_short_fills".to_string(),
            passed: short_fills_since_cutover == 0,
            detail: format!(
                "{} short fills since {}",
                short_fills_since_cutover,
                cutover.to_rfc3339()
            ),
        },
        PreflightCheck {
            name: "eligible_agent".to_string(),
            passed: eligible.len() >= MIN_ELIGIBLE_AGENTS,
            detail: format!("{} eligible agents", eligible.len()),
        },
        PreflightCheck {
            name: "eligible_roster".to_string(),
            passed: eligible_in_roster >= MIN_ELIGIBLE_ROSTER_AGENTS,
            detail: format!(
                "{} of {} roster agents eligible (need {})",
                eligible_in_roster,
                roster.len(),
                MIN_ELIGIBLE_ROSTER_AGENTS
            ),
        },
    ];

    PreflightReport {
        passed: checks.iter().all(|c| c.passed),
        checks,
    }
}

/// Run the preflight against the ledger.
pub async fn run(
    ledger: &dyn OrderLedger,
    cutover: DateTime<Utc>,
    agents: &[AgentSnapshot],
    roster: &[String],
) -> Result<PreflightReport> {
    let shorts = ledger.count_short_fills_since(cutover).await?;
    let report = evaluate(shorts, cutover, agents, roster);
    if report.passed {
        info!("Live preflight passed");
    } else {
        warn!(failures = %report.failure_summary(), "Live preflight failed");
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::governance::tier::{resolve, AgentStats};

    fn agent(id: &str, executable: bool) -> AgentSnapshot {
        let mut s = resolve(&AgentStats::empty(id));
        s.can_execute = executable;
        s
    }

    fn roster(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn passes_with_two_eligible_roster_agents_and_no_shorts() {
        let agents = vec![agent("a", true), agent("b", true), agent("c", false)];
        let report = evaluate(0, Utc::now(), &agents, &roster(&["a", "b", "c"]));
        assert!(report.passed, "{}", report.failure_summary());
    }

    #[test]
    fn any_short_fill_fails() {
        let agents = vec![agent("a", true), agent("b", true)];
        let report = evaluate(1, Utc::now(), &agents, &roster(&["a", "b"]));
        assert!(!report.passed);
        assert_eq!(report.failures()[0].name, "no_short_fills");
    }

    #[test]
    fn eligible_agents_outside_roster_do_not_count() {
        let agents = vec![agent("a", true), agent("x", true)];
        let report = evaluate(0, Utc::now(), &agents, &roster(&["a", "b"]));
        assert!(!report.passed);
        assert_eq!(report.failures().len(), 1);
        assert_eq!(report.failures()[0].name, "eligible_roster");
    }

    #[test]
    fn no_eligible_agents_fails_both_agent_checks() {
        let agents = vec![agent("a", false)];
        let report = evaluate(0, Utc::now(), &agents, &roster(&["a"]));
        assert_eq!(report.failures().len(), 2);
    }
}
