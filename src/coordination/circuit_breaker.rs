//! Circuit-breaker view.
//!
//! Breaker records are written by the external velocity monitor. The engine
//! only reads them: an active, unexpired record puts the affected pair (or
//! every pair, when the record has no pair) into the HALT configuration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CircuitState {
    /// Normal operation
    Closed,
    /// Pair tripped; HALT configuration applies
    Open,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerRecord {
    /// None trips every pair
    pub pair: Option<String>,
    pub reason: String,
    pub tripped_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CircuitBreakerRecord {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.tripped_at <= now && now < self.expires_at
    }

    pub fn affects(&self, pair: &str) -> bool {
        match &self.pair {
            None => true,
            Some(p) => p.eq_ignore_ascii_case(pair),
        }
    }
}

/// Breakers active for one tick
#[derive(Debug, Clone, Default, Serialize)]
pub struct CircuitBreakerView {
    active: Vec<CircuitBreakerRecord>,
}

impl CircuitBreakerView {
    /// Keep only records active at `now`.
    pub fn new(records: Vec<CircuitBreakerRecord>, now: DateTime<Utc>) -> Self {
        let active: Vec<_> = records.into_iter().filter(|r| r.is_active(now)).collect();
        for r in &active {
            warn!(
                pair = r.pair.as_deref().unwrap_or("*"),
                reason = %r.reason,
                expires_at = %r.expires_at,
                "Circuit breaker active"
            );
        }
        Self { active }
    }

    pub fn state_for(&self, pair: &str) -> CircuitState {
        if self.trip_for(pair).is_some() {
            CircuitState::Open
        } else {
            CircuitState::Closed
        }
    }

    /// The record tripping `pair`, if any
    pub fn trip_for(&self, pair: &str) -> Option<&CircuitBreakerRecord> {
        self.active.iter().find(|r| r.affects(pair))
    }

    pub fn active(&self) -> &[CircuitBreakerRecord] {
        &self.active
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(pair: Option<&str>, from_mins: i64, to_mins: i64) -> CircuitBreakerRecord {
        let now = Utc::now();
        CircuitBreakerRecord {
            pair: pair.map(str::to_string),
            reason: "velocity".into(),
            tripped_at: now + Duration::minutes(from_mins),
            expires_at: now + Duration::minutes(to_mins),
        }
    }

    #[test]
    fn expired_records_are_ignored() {
        let view = CircuitBreakerView::new(vec![record(Some("EUR_USD"), -30, -1)], Utc::now());
        assert!(view.is_empty());
        assert_eq!(view.state_for("EUR_USD"), CircuitState::Closed);
    }

    #[test]
    fn pair_record_only_trips_that_pair() {
        let view = CircuitBreakerView::new(vec![record(Some("usd_jpy"), -5, 10)], Utc::now());
        assert_eq!(view.state_for("USD_JPY"), CircuitState::Open);
        assert_eq!(view.state_for("EUR_USD"), CircuitState::Closed);
    }

    #[test]
    fn global_record_trips_everything() {
        let view = CircuitBreakerView::new(vec![record(None, -5, 10)], Utc::now());
        assert_eq!(view.state_for("GBP_USD"), CircuitState::Open);
        assert_eq!(view.trip_for("AUD_USD").map(|r| r.reason.as_str()), Some("velocity"));
    }
}
