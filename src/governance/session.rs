//! Session risk budget table.
//!
//! Maps wall-clock UTC time to one of five trading sessions. Each session
//! carries a trade-density cap, a spread (friction) multiplier, a volatility
//! tolerance, and a capital-budget fraction.

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Session {
    #[serde(rename = "rollover")]
    Rollover,
    #[serde(rename = "asian")]
    Asian,
    #[serde(rename = "london-open")]
    LondonOpen,
    #[serde(rename = "ny-overlap")]
    NyOverlap,
    #[serde(rename = "late-ny")]
    LateNy,
}

impl Session {
    pub const ALL: [Session; 5] = [
        Session::Rollover,
        Session::Asian,
        Session::LondonOpen,
        Session::NyOverlap,
        Session::LateNy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Session::Rollover => "rollover",
            Session::Asian => "asian",
            Session::LondonOpen => "london-open",
            Session::NyOverlap => "ny-overlap",
            Session::LateNy => "late-ny",
        }
    }

    /// Session for a UTC hour (0-23)
    pub fn for_hour(hour: u32) -> Session {
        match hour {
            21 | 22 => Session::Rollover,
            23 | 0..=6 => Session::Asian,
            7..=11 => Session::LondonOpen,
            12..=15 => Session::NyOverlap,
            _ => Session::LateNy,
        }
    }

    pub fn at(now: DateTime<Utc>) -> Session {
        Session::for_hour(now.hour())
    }

    pub fn budget(&self) -> SessionBudget {
        match self {
            Session::Rollover => SessionBudget {
                session: *self,
                max_density: 1,
                friction_multiplier: 2.5,
                volatility_tolerance: 0.3,
                capital_budget: 0.10,
            },
            Session::Asian => SessionBudget {
                session: *self,
                max_density: 3,
                friction_multiplier: 1.3,
                volatility_tolerance: 0.6,
                capital_budget: 0.50,
            },
            Session::LondonOpen => SessionBudget {
                session: *self,
                max_density: 6,
                friction_multiplier: 1.0,
                volatility_tolerance: 1.0,
                capital_budget: 1.00,
            },
            Session::NyOverlap => SessionBudget {
                session: *self,
                max_density: 6,
                friction_multiplier: 0.95,
                volatility_tolerance: 1.0,
                capital_budget: 1.00,
            },
            Session::LateNy => SessionBudget {
                session: *self,
                max_density: 3,
                friction_multiplier: 1.2,
                volatility_tolerance: 0.7,
                capital_budget: 0.60,
            },
        }
    }
}

impl std::fmt::Display for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionBudget {
    pub session: Session,
    /// Maximum candidate trades per tick
    pub max_density: u32,
    /// Applied to the instrument's baseline spread
    pub friction_multiplier: f64,
    /// 0.0-1.0; instruments above this volatility intensity are flagged
    pub volatility_tolerance: f64,
    /// Fraction of normal position size available in this session
    pub capital_budget: f64,
}

/// Weekend / rollover guard: no signals on Saturday, all of Sunday, or from
/// 22:00 UTC Friday.
pub fn market_closed(now: DateTime<Utc>) -> bool {
    match now.weekday() {
        Weekday::Sat | Weekday::Sun => true,
        Weekday::Fri => now.hour() >= 22,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        // 2026-03-02 is a Monday
        Utc.with_ymd_and_hms(2026, 3, day, hour, 30, 0).unwrap()
    }

    #[test]
    fn every_hour_maps_to_a_session() {
        let mut seen = std::collections::BTreeSet::new();
        for h in 0..24 {
            seen.insert(Session::for_hour(h));
        }
        assert_eq!(seen.len(), 5);
        assert_eq!(Session::for_hour(8), Session::LondonOpen);
        assert_eq!(Session::for_hour(13), Session::NyOverlap);
        assert_eq!(Session::for_hour(22), Session::Rollover);
        assert_eq!(Session::for_hour(23), Session::Asian);
        assert_eq!(Session::for_hour(18), Session::LateNy);
    }

    #[test]
    fn weekend_guard() {
        assert!(!market_closed(at(2, 10))); // Monday
        assert!(!market_closed(at(6, 21))); // Friday 21:30
        assert!(market_closed(at(6, 22))); // Friday 22:30
        assert!(market_closed(at(7, 12))); // Saturday
        assert!(market_closed(at(8, 23))); // Sunday late
    }

    #[test]
    fn liquid_sessions_have_the_full_budget() {
        assert_eq!(Session::LondonOpen.budget().capital_budget, 1.0);
        assert!(Session::Rollover.budget().friction_multiplier > 2.0);
    }
}
