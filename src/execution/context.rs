//! Per-tick context and the explicit TTL cache used for price snapshots.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use uuid::Uuid;

use crate::exchange::PriceQuote;
use crate::governance::{Session, SessionBudget};

/// Map whose entries expire `ttl` after insertion.
#[derive(Debug, Clone)]
pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: HashMap<K, (Instant, V)>,
}

impl<K: Eq + Hash + Clone, V: Clone> TtlCache<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn insert_at(&mut self, key: K, value: V, at: Instant) {
        self.entries.insert(key, (at, value));
    }

    /// Fresh value for `key` as of `now`
    pub fn get_at(&self, key: &K, now: Instant) -> Option<&V> {
        self.entries
            .get(key)
            .filter(|(stored, _)| now.saturating_duration_since(*stored) < self.ttl)
            .map(|(_, v)| v)
    }

    /// Keys from `keys` with no fresh entry as of `now`
    pub fn stale_keys_at(&self, keys: &[K], now: Instant) -> Vec<K> {
        keys.iter()
            .filter(|k| self.get_at(k, now).is_none())
            .cloned()
            .collect()
    }

    /// Drop expired entries
    pub fn purge_at(&mut self, now: Instant) {
        let ttl = self.ttl;
        self.entries
            .retain(|_, (stored, _)| now.saturating_duration_since(*stored) < ttl);
    }

    /// Fresh entries as of `now`
    pub fn snapshot_at(&self, now: Instant) -> HashMap<K, V> {
        self.entries
            .iter()
            .filter(|(_, (stored, _))| now.saturating_duration_since(*stored) < self.ttl)
            .map(|(k, (_, v))| (k.clone(), v.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub type PriceCache = TtlCache<String, PriceQuote>;

/// Everything a single tick carries between pipeline stages
pub struct TickContext {
    pub tick_id: Uuid,
    pub now: DateTime<Utc>,
    pub started: Instant,
    pub session: Session,
    pub budget: SessionBudget,
    /// Fresh quotes for the configured pairs, from the shared price cache
    pub quotes: HashMap<String, PriceQuote>,
    pub rng: StdRng,
}

impl TickContext {
    pub fn new(tick_id: Uuid, now: DateTime<Utc>, rng_seed: Option<u64>) -> Self {
        let session = Session::at(now);
        let rng = match rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            tick_id,
            now,
            started: Instant::now(),
            session,
            budget: session.budget(),
            quotes: HashMap::new(),
            rng,
        }
    }

    pub fn quote(&self, pair: &str) -> Option<&PriceQuote> {
        self.quotes.get(pair)
    }

    pub fn spread_pips(&self, pair: &str) -> Option<f64> {
        self.quote(pair).map(PriceQuote::spread_pips)
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}
