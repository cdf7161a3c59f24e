//! Idempotency keys for candidate orders.
//!
//! The key is derived from the tick id and the candidate's position and
//! identity, so a re-delivered tick produces the same keys and the ledger's
//! unique index turns the replay into `idempotency_conflict` rows instead of
//! duplicate broker orders.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::domain::Direction;

pub fn candidate_key(
    tick_id: Uuid,
    index: usize,
    pair: &str,
    agent_id: &str,
    direction: Direction,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(tick_id.as_bytes());
    hasher.update((index as u64).to_le_bytes());
    hasher.update(pair.as_bytes());
    hasher.update(b"|");
    hasher.update(agent_id.as_bytes());
    hasher.update(b"|");
    hasher.update(direction.as_str().as_bytes());
    format!("gx-{}", hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_inputs_same_key() {
        let tick = Uuid::new_v4();
        assert_eq!(
            candidate_key(tick, 0, "EUR_USD", "a", Direction::Long),
            candidate_key(tick, 0, "EUR_USD", "a", Direction::Long)
        );
    }

    #[test]
    fn any_component_changes_the_key() {
        let tick = Uuid::new_v4();
        let base = candidate_key(tick, 0, "EUR_USD", "a", Direction::Long);
        assert_ne!(base, candidate_key(Uuid::new_v4(), 0, "EUR_USD", "a", Direction::Long));
        assert_ne!(base, candidate_key(tick, 1, "EUR_USD", "a", Direction::Long));
        assert_ne!(base, candidate_key(tick, 0, "USD_JPY", "a", Direction::Long));
        assert_ne!(base, candidate_key(tick, 0, "EUR_USD", "b", Direction::Long));
        assert!(base.starts_with("gx-"));
        assert_eq!(base.len(), 3 + 64);
    }
}
