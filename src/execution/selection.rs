//! Score-weighted agent draw.

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use crate::governance::AgentSnapshot;

/// Agents allowed to originate a candidate
pub fn eligible(agents: &[AgentSnapshot]) -> Vec<&AgentSnapshot> {
    agents.iter().filter(|a| a.can_execute).collect()
}

/// Draw one eligible agent with probability proportional to its selection
/// score. None when no agent is eligible.
pub fn weighted_pick<'a, R: Rng + ?Sized>(
    agents: &[&'a AgentSnapshot],
    rng: &mut R,
) -> Option<&'a AgentSnapshot> {
    if agents.is_empty() {
        return None;
    }
    let weights: Vec<f64> = agents.iter().map(|a| a.selection_score()).collect();
    match WeightedIndex::new(&weights) {
        Ok(dist) => Some(agents[dist.sample(rng)]),
        // Scores are floored at 0.01, so this only happens on NaN input.
        Err(_) => agents.first().copied(),
    }
}
