use std::cmp::Ordering;
use std::collections::HashMap;

use super::opportunity::Opportunity;

/// Ordering used for both ranking and dedup collisions: score descending,
/// then older `created_at` first, then `id` ascending.
pub fn rank_order(a: &Opportunity, b: &Opportunity) -> Ordering {
    b.score()
        .total_cmp(&a.score())
        .then_with(|| a.created_at().cmp(&b.created_at()))
        .then_with(|| a.id().cmp(b.id()))
}

/// Keep one opportunity per (player, prop_type) and sort best first.
/// Losers are dropped, never merged.
pub fn rank_and_dedup(opportunities: Vec<Opportunity>) -> Vec<Opportunity> {
    let total = opportunities.len();
    let mut best: HashMap<(String, String), Opportunity> = HashMap::new();

    for opp in opportunities {
        let (player, prop) = opp.key().dedup_key();
        let slot = (player.to_string(), prop.to_string());
        match best.get(&slot) {
            Some(existing) if rank_order(existing, &opp) != Ordering::Greater => {}
            _ => {
                best.insert(slot, opp);
            }
        }
    }

    let mut ranked: Vec<Opportunity> = best.into_values().collect();
    ranked.sort_by(rank_order);

    if ranked.len() < total {
        tracing::debug!(
            dropped = total - ranked.len(),
            kept = ranked.len(),
            "deduplicated opportunities by player/prop"
        );
    }
    ranked
}
