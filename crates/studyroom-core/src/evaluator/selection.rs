use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use tracing::warn;

use crate::tips::{TipCatalog, TipRule};

/// Selection weight: priority weight times category weight.
pub fn selection_weight(rule: &TipRule, catalog: &TipCatalog) -> f64 {
    rule.priority_weight() * catalog.category_weight(rule.category)
}

/// Draw one candidate with probability proportional to its weight.
///
/// Candidates are put in rule-id order first, so the same seed and the same
/// candidate set always yield the same rule.
pub fn weighted_choice<'a, R: Rng + ?Sized>(
    mut candidates: Vec<&'a TipRule>,
    catalog: &TipCatalog,
    rng: &mut R,
) -> Option<&'a TipRule> {
    candidates.sort_by(|a, b| a.id.cmp(&b.id));
    if candidates.len() <= 1 {
        return candidates.first().copied();
    }

    let weights: Vec<f64> = candidates
        .iter()
        .map(|r| selection_weight(r, catalog))
        .collect();
    match WeightedIndex::new(&weights) {
        Ok(dist) => candidates.get(dist.sample(rng)).copied(),
        Err(e) => {
            warn!(error = %e, "unusable selection weights, taking first candidate");
            candidates.first().copied()
        }
    }
}
