//! Neighbor selection heuristic.

use super::candidate::Candidate;
use crate::metric::Metric;
use crate::node_store::{NodeId, NodeStore};

/// Picks up to `max` diverse neighbors from `candidates`.
///
/// `candidates` must be sorted by distance to the base node. A candidate is
/// kept only if it is strictly closer to the base node than to every
/// candidate kept before it, which favors links pointing in different
/// directions over a cluster of near-duplicates. Rejected candidates are
/// not used to fill remaining slots.
pub(crate) fn select_diverse(
    store: &NodeStore,
    metric: &Metric,
    candidates: &[Candidate],
    max: usize,
) -> Vec<NodeId> {
    let mut kept: Vec<(NodeId, &[u8])> = Vec::with_capacity(max.min(candidates.len()));

    for candidate in candidates {
        if kept.len() >= max {
            break;
        }
        let Some(vector) = store.vector(candidate.id) else {
            continue;
        };
        let diverse = kept
            .iter()
            .all(|(_, other)| candidate.distance < metric.distance(vector, other));
        if diverse {
            kept.push((candidate.id, vector));
        }
    }

    kept.into_iter().map(|(id, _)| id).collect()
}
