//! Heap entries for graph traversal.
//!
//! Candidates order by distance using `f32::total_cmp`, then by node id, so
//! ties resolve towards the earlier-inserted node and `BinaryHeap` stays
//! consistent even if a kernel yields NaN.

use std::cmp::Ordering;

use crate::node_store::NodeId;

/// A node paired with its distance to the current query.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Candidate {
    pub distance: f32,
    pub id: NodeId,
}

impl Candidate {
    pub(crate) const fn new(id: NodeId, distance: f32) -> Self {
        Self { distance, id }
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.id.cmp(&other.id))
    }
}
