//! Hierarchical navigable small-world graph.
//!
//! Implements insertion and k-NN search as described in the Malkov &
//! Yashunin paper, over the node ids of a [`NodeStore`].
//!
//! # Concurrency
//!
//! Inserts and searches run through `&self`. The only locks are the
//! per-list `RwLock`s inside the store and the entry-point lock; a list is
//! written under its own lock and readers copy it out under a read lock, so
//! no reader ever observes a half-written list. Growing the store needs
//! `&mut self` and is therefore exclusive with everything else.

mod candidate;
mod select;

pub(crate) use candidate::Candidate;

use parking_lot::RwLock;
use rustc_hash::FxHashSet;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::Result;
use crate::metric::Metric;
use crate::node_store::{Node, NodeId, NodeStore};

use select::select_diverse;

/// Highest layer a node can be assigned.
pub const MAX_LEVEL: usize = 15;

/// Seed used when a zero seed is configured; xorshift never leaves zero.
const FALLBACK_SEED: u64 = 0x5DEE_CE66_D1A4_B5B5;

/// Node searches start from, together with its level (the graph height).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EntryPoint {
    pub id: NodeId,
    pub level: usize,
}

/// HNSW graph over a node arena.
#[derive(Debug)]
pub(crate) struct HnswGraph {
    store: NodeStore,
    metric: Metric,
    entry: RwLock<Option<EntryPoint>>,
    /// xorshift64 state for level draws
    rng_state: AtomicU64,
    /// M: max links per node on layers ≥ 1
    connectivity: usize,
    /// 1 / ln(M)
    level_mult: f64,
}

impl HnswGraph {
    /// Creates a graph over `store` with the given entry point.
    pub(crate) fn new(
        store: NodeStore,
        metric: Metric,
        entry: Option<EntryPoint>,
        connectivity: usize,
        seed: u64,
    ) -> Self {
        Self {
            store,
            metric,
            entry: RwLock::new(entry),
            rng_state: AtomicU64::new(if seed == 0 { FALLBACK_SEED } else { seed }),
            connectivity,
            level_mult: 1.0 / (connectivity.max(2) as f64).ln(),
        }
    }

    pub(crate) fn store(&self) -> &NodeStore {
        &self.store
    }

    pub(crate) fn metric(&self) -> &Metric {
        &self.metric
    }

    pub(crate) fn connectivity(&self) -> usize {
        self.connectivity
    }

    /// Current PRNG state, persisted so reloaded graphs keep drawing the
    /// same sequence.
    pub(crate) fn seed(&self) -> u64 {
        self.rng_state.load(Ordering::Relaxed)
    }

    pub(crate) fn entry_point(&self) -> Option<EntryPoint> {
        *self.entry.read()
    }

    /// Grows the underlying store. See [`NodeStore::reserve`].
    pub(crate) fn reserve(&mut self, capacity: usize) -> Result<()> {
        self.store.reserve(capacity)
    }

    /// Link bound for a layer: `2M` at layer 0, `M` above.
    pub(crate) fn max_links(&self, layer: usize) -> usize {
        if layer == 0 {
            self.connectivity * 2
        } else {
            self.connectivity
        }
    }

    /// Stores a new unlinked node at a freshly drawn level.
    ///
    /// # Errors
    ///
    /// See [`NodeStore::push`].
    pub(crate) fn allocate(&self, label: u64, vector: Box<[u8]>) -> Result<NodeId> {
        let level = self.random_level();
        self.store.push(Node::new(label, level, vector))
    }

    /// Links an allocated node into the graph.
    ///
    /// `ef` is the beam width of the per-layer candidate search.
    pub(crate) fn insert(&self, id: NodeId, ef: usize) {
        let (Some(level), Some(vector)) = (self.store.level(id), self.store.vector(id)) else {
            return;
        };

        let current = *self.entry.read();
        let entry = match current {
            Some(entry) => entry,
            None => {
                let mut guard = self.entry.write();
                match *guard {
                    Some(entry) => entry,
                    None => {
                        *guard = Some(EntryPoint { id, level });
                        return;
                    }
                }
            }
        };

        let Some(mut nearest) = self.candidate(vector, entry.id) else {
            return;
        };
        for layer in (level + 1..=entry.level).rev() {
            nearest = self.greedy_closest(vector, nearest, layer);
        }

        for layer in (0..=level.min(entry.level)).rev() {
            let found: Vec<Candidate> = self
                .search_layer(vector, nearest, ef, layer, |_| true)
                .into_iter()
                .filter(|c| c.id != id)
                .collect();

            let max = self.max_links(layer);
            let selected = select_diverse(&self.store, &self.metric, &found, max);

            if let Some(links) = self.store.links(id, layer) {
                // keep back-links a concurrent insert may already have added
                let mut own = links.write();
                let late: Vec<NodeId> = own
                    .iter()
                    .copied()
                    .filter(|n| !selected.contains(n))
                    .collect();
                own.clone_from(&selected);
                own.extend(late);
                own.truncate(max);
            }
            for &neighbor in &selected {
                self.connect(neighbor, id, layer, max);
            }

            if let Some(first) = found.first() {
                nearest = *first;
            }
        }

        if level > entry.level {
            let mut guard = self.entry.write();
            if guard.map_or(true, |current| level > current.level) {
                tracing::debug!(node = id, level, "Entry point promoted");
                *guard = Some(EntryPoint { id, level });
            }
        }
    }

    /// Finds up to `k` nodes closest to `query`, nearest first.
    ///
    /// Layer 0 is searched with a beam of `max(k, ef)`. Nodes rejected by
    /// `accept` are traversed but never returned.
    pub(crate) fn search<F>(&self, query: &[u8], k: usize, ef: usize, accept: F) -> Vec<Candidate>
    where
        F: Fn(NodeId) -> bool,
    {
        if k == 0 {
            return Vec::new();
        }
        let Some(entry) = self.entry_point() else {
            return Vec::new();
        };
        let Some(mut nearest) = self.candidate(query, entry.id) else {
            return Vec::new();
        };

        for layer in (1..=entry.level).rev() {
            nearest = self.greedy_closest(query, nearest, layer);
        }

        let mut found = self.search_layer(query, nearest, ef.max(k), 0, accept);
        found.truncate(k);
        found
    }

    /// Trims `candidates` to at most `max` links for a node at `base`.
    ///
    /// Diverse candidates are kept first, remaining slots go to the nearest
    /// of the rest. Used when rewriting links around removed nodes, where
    /// dropping a candidate can cut the only path to it.
    pub(crate) fn shrink_links(&self, base: &[u8], candidates: &[NodeId], max: usize) -> Vec<NodeId> {
        let mut scored: Vec<Candidate> = candidates
            .iter()
            .filter_map(|&id| self.candidate(base, id))
            .collect();
        scored.sort_unstable();

        let mut kept = select_diverse(&self.store, &self.metric, &scored, max);
        for candidate in &scored {
            if kept.len() >= max {
                break;
            }
            if !kept.contains(&candidate.id) {
                kept.push(candidate.id);
            }
        }
        kept
    }

    // =========================================================================
    // Private helper methods
    // =========================================================================

    fn candidate(&self, query: &[u8], id: NodeId) -> Option<Candidate> {
        let vector = self.store.vector(id)?;
        Some(Candidate::new(id, self.metric.distance(query, vector)))
    }

    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    fn random_level(&self) -> usize {
        let previous = self
            .rng_state
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |s| Some(xorshift(s)))
            .unwrap_or_else(|s| s);
        let state = xorshift(previous);

        // uniform in (0, 1], then exponential with mean level_mult
        let uniform = (state as f64) / (u64::MAX as f64);
        let level = (-uniform.ln() * self.level_mult).floor() as usize;
        level.min(MAX_LEVEL)
    }

    /// Greedy walk on one layer: moves to the closest neighbor until no
    /// neighbor improves on the current node.
    fn greedy_closest(&self, query: &[u8], start: Candidate, layer: usize) -> Candidate {
        let mut best = start;
        let mut neighbors = Vec::new();

        loop {
            self.store.neighbors(best.id, layer, &mut neighbors);
            let mut improved = false;

            for &neighbor in &neighbors {
                if let Some(candidate) = self.candidate(query, neighbor) {
                    if candidate < best {
                        best = candidate;
                        improved = true;
                    }
                }
            }

            if !improved {
                return best;
            }
        }
    }

    /// Beam search on one layer keeping the `ef` best accepted nodes.
    ///
    /// Returns candidates sorted nearest first.
    fn search_layer<F>(
        &self,
        query: &[u8],
        entry: Candidate,
        ef: usize,
        layer: usize,
        accept: F,
    ) -> Vec<Candidate>
    where
        F: Fn(NodeId) -> bool,
    {
        let mut visited: FxHashSet<NodeId> = FxHashSet::default();
        let mut candidates: BinaryHeap<Reverse<Candidate>> = BinaryHeap::new();
        let mut results: BinaryHeap<Candidate> = BinaryHeap::with_capacity(ef + 1);
        let mut neighbors = Vec::new();

        visited.insert(entry.id);
        candidates.push(Reverse(entry));
        if accept(entry.id) {
            results.push(entry);
        }

        while let Some(Reverse(current)) = candidates.pop() {
            if results.len() >= ef && results.peek().is_some_and(|worst| current > *worst) {
                break;
            }

            self.store.neighbors(current.id, layer, &mut neighbors);
            for &neighbor in &neighbors {
                if !visited.insert(neighbor) {
                    continue;
                }
                let Some(candidate) = self.candidate(query, neighbor) else {
                    continue;
                };
                let admissible =
                    results.len() < ef || results.peek().is_some_and(|worst| candidate < *worst);
                if !admissible {
                    continue;
                }

                candidates.push(Reverse(candidate));
                if accept(neighbor) {
                    results.push(candidate);
                    if results.len() > ef {
                        results.pop();
                    }
                }
            }
        }

        results.into_sorted_vec()
    }

    /// Adds `new_node` to the list of `neighbor` at `layer`, re-running the
    /// selection heuristic when the list overflows `max`.
    fn connect(&self, neighbor: NodeId, new_node: NodeId, layer: usize, max: usize) {
        let Some(links) = self.store.links(neighbor, layer) else {
            return;
        };
        let Some(base) = self.store.vector(neighbor) else {
            return;
        };

        // Vectors are immutable, so distances can be computed while holding
        // only this list's lock.
        let mut list = links.write();
        if list.contains(&new_node) {
            return;
        }
        list.push(new_node);
        if list.len() <= max {
            return;
        }

        let mut scored: Vec<Candidate> = list
            .iter()
            .filter_map(|&id| {
                self.store
                    .vector(id)
                    .map(|v| Candidate::new(id, self.metric.distance(base, v)))
            })
            .collect();
        scored.sort_unstable();
        *list = select_diverse(&self.store, &self.metric, &scored, max);
    }
}

const fn xorshift(mut state: u64) -> u64 {
    state ^= state << 13;
    state ^= state >> 7;
    state ^= state << 17;
    state
}
