//! Serialization of a graph to the flat file format.
//!
//! Only live nodes are written. Tombstoned nodes are dropped and the
//! surviving ids are renumbered densely in their original order. An edge
//! into a dropped node is replaced by edges to the live nodes reachable
//! through it on the same layer, so nodes that were only reachable via
//! tombstones stay reachable in the written graph.

use rustc_hash::FxHashSet;
use std::collections::VecDeque;
use std::io::Write;

use super::format::{Header, HEADER_LEN};
use crate::error::Result;
use crate::graph::HnswGraph;
use crate::label_map::LabelMap;
use crate::node_store::NodeId;

const DROPPED: u32 = u32::MAX;

/// Expansion factors recorded alongside the graph.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Expansion {
    pub add: usize,
    pub search: usize,
}

/// Writes `graph` to `out`.
///
/// # Errors
///
/// Returns [`Error::Io`](crate::Error::Io) if writing fails.
pub(crate) fn write_graph<W: Write>(
    mut out: W,
    graph: &HnswGraph,
    labels: &LabelMap,
    expansion: Expansion,
) -> Result<usize> {
    let store = graph.store();
    let metric = graph.metric();

    let live: Vec<NodeId> = (0..store.allocated())
        .filter(|&id| labels.label_of(id).is_some() && store.vector(id).is_some())
        .collect();
    let mut remap = vec![DROPPED; store.allocated()];
    for (new_id, &old_id) in live.iter().enumerate() {
        remap[old_id] = new_id as u32;
    }

    let (entry, max_level) = pick_entry(graph, &live, &remap);
    let header = Header {
        metric: metric.kind(),
        scalar: metric.scalar(),
        dimensions: metric.dimensions(),
        connectivity: graph.connectivity(),
        expansion_add: expansion.add,
        expansion_search: expansion.search,
        capacity: store.capacity(),
        size: live.len(),
        entry,
        max_level,
        seed: graph.seed(),
    };
    let stride = header.stride();

    let mut scratch = Vec::new();
    let links: Vec<Vec<Vec<u32>>> = live
        .iter()
        .map(|&id| {
            (0..=store.level(id).unwrap_or(0))
                .map(|layer| repaired_links(graph, id, layer, &remap, &mut scratch))
                .collect()
        })
        .collect();

    out.write_all(&header.encode())?;

    // offset table
    let mut offset = (HEADER_LEN + live.len() * 8) as u64;
    for layers in &links {
        out.write_all(&offset.to_le_bytes())?;
        let len = 12 + stride + layers.iter().map(|ids| 4 + 4 * ids.len()).sum::<usize>();
        offset += len as u64;
    }

    // records
    let mut record = Vec::new();
    for (&id, layers) in live.iter().zip(&links) {
        record.clear();
        record.extend_from_slice(&labels.label_of(id).unwrap_or_default().to_le_bytes());
        record.extend_from_slice(&((layers.len() - 1) as u32).to_le_bytes());
        record.extend_from_slice(store.vector(id).unwrap_or_default());
        for ids in layers {
            record.extend_from_slice(&(ids.len() as u32).to_le_bytes());
            for neighbor in ids {
                record.extend_from_slice(&neighbor.to_le_bytes());
            }
        }
        out.write_all(&record)?;
    }

    out.flush()?;
    Ok(live.len())
}

/// Keeps the current entry point if it survives, otherwise promotes the
/// first live node of the highest surviving level.
fn pick_entry(graph: &HnswGraph, live: &[NodeId], remap: &[u32]) -> (Option<usize>, usize) {
    let store = graph.store();
    if let Some(entry) = graph.entry_point() {
        if remap.get(entry.id).is_some_and(|&r| r != DROPPED) {
            return (Some(remap[entry.id] as usize), entry.level);
        }
    }

    let mut best: Option<(usize, usize)> = None;
    for (new_id, &old_id) in live.iter().enumerate() {
        let level = store.level(old_id).unwrap_or(0);
        if best.map_or(true, |(_, top)| level > top) {
            best = Some((new_id, level));
        }
    }
    match best {
        Some((id, level)) => (Some(id), level),
        None => (None, 0),
    }
}

/// Renumbered live neighbors of `id` at `layer`.
///
/// Removed neighbors are expanded breadth-first through further removed
/// nodes, at most `4 * max_links(layer)` of them, and the live nodes found
/// take their place. The merged list is trimmed to the layer bound.
fn repaired_links(
    graph: &HnswGraph,
    id: NodeId,
    layer: usize,
    remap: &[u32],
    scratch: &mut Vec<NodeId>,
) -> Vec<u32> {
    let store = graph.store();
    let is_live = |n: NodeId| remap.get(n).is_some_and(|&r| r != DROPPED);

    let mut seen: FxHashSet<NodeId> = FxHashSet::default();
    seen.insert(id);
    let mut kept = Vec::new();
    let mut removed = VecDeque::new();

    store.neighbors(id, layer, scratch);
    for &n in scratch.iter() {
        if seen.insert(n) {
            if is_live(n) {
                kept.push(n);
            } else {
                removed.push_back(n);
            }
        }
    }
    if removed.is_empty() {
        return kept.into_iter().map(|n| remap[n]).collect();
    }

    let max = graph.max_links(layer);
    let mut budget = max * 4;
    while budget > 0 {
        let Some(dead) = removed.pop_front() else {
            break;
        };
        budget -= 1;
        store.neighbors(dead, layer, scratch);
        for &n in scratch.iter() {
            if seen.insert(n) {
                if is_live(n) {
                    kept.push(n);
                } else {
                    removed.push_back(n);
                }
            }
        }
    }

    if kept.len() > max {
        if let Some(base) = store.vector(id) {
            kept = graph.shrink_links(base, &kept, max);
        } else {
            kept.truncate(max);
        }
    }
    kept.into_iter().map(|n| remap[n]).collect()
}
