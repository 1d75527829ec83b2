//! Read-only memory-mapped graphs.
//!
//! Opening a view reads the header, the offset table and each record's
//! label and level. Vectors and neighbor lists are decoded from the mapping
//! on every access, so pages are faulted in on demand and the file never
//! has to fit in memory.
//!
//! Neighbor lists are therefore validated lazily. A list longer than its
//! layer bound or holding an id outside the graph is served as empty, where
//! [`load`](super::load) would reject the whole file with
//! [`Error::Serialization`]. Use `load` when a file must be fully checked.

use memmap2::Mmap;
use std::fs::File;
use std::path::Path;

use super::format::{self, Header, Record};
use super::reader::{entry_point, read_offsets, resolve_metric};
use super::Snapshot;
use crate::error::{Error, Result};
use crate::graph::HnswGraph;
use crate::label_map::LabelMap;
use crate::node_store::{NodeId, NodeStore};

/// Node records served straight from a mapped file.
#[derive(Debug)]
pub(crate) struct MappedNodes {
    mmap: Mmap,
    offsets: Vec<usize>,
    stride: usize,
    capacity: usize,
    /// M; lists hold at most `2M` ids on layer 0 and `M` above
    connectivity: usize,
}

impl MappedNodes {
    pub(crate) fn len(&self) -> usize {
        self.offsets.len()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    fn record(&self, id: NodeId) -> Option<Record<'_>> {
        let offset = *self.offsets.get(id)?;
        Record::at(&self.mmap, offset, self.stride).ok()
    }

    pub(crate) fn label(&self, id: NodeId) -> Option<u64> {
        self.record(id).map(|r| r.label)
    }

    pub(crate) fn level(&self, id: NodeId) -> Option<usize> {
        self.record(id).map(|r| r.level)
    }

    pub(crate) fn vector(&self, id: NodeId) -> Option<&[u8]> {
        self.record(id).map(|r| r.vector)
    }

    /// Appends the neighbors of `id` at `layer` to `out`.
    ///
    /// Nothing is appended if the list breaks its layer bound or points
    /// outside the graph.
    pub(crate) fn neighbors(&self, id: NodeId, layer: usize, out: &mut Vec<NodeId>) {
        let Some(raw) = self.record(id).and_then(|r| r.layer(layer)) else {
            return;
        };
        let bound = if layer == 0 {
            self.connectivity * 2
        } else {
            self.connectivity
        };
        let size = self.len();
        if raw.len() / 4 > bound || format::ids(raw).any(|n| n >= size) {
            tracing::debug!(node = id, layer, "Skipping corrupt neighbor list in mapped index");
            return;
        }
        out.extend(format::ids(raw));
    }
}

/// Maps `path` and builds a read-only graph over it.
///
/// # Errors
///
/// - [`Error::Io`] if the file cannot be opened or mapped.
/// - [`Error::Serialization`] if the header, offset table or a record's
///   fixed part is invalid.
pub(crate) fn open(path: &Path) -> Result<Snapshot> {
    let file = File::open(path)?;
    // SAFETY: the mapping is read-only and never outlives `MappedNodes`;
    // every access goes through bounds-checked slicing.
    let mmap = unsafe { Mmap::map(&file)? };

    let header = Header::decode(&mmap)?;
    let metric = resolve_metric(&header)?;
    let offsets = read_offsets(&mmap, &header)?;
    let stride = header.stride();

    let mut labels = Vec::with_capacity(offsets.len());
    let mut levels = Vec::with_capacity(offsets.len());
    for (id, &offset) in offsets.iter().enumerate() {
        let record = Record::at(&mmap, offset, stride)?;
        if record.level > header.max_level {
            return Err(Error::corrupt(format!(
                "node {id} has level {} above max level {}",
                record.level, header.max_level
            )));
        }
        labels.push((record.label, id));
        levels.push(record.level);
    }

    let entry = entry_point(&header, |id| levels.get(id).copied())?;
    let labels = LabelMap::from_pairs(labels).map_err(|e| Error::corrupt(e.to_string()))?;
    let store = NodeStore::mapped(MappedNodes {
        mmap,
        offsets,
        stride,
        capacity: header.capacity,
        connectivity: header.connectivity,
    });
    let graph = HnswGraph::new(store, metric, entry, header.connectivity, header.seed);

    Ok(Snapshot {
        header,
        graph,
        labels,
    })
}
