//! Eager decoding of a serialized graph into an owned store.

use super::format::{self, Header, Record, HEADER_LEN};
use super::Snapshot;
use crate::error::{Error, Result};
use crate::graph::{EntryPoint, HnswGraph};
use crate::label_map::LabelMap;
use crate::metric::Metric;
use crate::node_store::{Node, NodeId, NodeStore};

/// Decodes a complete file image.
///
/// Every structural invariant is checked: record bounds, levels against
/// the header's max level, neighbor counts against the layer bound,
/// neighbor ids against the node count and label uniqueness.
///
/// # Errors
///
/// Returns [`Error::Serialization`] on any violation.
pub(crate) fn decode(bytes: &[u8]) -> Result<Snapshot> {
    let header = Header::decode(bytes)?;
    let metric = resolve_metric(&header)?;
    let offsets = read_offsets(bytes, &header)?;
    let stride = header.stride();

    let mut nodes = Vec::with_capacity(header.size);
    let mut labels = Vec::with_capacity(header.size);
    for (id, &offset) in offsets.iter().enumerate() {
        let record = Record::at(bytes, offset, stride)?;
        if record.level > header.max_level {
            return Err(Error::corrupt(format!(
                "node {id} has level {} above max level {}",
                record.level, header.max_level
            )));
        }

        let mut links = Vec::with_capacity(record.level + 1);
        for layer in 0..=record.level {
            let raw = record.layer(layer).ok_or_else(|| {
                Error::corrupt(format!("node {id} neighbor list {layer} is truncated"))
            })?;
            let ids: Vec<NodeId> = format::ids(raw).collect();
            if ids.len() > header.max_links(layer) {
                return Err(Error::corrupt(format!(
                    "node {id} has {} links on layer {layer}, bound is {}",
                    ids.len(),
                    header.max_links(layer)
                )));
            }
            if let Some(bad) = ids.iter().find(|&&n| n >= header.size) {
                return Err(Error::corrupt(format!(
                    "node {id} links to {bad}, size is {}",
                    header.size
                )));
            }
            links.push(ids);
        }

        labels.push((record.label, id));
        nodes.push(Node::with_links(record.label, Box::from(record.vector), links));
    }

    let entry = entry_point(&header, |id| nodes.get(id).map(Node::level))?;
    let labels = LabelMap::from_pairs(labels).map_err(|e| Error::corrupt(e.to_string()))?;
    let store = NodeStore::from_nodes(nodes, header.capacity)?;
    let graph = HnswGraph::new(store, metric, entry, header.connectivity, header.seed);

    Ok(Snapshot {
        header,
        graph,
        labels,
    })
}

pub(super) fn resolve_metric(header: &Header) -> Result<Metric> {
    Metric::resolve(header.metric, header.scalar, header.dimensions)
        .map_err(|e| Error::corrupt(format!("header describes an invalid index: {e}")))
}

/// Reads the offset table, checking every offset lands past it.
pub(super) fn read_offsets(bytes: &[u8], header: &Header) -> Result<Vec<usize>> {
    let end = header.offsets_end()?;
    if bytes.len() < end {
        return Err(Error::corrupt(format!(
            "offset table for {} nodes runs past end of file",
            header.size
        )));
    }
    (0..header.size)
        .map(|i| {
            let raw = format::read_u64(bytes, HEADER_LEN + i * 8)?;
            let offset = usize::try_from(raw)
                .map_err(|_| Error::corrupt(format!("offset {raw} overflows usize")))?;
            if offset < end {
                return Err(Error::corrupt(format!(
                    "node {i} offset {offset} points into the header"
                )));
            }
            Ok(offset)
        })
        .collect()
}

/// Builds the entry point, checking it sits on the top level.
pub(super) fn entry_point(
    header: &Header,
    level_of: impl Fn(NodeId) -> Option<usize>,
) -> Result<Option<EntryPoint>> {
    let Some(id) = header.entry else {
        return Ok(None);
    };
    match level_of(id) {
        Some(level) if level == header.max_level => Ok(Some(EntryPoint { id, level })),
        _ => Err(Error::corrupt(format!(
            "entry point {id} is not on max level {}",
            header.max_level
        ))),
    }
}
