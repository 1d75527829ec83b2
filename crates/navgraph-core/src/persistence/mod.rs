//! Saving, loading and memory-mapping graphs.
//!
//! A graph is stored as one flat little-endian file (see [`format`]).
//! [`load`] decodes it into an owned store, [`view`] serves it from a
//! read-only mapping. Both produce identical search results for the same
//! file.

pub(crate) mod format;
mod reader;
pub(crate) mod view;
mod writer;

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use crate::error::Result;
use crate::graph::HnswGraph;
use crate::label_map::LabelMap;

pub(crate) use format::Header;
pub(crate) use writer::Expansion;

/// A decoded graph with its label map and the header it came from.
#[derive(Debug)]
pub(crate) struct Snapshot {
    pub header: Header,
    pub graph: HnswGraph,
    pub labels: LabelMap,
}

/// Writes the live part of a graph to `path`.
///
/// The data goes to a sibling temporary file first, which is renamed over
/// `path` once fully written.
///
/// Returns the number of nodes written.
pub(crate) fn save(
    path: &Path,
    graph: &HnswGraph,
    labels: &LabelMap,
    expansion: Expansion,
) -> Result<usize> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = Path::new(&tmp);

    let written = {
        let file = File::create(tmp)?;
        let written = writer::write_graph(BufWriter::new(&file), graph, labels, expansion)?;
        file.sync_all()?;
        written
    };
    fs::rename(tmp, path)?;
    Ok(written)
}

/// Reads and fully decodes the file at `path`.
pub(crate) fn load(path: &Path) -> Result<Snapshot> {
    let bytes = fs::read(path)?;
    reader::decode(&bytes)
}

/// Opens the file at `path` as a read-only view.
pub(crate) fn view(path: &Path) -> Result<Snapshot> {
    view::open(path)
}

/// Serializes to memory and decodes again, dropping tombstones.
pub(crate) fn rebuild(graph: &HnswGraph, labels: &LabelMap, expansion: Expansion) -> Result<Snapshot> {
    let mut bytes = Vec::new();
    writer::write_graph(&mut bytes, graph, labels, expansion)?;
    reader::decode(&bytes)
}
