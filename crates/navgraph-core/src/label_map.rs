//! Label ↔ node id mapping using `DashMap`.
//!
//! Labels are caller-chosen `u64` keys; node ids are dense arena indices
//! assigned by the [`NodeStore`](crate::node_store::NodeStore). At most one
//! live node exists per label: duplicate inserts fail with
//! [`Error::DuplicateLabel`] instead of overwriting, since overwriting would
//! orphan the original node's graph links.
//!
//! Removal drops both directions of the mapping. The node itself stays in
//! the arena as a tombstone until the graph is compacted, and its id is never
//! handed to another label in the meantime.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::{Error, Result};
use crate::node_store::NodeId;

/// Concurrent bidirectional label map.
#[derive(Debug, Default)]
pub struct LabelMap {
    by_label: DashMap<u64, NodeId>,
    by_id: DashMap<NodeId, u64>,
}

impl LabelMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a map with pre-allocated capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            by_label: DashMap::with_capacity(capacity),
            by_id: DashMap::with_capacity(capacity),
        }
    }

    /// Maps `label` to an existing node id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateLabel`] if the label is already live.
    pub fn insert(&self, label: u64, id: NodeId) -> Result<()> {
        self.register(label, || Ok(id)).map(|_| ())
    }

    /// Claims `label` and maps it to the id produced by `allocate`.
    ///
    /// `allocate` runs while the label's shard is locked, so concurrent
    /// registrations of the same label call it at most once between them
    /// and only one caller succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateLabel`] if the label is already live, or
    /// whatever `allocate` fails with.
    pub fn register<F>(&self, label: u64, allocate: F) -> Result<NodeId>
    where
        F: FnOnce() -> Result<NodeId>,
    {
        match self.by_label.entry(label) {
            Entry::Occupied(_) => Err(Error::DuplicateLabel(label)),
            Entry::Vacant(entry) => {
                let id = allocate()?;
                entry.insert(id);
                self.by_id.insert(id, label);
                Ok(id)
            }
        }
    }

    /// Node id of a live label.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the label is absent.
    pub fn lookup(&self, label: u64) -> Result<NodeId> {
        self.by_label
            .get(&label)
            .map(|r| *r)
            .ok_or(Error::NotFound(label))
    }

    /// Drops a label and returns the id it pointed to.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the label is absent.
    pub fn remove(&self, label: u64) -> Result<NodeId> {
        let (_, id) = self
            .by_label
            .remove(&label)
            .ok_or(Error::NotFound(label))?;
        self.by_id.remove(&id);
        Ok(id)
    }

    /// Returns true if the label is live.
    #[must_use]
    pub fn contains(&self, label: u64) -> bool {
        self.by_label.contains_key(&label)
    }

    /// Label of a live node, `None` for tombstones and unknown ids.
    #[must_use]
    pub fn label_of(&self, id: NodeId) -> Option<u64> {
        self.by_id.get(&id).map(|r| *r)
    }

    /// Number of live labels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_label.len()
    }

    /// Returns true if no label is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_label.is_empty()
    }

    /// Drops every mapping.
    pub fn clear(&self) {
        self.by_label.clear();
        self.by_id.clear();
    }

    /// Builds a map from `(label, id)` pairs, e.g. when reading a file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateLabel`] on the first repeated label.
    pub fn from_pairs<I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (u64, NodeId)>,
    {
        let pairs = pairs.into_iter();
        let map = Self::with_capacity(pairs.size_hint().0);
        for (label, id) in pairs {
            map.insert(label, id)?;
        }
        Ok(map)
    }
}
