//! Node arena.
//!
//! Nodes live in a vector of fixed slots indexed by [`NodeId`]; graph edges
//! are ids, never references, so growing the arena on `reserve` cannot
//! invalidate them. A slot is written once when its node is allocated and
//! the node's label, level and vector never change afterwards, so reads of
//! those need no locking. Each `(node, layer)` neighbor list sits behind its
//! own `RwLock`.
//!
//! A store is either owned (built by inserts or an eager load) or backed by
//! a read-only memory-mapped file, in which case every accessor decodes
//! straight from the mapping.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

use crate::config::MAX_CAPACITY;
use crate::error::{Error, Result};
use crate::persistence::view::MappedNodes;

/// Dense internal node index.
pub type NodeId = usize;

/// One inserted vector.
#[derive(Debug)]
pub(crate) struct Node {
    label: u64,
    vector: Box<[u8]>,
    /// One neighbor list per layer `0..=level`.
    links: Box<[RwLock<Vec<NodeId>>]>,
}

impl Node {
    /// Creates an unlinked node participating in layers `0..=level`.
    pub(crate) fn new(label: u64, level: usize, vector: Box<[u8]>) -> Self {
        Self {
            label,
            vector,
            links: (0..=level).map(|_| RwLock::new(Vec::new())).collect(),
        }
    }

    /// Creates a node with known neighbor lists (one per layer).
    pub(crate) fn with_links(label: u64, vector: Box<[u8]>, links: Vec<Vec<NodeId>>) -> Self {
        let mut links: Vec<_> = links.into_iter().map(RwLock::new).collect();
        if links.is_empty() {
            links.push(RwLock::new(Vec::new()));
        }
        Self {
            label,
            vector,
            links: links.into_boxed_slice(),
        }
    }

    pub(crate) fn level(&self) -> usize {
        self.links.len() - 1
    }
}

#[derive(Debug)]
struct OwnedNodes {
    slots: Vec<OnceLock<Node>>,
    /// Number of allocated slots; ids `0..next` are in use.
    next: AtomicUsize,
}

impl OwnedNodes {
    fn node(&self, id: NodeId) -> Option<&Node> {
        self.slots.get(id).and_then(OnceLock::get)
    }
}

#[derive(Debug)]
enum Backing {
    Owned(OwnedNodes),
    Mapped(MappedNodes),
}

/// Arena of graph nodes.
#[derive(Debug)]
pub(crate) struct NodeStore {
    backing: Backing,
}

impl NodeStore {
    /// Creates an empty owned store with `capacity` slots.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AllocationFailure`] if the slots cannot be allocated.
    pub(crate) fn with_capacity(capacity: usize) -> Result<Self> {
        let mut store = Self {
            backing: Backing::Owned(OwnedNodes {
                slots: Vec::new(),
                next: AtomicUsize::new(0),
            }),
        };
        store.reserve(capacity)?;
        Ok(store)
    }

    /// Creates an owned store from fully built nodes; ids follow vector order.
    pub(crate) fn from_nodes(nodes: Vec<Node>, capacity: usize) -> Result<Self> {
        let count = nodes.len();
        let mut store = Self::with_capacity(capacity.max(count))?;
        if let Backing::Owned(owned) = &mut store.backing {
            for (slot, node) in owned.slots.iter_mut().zip(nodes) {
                *slot = OnceLock::from(node);
            }
            *owned.next.get_mut() = count;
        }
        Ok(store)
    }

    /// Wraps a memory-mapped file.
    pub(crate) fn mapped(nodes: MappedNodes) -> Self {
        Self {
            backing: Backing::Mapped(nodes),
        }
    }

    /// Returns true for read-only mapped stores.
    pub(crate) fn is_mapped(&self) -> bool {
        matches!(self.backing, Backing::Mapped(_))
    }

    /// Number of node slots.
    pub(crate) fn capacity(&self) -> usize {
        match &self.backing {
            Backing::Owned(owned) => owned.slots.len(),
            Backing::Mapped(mapped) => mapped.capacity(),
        }
    }

    /// Number of slots in use, tombstones included.
    pub(crate) fn allocated(&self) -> usize {
        match &self.backing {
            Backing::Owned(owned) => owned.next.load(Ordering::Acquire).min(owned.slots.len()),
            Backing::Mapped(mapped) => mapped.len(),
        }
    }

    /// Grows the arena to at least `capacity` slots. Never shrinks.
    ///
    /// # Errors
    ///
    /// - [`Error::ReadOnly`] on a mapped store.
    /// - [`Error::AllocationFailure`] beyond [`MAX_CAPACITY`] or when the
    ///   allocator refuses.
    pub(crate) fn reserve(&mut self, capacity: usize) -> Result<()> {
        let Backing::Owned(owned) = &mut self.backing else {
            return Err(Error::ReadOnly("reserve"));
        };
        if capacity <= owned.slots.len() {
            return Ok(());
        }
        if capacity > MAX_CAPACITY {
            return Err(Error::AllocationFailure(format!(
                "capacity {capacity} exceeds {MAX_CAPACITY}"
            )));
        }
        owned
            .slots
            .try_reserve_exact(capacity - owned.slots.len())
            .map_err(|e| Error::AllocationFailure(e.to_string()))?;
        owned.slots.resize_with(capacity, OnceLock::new);
        Ok(())
    }

    /// Places `node` into the next free slot.
    ///
    /// # Errors
    ///
    /// - [`Error::ReadOnly`] on a mapped store.
    /// - [`Error::CapacityExceeded`] when every slot is taken.
    pub(crate) fn push(&self, node: Node) -> Result<NodeId> {
        let Backing::Owned(owned) = &self.backing else {
            return Err(Error::ReadOnly("add"));
        };
        let capacity = owned.slots.len();
        let id = owned
            .next
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < capacity).then_some(n + 1)
            })
            .map_err(|_| Error::CapacityExceeded { capacity })?;
        owned.slots[id]
            .set(node)
            .map_err(|_| Error::AllocationFailure(format!("slot {id} already taken")))?;
        Ok(id)
    }

    /// Label stored with a node.
    pub(crate) fn label(&self, id: NodeId) -> Option<u64> {
        match &self.backing {
            Backing::Owned(owned) => owned.node(id).map(|n| n.label),
            Backing::Mapped(mapped) => mapped.label(id),
        }
    }

    /// Highest layer a node participates in.
    pub(crate) fn level(&self, id: NodeId) -> Option<usize> {
        match &self.backing {
            Backing::Owned(owned) => owned.node(id).map(Node::level),
            Backing::Mapped(mapped) => mapped.level(id),
        }
    }

    /// Encoded vector of a node.
    pub(crate) fn vector(&self, id: NodeId) -> Option<&[u8]> {
        match &self.backing {
            Backing::Owned(owned) => owned.node(id).map(|n| &*n.vector),
            Backing::Mapped(mapped) => mapped.vector(id),
        }
    }

    /// Copies the neighbors of `id` at `layer` into `out`.
    ///
    /// `out` is cleared first; it stays empty if the node does not reach
    /// `layer`.
    pub(crate) fn neighbors(&self, id: NodeId, layer: usize, out: &mut Vec<NodeId>) {
        out.clear();
        match &self.backing {
            Backing::Owned(owned) => {
                if let Some(list) = owned.node(id).and_then(|n| n.links.get(layer)) {
                    out.extend_from_slice(&list.read());
                }
            }
            Backing::Mapped(mapped) => mapped.neighbors(id, layer, out),
        }
    }

    /// Lock guarding the neighbor list of `id` at `layer`; owned stores only.
    pub(crate) fn links(&self, id: NodeId, layer: usize) -> Option<&RwLock<Vec<NodeId>>> {
        match &self.backing {
            Backing::Owned(owned) => owned.node(id).and_then(|n| n.links.get(layer)),
            Backing::Mapped(_) => None,
        }
    }
}
