//! The public index handle.
//!
//! [`Index`] ties the pieces together: inputs are converted to the index's
//! scalar kind, labels are claimed in the [`LabelMap`], nodes are allocated
//! in the arena and linked by the graph engine.
//!
//! # Locking
//!
//! Graph and label map sit behind one `RwLock`. `add`, `search`, `get` and
//! `remove` share it; `reserve`, `save`, `load`, `view`, `clear` and
//! `compact` take it exclusively, so the graph is never serialized or
//! replaced while an insert is in flight.

use parking_lot::RwLock;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

use crate::config::IndexConfig;
use crate::error::{Error, Result};
use crate::graph::HnswGraph;
use crate::label_map::LabelMap;
use crate::metric::{Metric, MetricKind};
use crate::node_store::NodeStore;
use crate::persistence::{self, Expansion, Snapshot};
use crate::scalar::{ScalarKind, VectorRef};

/// One search hit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Label of the matched vector.
    pub label: u64,
    /// Distance to the query; smaller is closer.
    pub distance: f32,
}

#[derive(Debug)]
struct State {
    graph: HnswGraph,
    labels: LabelMap,
}

impl State {
    fn empty(metric: Metric, capacity: usize, connectivity: usize, seed: u64) -> Result<Self> {
        let store = NodeStore::with_capacity(capacity)?;
        Ok(Self {
            graph: HnswGraph::new(store, metric, None, connectivity, seed),
            labels: LabelMap::new(),
        })
    }

    fn check_writable(&self, op: &'static str) -> Result<()> {
        if self.graph.store().is_mapped() {
            Err(Error::ReadOnly(op))
        } else {
            Ok(())
        }
    }
}

impl From<Snapshot> for State {
    fn from(snapshot: Snapshot) -> Self {
        Self {
            graph: snapshot.graph,
            labels: snapshot.labels,
        }
    }
}

/// Approximate nearest-neighbor index over labeled vectors.
///
/// # Example
///
/// ```rust
/// use navgraph_core::{Index, IndexConfig, MetricKind, ScalarKind};
///
/// let config = IndexConfig::new(MetricKind::L2sq, ScalarKind::F32, 2).with_capacity(10);
/// let index = Index::create(config)?;
/// index.add(1, &[0.0f32, 1.0])?;
/// index.add(2, &[1.0f32, 0.0])?;
///
/// let hits = index.search(&[0.1f32, 0.9], 1)?;
/// assert_eq!(hits[0].label, 1);
/// # Ok::<(), navgraph_core::Error>(())
/// ```
#[derive(Debug)]
pub struct Index {
    config: IndexConfig,
    expansion_add: AtomicUsize,
    expansion_search: AtomicUsize,
    state: RwLock<State>,
    add_pool: OnceLock<ThreadPool>,
    search_pool: OnceLock<ThreadPool>,
}

impl Index {
    /// Creates an empty index.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidConfig`] if a configuration value is out of range.
    /// - [`Error::UnsupportedCombination`] / [`Error::DimensionMismatch`] if
    ///   the metric cannot run on the scalar kind or dimensionality.
    /// - [`Error::AllocationFailure`] if the initial capacity cannot be
    ///   allocated.
    pub fn create(config: IndexConfig) -> Result<Self> {
        config.validate()?;
        let metric = config.resolve_metric()?;
        let state = State::empty(metric, config.capacity, config.connectivity, config.seed)?;

        tracing::info!(
            metric = %config.metric,
            scalar = %config.scalar,
            dimensions = config.dimensions,
            capacity = config.capacity,
            "Index created"
        );
        Ok(Self::with_state(config, state))
    }

    /// Loads an index from a file, taking its configuration from the file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] or [`Error::Serialization`] if the file cannot
    /// be read or is corrupt.
    pub fn restore<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let snapshot = persistence::load(path)?;
        let config = snapshot.header.config();
        tracing::info!(path = %path.display(), size = snapshot.labels.len(), "Index restored");
        Ok(Self::with_state(config, snapshot.into()))
    }

    /// Opens a file as a read-only memory-mapped index.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] or [`Error::Serialization`] if the file cannot
    /// be mapped or is corrupt.
    pub fn open_view<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let snapshot = persistence::view(path)?;
        let config = snapshot.header.config();
        tracing::info!(path = %path.display(), size = snapshot.labels.len(), "Index view opened");
        Ok(Self::with_state(config, snapshot.into()))
    }

    fn with_state(config: IndexConfig, state: State) -> Self {
        Self {
            expansion_add: AtomicUsize::new(config.expansion_add),
            expansion_search: AtomicUsize::new(config.expansion_search),
            config,
            state: RwLock::new(state),
            add_pool: OnceLock::new(),
            search_pool: OnceLock::new(),
        }
    }

    // =========================================================================
    // Insertion
    // =========================================================================

    /// Inserts a vector under `label`.
    ///
    /// # Errors
    ///
    /// - [`Error::DuplicateLabel`] if `label` is already live.
    /// - [`Error::CapacityExceeded`] if every slot is taken; call
    ///   [`Index::reserve`] and retry.
    /// - [`Error::DimensionMismatch`] if the vector length is wrong.
    /// - [`Error::UnsupportedCombination`] if a binary input is given to a
    ///   float index or vice versa.
    /// - [`Error::ReadOnly`] on a view.
    pub fn add<'a>(&self, label: u64, vector: impl Into<VectorRef<'a>>) -> Result<()> {
        let vector = vector.into();
        self.add_bytes(label, &vector.to_bytes(), vector.kind())
    }

    /// Inserts an already encoded vector of the given scalar kind.
    ///
    /// # Errors
    ///
    /// See [`Index::add`].
    pub fn add_bytes(&self, label: u64, bytes: &[u8], scalar: ScalarKind) -> Result<()> {
        let encoded = self.encode_input(bytes, scalar)?;
        let state = self.state.read();
        state.check_writable("add")?;

        let vector: Box<[u8]> = encoded.into_owned().into_boxed_slice();
        let id = state
            .labels
            .register(label, || state.graph.allocate(label, vector))?;
        state
            .graph
            .insert(id, self.expansion_add.load(Ordering::Relaxed));
        Ok(())
    }

    /// Inserts many vectors on the index's add thread pool.
    ///
    /// Every item is attempted. Returns the number inserted, or the first
    /// error if any item failed.
    ///
    /// # Errors
    ///
    /// See [`Index::add`]; [`Error::AllocationFailure`] if the thread pool
    /// cannot be built.
    pub fn add_batch(&self, items: &[(u64, Vec<f32>)]) -> Result<usize> {
        let pool = pool(&self.add_pool, self.config.effective_threads_add())?;
        let results: Vec<Result<()>> = pool.install(|| {
            items
                .par_iter()
                .map(|(label, vector)| self.add(*label, vector))
                .collect()
        });

        let failed = results.iter().filter(|r| r.is_err()).count();
        if failed > 0 {
            tracing::warn!(failed, total = items.len(), "Batch insert partially failed");
        }
        match results.into_iter().find_map(Result::err) {
            Some(err) => Err(err),
            None => Ok(items.len()),
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Returns up to `k` labels closest to `query`, nearest first.
    ///
    /// Equal distances are ordered by insertion. An empty index yields an
    /// empty result.
    ///
    /// # Errors
    ///
    /// - [`Error::DimensionMismatch`] if the query length is wrong.
    /// - [`Error::UnsupportedCombination`] if a binary query is given to a
    ///   float index or vice versa.
    pub fn search<'a>(&self, query: impl Into<VectorRef<'a>>, k: usize) -> Result<Vec<SearchResult>> {
        let query = query.into();
        self.search_bytes(&query.to_bytes(), query.kind(), k)
    }

    /// Searches with an already encoded query of the given scalar kind.
    ///
    /// # Errors
    ///
    /// See [`Index::search`].
    pub fn search_bytes(&self, bytes: &[u8], scalar: ScalarKind, k: usize) -> Result<Vec<SearchResult>> {
        let query = self.encode_input(bytes, scalar)?;
        let state = self.state.read();
        let ef = self.expansion_search.load(Ordering::Relaxed);

        let hits = state
            .graph
            .search(&query, k, ef, |id| state.labels.label_of(id).is_some());
        Ok(hits
            .into_iter()
            .filter_map(|hit| {
                state.labels.label_of(hit.id).map(|label| SearchResult {
                    label,
                    distance: hit.distance,
                })
            })
            .collect())
    }

    /// Runs many searches on the index's search thread pool.
    ///
    /// Results are in query order.
    ///
    /// # Errors
    ///
    /// See [`Index::search`]; [`Error::AllocationFailure`] if the thread
    /// pool cannot be built.
    pub fn search_batch(&self, queries: &[Vec<f32>], k: usize) -> Result<Vec<Vec<SearchResult>>> {
        let pool = pool(&self.search_pool, self.config.effective_threads_search())?;
        pool.install(|| queries.par_iter().map(|q| self.search(q, k)).collect())
    }

    /// Stored vector of `label`, encoded in the index's scalar kind.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the label is not live.
    pub fn get(&self, label: u64) -> Result<Vec<u8>> {
        let state = self.state.read();
        let id = state.labels.lookup(label)?;
        state
            .graph
            .store()
            .vector(id)
            .map(<[u8]>::to_vec)
            .ok_or(Error::NotFound(label))
    }

    /// Stored vector of `label`, decoded to `f32`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the label is not live.
    pub fn get_f32(&self, label: u64) -> Result<Vec<f32>> {
        let bytes = self.get(label)?;
        Ok(self.config.scalar.decode(&bytes, self.config.dimensions))
    }

    /// Stored vector of `label`, converted to `scalar`.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if the label is not live.
    /// - [`Error::UnsupportedCombination`] if `scalar` is binary and the
    ///   index stores floats, or the other way round.
    pub fn get_as(&self, label: u64, scalar: ScalarKind) -> Result<Vec<u8>> {
        if scalar.is_binary() != self.config.scalar.is_binary() {
            return Err(Error::UnsupportedCombination {
                metric: self.config.metric,
                scalar,
            });
        }
        let bytes = self.get(label)?;
        Ok(scalar
            .convert(self.config.scalar, &bytes, self.config.dimensions)
            .into_owned())
    }

    /// Returns true if `label` is live.
    #[must_use]
    pub fn contains(&self, label: u64) -> bool {
        self.state.read().labels.contains(label)
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Removes `label` from the index.
    ///
    /// The node is tombstoned: it stops appearing in results and lookups
    /// immediately, keeps routing searches through its edges, and is
    /// dropped by [`Index::compact`] or a save/load cycle. Its slot is not
    /// reused before then.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if the label is not live.
    /// - [`Error::ReadOnly`] on a view.
    pub fn remove(&self, label: u64) -> Result<()> {
        let state = self.state.read();
        state.check_writable("remove")?;
        let id = state.labels.remove(label)?;
        tracing::debug!(label, node = id, "Label removed");
        Ok(())
    }

    /// Grows capacity to at least `capacity` slots. Never shrinks.
    ///
    /// # Errors
    ///
    /// - [`Error::AllocationFailure`] if the slots cannot be allocated.
    /// - [`Error::ReadOnly`] on a view.
    pub fn reserve(&self, capacity: usize) -> Result<()> {
        let mut state = self.state.write();
        state.graph.reserve(capacity)?;
        tracing::info!(capacity = state.graph.store().capacity(), "Index reserved");
        Ok(())
    }

    /// Drops every vector, keeping configuration and capacity.
    ///
    /// # Errors
    ///
    /// - [`Error::ReadOnly`] on a view.
    /// - [`Error::AllocationFailure`] if the fresh arena cannot be allocated.
    pub fn clear(&self) -> Result<()> {
        let mut state = self.state.write();
        state.check_writable("clear")?;
        let fresh = State::empty(
            *state.graph.metric(),
            state.graph.store().capacity(),
            state.graph.connectivity(),
            self.config.seed,
        )?;
        *state = fresh;
        tracing::info!(dimensions = self.config.dimensions, "Index cleared");
        Ok(())
    }

    /// Rebuilds the graph without tombstones, renumbering live nodes and
    /// freeing the slots of removed ones.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReadOnly`] on a view.
    pub fn compact(&self) -> Result<()> {
        let mut state = self.state.write();
        state.check_writable("compact")?;
        let before = state.graph.store().allocated();
        let snapshot = persistence::rebuild(&state.graph, &state.labels, self.expansion())?;
        *state = snapshot.into();
        tracing::info!(
            before,
            after = state.graph.store().allocated(),
            "Index compacted"
        );
        Ok(())
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Writes the index to `path`.
    ///
    /// Removed labels are not written.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let state = self.state.write();
        let size = persistence::save(path, &state.graph, &state.labels, self.expansion())?;
        tracing::info!(path = %path.display(), size, "Index saved");
        Ok(())
    }

    /// Replaces the contents of this index with the file at `path`.
    ///
    /// # Errors
    ///
    /// - [`Error::ConfigMismatch`] if the file's dimensions, metric or
    ///   scalar kind differ from this index's.
    /// - [`Error::Io`] / [`Error::Serialization`] if the file cannot be read
    ///   or is corrupt.
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let snapshot = persistence::load(path)?;
        self.install(snapshot)?;
        tracing::info!(path = %path.display(), size = self.size(), "Index loaded");
        Ok(())
    }

    /// Replaces the contents of this index with a read-only mapping of the
    /// file at `path`.
    ///
    /// # Errors
    ///
    /// See [`Index::load`].
    pub fn view<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let snapshot = persistence::view(path)?;
        self.install(snapshot)?;
        tracing::info!(path = %path.display(), size = self.size(), "Index view established");
        Ok(())
    }

    fn install(&self, snapshot: Snapshot) -> Result<()> {
        snapshot.header.check_compatible(&self.config)?;
        let mut state = self.state.write();
        self.expansion_add
            .store(snapshot.header.expansion_add, Ordering::Relaxed);
        self.expansion_search
            .store(snapshot.header.expansion_search, Ordering::Relaxed);
        *state = snapshot.into();
        Ok(())
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Number of live vectors.
    #[must_use]
    pub fn size(&self) -> usize {
        self.state.read().labels.len()
    }

    /// Returns true if no vector is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Number of node slots, including those held by removed vectors.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.state.read().graph.store().capacity()
    }

    /// Number of components per vector.
    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    /// Max links per node on layers ≥ 1.
    #[must_use]
    pub fn connectivity(&self) -> usize {
        self.state.read().graph.connectivity()
    }

    /// Beam width used by inserts.
    #[must_use]
    pub fn expansion_add(&self) -> usize {
        self.expansion_add.load(Ordering::Relaxed)
    }

    /// Beam width used by searches.
    #[must_use]
    pub fn expansion_search(&self) -> usize {
        self.expansion_search.load(Ordering::Relaxed)
    }

    /// Changes the search beam width; takes effect for subsequent searches.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for 0.
    pub fn set_expansion_search(&self, expansion: usize) -> Result<()> {
        if expansion == 0 {
            return Err(Error::InvalidConfig(
                "expansion_search must be greater than 0".to_string(),
            ));
        }
        self.expansion_search.store(expansion, Ordering::Relaxed);
        Ok(())
    }

    /// Distance function family.
    #[must_use]
    pub fn metric(&self) -> MetricKind {
        self.config.metric
    }

    /// Storage encoding of vectors.
    #[must_use]
    pub fn scalar(&self) -> ScalarKind {
        self.config.scalar
    }

    /// Returns true if the index serves a read-only mapped file.
    #[must_use]
    pub fn is_view(&self) -> bool {
        self.state.read().graph.store().is_mapped()
    }

    /// Current configuration, reflecting capacity growth and tuning changes.
    #[must_use]
    pub fn config(&self) -> IndexConfig {
        let state = self.state.read();
        IndexConfig {
            connectivity: state.graph.connectivity(),
            capacity: state.graph.store().capacity(),
            expansion_add: self.expansion_add(),
            expansion_search: self.expansion_search(),
            ..self.config.clone()
        }
    }

    fn expansion(&self) -> Expansion {
        Expansion {
            add: self.expansion_add(),
            search: self.expansion_search(),
        }
    }

    /// Validates an input vector and converts it to the index encoding.
    fn encode_input<'b>(&self, bytes: &'b [u8], scalar: ScalarKind) -> Result<Cow<'b, [u8]>> {
        if scalar.is_binary() != self.config.scalar.is_binary() {
            return Err(Error::UnsupportedCombination {
                metric: self.config.metric,
                scalar,
            });
        }
        scalar.check_len(bytes, self.config.dimensions)?;
        Ok(self
            .config
            .scalar
            .convert(scalar, bytes, self.config.dimensions))
    }
}

fn pool(cell: &OnceLock<ThreadPool>, threads: usize) -> Result<&ThreadPool> {
    if let Some(pool) = cell.get() {
        return Ok(pool);
    }
    let pool = ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| Error::AllocationFailure(e.to_string()))?;
    Ok(cell.get_or_init(|| pool))
}
