//! # `navgraph` Core
//!
//! Approximate nearest-neighbor search over a hierarchical navigable
//! small-world (HNSW) graph.
//!
//! Vectors are registered under caller-chosen `u64` labels and stored in one
//! of five scalar encodings. Queries return the `k` closest labels under one
//! of nine distance metrics, resolved once per index into a plain function
//! pointer.
//!
//! ## Features
//!
//! - **Scalars**: `f64`, `f32`, `f16`, `f8` (hundredths fixed point), `b1`
//!   (packed bits)
//! - **Metrics**: inner product, squared L2, cosine, haversine, Pearson,
//!   Jaccard, Hamming, Tanimoto, Sørensen–Dice
//! - **Concurrency**: inserts and searches share the index through `&self`
//!   with per-node neighbor locks; batch calls run on per-index thread pools
//! - **Persistence**: flat little-endian file, loaded eagerly or served from
//!   a read-only memory map
//!
//! ## Quick Start
//!
//! ```rust
//! use navgraph_core::{Index, IndexConfig, MetricKind, ScalarKind};
//!
//! let config = IndexConfig::new(MetricKind::Cos, ScalarKind::F16, 3).with_capacity(100);
//! let index = Index::create(config)?;
//!
//! index.add(7, &[0.1f32, 0.9, 0.0])?;
//! index.add(8, &[0.9f32, 0.1, 0.0])?;
//!
//! let hits = index.search(&[0.0f32, 1.0, 0.0], 1)?;
//! assert_eq!(hits[0].label, 7);
//! # Ok::<(), navgraph_core::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
// Lengths and ids cross between usize, u32 (on disk) and f64 (level draws).
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::redundant_pub_crate)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::significant_drop_tightening)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
#[cfg(test)]
mod config_tests;
pub mod error;
#[cfg(test)]
mod error_tests;
mod graph;
pub mod index;
pub mod label_map;
#[cfg(test)]
mod label_map_tests;
pub mod metric;
mod node_store;
#[cfg(test)]
mod node_store_tests;
mod persistence;
pub mod scalar;
#[cfg(test)]
mod scalar_tests;

pub use config::{ConfigError, IndexConfig};
pub use error::{Error, Result};
pub use graph::MAX_LEVEL;
pub use index::{Index, SearchResult};
pub use label_map::LabelMap;
pub use metric::{DistanceFn, Metric, MetricKind};
pub use node_store::NodeId;
pub use scalar::{ScalarKind, VectorRef};
