//! Error types for `navgraph`.
//!
//! This module provides a unified error type for every engine operation,
//! designed so that foreign bindings can translate failures uniformly.

use thiserror::Error;

use crate::metric::MetricKind;
use crate::scalar::ScalarKind;

/// Result type alias for `navgraph` operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in `navgraph` operations.
///
/// Each variant includes a descriptive message suitable for end-users.
/// Error codes follow the pattern `NAVG-XXX` for easy mapping in bindings.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid index configuration (NAVG-001).
    #[error("[NAVG-001] Invalid configuration: {0}")]
    InvalidConfig(String),

    /// No distance implementation for this metric/scalar pair (NAVG-002).
    #[error("[NAVG-002] Metric '{metric}' is not supported for scalar kind '{scalar}'")]
    UnsupportedCombination {
        /// Requested metric.
        metric: MetricKind,
        /// Requested scalar kind.
        scalar: ScalarKind,
    },

    /// Dimension mismatch (NAVG-003).
    #[error("[NAVG-003] Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimension.
        expected: usize,
        /// Actual dimension.
        actual: usize,
    },

    /// Label already present in the index (NAVG-004).
    #[error("[NAVG-004] Label {0} already exists")]
    DuplicateLabel(u64),

    /// Index is full (NAVG-005).
    #[error("[NAVG-005] Capacity of {capacity} nodes exceeded, call reserve() first")]
    CapacityExceeded {
        /// Capacity at the time of the failed insert.
        capacity: usize,
    },

    /// Node storage could not be grown (NAVG-006).
    #[error("[NAVG-006] Allocation failure: {0}")]
    AllocationFailure(String),

    /// Label not found (NAVG-007).
    #[error("[NAVG-007] Label {0} not found")]
    NotFound(u64),

    /// Truncated or corrupt index file (NAVG-008).
    #[error("[NAVG-008] Serialization error: {0}")]
    Serialization(String),

    /// File header conflicts with the index configuration (NAVG-009).
    #[error("[NAVG-009] Config mismatch on '{field}': index has {expected}, file has {found}")]
    ConfigMismatch {
        /// Header field that differs.
        field: &'static str,
        /// Value held by the index.
        expected: String,
        /// Value found in the file.
        found: String,
    },

    /// Mutation attempted on a memory-mapped view (NAVG-010).
    #[error("[NAVG-010] Index is a read-only view, '{0}' is not allowed")]
    ReadOnly(&'static str),

    /// IO error (NAVG-011).
    #[error("[NAVG-011] IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns the error code (e.g., "NAVG-001").
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig(_) => "NAVG-001",
            Self::UnsupportedCombination { .. } => "NAVG-002",
            Self::DimensionMismatch { .. } => "NAVG-003",
            Self::DuplicateLabel(_) => "NAVG-004",
            Self::CapacityExceeded { .. } => "NAVG-005",
            Self::AllocationFailure(_) => "NAVG-006",
            Self::NotFound(_) => "NAVG-007",
            Self::Serialization(_) => "NAVG-008",
            Self::ConfigMismatch { .. } => "NAVG-009",
            Self::ReadOnly(_) => "NAVG-010",
            Self::Io(_) => "NAVG-011",
        }
    }

    /// Returns true if this error is recoverable.
    ///
    /// A corrupt file is the only outcome the caller cannot fix by changing
    /// its inputs or calling `reserve`.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Serialization(_))
    }

    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }
}

impl From<crate::config::ConfigError> for Error {
    fn from(err: crate::config::ConfigError) -> Self {
        Self::InvalidConfig(err.to_string())
    }
}
