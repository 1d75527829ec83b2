//! Index configuration.
//!
//! Provides configuration via `navgraph.toml`, environment variables and
//! code.
//!
//! # Priority (highest to lowest)
//!
//! 1. Environment variables (`NAVGRAPH_*`)
//! 2. Configuration file (`navgraph.toml`)
//! 3. Default values
//!
//! ```toml
//! metric = "cos"
//! scalar = "f16"
//! dimensions = 768
//! connectivity = 16
//! expansion_add = 128
//! expansion_search = 64
//! capacity = 100000
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::metric::{Metric, MetricKind};
use crate::scalar::ScalarKind;

/// Largest supported capacity: neighbor ids are persisted as `u32`.
pub const MAX_CAPACITY: usize = u32::MAX as usize;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to parse configuration.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Invalid configuration value.
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue {
        /// Configuration key that failed validation.
        key: String,
        /// Validation error message.
        message: String,
    },
}

/// Configuration of one index.
///
/// `dimensions`, `metric` and `scalar` are fixed for the lifetime of the
/// index; the rest can be tuned per instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Distance function.
    pub metric: MetricKind,
    /// Storage encoding of vector components.
    pub scalar: ScalarKind,
    /// Number of components per vector.
    pub dimensions: usize,
    /// Max neighbors per node on layers ≥ 1 (`M`); layer 0 allows `2 * M`.
    pub connectivity: usize,
    /// Beam width while inserting (`efConstruction`).
    pub expansion_add: usize,
    /// Beam width while searching (`efSearch`).
    pub expansion_search: usize,
    /// Initial number of node slots.
    pub capacity: usize,
    /// Worker threads for batch inserts (0 = available parallelism).
    pub threads_add: usize,
    /// Worker threads for batch searches (0 = available parallelism).
    pub threads_search: usize,
    /// Seed of the level-drawing PRNG.
    pub seed: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            metric: MetricKind::Ip,
            scalar: ScalarKind::F32,
            dimensions: 0,
            connectivity: 16,
            expansion_add: 128,
            expansion_search: 64,
            capacity: 0,
            threads_add: 0,
            threads_search: 0,
            seed: 0x5DEE_CE66_D1A4_B5B5,
        }
    }
}

impl IndexConfig {
    /// Creates a configuration with default tuning.
    #[must_use]
    pub fn new(metric: MetricKind, scalar: ScalarKind, dimensions: usize) -> Self {
        Self {
            metric,
            scalar,
            dimensions,
            ..Self::default()
        }
    }

    /// Sets the connectivity (`M`).
    #[must_use]
    pub fn with_connectivity(mut self, connectivity: usize) -> Self {
        self.connectivity = connectivity;
        self
    }

    /// Sets both expansion factors.
    #[must_use]
    pub fn with_expansion(mut self, expansion_add: usize, expansion_search: usize) -> Self {
        self.expansion_add = expansion_add;
        self.expansion_search = expansion_search;
        self
    }

    /// Sets the initial capacity.
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the batch worker counts.
    #[must_use]
    pub fn with_threads(mut self, threads_add: usize, threads_search: usize) -> Self {
        self.threads_add = threads_add;
        self.threads_search = threads_search;
        self
    }

    /// Sets the level-drawing seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Loads configuration from `navgraph.toml` and the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration parsing fails.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("navgraph.toml")
    }

    /// Loads configuration from a specific file path.
    ///
    /// Priority: defaults < file < environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration parsing fails.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("NAVGRAPH_"));

        figment
            .extract()
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Creates a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::string(toml_str));

        figment
            .extract()
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Serializes the configuration to TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Validates value ranges.
    ///
    /// Metric/scalar compatibility is checked separately by
    /// [`IndexConfig::resolve_metric`] so that it surfaces with its own
    /// error kind.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dimensions == 0 {
            return Err(invalid("dimensions", "must be greater than 0"));
        }
        if self.connectivity < 2 {
            return Err(invalid(
                "connectivity",
                &format!("value {} must be at least 2", self.connectivity),
            ));
        }
        if self.expansion_add == 0 {
            return Err(invalid("expansion_add", "must be greater than 0"));
        }
        if self.expansion_search == 0 {
            return Err(invalid("expansion_search", "must be greater than 0"));
        }
        if self.capacity > MAX_CAPACITY {
            return Err(invalid(
                "capacity",
                &format!("value {} exceeds {MAX_CAPACITY}", self.capacity),
            ));
        }
        Ok(())
    }

    /// Resolves the bound distance function for this configuration.
    ///
    /// # Errors
    ///
    /// See [`Metric::resolve`].
    pub fn resolve_metric(&self) -> crate::Result<Metric> {
        Metric::resolve(self.metric, self.scalar, self.dimensions)
    }

    /// Effective worker count for batch inserts.
    #[must_use]
    pub fn effective_threads_add(&self) -> usize {
        effective_threads(self.threads_add)
    }

    /// Effective worker count for batch searches.
    #[must_use]
    pub fn effective_threads_search(&self) -> usize {
        effective_threads(self.threads_search)
    }

    /// Bytes occupied by one stored vector.
    #[must_use]
    pub fn vector_bytes(&self) -> usize {
        self.scalar.bytes_for(self.dimensions)
    }
}

fn invalid(key: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}

fn effective_threads(requested: usize) -> usize {
    if requested == 0 {
        std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
    } else {
        requested
    }
}
