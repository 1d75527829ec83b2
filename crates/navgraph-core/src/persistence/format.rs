//! On-disk layout.
//!
//! ```text
//! header   88 bytes, see `Header`
//! offsets  size × u64, absolute offset of each node record
//! records  label u64 | level u32 | vector (stride bytes)
//!          | for each layer 0..=level: count u32, count × u32 ids
//! ```
//!
//! All integers are little-endian.

use crate::config::{IndexConfig, MAX_CAPACITY};
use crate::error::{Error, Result};
use crate::graph::MAX_LEVEL;
use crate::metric::MetricKind;
use crate::scalar::ScalarKind;

/// File magic.
pub const MAGIC: &[u8; 8] = b"NAVGRAPH";

/// Current format version.
pub const VERSION: u32 = 1;

/// Size of the fixed header.
pub const HEADER_LEN: usize = 88;

const NO_ENTRY: u64 = u64::MAX;

/// Fixed-size file header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Header {
    pub metric: MetricKind,
    pub scalar: ScalarKind,
    pub dimensions: usize,
    pub connectivity: usize,
    pub expansion_add: usize,
    pub expansion_search: usize,
    pub capacity: usize,
    pub size: usize,
    pub entry: Option<usize>,
    pub max_level: usize,
    pub seed: u64,
}

impl Header {
    pub(crate) fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0..8].copy_from_slice(MAGIC);
        out[8..12].copy_from_slice(&VERSION.to_le_bytes());
        out[12] = self.metric.tag();
        out[13] = self.scalar.tag();
        put_u64(&mut out, 16, self.dimensions as u64);
        put_u64(&mut out, 24, self.connectivity as u64);
        put_u64(&mut out, 32, self.expansion_add as u64);
        put_u64(&mut out, 40, self.expansion_search as u64);
        put_u64(&mut out, 48, self.capacity as u64);
        put_u64(&mut out, 56, self.size as u64);
        put_u64(&mut out, 64, self.entry.map_or(NO_ENTRY, |e| e as u64));
        out[72..76].copy_from_slice(&(self.max_level as u32).to_le_bytes());
        put_u64(&mut out, 80, self.seed);
        out
    }

    /// Parses and validates a header.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] on bad magic, unknown version or
    /// tags, or inconsistent fields.
    pub(crate) fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(Error::corrupt(format!(
                "file is {} bytes, shorter than the {HEADER_LEN}-byte header",
                bytes.len()
            )));
        }
        if &bytes[0..8] != MAGIC {
            return Err(Error::corrupt("bad magic"));
        }
        let version = read_u32(bytes, 8)?;
        if version != VERSION {
            return Err(Error::corrupt(format!("unsupported format version {version}")));
        }
        let metric = MetricKind::from_tag(bytes[12])
            .ok_or_else(|| Error::corrupt(format!("unknown metric tag {}", bytes[12])))?;
        let scalar = ScalarKind::from_tag(bytes[13])
            .ok_or_else(|| Error::corrupt(format!("unknown scalar tag {}", bytes[13])))?;

        let entry = read_u64(bytes, 64)?;
        let header = Self {
            metric,
            scalar,
            dimensions: read_usize(bytes, 16)?,
            connectivity: read_usize(bytes, 24)?,
            expansion_add: read_usize(bytes, 32)?,
            expansion_search: read_usize(bytes, 40)?,
            capacity: read_usize(bytes, 48)?,
            size: read_usize(bytes, 56)?,
            entry: if entry == NO_ENTRY {
                None
            } else {
                Some(to_usize(entry)?)
            },
            max_level: read_u32(bytes, 72)? as usize,
            seed: read_u64(bytes, 80)?,
        };
        header.validate()?;
        Ok(header)
    }

    fn validate(&self) -> Result<()> {
        if self.dimensions == 0 || self.dimensions > u32::MAX as usize {
            return Err(Error::corrupt(format!(
                "dimensions {} out of range",
                self.dimensions
            )));
        }
        if self.connectivity < 2 {
            return Err(Error::corrupt(format!(
                "connectivity {} is below 2",
                self.connectivity
            )));
        }
        if self.expansion_add == 0 || self.expansion_search == 0 {
            return Err(Error::corrupt(format!(
                "expansion factors ({}, {}) must be greater than 0",
                self.expansion_add, self.expansion_search
            )));
        }
        if self.capacity > MAX_CAPACITY {
            return Err(Error::corrupt(format!(
                "capacity {} exceeds {MAX_CAPACITY}",
                self.capacity
            )));
        }
        if self.size > self.capacity {
            return Err(Error::corrupt(format!(
                "size {} exceeds capacity {}",
                self.size, self.capacity
            )));
        }
        if self.max_level > MAX_LEVEL {
            return Err(Error::corrupt(format!(
                "max level {} exceeds {MAX_LEVEL}",
                self.max_level
            )));
        }
        match self.entry {
            None if self.size > 0 => Err(Error::corrupt("non-empty graph without entry point")),
            Some(entry) if entry >= self.size => Err(Error::corrupt(format!(
                "entry point {entry} out of range for size {}",
                self.size
            ))),
            _ => Ok(()),
        }
    }

    /// Bytes per stored vector.
    pub(crate) fn stride(&self) -> usize {
        self.scalar.bytes_for(self.dimensions)
    }

    /// Link bound for a layer.
    pub(crate) fn max_links(&self, layer: usize) -> usize {
        if layer == 0 {
            self.connectivity * 2
        } else {
            self.connectivity
        }
    }

    /// Byte range of the offset table.
    pub(crate) fn offsets_end(&self) -> Result<usize> {
        self.size
            .checked_mul(8)
            .and_then(|n| n.checked_add(HEADER_LEN))
            .ok_or_else(|| Error::corrupt("offset table overflows"))
    }

    /// Configuration recorded in the file.
    pub(crate) fn config(&self) -> IndexConfig {
        IndexConfig {
            metric: self.metric,
            scalar: self.scalar,
            dimensions: self.dimensions,
            connectivity: self.connectivity,
            expansion_add: self.expansion_add,
            expansion_search: self.expansion_search,
            capacity: self.capacity,
            seed: self.seed,
            ..IndexConfig::default()
        }
    }

    /// Checks the fields an existing index cannot change.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigMismatch`] naming the first differing field.
    pub(crate) fn check_compatible(&self, expected: &IndexConfig) -> Result<()> {
        if self.dimensions != expected.dimensions {
            return Err(mismatch("dimensions", expected.dimensions, self.dimensions));
        }
        if self.metric != expected.metric {
            return Err(mismatch("metric", expected.metric, self.metric));
        }
        if self.scalar != expected.scalar {
            return Err(mismatch("scalar", expected.scalar, self.scalar));
        }
        Ok(())
    }
}

fn mismatch(field: &'static str, expected: impl ToString, found: impl ToString) -> Error {
    Error::ConfigMismatch {
        field,
        expected: expected.to_string(),
        found: found.to_string(),
    }
}

/// A node record borrowed from file bytes.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Record<'a> {
    pub label: u64,
    pub level: usize,
    pub vector: &'a [u8],
    /// Bytes from the first neighbor count to the end of the file.
    links: &'a [u8],
}

impl<'a> Record<'a> {
    /// Reads the fixed part of the record at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if the record does not fit or its
    /// level is out of range.
    pub(crate) fn at(bytes: &'a [u8], offset: usize, stride: usize) -> Result<Self> {
        if offset < HEADER_LEN || offset >= bytes.len() {
            return Err(Error::corrupt(format!("record offset {offset} out of bounds")));
        }
        let label = read_u64(bytes, offset)?;
        let level = read_u32(bytes, offset + 8)? as usize;
        if level > MAX_LEVEL {
            return Err(Error::corrupt(format!("node level {level} exceeds {MAX_LEVEL}")));
        }
        let start = offset + 12;
        let vector = bytes
            .get(start..start + stride)
            .ok_or_else(|| Error::corrupt(format!("vector at {start} runs past end of file")))?;
        Ok(Self {
            label,
            level,
            vector,
            links: &bytes[start + stride..],
        })
    }

    /// Raw id bytes of one layer, `None` if the node does not reach it or
    /// the list is truncated.
    pub(crate) fn layer(&self, layer: usize) -> Option<&'a [u8]> {
        if layer > self.level {
            return None;
        }
        let mut pos = 0usize;
        for current in 0..=layer {
            let count = read_u32(self.links, pos).ok()? as usize;
            let ids = self.links.get(pos + 4..pos + 4 + count * 4)?;
            if current == layer {
                return Some(ids);
            }
            pos += 4 + count * 4;
        }
        None
    }
}

/// Decodes packed little-endian `u32` ids.
pub(crate) fn ids(bytes: &[u8]) -> impl Iterator<Item = usize> + '_ {
    bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]) as usize)
}

fn put_u64(out: &mut [u8], pos: usize, value: u64) {
    out[pos..pos + 8].copy_from_slice(&value.to_le_bytes());
}

pub(crate) fn read_u32(bytes: &[u8], pos: usize) -> Result<u32> {
    bytes
        .get(pos..pos + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| Error::corrupt(format!("unexpected end of file at byte {pos}")))
}

pub(crate) fn read_u64(bytes: &[u8], pos: usize) -> Result<u64> {
    let b = bytes
        .get(pos..pos + 8)
        .ok_or_else(|| Error::corrupt(format!("unexpected end of file at byte {pos}")))?;
    let mut word = [0u8; 8];
    word.copy_from_slice(b);
    Ok(u64::from_le_bytes(word))
}

fn read_usize(bytes: &[u8], pos: usize) -> Result<usize> {
    to_usize(read_u64(bytes, pos)?)
}

fn to_usize(value: u64) -> Result<usize> {
    usize::try_from(value).map_err(|_| Error::corrupt(format!("value {value} overflows usize")))
}
