//! Scalar encodings for stored vectors.
//!
//! Every index stores its vectors in exactly one [`ScalarKind`]. Callers may
//! hand in vectors of any kind; they are converted through the canonical
//! `f32` representation before insertion or search.
//!
//! # Memory per dimension
//!
//! | Kind | Bytes | Notes                                   |
//! |------|-------|-----------------------------------------|
//! | f64  | 8     | full double precision                   |
//! | f32  | 4     | default                                 |
//! | f16  | 2     | IEEE 754 half precision                 |
//! | f8   | 1     | fixed point, `byte / 100`, range ±1.27  |
//! | b1   | 1/8   | one bit per dimension, MSB first        |
//!
//! All multi-byte values are little-endian so files are portable and the
//! distance kernels never depend on buffer alignment.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use half::f16;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Fixed-point scale of the `f8` encoding.
const F8_SCALE: f32 = 100.0;

/// Storage encoding of vector components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarKind {
    /// 32-bit float (4 bytes per dimension).
    #[default]
    F32,
    /// 64-bit float (8 bytes per dimension).
    F64,
    /// 16-bit IEEE half float (2 bytes per dimension).
    F16,
    /// 8-bit fixed-point float for normalized vectors (1 byte per dimension).
    F8,
    /// Packed bits (8 dimensions per byte).
    B1,
}

impl ScalarKind {
    /// All kinds, in tag order.
    pub const ALL: [Self; 5] = [Self::F32, Self::F64, Self::F16, Self::F8, Self::B1];

    /// Stable on-disk tag.
    #[must_use]
    pub const fn tag(self) -> u8 {
        match self {
            Self::F32 => 0,
            Self::F64 => 1,
            Self::F16 => 2,
            Self::F8 => 3,
            Self::B1 => 4,
        }
    }

    /// Inverse of [`ScalarKind::tag`].
    #[must_use]
    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::F32),
            1 => Some(Self::F64),
            2 => Some(Self::F16),
            3 => Some(Self::F8),
            4 => Some(Self::B1),
            _ => None,
        }
    }

    /// Canonical lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::F16 => "f16",
            Self::F8 => "f8",
            Self::B1 => "b1",
        }
    }

    /// Returns true for the bit-packed encoding.
    #[must_use]
    pub const fn is_binary(self) -> bool {
        matches!(self, Self::B1)
    }

    /// Number of bytes needed to store a vector of `dimensions` components.
    #[must_use]
    pub const fn bytes_for(self, dimensions: usize) -> usize {
        match self {
            Self::F64 => dimensions * 8,
            Self::F32 => dimensions * 4,
            Self::F16 => dimensions * 2,
            Self::F8 => dimensions,
            Self::B1 => dimensions.div_ceil(8),
        }
    }

    /// Encodes canonical `f32` components into this kind.
    ///
    /// Binary encoding sets a bit for every strictly positive component.
    #[must_use]
    pub fn encode(self, src: &[f32]) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.bytes_for(src.len()));
        match self {
            Self::F32 => src.iter().for_each(|v| out.extend_from_slice(&v.to_le_bytes())),
            Self::F64 => src
                .iter()
                .for_each(|v| out.extend_from_slice(&f64::from(*v).to_le_bytes())),
            Self::F16 => src
                .iter()
                .for_each(|v| out.extend_from_slice(&f16::from_f32(*v).to_le_bytes())),
            Self::F8 => out.extend(src.iter().map(|v| encode_f8(*v) as u8)),
            Self::B1 => {
                out.resize(self.bytes_for(src.len()), 0);
                for (i, v) in src.iter().enumerate() {
                    if *v > 0.0 {
                        out[i / 8] |= 0x80 >> (i % 8);
                    }
                }
            }
        }
        out
    }

    /// Decodes `dimensions` components from bytes of this kind.
    ///
    /// # Panics
    ///
    /// Panics if `src` is shorter than [`ScalarKind::bytes_for`].
    #[must_use]
    pub fn decode(self, src: &[u8], dimensions: usize) -> Vec<f32> {
        let src = &src[..self.bytes_for(dimensions)];
        match self {
            Self::F32 => src.chunks_exact(4).map(F32Lanes::load).map(|v| v as f32).collect(),
            Self::F64 => src.chunks_exact(8).map(F64Lanes::load).map(|v| v as f32).collect(),
            Self::F16 => src.chunks_exact(2).map(F16Lanes::load).map(|v| v as f32).collect(),
            Self::F8 => src.iter().map(|b| f32::from(*b as i8) / F8_SCALE).collect(),
            Self::B1 => (0..dimensions)
                .map(|i| {
                    if src[i / 8] & (0x80 >> (i % 8)) != 0 {
                        1.0
                    } else {
                        0.0
                    }
                })
                .collect(),
        }
    }

    /// Converts an encoded vector from `from` into `self`.
    ///
    /// Borrows when the kinds already agree.
    #[must_use]
    pub fn convert<'a>(self, from: Self, src: &'a [u8], dimensions: usize) -> Cow<'a, [u8]> {
        if from == self {
            Cow::Borrowed(src)
        } else {
            Cow::Owned(self.encode(&from.decode(src, dimensions)))
        }
    }

    /// Validates that `bytes` holds exactly one vector of `dimensions`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] with the component count implied
    /// by the buffer length.
    pub fn check_len(self, bytes: &[u8], dimensions: usize) -> Result<()> {
        let expected = self.bytes_for(dimensions);
        if bytes.len() == expected {
            return Ok(());
        }
        let actual = match self {
            Self::B1 => bytes.len() * 8,
            _ => bytes.len() / self.bytes_for(1),
        };
        Err(Error::DimensionMismatch {
            expected: dimensions,
            actual,
        })
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ScalarKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "f32" | "float32" | "float" => Ok(Self::F32),
            "f64" | "float64" | "double" => Ok(Self::F64),
            "f16" | "float16" | "half" => Ok(Self::F16),
            "f8" | "i8" | "int8" => Ok(Self::F8),
            "b1" | "b1x8" | "bits" | "binary" => Ok(Self::B1),
            other => Err(Error::InvalidConfig(format!("unknown scalar kind '{other}'"))),
        }
    }
}

#[inline]
fn encode_f8(v: f32) -> i8 {
    (v * F8_SCALE).round().clamp(-127.0, 127.0) as i8
}

// =============================================================================
// Lane readers used by the distance kernels
// =============================================================================

/// Reads one component from its little-endian bytes.
pub(crate) trait Lanes {
    /// Bytes per component.
    const WIDTH: usize;

    fn load(chunk: &[u8]) -> f64;

    #[inline]
    fn iter<'a>(bytes: &'a [u8]) -> impl Iterator<Item = f64> + 'a
    where
        Self: 'a,
    {
        bytes.chunks_exact(Self::WIDTH).map(Self::load)
    }
}

pub(crate) struct F32Lanes;
pub(crate) struct F64Lanes;
pub(crate) struct F16Lanes;
pub(crate) struct F8Lanes;

impl Lanes for F32Lanes {
    const WIDTH: usize = 4;

    #[inline]
    fn load(chunk: &[u8]) -> f64 {
        f64::from(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
    }
}

impl Lanes for F64Lanes {
    const WIDTH: usize = 8;

    #[inline]
    fn load(chunk: &[u8]) -> f64 {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&chunk[..8]);
        f64::from_le_bytes(raw)
    }
}

impl Lanes for F16Lanes {
    const WIDTH: usize = 2;

    #[inline]
    fn load(chunk: &[u8]) -> f64 {
        f16::from_le_bytes([chunk[0], chunk[1]]).to_f64()
    }
}

impl Lanes for F8Lanes {
    const WIDTH: usize = 1;

    #[inline]
    fn load(chunk: &[u8]) -> f64 {
        f64::from(chunk[0] as i8) / f64::from(F8_SCALE)
    }
}

// =============================================================================
// Typed borrowed input
// =============================================================================

/// A borrowed vector in one of the supported scalar kinds.
///
/// This is the typed entry point for `add`/`search`; raw byte buffers go
/// through the `*_bytes` variants of those operations instead.
#[derive(Debug, Clone, Copy)]
pub enum VectorRef<'a> {
    /// Single precision components.
    F32(&'a [f32]),
    /// Double precision components.
    F64(&'a [f64]),
    /// Half precision components.
    F16(&'a [f16]),
    /// Fixed-point `f8` components (`value * 100`).
    F8(&'a [i8]),
    /// Bit-packed components, MSB first.
    B1(&'a [u8]),
}

impl<'a> VectorRef<'a> {
    /// Scalar kind of the borrowed data.
    #[must_use]
    pub const fn kind(&self) -> ScalarKind {
        match self {
            Self::F32(_) => ScalarKind::F32,
            Self::F64(_) => ScalarKind::F64,
            Self::F16(_) => ScalarKind::F16,
            Self::F8(_) => ScalarKind::F8,
            Self::B1(_) => ScalarKind::B1,
        }
    }

    /// Little-endian bytes in this vector's own kind.
    #[must_use]
    pub fn to_bytes(&self) -> Cow<'a, [u8]> {
        match *self {
            Self::F32(v) => Cow::Owned(v.iter().flat_map(|x| x.to_le_bytes()).collect()),
            Self::F64(v) => Cow::Owned(v.iter().flat_map(|x| x.to_le_bytes()).collect()),
            Self::F16(v) => Cow::Owned(v.iter().flat_map(|x| x.to_le_bytes()).collect()),
            Self::F8(v) => Cow::Owned(v.iter().map(|x| *x as u8).collect()),
            Self::B1(v) => Cow::Borrowed(v),
        }
    }
}

impl<'a> From<&'a [f32]> for VectorRef<'a> {
    fn from(v: &'a [f32]) -> Self {
        Self::F32(v)
    }
}

impl<'a> From<&'a Vec<f32>> for VectorRef<'a> {
    fn from(v: &'a Vec<f32>) -> Self {
        Self::F32(v)
    }
}

impl<'a, const N: usize> From<&'a [f32; N]> for VectorRef<'a> {
    fn from(v: &'a [f32; N]) -> Self {
        Self::F32(v)
    }
}

impl<'a> From<&'a [f64]> for VectorRef<'a> {
    fn from(v: &'a [f64]) -> Self {
        Self::F64(v)
    }
}

impl<'a> From<&'a Vec<f64>> for VectorRef<'a> {
    fn from(v: &'a Vec<f64>) -> Self {
        Self::F64(v)
    }
}

impl<'a> From<&'a [f16]> for VectorRef<'a> {
    fn from(v: &'a [f16]) -> Self {
        Self::F16(v)
    }
}

impl<'a> From<&'a [i8]> for VectorRef<'a> {
    fn from(v: &'a [i8]) -> Self {
        Self::F8(v)
    }
}
