//! Distance metrics over encoded vectors.
//!
//! A [`Metric`] is resolved once per index from a `(MetricKind, ScalarKind)`
//! pair into a plain function pointer that reads both operands directly from
//! their stored bytes. The graph never branches on the metric while
//! traversing.
//!
//! All metrics follow the "smaller is closer" convention:
//!
//! | Metric      | Distance                                   | Scalars        |
//! |-------------|--------------------------------------------|----------------|
//! | `ip`        | `1 - a·b`                                  | f64/f32/f16/f8 |
//! | `l2sq`      | `Σ (a_i - b_i)²`                           | f64/f32/f16/f8 |
//! | `cos`       | `1 - a·b / (|a| |b|)`                      | f64/f32/f16/f8 |
//! | `pearson`   | `1 - r(a, b)`                              | f64/f32/f16/f8 |
//! | `haversine` | central angle between `(lat, lon)` radians | f64/f32/f16/f8 |
//! | `hamming`   | `popcount(a ^ b)`                          | b1             |
//! | `jaccard`   | `1 - |a ∧ b| / |a ∨ b|`                    | b1             |
//! | `tanimoto`  | same as `jaccard` on bit sets              | b1             |
//! | `sorensen`  | `1 - 2|a ∧ b| / (|a| + |b|)`               | b1             |
//!
//! `ip` is only non-negative for normalized inputs.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::scalar::{F16Lanes, F32Lanes, F64Lanes, F8Lanes, Lanes, ScalarKind};

/// Distance kernel over two encoded vectors of equal length.
pub type DistanceFn = fn(&[u8], &[u8]) -> f32;

/// Distance function family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Inner product (`1 - a·b`).
    #[default]
    Ip,
    /// Squared Euclidean distance.
    L2sq,
    /// Cosine distance.
    Cos,
    /// Great-circle distance between `(lat, lon)` pairs in radians.
    Haversine,
    /// Pearson correlation distance.
    Pearson,
    /// Jaccard distance over bit sets.
    Jaccard,
    /// Number of differing bits.
    Hamming,
    /// Tanimoto distance over bit sets.
    Tanimoto,
    /// Sørensen–Dice distance over bit sets.
    Sorensen,
}

impl MetricKind {
    /// All kinds, in tag order.
    pub const ALL: [Self; 9] = [
        Self::Ip,
        Self::L2sq,
        Self::Cos,
        Self::Haversine,
        Self::Pearson,
        Self::Jaccard,
        Self::Hamming,
        Self::Tanimoto,
        Self::Sorensen,
    ];

    /// Stable on-disk tag.
    #[must_use]
    pub const fn tag(self) -> u8 {
        match self {
            Self::Ip => 0,
            Self::L2sq => 1,
            Self::Cos => 2,
            Self::Haversine => 3,
            Self::Pearson => 4,
            Self::Jaccard => 5,
            Self::Hamming => 6,
            Self::Tanimoto => 7,
            Self::Sorensen => 8,
        }
    }

    /// Inverse of [`MetricKind::tag`].
    #[must_use]
    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Ip),
            1 => Some(Self::L2sq),
            2 => Some(Self::Cos),
            3 => Some(Self::Haversine),
            4 => Some(Self::Pearson),
            5 => Some(Self::Jaccard),
            6 => Some(Self::Hamming),
            7 => Some(Self::Tanimoto),
            8 => Some(Self::Sorensen),
            _ => None,
        }
    }

    /// Canonical lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ip => "ip",
            Self::L2sq => "l2sq",
            Self::Cos => "cos",
            Self::Haversine => "haversine",
            Self::Pearson => "pearson",
            Self::Jaccard => "jaccard",
            Self::Hamming => "hamming",
            Self::Tanimoto => "tanimoto",
            Self::Sorensen => "sorensen",
        }
    }

    /// Returns true for metrics defined over bit sets.
    #[must_use]
    pub const fn is_binary(self) -> bool {
        matches!(
            self,
            Self::Jaccard | Self::Hamming | Self::Tanimoto | Self::Sorensen
        )
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MetricKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ip" | "inner_product" | "dot" => Ok(Self::Ip),
            "l2sq" | "l2_sq" | "euclidean_sq" => Ok(Self::L2sq),
            "cos" | "cosine" | "angular" => Ok(Self::Cos),
            "haversine" => Ok(Self::Haversine),
            "pearson" => Ok(Self::Pearson),
            "jaccard" => Ok(Self::Jaccard),
            "hamming" => Ok(Self::Hamming),
            "tanimoto" => Ok(Self::Tanimoto),
            "sorensen" | "dice" => Ok(Self::Sorensen),
            other => Err(Error::InvalidConfig(format!("unknown metric '{other}'"))),
        }
    }
}

/// Picks the monomorphized float kernel for a non-binary scalar kind.
macro_rules! float_kernel {
    ($scalar:expr, $f:ident, $unsupported:expr) => {
        match $scalar {
            ScalarKind::F32 => $f::<F32Lanes>,
            ScalarKind::F64 => $f::<F64Lanes>,
            ScalarKind::F16 => $f::<F16Lanes>,
            ScalarKind::F8 => $f::<F8Lanes>,
            ScalarKind::B1 => return Err($unsupported),
        }
    };
}

/// A metric bound to one scalar kind and dimensionality.
#[derive(Debug, Clone, Copy)]
pub struct Metric {
    kind: MetricKind,
    scalar: ScalarKind,
    dimensions: usize,
    kernel: DistanceFn,
}

impl Metric {
    /// Resolves the distance kernel for a metric/scalar pair.
    ///
    /// # Errors
    ///
    /// - [`Error::UnsupportedCombination`] if the pair has no kernel.
    /// - [`Error::DimensionMismatch`] for `haversine` with dimensions != 2.
    pub fn resolve(kind: MetricKind, scalar: ScalarKind, dimensions: usize) -> Result<Self> {
        let unsupported = Error::UnsupportedCombination {
            metric: kind,
            scalar,
        };
        if kind.is_binary() != scalar.is_binary() {
            return Err(unsupported);
        }
        if kind == MetricKind::Haversine && dimensions != 2 {
            return Err(Error::DimensionMismatch {
                expected: 2,
                actual: dimensions,
            });
        }

        let kernel: DistanceFn = match kind {
            MetricKind::Ip => float_kernel!(scalar, ip, unsupported),
            MetricKind::L2sq => float_kernel!(scalar, l2sq, unsupported),
            MetricKind::Cos => float_kernel!(scalar, cos, unsupported),
            MetricKind::Pearson => float_kernel!(scalar, pearson, unsupported),
            MetricKind::Haversine => float_kernel!(scalar, haversine, unsupported),
            MetricKind::Hamming => hamming,
            MetricKind::Jaccard | MetricKind::Tanimoto => jaccard,
            MetricKind::Sorensen => sorensen,
        };

        Ok(Self {
            kind,
            scalar,
            dimensions,
            kernel,
        })
    }

    /// Distance between two encoded vectors.
    #[inline]
    #[must_use]
    pub fn distance(&self, a: &[u8], b: &[u8]) -> f32 {
        (self.kernel)(a, b)
    }

    /// Metric kind.
    #[must_use]
    pub const fn kind(&self) -> MetricKind {
        self.kind
    }

    /// Scalar kind both operands are encoded in.
    #[must_use]
    pub const fn scalar(&self) -> ScalarKind {
        self.scalar
    }

    /// Dimensionality the metric was resolved for.
    #[must_use]
    pub const fn dimensions(&self) -> usize {
        self.dimensions
    }
}

// =============================================================================
// Float kernels
// =============================================================================

fn ip<L: Lanes>(a: &[u8], b: &[u8]) -> f32 {
    let dot: f64 = L::iter(a).zip(L::iter(b)).map(|(x, y)| x * y).sum();
    (1.0 - dot) as f32
}

fn l2sq<L: Lanes>(a: &[u8], b: &[u8]) -> f32 {
    L::iter(a)
        .zip(L::iter(b))
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>() as f32
}

fn cos<L: Lanes>(a: &[u8], b: &[u8]) -> f32 {
    let (mut dot, mut aa, mut bb) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in L::iter(a).zip(L::iter(b)) {
        dot += x * y;
        aa += x * x;
        bb += y * y;
    }
    match (aa == 0.0, bb == 0.0) {
        (true, true) => 0.0,
        (true, false) | (false, true) => 1.0,
        _ => (1.0 - dot / (aa.sqrt() * bb.sqrt())).max(0.0) as f32,
    }
}

fn pearson<L: Lanes>(a: &[u8], b: &[u8]) -> f32 {
    let n = (a.len() / L::WIDTH) as f64;
    if n == 0.0 {
        return 0.0;
    }
    let mean_a = L::iter(a).sum::<f64>() / n;
    let mean_b = L::iter(b).sum::<f64>() / n;

    let (mut cov, mut var_a, mut var_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in L::iter(a).zip(L::iter(b)) {
        let (dx, dy) = (x - mean_a, y - mean_b);
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }
    match (var_a == 0.0, var_b == 0.0) {
        (true, true) => 0.0,
        (true, false) | (false, true) => 1.0,
        _ => (1.0 - cov / (var_a.sqrt() * var_b.sqrt())).max(0.0) as f32,
    }
}

fn haversine<L: Lanes>(a: &[u8], b: &[u8]) -> f32 {
    let mut pa = L::iter(a);
    let mut pb = L::iter(b);
    let (lat1, lon1) = (pa.next().unwrap_or(0.0), pa.next().unwrap_or(0.0));
    let (lat2, lon2) = (pb.next().unwrap_or(0.0), pb.next().unwrap_or(0.0));

    let dlat = (lat2 - lat1) / 2.0;
    let dlon = (lon2 - lon1) / 2.0;
    let h = dlat.sin().powi(2) + lat1.cos() * lat2.cos() * dlon.sin().powi(2);
    (2.0 * h.clamp(0.0, 1.0).sqrt().asin()) as f32
}

// =============================================================================
// Bit-set kernels
// =============================================================================

/// Processes packed bits eight bytes at a time.
#[inline]
fn bit_counts(a: &[u8], b: &[u8], mut visit: impl FnMut(u64, u64)) {
    let chunks_a = a.chunks_exact(8);
    let chunks_b = b.chunks_exact(8);
    let (tail_a, tail_b) = (chunks_a.remainder(), chunks_b.remainder());
    for (x, y) in chunks_a.zip(chunks_b) {
        let mut wx = [0u8; 8];
        let mut wy = [0u8; 8];
        wx.copy_from_slice(x);
        wy.copy_from_slice(y);
        visit(u64::from_le_bytes(wx), u64::from_le_bytes(wy));
    }
    for (x, y) in tail_a.iter().zip(tail_b) {
        visit(u64::from(*x), u64::from(*y));
    }
}

fn hamming(a: &[u8], b: &[u8]) -> f32 {
    let mut diff = 0u32;
    bit_counts(a, b, |x, y| diff += (x ^ y).count_ones());
    diff as f32
}

fn jaccard(a: &[u8], b: &[u8]) -> f32 {
    let (mut and, mut or) = (0u32, 0u32);
    bit_counts(a, b, |x, y| {
        and += (x & y).count_ones();
        or += (x | y).count_ones();
    });
    if or == 0 {
        0.0
    } else {
        1.0 - and as f32 / or as f32
    }
}

fn sorensen(a: &[u8], b: &[u8]) -> f32 {
    let (mut and, mut total) = (0u32, 0u32);
    bit_counts(a, b, |x, y| {
        and += (x & y).count_ones();
        total += x.count_ones() + y.count_ones();
    });
    if total == 0 {
        0.0
    } else {
        1.0 - 2.0 * and as f32 / total as f32
    }
}
