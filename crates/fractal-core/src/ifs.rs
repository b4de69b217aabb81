//! Iterated function systems: weighted sets of planar affine maps.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{FractalError, Result};
use crate::geometry::Point;

/// `x' = a·x + b·y + e`, `y' = c·x + d·y + f`, selected with weight `p`.
///
/// Serialised as the row `[a, b, c, d, e, f, p]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 7]", into = "[f64; 7]")]
pub struct AffineMap {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
    /// Raw (unnormalised) selection weight.
    pub weight: f64,
}

impl AffineMap {
    pub const fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64, weight: f64) -> Self {
        Self { a, b, c, d, e, f, weight }
    }

    #[inline]
    pub fn apply(&self, p: Point) -> Point {
        Point {
            x: self.a * p.x + self.b * p.y + self.e,
            y: self.c * p.x + self.d * p.y + self.f,
        }
    }

    /// Largest singular value of the linear part `[[a, b], [c, d]]`.
    pub fn max_stretch(&self) -> f64 {
        let s = self.a * self.a + self.b * self.b + self.c * self.c + self.d * self.d;
        let det = self.a * self.d - self.b * self.c;
        let disc = (s * s - 4.0 * det * det).max(0.0);
        ((s + disc.sqrt()) / 2.0).sqrt()
    }

    /// True when the map strictly shrinks every distance.
    pub fn is_contractive(&self) -> bool {
        self.max_stretch() < 1.0
    }
}

impl From<[f64; 7]> for AffineMap {
    fn from([a, b, c, d, e, f, weight]: [f64; 7]) -> Self {
        Self { a, b, c, d, e, f, weight }
    }
}

impl From<AffineMap> for [f64; 7] {
    fn from(m: AffineMap) -> Self {
        [m.a, m.b, m.c, m.d, m.e, m.f, m.weight]
    }
}

/// A validated, ordered, non-empty set of affine maps.
///
/// Weights are each finite and `>= 0` with at least one positive, so they
/// always normalise to a probability distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<AffineMap>", into = "Vec<AffineMap>")]
pub struct AffineMapSet {
    maps: Vec<AffineMap>,
}

impl AffineMapSet {
    pub fn new(maps: Vec<AffineMap>) -> Result<Self> {
        if maps.is_empty() {
            return Err(FractalError::InvalidConfiguration("map set is empty".into()));
        }
        for (i, m) in maps.iter().enumerate() {
            if !m.weight.is_finite() || m.weight < 0.0 {
                return Err(FractalError::InvalidConfiguration(format!(
                    "map {i} has invalid weight {}",
                    m.weight
                )));
            }
            let coeffs: [f64; 7] = (*m).into();
            if coeffs.iter().any(|v| !v.is_finite()) {
                return Err(FractalError::InvalidConfiguration(format!(
                    "map {i} has a non-finite coefficient"
                )));
            }
        }
        if max_weight(&maps) <= 0.0 {
            return Err(FractalError::InvalidConfiguration(
                "all weights are zero, cannot normalise".into(),
            ));
        }
        Ok(Self { maps })
    }

    /// Barnsley fern: stem, successively smaller leaflets, largest left and
    /// right leaflets.
    pub fn barnsley_fern() -> Self {
        Self {
            maps: vec![
                AffineMap::new(0.00, 0.00, 0.00, 0.16, 0.00, 0.00, 0.01),
                AffineMap::new(0.85, 0.04, -0.04, 0.85, 0.00, 1.60, 0.85),
                AffineMap::new(0.20, -0.26, 0.23, 0.22, 0.00, 1.60, 0.07),
                AffineMap::new(-0.15, 0.28, 0.26, 0.24, 0.00, 0.44, 0.07),
            ],
        }
    }

    /// Probability tree: trunk plus left and right branches rotated ±45°.
    pub fn probability_tree() -> Self {
        Self {
            maps: vec![
                AffineMap::new(0.0, 0.0, 0.0, 0.5, 0.0, 0.0, 0.1),
                AffineMap::new(0.42, -0.42, 0.42, 0.42, 0.0, 0.2, 0.45),
                AffineMap::new(0.42, 0.42, -0.42, 0.42, 0.0, 0.2, 0.45),
            ],
        }
    }

    pub fn maps(&self) -> &[AffineMap] {
        &self.maps
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    /// Selection probabilities: raw weights divided by their sum.
    ///
    /// Weights are first scaled by the largest one, so huge raw weights
    /// cannot overflow the sum.
    pub fn normalized_weights(&self) -> Vec<f64> {
        let max = max_weight(&self.maps);
        let scaled: Vec<f64> = self.maps.iter().map(|m| m.weight / max).collect();
        let total: f64 = scaled.iter().sum();
        scaled.into_iter().map(|w| w / total).collect()
    }

    /// Whether every map is a strict contraction. Informational only: the
    /// fern's stem map is singular yet the system still converges.
    pub fn is_contractive(&self) -> bool {
        self.maps.iter().all(AffineMap::is_contractive)
    }
}

fn max_weight(maps: &[AffineMap]) -> f64 {
    maps.iter().map(|m| m.weight).fold(0.0, f64::max)
}

impl TryFrom<Vec<AffineMap>> for AffineMapSet {
    type Error = FractalError;

    fn try_from(maps: Vec<AffineMap>) -> Result<Self> {
        Self::new(maps)
    }
}

impl From<AffineMapSet> for Vec<AffineMap> {
    fn from(set: AffineMapSet) -> Self {
        set.maps
    }
}

/// Cumulative distribution over a map set's normalised weights.
///
/// One uniform draw `u ∈ [0, 1)` selects the first index whose cumulative
/// probability exceeds `u`. Maps with zero weight are never selected.
#[derive(Debug, Clone)]
pub struct WeightedSelector {
    cumulative: Vec<f64>,
}

impl WeightedSelector {
    pub fn new(set: &AffineMapSet) -> Self {
        let weights = set.normalized_weights();
        let mut acc = 0.0;
        let mut cumulative: Vec<f64> = weights
            .iter()
            .map(|w| {
                acc += w;
                acc
            })
            .collect();
        // Pin the tail to exactly 1 from the last positive weight on, so
        // rounding cannot leak draws onto trailing zero-weight maps.
        if let Some(last) = weights.iter().rposition(|&w| w > 0.0) {
            for c in &mut cumulative[last..] {
                *c = 1.0;
            }
        }
        Self { cumulative }
    }

    #[inline]
    pub fn select(&self, u: f64) -> usize {
        self.cumulative
            .partition_point(|&c| c <= u)
            .min(self.cumulative.len() - 1)
    }
}

/// Named parameter tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IfsPreset {
    #[default]
    Fern,
    Tree,
}

impl IfsPreset {
    pub fn map_set(self) -> AffineMapSet {
        match self {
            IfsPreset::Fern => AffineMapSet::barnsley_fern(),
            IfsPreset::Tree => AffineMapSet::probability_tree(),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            IfsPreset::Fern => "fern",
            IfsPreset::Tree => "tree",
        }
    }
}

impl fmt::Display for IfsPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for IfsPreset {
    type Err = FractalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fern" | "barnsley" | "barnsley-fern" => Ok(IfsPreset::Fern),
            "tree" | "probability-tree" => Ok(IfsPreset::Tree),
            _ => Err(FractalError::UnknownPreset(s.to_string())),
        }
    }
}
