//! Parameter records and the single entry point used by the outer binaries.

use std::time::Instant;

use serde::{de, Deserialize, Deserializer, Serialize};
use tracing::info;

use crate::chaos::run_orbits;
use crate::error::{FractalError, Result};
use crate::geometry::{Point, Segment};
use crate::ifs::{AffineMap, AffineMapSet, IfsPreset};
use crate::rule::CurveRule;
use crate::subdivision::checked_level;

// ── Public structs ────────────────────────────────────────────────────────────

/// Edge-replacement curve parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurveParams {
    pub rule: CurveRule,
    /// Recursion depth. Signed so that a negative value in a config file is
    /// reported as `InvalidLevel` instead of a parse error.
    pub level: i64,
    pub start: Point,
    pub end: Point,
}

impl Default for CurveParams {
    fn default() -> Self {
        Self {
            rule: CurveRule::Koch,
            level: 4,
            start: Point::new(0.0, 0.0),
            end: Point::new(1.0, 0.0),
        }
    }
}

/// Where an IFS gets its maps: a preset name or an explicit table of
/// `[a, b, c, d, e, f, p]` rows.
///
/// A bad preset name or map table fails with the matching `FractalError`
/// message rather than a generic untagged-enum mismatch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MapSource {
    Preset(IfsPreset),
    Explicit(AffineMapSet),
}

/// Unvalidated shape of [`MapSource`] as it appears in JSON.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawMapSource {
    Name(String),
    Table(Vec<AffineMap>),
}

impl TryFrom<RawMapSource> for MapSource {
    type Error = FractalError;

    fn try_from(raw: RawMapSource) -> Result<Self> {
        match raw {
            RawMapSource::Name(name) => name.parse().map(MapSource::Preset),
            RawMapSource::Table(rows) => AffineMapSet::new(rows).map(MapSource::Explicit),
        }
    }
}

impl<'de> Deserialize<'de> for MapSource {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let raw = RawMapSource::deserialize(d)?;
        MapSource::try_from(raw).map_err(de::Error::custom)
    }
}

impl MapSource {
    pub fn resolve(&self) -> AffineMapSet {
        match self {
            MapSource::Preset(p) => p.map_set(),
            MapSource::Explicit(set) => set.clone(),
        }
    }
}

impl Default for MapSource {
    fn default() -> Self {
        MapSource::Preset(IfsPreset::Fern)
    }
}

/// Chaos-game parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IfsParams {
    pub maps: MapSource,
    /// Steps per orbit, warmup included.
    pub total_iterations: usize,
    /// Leading steps of each orbit that are discarded.
    pub warmup: usize,
    pub seed: u64,
    /// Independent orbits whose clouds are concatenated.
    pub orbits: usize,
}

impl Default for IfsParams {
    fn default() -> Self {
        Self {
            maps: MapSource::default(),
            total_iterations: 100_000,
            warmup: 100,
            seed: 42,
            orbits: 1,
        }
    }
}

/// Either pipeline, tagged by `"kind"` in JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FractalParams {
    Curve(CurveParams),
    Ifs(IfsParams),
}

/// How the points of a result should be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointLayout {
    /// Ordered; consecutive points are joined by line segments.
    Polyline,
    /// Unordered scatter.
    Cloud,
}

#[derive(Debug, Clone, Serialize)]
pub struct FractalResult {
    pub layout: PointLayout,
    pub points: Vec<Point>,
    pub generation_time_ms: u64,
}

// ── Orchestrator ──────────────────────────────────────────────────────────────

pub struct FractalGenerator;

impl FractalGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn generate(&self, params: &FractalParams) -> Result<FractalResult> {
        let started = Instant::now();
        let (layout, points) = match params {
            FractalParams::Curve(p) => (PointLayout::Polyline, self.curve(p)?),
            FractalParams::Ifs(p) => (PointLayout::Cloud, self.ifs(p)?),
        };
        let generation_time_ms = started.elapsed().as_millis() as u64;
        info!(?layout, points = points.len(), generation_time_ms, "generated fractal");
        Ok(FractalResult { layout, points, generation_time_ms })
    }

    /// Validate and run the subdivision engine.
    pub fn curve(&self, params: &CurveParams) -> Result<Vec<Point>> {
        let level = checked_level(params.level)?;
        let segment = Segment::new(params.start, params.end)?;
        let rule = params.rule.rule();

        #[cfg(feature = "threading")]
        let points = crate::subdivision::generate_par(&segment, level, &rule);
        #[cfg(not(feature = "threading"))]
        let points = crate::subdivision::generate(&segment, level, &rule);

        points
    }

    /// Validate and run the chaos game.
    pub fn ifs(&self, params: &IfsParams) -> Result<Vec<Point>> {
        if params.orbits == 0 {
            return Err(FractalError::InvalidConfiguration("orbits must be at least 1".into()));
        }
        let set = params.maps.resolve();
        run_orbits(&set, params.orbits, params.total_iterations, params.warmup, params.seed)
    }
}

impl Default for FractalGenerator {
    fn default() -> Self {
        Self::new()
    }
}

// ── Unit tests ────────────────────────────────────────────────────────────────
