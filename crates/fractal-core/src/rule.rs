//! Edge-replacement rules.
//!
//! A rule is a polyline in the unit frame, where the segment being replaced
//! runs from 0 to 1 on the real axis and positive imaginary offsets bulge to
//! the left of the direction of travel. Applying a rule to any segment maps
//! every offset through that segment's length and direction.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{FractalError, Result};
use crate::geometry::Point;

/// A validated replacement rule with `k = offsets.len() - 1` sub-segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Point>", into = "Vec<Point>")]
pub struct ReplacementRule {
    offsets: Vec<Point>,
}

impl ReplacementRule {
    /// Validate and wrap a list of unit-frame offsets.
    ///
    /// The list must start at exactly `0`, end at exactly `1`, contain finite
    /// values only, and never repeat a point back to back.
    pub fn new(offsets: Vec<Point>) -> Result<Self> {
        if offsets.len() < 2 {
            return Err(FractalError::MalformedRule(format!(
                "need at least 2 offsets, got {}",
                offsets.len()
            )));
        }
        if let Some(i) = offsets.iter().position(|p| !p.is_finite()) {
            return Err(FractalError::MalformedRule(format!("offset {i} is not finite")));
        }
        if offsets[0] != Point::ORIGIN {
            return Err(FractalError::MalformedRule(format!(
                "first offset must be 0, got ({}, {})",
                offsets[0].x, offsets[0].y
            )));
        }
        let last = offsets[offsets.len() - 1];
        if last != Point::new(1.0, 0.0) {
            return Err(FractalError::MalformedRule(format!(
                "last offset must be 1, got ({}, {})",
                last.x, last.y
            )));
        }
        if let Some(i) = offsets.windows(2).position(|w| w[0] == w[1]) {
            return Err(FractalError::MalformedRule(format!(
                "sub-segment {i} has zero length"
            )));
        }
        Ok(Self { offsets })
    }

    /// Koch curve: four sub-segments of length ⅓ with an equilateral bump
    /// of height √3/6 above the middle third.
    pub fn koch() -> Self {
        let h = 3.0f64.sqrt() / 6.0;
        Self {
            offsets: vec![
                Point::new(0.0, 0.0),
                Point::new(1.0 / 3.0, 0.0),
                Point::new(0.5, h),
                Point::new(2.0 / 3.0, 0.0),
                Point::new(1.0, 0.0),
            ],
        }
    }

    /// Minkowski sausage: eight sub-segments of length ¼ forming a square
    /// zigzag, up over the second quarter and down under the third.
    pub fn minkowski() -> Self {
        Self {
            offsets: vec![
                Point::new(0.0, 0.0),
                Point::new(0.25, 0.0),
                Point::new(0.25, 0.25),
                Point::new(0.5, 0.25),
                Point::new(0.5, 0.0),
                Point::new(0.5, -0.25),
                Point::new(0.75, -0.25),
                Point::new(0.75, 0.0),
                Point::new(1.0, 0.0),
            ],
        }
    }

    /// Number of sub-segments `k`.
    pub fn branching(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn offsets(&self) -> &[Point] {
        &self.offsets
    }

    /// Total length of the rule polyline relative to the replaced segment.
    /// Each level multiplies the curve length by this factor.
    pub fn length_ratio(&self) -> f64 {
        crate::geometry::polyline_length(&self.offsets)
    }
}

impl TryFrom<Vec<Point>> for ReplacementRule {
    type Error = FractalError;

    fn try_from(offsets: Vec<Point>) -> Result<Self> {
        Self::new(offsets)
    }
}

impl From<ReplacementRule> for Vec<Point> {
    fn from(rule: ReplacementRule) -> Self {
        rule.offsets
    }
}

/// Curve families understood by the subdivision engine.
///
/// Serialised as `"koch"`, `"minkowski"`, or `{"custom": [[x, y], ...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CurveRule {
    #[default]
    Koch,
    Minkowski,
    Custom(ReplacementRule),
}

impl CurveRule {
    /// Resolve to the concrete offset table.
    pub fn rule(&self) -> Cow<'_, ReplacementRule> {
        match self {
            CurveRule::Koch => Cow::Owned(ReplacementRule::koch()),
            CurveRule::Minkowski => Cow::Owned(ReplacementRule::minkowski()),
            CurveRule::Custom(r) => Cow::Borrowed(r),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CurveRule::Koch => "koch",
            CurveRule::Minkowski => "minkowski",
            CurveRule::Custom(_) => "custom",
        }
    }
}

impl fmt::Display for CurveRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CurveRule {
    type Err = FractalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "koch" => Ok(CurveRule::Koch),
            "minkowski" => Ok(CurveRule::Minkowski),
            _ => Err(FractalError::UnknownRule(s.to_string())),
        }
    }
}
