//! Planar geometry shared by both pipelines.
//! All coordinate math uses f64.

use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

use crate::error::{FractalError, Result};

/// A point in the plane.
///
/// Also read as the complex number `x + iy`: rule offsets are mapped onto a
/// segment with one complex multiplication (see [`Point::cmul`]).
/// Serialised as `[x, y]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean length, i.e. the complex modulus.
    pub fn norm(self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Complex product `(x + iy)(u + iv)`: scales by `|other|` and rotates by
    /// `arg(other)`.
    pub fn cmul(self, other: Self) -> Self {
        Self {
            x: self.x * other.x - self.y * other.y,
            y: self.x * other.y + self.y * other.x,
        }
    }

    /// Complex quotient. Dividing by the origin yields non-finite components.
    pub fn cdiv(self, other: Self) -> Self {
        let den = other.x * other.x + other.y * other.y;
        Self {
            x: (self.x * other.x + self.y * other.y) / den,
            y: (self.y * other.x - self.x * other.y) / den,
        }
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn distance(self, other: Self) -> f64 {
        (other - self).norm()
    }
}

impl From<[f64; 2]> for Point {
    fn from([x, y]: [f64; 2]) -> Self {
        Self { x, y }
    }
}

impl From<Point> for [f64; 2] {
    fn from(p: Point) -> Self {
        [p.x, p.y]
    }
}

impl Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Point {
    type Output = Point;
    fn mul(self, k: f64) -> Point {
        Point::new(self.x * k, self.y * k)
    }
}

/// A directed, non-degenerate line segment.
///
/// Only the endpoints are stored; length and direction are derived on demand.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    start: Point,
    end: Point,
}

impl Segment {
    /// Fails with `DegenerateSegment` when the endpoints coincide or either
    /// one is not finite.
    pub fn new(start: Point, end: Point) -> Result<Self> {
        let len = start.distance(end);
        if !start.is_finite() || !end.is_finite() || len == 0.0 || !len.is_finite() {
            return Err(FractalError::DegenerateSegment {
                x0: start.x,
                y0: start.y,
                x1: end.x,
                y1: end.y,
            });
        }
        Ok(Self { start, end })
    }

    /// The unit segment `(0, 0) → (1, 0)`, the local frame of every rule.
    pub fn unit() -> Self {
        Self { start: Point::ORIGIN, end: Point::new(1.0, 0.0) }
    }

    /// Child segments built from already-validated rule control points.
    pub(crate) fn from_control_points(start: Point, end: Point) -> Self {
        Self { start, end }
    }

    pub fn start(&self) -> Point {
        self.start
    }

    pub fn end(&self) -> Point {
        self.end
    }

    /// `end - start` as a complex number.
    pub fn delta(&self) -> Point {
        self.end - self.start
    }

    pub fn length(&self) -> f64 {
        self.delta().norm()
    }

    /// Unit vector from start to end.
    pub fn direction(&self) -> Point {
        self.delta() * (1.0 / self.length())
    }

    /// Map an offset from the unit frame into this segment's frame:
    /// `start + length · direction · offset`.
    pub fn map_offset(&self, offset: Point) -> Point {
        self.start + self.delta().cmul(offset)
    }

    /// Inverse of [`Segment::map_offset`]: express `p` in this segment's unit frame.
    pub fn to_local(&self, p: Point) -> Point {
        (p - self.start).cdiv(self.delta())
    }
}

/// Axis-aligned bounding box of a point sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Point,
    pub max: Point,
}

impl Bounds {
    /// `None` for an empty sequence.
    pub fn of(points: &[Point]) -> Option<Self> {
        let first = *points.first()?;
        let mut b = Bounds { min: first, max: first };
        for p in &points[1..] {
            b.min.x = b.min.x.min(p.x);
            b.min.y = b.min.y.min(p.y);
            b.max.x = b.max.x.max(p.x);
            b.max.y = b.max.y.max(p.y);
        }
        Some(b)
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }
}

/// Total length of a polyline.
pub fn polyline_length(points: &[Point]) -> f64 {
    points.windows(2).map(|w| w[0].distance(w[1])).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn complex_product_rotates_and_scales() {
        // i · i = -1
        let i = Point::new(0.0, 1.0);
        assert_eq!(i.cmul(i), Point::new(-1.0, 0.0));

        let p = Point::new(3.0, 4.0);
        let q = p.cmul(Point::new(0.5, 0.5));
        assert_relative_eq!(q.norm(), p.norm() * 0.5f64.hypot(0.5), epsilon = 1e-12);
    }

    #[test]
    fn cdiv_inverts_cmul() {
        let a = Point::new(1.25, -0.5);
        let b = Point::new(-2.0, 0.75);
        let back = a.cmul(b).cdiv(b);
        assert_relative_eq!(back.x, a.x, epsilon = 1e-12);
        assert_relative_eq!(back.y, a.y, epsilon = 1e-12);
    }

    #[test]
    fn segment_rejects_zero_length() {
        let p = Point::new(2.0, 3.0);
        assert!(matches!(Segment::new(p, p), Err(FractalError::DegenerateSegment { .. })));
        assert!(Segment::new(p, Point::new(f64::NAN, 0.0)).is_err());
    }

    #[test]
    fn map_offset_follows_direction() {
        let seg = Segment::new(Point::new(1.0, 1.0), Point::new(1.0, 3.0)).unwrap();
        assert_relative_eq!(seg.length(), 2.0);
        assert_eq!(seg.direction(), Point::new(0.0, 1.0));
        // Half-way along, then a quarter of the length to the left.
        let p = seg.map_offset(Point::new(0.5, 0.25));
        assert_relative_eq!(p.x, 0.5, epsilon = 1e-12);
        assert_relative_eq!(p.y, 2.0, epsilon = 1e-12);

        let local = seg.to_local(p);
        assert_relative_eq!(local.x, 0.5, epsilon = 1e-12);
        assert_relative_eq!(local.y, 0.25, epsilon = 1e-12);
    }

    #[test]
    fn bounds_cover_all_points() {
        let pts = [Point::new(0.0, 1.0), Point::new(-2.0, 5.0), Point::new(3.0, -1.0)];
        let b = Bounds::of(&pts).unwrap();
        assert_eq!(b.min, Point::new(-2.0, -1.0));
        assert_eq!(b.max, Point::new(3.0, 5.0));
        assert!(pts.iter().all(|&p| b.contains(p)));
        assert!(Bounds::of(&[]).is_none());
    }

    #[test]
    fn point_serialises_as_pair() {
        let json = serde_json::to_string(&Point::new(0.5, -1.0)).unwrap();
        assert_eq!(json, "[0.5,-1.0]");
        let back: Point = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Point::new(0.5, -1.0));
    }
}
