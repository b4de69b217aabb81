//! Self-similar fractal point generation.
//!
//! Two independent pipelines share the planar primitives in [`geometry`]:
//!
//! - [`subdivision`]: edge-replacement curves (Koch, Minkowski, custom
//!   [`rule::ReplacementRule`]s) as ordered polylines.
//! - [`chaos`]: chaos-game sampling of an [`ifs::AffineMapSet`] attractor
//!   (Barnsley fern, probability tree) as an unordered point cloud.
//!
//! Rendering and export are left to the caller.

pub mod chaos;
pub mod error;
pub mod generator;
pub mod geometry;
pub mod ifs;
pub mod rule;
pub mod subdivision;

pub use error::{FractalError, Result};
pub use generator::{CurveParams, FractalGenerator, FractalParams, FractalResult, IfsParams, MapSource, PointLayout};
pub use geometry::{Bounds, Point, Segment};
pub use ifs::{AffineMap, AffineMapSet, IfsPreset};
pub use rule::{CurveRule, ReplacementRule};
