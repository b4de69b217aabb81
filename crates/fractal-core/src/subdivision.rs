//! Edge-replacement subdivision engine (Koch, Minkowski, custom rules).
//!
//! Every segment at level `L > 0` is replaced by the `k` child segments of
//! the rule, each subdivided to level `L - 1`. The recursion runs on an
//! explicit work stack, so call depth does not grow with `level`.
//!
//! Output for a rule with `k` sub-segments holds exactly `k^level + 1`
//! points. Adjacent children share one endpoint, which is emitted once.

use tracing::debug;

use crate::error::{FractalError, Result};
use crate::geometry::{Point, Segment};
use crate::rule::ReplacementRule;

/// Convert a signed level (e.g. from a config file) into an engine level.
pub fn checked_level(level: i64) -> Result<u32> {
    if level < 0 {
        return Err(FractalError::InvalidLevel { level, reason: "level must be non-negative" });
    }
    u32::try_from(level)
        .map_err(|_| FractalError::InvalidLevel { level, reason: "level exceeds u32 range" })
}

/// Number of points produced for `k` sub-segments at `level`: `k^level + 1`.
///
/// Rejects levels whose point buffer would exceed `isize::MAX` bytes, the
/// largest allocation a `Vec` can describe.
pub fn output_len(k: usize, level: u32) -> Result<usize> {
    k.checked_pow(level)
        .and_then(|n| n.checked_add(1))
        .filter(|&n| {
            n.checked_mul(std::mem::size_of::<Point>())
                .is_some_and(|bytes| bytes <= isize::MAX as usize)
        })
        .ok_or(FractalError::InvalidLevel {
            level: level as i64,
            reason: "output size exceeds addressable memory",
        })
}

/// Reserve the whole output up front, reporting allocation failure as
/// `InvalidLevel` instead of aborting.
fn reserve_output(total: usize, level: u32) -> Result<Vec<Point>> {
    let mut out = Vec::new();
    out.try_reserve_exact(total).map_err(|_| FractalError::InvalidLevel {
        level: level as i64,
        reason: "output buffer could not be allocated",
    })?;
    Ok(out)
}

/// Generate the level-`level` polyline of `rule` over `segment`.
///
/// The first and last points are exactly `segment.start()` and
/// `segment.end()`. Output order is the left-to-right rule order.
pub fn generate(segment: &Segment, level: u32, rule: &ReplacementRule) -> Result<Vec<Point>> {
    let total = output_len(rule.branching(), level)?;
    let mut out = reserve_output(total, level)?;
    out.push(segment.start());
    subdivide_into(*segment, level, rule, &mut out);
    debug_assert_eq!(out.len(), total);
    debug!(k = rule.branching(), level, points = out.len(), "subdivided segment");
    Ok(out)
}

/// Same output as [`generate`], with the `k` top-level children evaluated
/// on the rayon pool.
#[cfg(feature = "threading")]
pub fn generate_par(segment: &Segment, level: u32, rule: &ReplacementRule) -> Result<Vec<Point>> {
    use rayon::prelude::*;

    let total = output_len(rule.branching(), level)?;
    if level == 0 {
        return Ok(vec![segment.start(), segment.end()]);
    }
    let child_len = total / rule.branching();
    let mut out = reserve_output(total, level)?;

    let mut controls = Vec::with_capacity(rule.offsets().len());
    control_points(segment, rule, &mut controls);

    let parts: Vec<Vec<Point>> = controls
        .par_windows(2)
        .map(|w| {
            let mut part = Vec::with_capacity(child_len);
            subdivide_into(Segment::from_control_points(w[0], w[1]), level - 1, rule, &mut part);
            part
        })
        .collect();

    out.push(segment.start());
    for part in parts {
        out.extend(part);
    }
    debug!(k = rule.branching(), level, points = out.len(), "subdivided segment (parallel)");
    Ok(out)
}

/// Append every point of the subdivided `segment` except its start.
fn subdivide_into(segment: Segment, level: u32, rule: &ReplacementRule, out: &mut Vec<Point>) {
    // Children are pushed in reverse so the leftmost one is popped first.
    // Depth-first, so the stack never holds more than level·(k-1)+1 tasks.
    let mut stack: Vec<(Segment, u32)> =
        Vec::with_capacity(level as usize * (rule.branching() - 1) + 1);
    let mut controls = Vec::with_capacity(rule.offsets().len());
    stack.push((segment, level));

    while let Some((seg, lvl)) = stack.pop() {
        if lvl == 0 {
            out.push(seg.end());
            continue;
        }
        control_points(&seg, rule, &mut controls);
        for w in controls.windows(2).rev() {
            stack.push((Segment::from_control_points(w[0], w[1]), lvl - 1));
        }
    }
}

/// Map the rule offsets onto `segment`. The outer control points are the
/// segment's own endpoints, not recomputed ones, so shared endpoints stay
/// bit-identical between neighbours.
fn control_points(segment: &Segment, rule: &ReplacementRule, controls: &mut Vec<Point>) {
    let offsets = rule.offsets();
    let last = offsets.len() - 1;
    controls.clear();
    controls.push(segment.start());
    controls.extend(offsets[1..last].iter().map(|&o| segment.map_offset(o)));
    controls.push(segment.end());
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit() -> Segment {
        Segment::unit()
    }

    /// Direct recursive definition, used to pin the work-stack version.
    fn recursive(segment: Segment, level: u32, rule: &ReplacementRule) -> Vec<Point> {
        if level == 0 {
            return vec![segment.start(), segment.end()];
        }
        let mut controls = Vec::new();
        control_points(&segment, rule, &mut controls);
        let mut out = vec![segment.start()];
        for w in controls.windows(2) {
            let child = recursive(Segment::from_control_points(w[0], w[1]), level - 1, rule);
            out.extend_from_slice(&child[1..]);
        }
        out
    }

    #[test]
    fn level_zero_returns_endpoints() {
        let seg = Segment::new(Point::new(-1.5, 2.0), Point::new(4.0, 0.25)).unwrap();
        for rule in [ReplacementRule::koch(), ReplacementRule::minkowski()] {
            assert_eq!(generate(&seg, 0, &rule).unwrap(), vec![seg.start(), seg.end()]);
        }
        assert_eq!(
            generate(&unit(), 0, &ReplacementRule::koch()).unwrap(),
            vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0)]
        );
    }

    #[test]
    fn point_count_is_k_pow_level_plus_one() {
        for rule in [ReplacementRule::koch(), ReplacementRule::minkowski()] {
            let k = rule.branching();
            for level in 0..5u32 {
                let pts = generate(&unit(), level, &rule).unwrap();
                assert_eq!(pts.len(), k.pow(level) + 1, "k={k} level={level}");
            }
        }
    }

    #[test]
    fn endpoints_are_preserved_exactly() {
        let seg = Segment::new(Point::new(0.3, -0.7), Point::new(-2.1, 5.9)).unwrap();
        for rule in [ReplacementRule::koch(), ReplacementRule::minkowski()] {
            for level in 0..5u32 {
                let pts = generate(&seg, level, &rule).unwrap();
                assert_eq!(pts[0], seg.start());
                assert_eq!(*pts.last().unwrap(), seg.end());
            }
        }
    }

    #[test]
    fn koch_level_one_has_single_bump() {
        let pts = generate(&unit(), 1, &ReplacementRule::koch()).unwrap();
        assert_eq!(pts.len(), 5);
        assert_relative_eq!(pts[1].x, 1.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(pts[2].x, 0.5, epsilon = 1e-12);
        assert_relative_eq!(pts[2].y, 3.0f64.sqrt() / 6.0, epsilon = 1e-12);
        assert!(pts[2].y > 0.0);
        assert_relative_eq!(pts[3].x, 2.0 / 3.0, epsilon = 1e-12);
        for p in [pts[0], pts[1], pts[3], pts[4]] {
            assert_relative_eq!(p.y, 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn matches_recursive_definition_bit_for_bit() {
        let seg = Segment::new(Point::new(1.0, 1.0), Point::new(-3.0, 2.5)).unwrap();
        for rule in [ReplacementRule::koch(), ReplacementRule::minkowski()] {
            for level in 0..4u32 {
                assert_eq!(generate(&seg, level, &rule).unwrap(), recursive(seg, level, &rule));
            }
        }
    }

    #[test]
    fn children_are_self_similar() {
        for rule in [ReplacementRule::koch(), ReplacementRule::minkowski()] {
            let k = rule.branching();
            for level in 0..3u32 {
                let whole = generate(&unit(), level + 1, &rule).unwrap();
                let reference = generate(&unit(), level, &rule).unwrap();
                let span = k.pow(level);

                let mut controls = Vec::new();
                control_points(&unit(), &rule, &mut controls);
                for (i, w) in controls.windows(2).enumerate() {
                    let child = Segment::new(w[0], w[1]).unwrap();
                    let sub = &whole[i * span..=(i + 1) * span];
                    assert_eq!(sub.len(), reference.len());
                    for (p, q) in sub.iter().zip(&reference) {
                        let local = child.to_local(*p);
                        assert_relative_eq!(local.x, q.x, epsilon = 1e-9);
                        assert_relative_eq!(local.y, q.y, epsilon = 1e-9);
                    }
                }
            }
        }
    }

    #[test]
    fn generation_is_deterministic() {
        let a = generate(&unit(), 4, &ReplacementRule::minkowski()).unwrap();
        let b = generate(&unit(), 4, &ReplacementRule::minkowski()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn curve_length_scales_with_rule_ratio() {
        let rule = ReplacementRule::minkowski();
        for level in 0..4u32 {
            let pts = generate(&unit(), level, &rule).unwrap();
            let len = crate::geometry::polyline_length(&pts);
            assert_relative_eq!(len, 2f64.powi(level as i32), epsilon = 1e-9);
        }
    }

    #[test]
    fn custom_rule_runs_through_same_engine() {
        // Lévy C curve: two legs of a right isoceles triangle.
        let rule = ReplacementRule::new(vec![
            Point::new(0.0, 0.0),
            Point::new(0.5, 0.5),
            Point::new(1.0, 0.0),
        ])
        .unwrap();
        let pts = generate(&unit(), 10, &rule).unwrap();
        assert_eq!(pts.len(), 1025);
        assert_eq!(*pts.last().unwrap(), Point::new(1.0, 0.0));
    }

    #[test]
    fn rejects_levels_that_overflow() {
        let err = generate(&unit(), 64, &ReplacementRule::minkowski()).unwrap_err();
        assert!(matches!(err, FractalError::InvalidLevel { level: 64, .. }));
    }

    #[test]
    fn rejects_levels_too_large_to_allocate() {
        // 8^20 points of 16 bytes each overflow the addressable range.
        let err = generate(&unit(), 20, &ReplacementRule::minkowski()).unwrap_err();
        assert!(matches!(err, FractalError::InvalidLevel { level: 20, .. }));
        let err = generate(&unit(), 31, &ReplacementRule::koch()).unwrap_err();
        assert!(matches!(err, FractalError::InvalidLevel { level: 31, .. }));
        assert!(output_len(8, 20).is_err());
        assert_eq!(output_len(8, 5), Ok(8usize.pow(5) + 1));
    }

    #[test]
    fn checked_level_rejects_negative() {
        assert_eq!(checked_level(3), Ok(3));
        assert!(matches!(checked_level(-1), Err(FractalError::InvalidLevel { level: -1, .. })));
        assert!(checked_level(i64::MAX).is_err());
    }

    #[cfg(feature = "threading")]
    #[test]
    fn parallel_matches_sequential() {
        let seg = Segment::new(Point::new(0.0, 0.0), Point::new(2.0, 1.0)).unwrap();
        for rule in [ReplacementRule::koch(), ReplacementRule::minkowski()] {
            for level in 0..5u32 {
                assert_eq!(
                    generate_par(&seg, level, &rule).unwrap(),
                    generate(&seg, level, &rule).unwrap()
                );
            }
        }
    }

    #[cfg(feature = "threading")]
    #[test]
    fn parallel_rejects_levels_too_large_to_allocate() {
        let err = generate_par(&unit(), 20, &ReplacementRule::minkowski()).unwrap_err();
        assert!(matches!(err, FractalError::InvalidLevel { level: 20, .. }));
    }
}
