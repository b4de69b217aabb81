//! Chaos-game sampling of IFS attractors.
//!
//! The orbit starts at the origin. Each step draws one uniform number,
//! picks a map through the cumulative weight table, and applies it to the
//! running point. The first `warmup` steps are discarded: they are the
//! transient before the orbit lands near the attractor. Warmup is a tuning
//! knob, not a convergence guarantee.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::error::{FractalError, Result};
use crate::geometry::Point;
use crate::ifs::{AffineMapSet, WeightedSelector};

/// Per-orbit seed spacing for [`run_orbits`].
const ORBIT_SEED_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;

/// A sampled orbit together with the map that produced each kept point.
#[derive(Debug, Clone, PartialEq)]
pub struct Orbit {
    pub points: Vec<Point>,
    /// `map_indices[i]` is the index of the map applied to reach `points[i]`.
    pub map_indices: Vec<usize>,
}

fn check_bounds(total_iterations: usize, warmup: usize) -> Result<()> {
    if warmup > total_iterations {
        return Err(FractalError::IterationBounds { total_iterations, warmup });
    }
    Ok(())
}

/// Drive the orbit, calling `emit(map_index, point)` for every kept step.
fn iterate<R, F>(
    map_set: &AffineMapSet,
    total_iterations: usize,
    warmup: usize,
    rng: &mut R,
    mut emit: F,
) where
    R: Rng + ?Sized,
    F: FnMut(usize, Point),
{
    let maps = map_set.maps();
    let selector = WeightedSelector::new(map_set);
    let mut current = Point::ORIGIN;
    for step in 0..total_iterations {
        let idx = selector.select(rng.gen::<f64>());
        current = maps[idx].apply(current);
        if step >= warmup {
            emit(idx, current);
        }
    }
}

/// Sample `total_iterations - warmup` attractor points.
///
/// `warmup == total_iterations` is valid and yields an empty cloud.
pub fn run<R: Rng + ?Sized>(
    map_set: &AffineMapSet,
    total_iterations: usize,
    warmup: usize,
    rng: &mut R,
) -> Result<Vec<Point>> {
    check_bounds(total_iterations, warmup)?;
    let mut points = Vec::with_capacity(total_iterations - warmup);
    iterate(map_set, total_iterations, warmup, rng, |_, p| points.push(p));
    debug!(maps = map_set.len(), total_iterations, warmup, points = points.len(), "chaos game finished");
    Ok(points)
}

/// Like [`run`], also recording which map produced each point.
pub fn run_traced<R: Rng + ?Sized>(
    map_set: &AffineMapSet,
    total_iterations: usize,
    warmup: usize,
    rng: &mut R,
) -> Result<Orbit> {
    check_bounds(total_iterations, warmup)?;
    let kept = total_iterations - warmup;
    let mut orbit = Orbit {
        points: Vec::with_capacity(kept),
        map_indices: Vec::with_capacity(kept),
    };
    iterate(map_set, total_iterations, warmup, rng, |idx, p| {
        orbit.points.push(p);
        orbit.map_indices.push(idx);
    });
    Ok(orbit)
}

/// [`run`] with a `StdRng` seeded from `seed`.
pub fn run_seeded(
    map_set: &AffineMapSet,
    total_iterations: usize,
    warmup: usize,
    seed: u64,
) -> Result<Vec<Point>> {
    let mut rng = StdRng::seed_from_u64(seed);
    run(map_set, total_iterations, warmup, &mut rng)
}

/// Run `orbits` independent orbits and concatenate them in orbit order.
///
/// Orbit `i` owns a generator seeded with `seed ^ (i · stride)`, so orbit 0
/// is exactly `run_seeded(.., seed)`. With the `threading` feature the
/// orbits run on the rayon pool; the output is identical either way.
pub fn run_orbits(
    map_set: &AffineMapSet,
    orbits: usize,
    total_iterations: usize,
    warmup: usize,
    seed: u64,
) -> Result<Vec<Point>> {
    check_bounds(total_iterations, warmup)?;
    let orbit_seed = |i: usize| seed ^ (i as u64).wrapping_mul(ORBIT_SEED_STRIDE);

    #[cfg(feature = "threading")]
    let clouds: Vec<Vec<Point>> = {
        use rayon::prelude::*;
        (0..orbits)
            .into_par_iter()
            .map(|i| run_seeded(map_set, total_iterations, warmup, orbit_seed(i)))
            .collect::<Result<_>>()?
    };

    #[cfg(not(feature = "threading"))]
    let clouds: Vec<Vec<Point>> = (0..orbits)
        .map(|i| run_seeded(map_set, total_iterations, warmup, orbit_seed(i)))
        .collect::<Result<_>>()?;

    Ok(clouds.concat())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Bounds;
    use crate::ifs::AffineMap;

    #[test]
    fn fern_scenario_is_deterministic_and_bounded() {
        let fern = AffineMapSet::barnsley_fern();
        let a = run_seeded(&fern, 1000, 20, 7).unwrap();
        let b = run_seeded(&fern, 1000, 20, 7).unwrap();
        assert_eq!(a.len(), 980);
        assert_eq!(a, b);
        for p in &a {
            assert!((-3.0..=3.0).contains(&p.x), "x out of range: {p:?}");
            assert!((0.0..=11.0).contains(&p.y), "y out of range: {p:?}");
        }
    }

    #[test]
    fn different_seeds_give_different_clouds() {
        let fern = AffineMapSet::barnsley_fern();
        let a = run_seeded(&fern, 500, 10, 1).unwrap();
        let b = run_seeded(&fern, 500, 10, 2).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn warmup_equal_to_total_is_empty() {
        let tree = AffineMapSet::probability_tree();
        assert!(run_seeded(&tree, 50, 50, 3).unwrap().is_empty());
        assert!(run_seeded(&tree, 0, 0, 3).unwrap().is_empty());
    }

    #[test]
    fn warmup_beyond_total_fails_fast() {
        let tree = AffineMapSet::probability_tree();
        let err = run_seeded(&tree, 10, 11, 3).unwrap_err();
        assert_eq!(err, FractalError::IterationBounds { total_iterations: 10, warmup: 11 });
        assert!(run_orbits(&tree, 4, 10, 11, 3).is_err());
    }

    #[test]
    fn selection_frequency_converges_to_weights() {
        let set = AffineMapSet::new(vec![
            AffineMap::new(0.5, 0.0, 0.0, 0.5, 0.0, 0.0, 0.3),
            AffineMap::new(0.5, 0.0, 0.0, 0.5, 0.5, 0.5, 0.7),
        ])
        .unwrap();
        let mut rng = StdRng::seed_from_u64(2024);
        let orbit = run_traced(&set, 200_000, 0, &mut rng).unwrap();
        let n = orbit.map_indices.len() as f64;
        let first = orbit.map_indices.iter().filter(|&&i| i == 0).count() as f64 / n;
        assert!((first - 0.3).abs() < 0.01, "freq(map 0) = {first:.4}");
        assert!(((1.0 - first) - 0.7).abs() < 0.01);
    }

    #[test]
    fn traced_orbit_matches_plain_run() {
        let fern = AffineMapSet::barnsley_fern();
        let plain = run_seeded(&fern, 300, 30, 11).unwrap();
        let traced = run_traced(&fern, 300, 30, &mut StdRng::seed_from_u64(11)).unwrap();
        assert_eq!(traced.points, plain);
        assert_eq!(traced.map_indices.len(), plain.len());
        // Each traced point is the chosen map applied to its predecessor.
        for i in 1..plain.len() {
            let m = fern.maps()[traced.map_indices[i]];
            assert_eq!(m.apply(plain[i - 1]), plain[i]);
        }
    }

    #[test]
    fn tree_stays_inside_contraction_radius() {
        let tree = AffineMapSet::probability_tree();
        let cloud = run_seeded(&tree, 5000, 100, 42).unwrap();
        assert!(cloud.iter().all(|p| p.norm() < 0.5));
        let b = Bounds::of(&cloud).unwrap();
        assert!(b.width() > 0.1 && b.height() > 0.1, "{b:?}");
    }

    #[test]
    fn multiple_orbits_concatenate() {
        let fern = AffineMapSet::barnsley_fern();
        let cloud = run_orbits(&fern, 3, 400, 40, 9).unwrap();
        assert_eq!(cloud.len(), 3 * 360);
        assert_eq!(&cloud[..360], run_seeded(&fern, 400, 40, 9).unwrap().as_slice());
        assert_eq!(cloud, run_orbits(&fern, 3, 400, 40, 9).unwrap());
        assert_ne!(&cloud[..360], &cloud[360..720]);
    }
}
