//! Diagnostic visualizer: writes PNG previews of every built-in fractal to
//! data/debug/. Koch and Minkowski at levels 0-3, fern and tree clouds.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use fractal_core::{
    chaos::run_seeded, subdivision::generate, AffineMapSet, Bounds, Point, ReplacementRule,
    Segment,
};

const SIZE: u32 = 512;
const MARGIN: f64 = 16.0;

const BACKGROUND: image::Rgb<u8> = image::Rgb([255, 255, 255]);
const INK: image::Rgb<u8> = image::Rgb([20, 20, 20]);
const LEAF: image::Rgb<u8> = image::Rgb([30, 120, 50]);

// ── Raster helpers ────────────────────────────────────────────────────────────

/// Uniform scale + offset fitting `bounds` into the canvas, y axis up.
struct Viewport {
    bounds: Bounds,
    scale: f64,
}

impl Viewport {
    fn fit(points: &[Point]) -> Option<Self> {
        let bounds = Bounds::of(points)?;
        let span = bounds.width().max(bounds.height()).max(f64::EPSILON);
        let scale = (SIZE as f64 - 2.0 * MARGIN) / span;
        Some(Self { bounds, scale })
    }

    fn to_pixel(&self, p: Point) -> (f64, f64) {
        let px = MARGIN + (p.x - self.bounds.min.x) * self.scale;
        let py = SIZE as f64 - MARGIN - (p.y - self.bounds.min.y) * self.scale;
        (px, py)
    }
}

fn put(img: &mut image::RgbImage, x: f64, y: f64, color: image::Rgb<u8>) {
    if x >= 0.0 && y >= 0.0 && x < SIZE as f64 && y < SIZE as f64 {
        img.put_pixel(x as u32, y as u32, color);
    }
}

/// Join consecutive points with straight lines (DDA stepping).
fn draw_polyline(points: &[Point]) -> image::RgbImage {
    let mut img = image::RgbImage::from_pixel(SIZE, SIZE, BACKGROUND);
    let Some(view) = Viewport::fit(points) else { return img };
    for w in points.windows(2) {
        let (x0, y0) = view.to_pixel(w[0]);
        let (x1, y1) = view.to_pixel(w[1]);
        let steps = (x1 - x0).abs().max((y1 - y0).abs()).ceil().max(1.0) as usize;
        for s in 0..=steps {
            let t = s as f64 / steps as f64;
            put(&mut img, x0 + (x1 - x0) * t, y0 + (y1 - y0) * t, INK);
        }
    }
    img
}

/// One pixel per point.
fn draw_cloud(points: &[Point]) -> image::RgbImage {
    let mut img = image::RgbImage::from_pixel(SIZE, SIZE, BACKGROUND);
    let Some(view) = Viewport::fit(points) else { return img };
    for &p in points {
        let (x, y) = view.to_pixel(p);
        put(&mut img, x, y, LEAF);
    }
    img
}

fn save(img: &image::RgbImage, out_dir: &Path, name: &str) -> Result<()> {
    let path = out_dir.join(name);
    img.save(&path).with_context(|| format!("failed to save {name}"))?;
    println!("Wrote {}", path.display());
    Ok(())
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let out_dir = Path::new("data/debug");
    fs::create_dir_all(out_dir).context("cannot create data/debug/")?;

    // ── 1. Edge-replacement curves ───────────────────────────────────────────
    let segment = Segment::unit();
    for (name, rule) in [("koch", ReplacementRule::koch()), ("minkowski", ReplacementRule::minkowski())] {
        for level in 0..4u32 {
            let points = generate(&segment, level, &rule)?;
            save(&draw_polyline(&points), out_dir, &format!("{name}_level{level}.png"))?;
        }
    }

    // ── 2. Chaos-game attractors ─────────────────────────────────────────────
    for (name, set) in [("fern", AffineMapSet::barnsley_fern()), ("tree", AffineMapSet::probability_tree())] {
        println!("Sampling {name}…");
        let points = run_seeded(&set, 100_000, 100, 42)?;
        save(&draw_cloud(&points), out_dir, &format!("{name}.png"))?;
    }

    println!("Done.");
    Ok(())
}
