/// Command-line front end: runs one fractal pipeline and writes its points
/// as JSON for an external renderer.

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use fractal_core::{
    AffineMapSet, CurveParams, CurveRule, FractalGenerator, FractalParams, IfsParams, IfsPreset,
    MapSource, Point,
};

#[derive(Parser, Debug)]
#[command(name = "fractal", about = "Generate self-similar fractal point sets")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Write JSON here instead of stdout.
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Pretty-print the JSON output.
    #[arg(long, global = true)]
    pretty: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Edge-replacement curve (ordered polyline).
    Curve(CurveArgs),
    /// Chaos-game attractor (unordered point cloud).
    Ifs(IfsArgs),
    /// Run a parameter file: {"kind": "curve" | "ifs", ...}.
    Run {
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[derive(ClapArgs, Debug)]
struct CurveArgs {
    /// Replacement rule: koch or minkowski.
    #[arg(short, long, default_value = "koch")]
    rule: CurveRule,

    /// Recursion depth.
    #[arg(short, long, default_value_t = 4, allow_negative_numbers = true)]
    level: i64,

    /// Segment start as "x,y".
    #[arg(long, default_value = "0,0", value_parser = parse_point)]
    start: Point,

    /// Segment end as "x,y".
    #[arg(long, default_value = "1,0", value_parser = parse_point)]
    end: Point,
}

#[derive(ClapArgs, Debug)]
struct IfsArgs {
    /// Named map set: fern or tree.
    #[arg(short, long, default_value = "fern", conflicts_with = "maps")]
    preset: IfsPreset,

    /// JSON file holding [[a, b, c, d, e, f, p], ...] rows.
    #[arg(short, long)]
    maps: Option<PathBuf>,

    /// Steps per orbit, warmup included.
    #[arg(short = 'n', long, default_value_t = 100_000)]
    iterations: usize,

    /// Leading steps discarded per orbit.
    #[arg(short, long, default_value_t = 100)]
    warmup: usize,

    #[arg(short, long, default_value_t = 42)]
    seed: u64,

    /// Independent orbits to concatenate.
    #[arg(long, default_value_t = 1)]
    orbits: usize,
}

fn parse_point(s: &str) -> Result<Point, String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected \"x,y\", got {s:?}"))?;
    let x: f64 = x.trim().parse().map_err(|e| format!("bad x in {s:?}: {e}"))?;
    let y: f64 = y.trim().parse().map_err(|e| format!("bad y in {s:?}: {e}"))?;
    Ok(Point::new(x, y))
}

fn resolve_params(command: Command) -> Result<FractalParams> {
    Ok(match command {
        Command::Curve(a) => FractalParams::Curve(CurveParams {
            rule: a.rule,
            level: a.level,
            start: a.start,
            end: a.end,
        }),
        Command::Ifs(a) => {
            let maps = match a.maps {
                Some(path) => {
                    let text = fs::read_to_string(&path)
                        .with_context(|| format!("reading map table {}", path.display()))?;
                    let set: AffineMapSet = serde_json::from_str(&text)
                        .with_context(|| format!("parsing map table {}", path.display()))?;
                    MapSource::Explicit(set)
                }
                None => MapSource::Preset(a.preset),
            };
            FractalParams::Ifs(IfsParams {
                maps,
                total_iterations: a.iterations,
                warmup: a.warmup,
                seed: a.seed,
                orbits: a.orbits,
            })
        }
        Command::Run { config } => {
            let text = fs::read_to_string(&config)
                .with_context(|| format!("reading config {}", config.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("parsing config {}", config.display()))?
        }
    })
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .compact()
        .init();

    let args = Args::parse();
    let params = resolve_params(args.command)?;

    let result = FractalGenerator::new()
        .generate(&params)
        .context("fractal generation failed")?;

    let json = if args.pretty {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string(&result)?
    };

    match args.output {
        Some(path) => {
            fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), points = result.points.len(), "wrote points");
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(json.as_bytes())?;
            stdout.write_all(b"\n")?;
        }
    }

    Ok(())
}
