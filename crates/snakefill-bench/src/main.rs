//! snakefill-bench: CLI tool for fill parameter experimentation and diagnostics.
//!
//! Thresholds an image file into a shape mask, runs the zigzag fill
//! engine on it with configurable parameters, and prints per-pass
//! diagnostics. Useful for:
//!
//! - Tuning step size, down rows, and recursion budget for a shape
//! - Measuring per-pass durations to identify slow passes
//! - Checking how parameter changes affect path, branch, and connector counts
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin snakefill-bench -- [OPTIONS] <IMAGE_PATH>
//! ```
//!
//! Set `RUST_LOG=snakefill_pipeline=debug` to see per-pass engine logs.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;
use snakefill_pipeline::diagnostics::{Clock, PatternDiagnostics, generate_with_diagnostics};
use snakefill_pipeline::shape::DEFAULT_THRESHOLD;
use snakefill_pipeline::{Dimensions, PatternConfig, SeededRandom};

/// Fill parameter experimentation and diagnostics for snakefill.
///
/// Runs the zigzag fill engine on a thresholded image with configurable
/// parameters and prints detailed per-pass timing and count diagnostics.
#[derive(Parser)]
#[command(name = "snakefill-bench", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Luminance above which a pixel is inside the shape.
    #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
    threshold: u8,

    /// Pixels advanced per horizontal step.
    #[arg(long, default_value_t = PatternConfig::DEFAULT_STEP_SIZE, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    step_size: u32,

    /// Rows descended between sweeps.
    #[arg(long, default_value_t = PatternConfig::DEFAULT_DOWN_ROWS, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    down_rows: u32,

    /// Additional passes allowed after the first.
    #[arg(long, default_value_t = PatternConfig::DEFAULT_RECURSION_BUDGET)]
    recursion_budget: u32,

    /// Seed for branch and connector randomness (random when omitted).
    #[arg(long)]
    seed: Option<u64>,

    /// Occupancy grid resolution as WIDTHxHEIGHT (defaults to the mask size).
    #[arg(long, value_parser = parse_resolution)]
    output_resolution: Option<Dimensions>,

    /// Spacing of crossover marks along horizontal runs (disabled when omitted).
    #[arg(long, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    crossover_spacing: Option<u32>,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of human-readable report.
    #[arg(long)]
    json: bool,

    /// Full pattern config as a JSON string.
    ///
    /// When provided, all other fill parameter flags are ignored.
    /// The JSON must be a valid `PatternConfig` serialization.
    #[arg(long)]
    config_json: Option<String>,
}

/// Parse `WIDTHxHEIGHT` into [`Dimensions`].
fn parse_resolution(s: &str) -> Result<Dimensions, String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {s:?}"))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<u32>()
            .ok()
            .filter(|&n| n > 0)
            .ok_or_else(|| format!("invalid dimension {v:?} in {s:?}"))
    };
    Ok(Dimensions::new(parse(w)?, parse(h)?))
}

/// Build a [`PatternConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored. Otherwise, a config is
/// assembled from the individual flags.
fn config_from_cli(cli: &Cli) -> Result<PatternConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(PatternConfig {
        step_size: cli.step_size,
        down_rows: cli.down_rows,
        recursion_budget: cli.recursion_budget,
        output_resolution: cli.output_resolution,
        crossover_spacing: cli.crossover_spacing,
        ..PatternConfig::default()
    })
}

/// Install a stderr `fmt` subscriber filtered by `RUST_LOG`.
fn init_logging() {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let env_filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let image_bytes = match std::fs::read(&cli.image_path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error reading {}: {e}", cli.image_path.display());
            return ExitCode::FAILURE;
        }
    };

    let mask = match snakefill_pipeline::decode_mask(&image_bytes, cli.threshold) {
        Ok(mask) => mask,
        Err(e) => {
            eprintln!("Error decoding {}: {e}", cli.image_path.display());
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        path = %cli.image_path.display(),
        bytes = image_bytes.len(),
        width = mask.width(),
        height = mask.height(),
        inside = mask.inside_count(),
        "loaded mask"
    );
    eprintln!("Config: {config:#?}");
    eprintln!("Runs: {}", cli.runs);
    eprintln!();

    let mut all_diagnostics = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        let mut rng = cli.seed.map_or_else(SeededRandom::from_entropy, SeededRandom::new);
        match generate_with_diagnostics(&mask, &config, &mut rng, &StdClock) {
            Ok((_pattern, diagnostics)) => {
                if cli.json {
                    match serde_json::to_string_pretty(&diagnostics) {
                        Ok(json) => println!("{json}"),
                        Err(e) => {
                            eprintln!("Error serializing diagnostics: {e}");
                            return ExitCode::FAILURE;
                        }
                    }
                } else {
                    println!("{}", diagnostics.report());
                }
                all_diagnostics.push(diagnostics);
            }
            Err(e) => {
                eprintln!("Pattern error: {e}");
                return ExitCode::FAILURE;
            }
        }

        if cli.runs > 1 {
            eprintln!();
        }
    }

    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    ExitCode::SUCCESS
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[PatternDiagnostics]) {
    if all_diagnostics.is_empty() {
        println!("Warning: no diagnostics to summarize");
        return;
    }

    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    let stats = |values: &[f64]| {
        let min = values.iter().copied().reduce(f64::min).unwrap_or(0.0);
        let max = values.iter().copied().reduce(f64::max).unwrap_or(0.0);
        let mean = values.iter().sum::<f64>() / values.len().max(1) as f64;
        (min, mean, max)
    };

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();
    let (min, mean, max) = stats(&durations);
    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    let passes: Vec<f64> = all_diagnostics.iter().map(|d| d.passes.len() as f64).collect();
    let (min, mean, max) = stats(&passes);
    println!("Passes:         min={min:.0}  mean={mean:.2}  max={max:.0}");

    let points: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.summary.primary_points as f64)
        .collect();
    let (min, mean, max) = stats(&points);
    println!("Path points:    min={min:.0}  mean={mean:.1}  max={max:.0}");

    let cells: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.summary.occupied_cells as f64)
        .collect();
    let (min, mean, max) = stats(&cells);
    println!("Occupied cells: min={min:.0}  mean={mean:.1}  max={max:.0}");
}
