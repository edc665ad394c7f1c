//! Generation diagnostics: per-pass timing and counts.
//!
//! Intended for parameter experimentation. Timestamps come from an
//! injected [`Clock`], so the engine itself stays free of platform time
//! APIs. Durations are serialized as fractional seconds (`f64`) because
//! `std::time::Duration` does not implement serde traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::orchestrator::generate_observed;
use crate::random::RandomSource;
use crate::shape::ShapeMask;
use crate::types::{PassSummary, Pattern, PatternConfig, PatternError};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Source of timestamps.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// The current instant.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Diagnostics collected from a single generation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternDiagnostics {
    /// One entry per executed pass, in order.
    pub passes: Vec<PassDiagnostics>,
    /// Time spent after the last pass (crossover stamping, assembly).
    #[serde(with = "duration_serde")]
    pub finish_duration: Duration,
    /// Total wall-clock duration of the run.
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Whole-run counts.
    pub summary: PatternSummary,
}

/// Timing and counts for one pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassDiagnostics {
    /// Wall-clock duration of the pass, including connector placement
    /// and the region search that follows it.
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Counts reported by the engine.
    pub summary: PassSummary,
}

/// High-level counts for the entire run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternSummary {
    /// Mask width in pixels.
    pub mask_width: u32,
    /// Mask height in pixels.
    pub mask_height: u32,
    /// Inside pixels in the mask.
    pub inside_pixels: usize,
    /// Occupancy grid width.
    pub output_width: u32,
    /// Occupancy grid height.
    pub output_height: u32,
    /// Occupied cells in the final grid.
    pub occupied_cells: usize,
    /// Primary paths (two per pass).
    pub path_count: usize,
    /// Points across all primary paths.
    pub primary_points: usize,
    /// Collision branches.
    pub branch_count: usize,
    /// Connectors.
    pub connector_count: usize,
    /// Crossover marks.
    pub crossover_count: usize,
}

impl PatternSummary {
    fn new(mask: &ShapeMask, pattern: &Pattern) -> Self {
        let output = pattern.occupancy.dimensions();
        Self {
            mask_width: mask.width(),
            mask_height: mask.height(),
            inside_pixels: mask.inside_count(),
            output_width: output.width,
            output_height: output.height,
            occupied_cells: pattern.occupancy.count_on(),
            path_count: pattern.paths.len(),
            primary_points: pattern.primary_point_count(),
            branch_count: pattern.branches.len(),
            connector_count: pattern.connectors.len(),
            crossover_count: pattern.crossovers.len(),
        }
    }
}

/// Run [`generate`](crate::generate) and collect diagnostics alongside
/// the pattern.
///
/// # Errors
///
/// Returns [`PatternError::InvalidConfig`] if `config` is invalid.
pub fn generate_with_diagnostics<R: RandomSource + ?Sized, C: Clock>(
    mask: &ShapeMask,
    config: &PatternConfig,
    rng: &mut R,
    clock: &C,
) -> Result<(Pattern, PatternDiagnostics), PatternError> {
    let start = clock.now();
    let mut mark = clock.now();
    let mut passes = Vec::new();

    let pattern = generate_observed(mask, config, rng, &mut |summary: &PassSummary| {
        passes.push(PassDiagnostics {
            duration: clock.elapsed(&mark),
            summary: summary.clone(),
        });
        mark = clock.now();
    })?;

    let finish_duration = clock.elapsed(&mark);
    let total_duration = clock.elapsed(&start);
    let summary = PatternSummary::new(mask, &pattern);
    Ok((
        pattern,
        PatternDiagnostics {
            passes,
            finish_duration,
            total_duration,
            summary,
        },
    ))
}

impl PatternDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let s = &self.summary;
        let mut lines = Vec::new();

        lines.push(format!("Pattern Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Mask: {}x{} ({} inside pixels)  |  Output: {}x{}",
            s.mask_width, s.mask_height, s.inside_pixels, s.output_width, s.output_height,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<6} {:>5} {:>10} {:>10}  {}",
            "Pass", "Depth", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        let pct = |d: Duration| {
            if total_ms > 0.0 {
                duration_ms(d) / total_ms * 100.0
            } else {
                0.0
            }
        };

        for pass in &self.passes {
            let p = &pass.summary;
            let ms = duration_ms(pass.duration);
            lines.push(format!(
                "{:<6} {:>5} {ms:>8.3}ms {:>9.1}%  {}",
                p.pass,
                p.depth,
                pct(pass.duration),
                format_pass(p),
            ));
        }
        lines.push(format!(
            "{:<6} {:>5} {:>8.3}ms {:>9.1}%",
            "finish",
            "",
            duration_ms(self.finish_duration),
            pct(self.finish_duration),
        ));

        lines.push(String::new());
        lines.push(format!(
            "Paths: {} ({} points)  |  Branches: {}  |  Connectors: {}  |  Crossovers: {}",
            s.path_count, s.primary_points, s.branch_count, s.connector_count, s.crossover_count,
        ));
        lines.push(format!("Occupied cells: {} ({:.1}% of output)", s.occupied_cells, coverage(s)));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

#[allow(clippy::cast_precision_loss)]
fn coverage(s: &PatternSummary) -> f64 {
    let cells = u64::from(s.output_width) * u64::from(s.output_height);
    if cells == 0 {
        0.0
    } else {
        s.occupied_cells as f64 / cells as f64 * 100.0
    }
}

fn format_pass(p: &PassSummary) -> String {
    let ceiling = if p.hit_iteration_ceiling { " (ceiling)" } else { "" };
    format!(
        "start=({},{}) iters={}{ceiling} points={}+{} branches={} connectors={} cells={}",
        p.start.x,
        p.start.y,
        p.iterations,
        p.left_points,
        p.right_points,
        p.branches,
        p.connectors,
        p.cells_drawn,
    )
}
