//! Bracket connectors between neighbouring scaffold lines.
//!
//! Consecutive well-populated rows of a pass's occupancy are the
//! horizontal sweeps of the zigzag. Where two of them run side by side
//! with room in between, small `⊏`/`⊐` brackets are dropped into the gap.

use image::GrayImage;
use tracing::trace;

use crate::occupancy::{OccupancyGrid, raster_on};
use crate::random::{RandomSource, sample_indices};
use crate::shape::{ShapeMask, to_coord, to_offset};
use crate::types::{ConnectorConfig, MAX_CANDIDATES_PER_PAIR, MAX_STRIDE, Path, Point};

/// Horizontal extent of one populated row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RowSpan {
    y: i32,
    min_x: i32,
    max_x: i32,
}

/// Which way the bracket's open side faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BracketOpening {
    /// `⊏`: arms extend right of the spine.
    Right,
    /// `⊐`: arms extend left of the spine.
    Left,
}

/// Place connectors between consecutive populated rows of `occupancy`.
///
/// Works on the occupancy resampled to mask resolution. Every returned
/// path lies inside `mask`.
pub fn place_connectors<R: RandomSource + ?Sized>(
    mask: &ShapeMask,
    occupancy: &OccupancyGrid,
    config: &ConnectorConfig,
    rng: &mut R,
) -> Vec<Path> {
    let view = occupancy.at_source_resolution();
    let rows = populated_rows(&view, config.min_row_pixels);
    let half = to_offset(config.arm_half_height.min(MAX_STRIDE));
    let min_separation = 2 * half + to_offset(config.gap.min(MAX_STRIDE));
    let max_separation = to_offset(config.max_separation);

    let mut accepted = Vec::new();
    for pair in rows.windows(2) {
        let (upper, lower) = (pair[0], pair[1]);
        let separation = lower.y - upper.y;
        if separation < min_separation || separation > max_separation {
            continue;
        }
        let lo = upper.min_x.max(lower.min_x);
        let hi = upper.max_x.min(lower.max_x);
        let width = hi - lo;
        if width <= to_offset(config.min_overlap) {
            continue;
        }

        let cy = (upper.y + lower.y).div_euclid(2);
        let k = i64::try_from(config.candidates_per_pair.min(MAX_CANDIDATES_PER_PAIR)).unwrap_or(0);
        for i in 0..k {
            let offset = (i + 1) * i64::from(width) / (k + 1);
            let Ok(cx) = i32::try_from(i64::from(lo) + offset) else {
                continue;
            };
            let opening = if rng.coin() {
                BracketOpening::Right
            } else {
                BracketOpening::Left
            };
            let arm = rng.next_int(
                to_offset(config.min_arm.min(MAX_STRIDE)),
                to_offset(config.max_arm.min(MAX_STRIDE)),
            );
            let Some(path) = bracket(Point::new(cx, cy), half, arm, opening, mask) else {
                continue;
            };
            if path.len() < config.min_points || on_fraction(&path, &view) > config.max_on_fraction {
                continue;
            }
            trace!(cx, cy, arm, ?opening, "connector placed");
            accepted.push(path);
        }
    }

    if accepted.len() > config.max_connectors {
        let keep = sample_indices(rng, accepted.len(), config.max_connectors);
        let mut slots: Vec<Option<Path>> = accepted.into_iter().map(Some).collect();
        return keep.into_iter().filter_map(|i| slots[i].take()).collect();
    }
    accepted
}

/// Rows with at least `min_pixels` on cells, top to bottom.
fn populated_rows(view: &GrayImage, min_pixels: usize) -> Vec<RowSpan> {
    let width = to_coord(view.width() as usize);
    (0..to_coord(view.height() as usize))
        .filter_map(|y| {
            let xs: Vec<i32> = (0..width)
                .filter(|&x| raster_on(view, Point::new(x, y)))
                .collect();
            if xs.len() < min_pixels.max(1) {
                return None;
            }
            Some(RowSpan {
                y,
                min_x: *xs.first()?,
                max_x: *xs.last()?,
            })
        })
        .collect()
}

/// Trace a three-segment bracket whose spine runs through `center`.
///
/// Returns `None` as soon as a step would leave the shape.
#[must_use]
pub fn bracket(
    center: Point,
    half_height: i32,
    arm: i32,
    opening: BracketOpening,
    mask: &ShapeMask,
) -> Option<Path> {
    let sx = match opening {
        BracketOpening::Right => 1,
        BracketOpening::Left => -1,
    };
    let top = Point::new(center.x, center.y - half_height);
    let bottom = Point::new(center.x, center.y + half_height);

    let mut cursor = top.offset(sx * arm, 0);
    if !mask.contains(cursor) {
        return None;
    }
    let mut points = vec![cursor];
    let legs = [
        (top, (-sx, 0)),
        (bottom, (0, 1)),
        (bottom.offset(sx * arm, 0), (sx, 0)),
    ];
    for (target, (dx, dy)) in legs {
        while cursor != target {
            cursor = cursor.offset(dx, dy);
            if !mask.contains(cursor) {
                return None;
            }
            points.push(cursor);
        }
    }
    Some(Path::new(points))
}

#[allow(clippy::cast_precision_loss)]
fn on_fraction(path: &Path, view: &GrayImage) -> f64 {
    if path.is_empty() {
        return 0.0;
    }
    let on = path.points().iter().filter(|&&p| raster_on(view, p)).count();
    on as f64 / path.len() as f64
}
