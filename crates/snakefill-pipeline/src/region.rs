//! Finding uncovered parts of the shape.
//!
//! After a pass, the cells that are inside the shape but not yet occupied
//! split into 4-connected components. The first component (in row-major
//! scan order) that is large enough, and whose topmost point is far
//! enough from every start used so far, seeds the next pass.

use std::collections::VecDeque;

use image::GrayImage;
use tracing::debug;

use crate::occupancy::{OccupancyGrid, raster_on};
use crate::shape::{ShapeMask, to_coord};
use crate::types::{Dimensions, PatternConfig, Point};

/// Thresholds a component must meet to earn a pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionCriteria {
    /// Minimum pixel count.
    pub min_area: usize,
    /// Minimum bounding-box width and height.
    pub min_dimension: u32,
    /// The topmost point must be strictly farther than this from every
    /// used start.
    pub min_distance: f64,
}

impl From<&PatternConfig> for RegionCriteria {
    fn from(config: &PatternConfig) -> Self {
        Self {
            min_area: config.min_region_area,
            min_dimension: config.min_region_dimension,
            min_distance: config.min_start_distance,
        }
    }
}

/// A connected component of uncovered shape pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    /// Member pixels in discovery order.
    pub pixels: Vec<Point>,
    /// Inclusive bounding-box corner with the smallest coordinates.
    pub min: Point,
    /// Inclusive bounding-box corner with the largest coordinates.
    pub max: Point,
    /// Floor of the mean x over the region's first row, on that row.
    pub topmost: Point,
}

impl Region {
    /// Pixel count.
    #[must_use]
    pub fn area(&self) -> usize {
        self.pixels.len()
    }

    /// Bounding-box width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.max.x.abs_diff(self.min.x) + 1
    }

    /// Bounding-box height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.max.y.abs_diff(self.min.y) + 1
    }

    fn from_pixels(pixels: Vec<Point>) -> Option<Self> {
        let first = *pixels.first()?;
        let (mut min, mut max) = (first, first);
        for p in &pixels {
            min = Point::new(min.x.min(p.x), min.y.min(p.y));
            max = Point::new(max.x.max(p.x), max.y.max(p.y));
        }
        let (sum, count) = pixels
            .iter()
            .filter(|p| p.y == min.y)
            .fold((0_i64, 0_i64), |(s, c), p| (s + i64::from(p.x), c + 1));
        let x = i32::try_from(sum.div_euclid(count.max(1))).unwrap_or(min.x);
        Some(Self {
            pixels,
            min,
            max,
            topmost: Point::new(x, min.y),
        })
    }

    fn qualifies(&self, criteria: &RegionCriteria) -> bool {
        self.area() >= criteria.min_area
            && self.width() >= criteria.min_dimension
            && self.height() >= criteria.min_dimension
    }
}

/// The first qualifying uncovered region, or `None`.
///
/// `occupancy` is read back at mask resolution when the two differ: a
/// mask pixel counts as covered when any cell of its footprint is on.
#[must_use]
pub fn next_region(
    mask: &ShapeMask,
    occupancy: &OccupancyGrid,
    used_starts: &[Point],
    criteria: &RegionCriteria,
) -> Option<Region> {
    let covered = occupancy.at_source_resolution();
    let mut search = FloodSearch::new(mask, &covered);
    let mut rejected = 0_usize;

    while let Some(region) = search.next_component() {
        if !region.qualifies(criteria) {
            rejected += 1;
            continue;
        }
        let crowded = used_starts
            .iter()
            .any(|s| s.distance(region.topmost) <= criteria.min_distance);
        if crowded {
            rejected += 1;
            continue;
        }
        debug!(
            area = region.area(),
            x = region.topmost.x,
            y = region.topmost.y,
            rejected,
            "found uncovered region"
        );
        return Some(region);
    }
    debug!(rejected, "no qualifying region left");
    None
}

/// Start point of the first qualifying uncovered region.
#[must_use]
pub fn find_next_region(
    mask: &ShapeMask,
    occupancy: &OccupancyGrid,
    used_starts: &[Point],
    criteria: &RegionCriteria,
) -> Option<Point> {
    next_region(mask, occupancy, used_starts, criteria).map(|r| r.topmost)
}

/// Row-major scan over `inside ∧ ¬covered`, yielding one component per
/// unvisited seed.
struct FloodSearch<'a> {
    mask: &'a ShapeMask,
    covered: &'a GrayImage,
    dimensions: Dimensions,
    visited: Vec<bool>,
    cursor: usize,
}

impl<'a> FloodSearch<'a> {
    fn new(mask: &'a ShapeMask, covered: &'a GrayImage) -> Self {
        let dimensions = mask.dimensions();
        Self {
            mask,
            covered,
            dimensions,
            visited: vec![false; dimensions.area()],
            cursor: 0,
        }
    }

    fn is_empty_cell(&self, p: Point) -> bool {
        self.mask.contains(p) && !raster_on(self.covered, p)
    }

    fn point_at(&self, i: usize) -> Point {
        let w = (self.dimensions.width as usize).max(1);
        Point::new(to_coord(i % w), to_coord(i / w))
    }

    fn next_component(&mut self) -> Option<Region> {
        while self.cursor < self.visited.len() {
            let i = self.cursor;
            self.cursor += 1;
            if self.visited[i] {
                continue;
            }
            self.visited[i] = true;
            let seed = self.point_at(i);
            if self.is_empty_cell(seed) {
                return Region::from_pixels(self.fill(seed));
            }
        }
        None
    }

    fn fill(&mut self, seed: Point) -> Vec<Point> {
        let mut pixels = Vec::new();
        let mut queue = VecDeque::from([seed]);
        while let Some(p) = queue.pop_front() {
            pixels.push(p);
            for (dx, dy) in [(1, 0), (-1, 0), (0, 1), (0, -1)] {
                let q = p.offset(dx, dy);
                let Some(j) = self.dimensions.index(q.x, q.y) else {
                    continue;
                };
                if !self.visited[j] && self.is_empty_cell(q) {
                    self.visited[j] = true;
                    queue.push_back(q);
                }
            }
        }
        pixels
    }
}
