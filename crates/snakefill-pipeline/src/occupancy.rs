//! Occupancy grid: the raster of cells already carrying scaffold lines.
//!
//! The grid may use a different resolution than the shape mask. All
//! drawing methods take mask coordinates and map them through the
//! recorded scale factors (`output / source` per axis), so callers never
//! deal with output pixels directly.
//!
//! Writes are monotonic: a cell that is on never turns off.

use std::borrow::Cow;

use image::GrayImage;
use image::imageops::FilterType;

use crate::types::{Dimensions, Point};

/// Pixel value of an occupied cell.
pub const ON: u8 = 255;

/// Mutable raster of drawn cells with explicit scale factors.
#[derive(Debug, Clone)]
pub struct OccupancyGrid {
    image: GrayImage,
    source: Dimensions,
    scale_x: f64,
    scale_y: f64,
}

impl OccupancyGrid {
    /// An all-zero grid of `output` size for a mask of `source` size.
    #[must_use]
    pub fn new(output: Dimensions, source: Dimensions) -> Self {
        let scale = |out: u32, src: u32| {
            if src == 0 {
                1.0
            } else {
                f64::from(out) / f64::from(src)
            }
        };
        Self {
            image: GrayImage::new(output.width, output.height),
            source,
            scale_x: scale(output.width, source.width),
            scale_y: scale(output.height, source.height),
        }
    }

    /// An all-zero grid at the mask's own resolution.
    #[must_use]
    pub fn matching(source: Dimensions) -> Self {
        Self::new(source, source)
    }

    /// Output dimensions.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.image.width(), self.image.height())
    }

    /// Dimensions of the mask this grid was created for.
    #[must_use]
    pub const fn source_dimensions(&self) -> Dimensions {
        self.source
    }

    /// Horizontal and vertical scale factors (`output / source`).
    #[must_use]
    pub const fn scale(&self) -> (f64, f64) {
        (self.scale_x, self.scale_y)
    }

    /// Borrow the underlying raster (on cells are [`ON`]).
    #[must_use]
    pub const fn as_image(&self) -> &GrayImage {
        &self.image
    }

    /// Whether output cell `(x, y)` is on. Out of bounds is off.
    #[must_use]
    pub fn get(&self, x: i32, y: i32) -> bool {
        self.dimensions().contains(x, y) && self.image.as_raw()[self.raw_index(x, y)] == ON
    }

    /// Whether the output cell a mask point maps to is on.
    #[must_use]
    pub fn is_occupied(&self, p: Point) -> bool {
        let q = self.to_output(p);
        self.get(q.x, q.y)
    }

    /// Number of on cells.
    #[must_use]
    pub fn count_on(&self) -> usize {
        self.image.as_raw().iter().filter(|&&v| v == ON).count()
    }

    /// Whether no cell is on.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.image.as_raw().iter().all(|&v| v != ON)
    }

    /// Row-major `{0, 1}` copy of the grid.
    #[must_use]
    pub fn to_bits(&self) -> Vec<u8> {
        self.image.as_raw().iter().map(|&v| u8::from(v == ON)).collect()
    }

    /// Map a mask point to the output cell it lands in, clamped to the
    /// grid.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_output(&self, p: Point) -> Point {
        let map = |v: i32, scale: f64, len: u32| -> i32 {
            let max = i32::try_from(len).unwrap_or(i32::MAX).saturating_sub(1).max(0);
            ((f64::from(v) * scale).floor() as i32).clamp(0, max)
        };
        Point::new(
            map(p.x, self.scale_x, self.image.width()),
            map(p.y, self.scale_y, self.image.height()),
        )
    }

    /// Turn on the cell a mask point maps to. Returns `true` if it was
    /// off before.
    pub fn mark(&mut self, p: Point) -> bool {
        if !self.source.contains(p.x, p.y) {
            return false;
        }
        let q = self.to_output(p);
        self.set(q)
    }

    /// Rasterize the segment `from -> to` (mask coordinates, both ends
    /// inclusive). Returns the number of cells newly turned on.
    ///
    /// Segments with an endpoint outside the mask are ignored.
    pub fn draw_segment(&mut self, from: Point, to: Point) -> usize {
        if !self.source.contains(from.x, from.y) || !self.source.contains(to.x, to.y) {
            return 0;
        }
        let (a, b) = (self.to_output(from), self.to_output(to));
        line_cells(a, b)
            .into_iter()
            .filter(|&q| self.set(q))
            .count()
    }

    /// Stamp a small filled disc centred on a mask point.
    pub fn stamp(&mut self, p: Point, radius: u32) {
        if !self.source.contains(p.x, p.y) {
            return;
        }
        let q = self.to_output(p);
        imageproc::drawing::draw_filled_circle_mut(
            &mut self.image,
            (q.x, q.y),
            i32::try_from(radius).unwrap_or(i32::MAX),
            image::Luma([ON]),
        );
    }

    /// Logical OR of another grid into this one.
    ///
    /// Grids of different output size are resampled with
    /// nearest-neighbour first.
    pub fn merge(&mut self, other: &Self) {
        let other_image = other.at_resolution(self.dimensions());
        for (dst, &src) in self.image.iter_mut().zip(other_image.as_raw()) {
            if src == ON {
                *dst = ON;
            }
        }
    }

    /// The grid resampled (nearest-neighbour) to `dimensions`, borrowed
    /// when no resampling is needed.
    ///
    /// Meant for combining grids of different output size. Use
    /// [`at_source_resolution`](Self::at_source_resolution) to read the
    /// grid back in mask coordinates.
    #[must_use]
    pub fn at_resolution(&self, dimensions: Dimensions) -> Cow<'_, GrayImage> {
        if dimensions == self.dimensions() {
            Cow::Borrowed(&self.image)
        } else {
            Cow::Owned(image::imageops::resize(
                &self.image,
                dimensions.width,
                dimensions.height,
                FilterType::Nearest,
            ))
        }
    }

    /// The grid at the resolution of its source mask.
    ///
    /// A mask cell is on when any output cell of its footprint is on.
    /// The footprint of mask column `x` is the output columns
    /// `floor(x * s) .. floor((x + 1) * s)` (at least one), the same
    /// mapping [`to_output`](Self::to_output) draws with.
    #[must_use]
    pub fn at_source_resolution(&self) -> Cow<'_, GrayImage> {
        if self.source == self.dimensions() {
            return Cow::Borrowed(&self.image);
        }
        let (width, height) = (self.image.width(), self.image.height());
        Cow::Owned(GrayImage::from_fn(
            self.source.width,
            self.source.height,
            |x, y| {
                let (x0, x1) = footprint(x, self.scale_x, width);
                let (y0, y1) = footprint(y, self.scale_y, height);
                let on = (y0..y1)
                    .any(|oy| (x0..x1).any(|ox| self.image.get_pixel(ox, oy).0[0] == ON));
                image::Luma([if on { ON } else { 0 }])
            },
        ))
    }

    fn set(&mut self, q: Point) -> bool {
        if !self.dimensions().contains(q.x, q.y) {
            return false;
        }
        let i = self.raw_index(q.x, q.y);
        let raw: &mut [u8] = &mut self.image;
        let fresh = raw[i] != ON;
        raw[i] = ON;
        fresh
    }

    #[allow(clippy::cast_sign_loss)]
    fn raw_index(&self, x: i32, y: i32) -> usize {
        y as usize * self.image.width() as usize + x as usize
    }
}

impl PartialEq for OccupancyGrid {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
            && self.dimensions() == other.dimensions()
            && self.image.as_raw() == other.image.as_raw()
    }
}

/// Output cells `lo..hi` covered by source cell `v` along one axis.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn footprint(v: u32, scale: f64, len: u32) -> (u32, u32) {
    let at = |t: f64| ((t * scale).floor().max(0.0) as u32).min(len);
    let lo = at(f64::from(v)).min(len.saturating_sub(1));
    let hi = at(f64::from(v) + 1.0).max(lo + 1).min(len);
    (lo, hi)
}

/// Whether mask cell `p` is on in a raster at mask resolution.
#[must_use]
pub fn raster_on(raster: &GrayImage, p: Point) -> bool {
    Dimensions::new(raster.width(), raster.height())
        .index(p.x, p.y)
        .is_some_and(|i| raster.as_raw()[i] == ON)
}

/// Cells of the Bresenham line from `a` to `b`, both ends inclusive.
#[must_use]
pub fn line_cells(a: Point, b: Point) -> Vec<Point> {
    let dx = (b.x - a.x).abs();
    let dy = -(b.y - a.y).abs();
    let sx = if a.x < b.x { 1 } else { -1 };
    let sy = if a.y < b.y { 1 } else { -1 };
    let mut err = dx + dy;
    let mut p = a;
    let mut cells = Vec::with_capacity(usize::try_from(dx.max(-dy)).unwrap_or(0) + 1);

    loop {
        cells.push(p);
        if p == b {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            p.x += sx;
        }
        if e2 <= dx {
            err += dx;
            p.y += sy;
        }
    }
    cells
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_cells_horizontal_and_vertical() {
        assert_eq!(
            line_cells(Point::new(2, 3), Point::new(5, 3)),
            vec![
                Point::new(2, 3),
                Point::new(3, 3),
                Point::new(4, 3),
                Point::new(5, 3)
            ]
        );
        assert_eq!(
            line_cells(Point::new(1, 4), Point::new(1, 2)),
            vec![Point::new(1, 4), Point::new(1, 3), Point::new(1, 2)]
        );
    }

    #[test]
    fn line_cells_diagonal_is_connected() {
        let cells = line_cells(Point::new(0, 0), Point::new(7, 3));
        assert_eq!(cells.first(), Some(&Point::new(0, 0)));
        assert_eq!(cells.last(), Some(&Point::new(7, 3)));
        for w in cells.windows(2) {
            assert_eq!(w[0].chebyshev(w[1]), 1);
        }
    }

    #[test]
    fn single_point_line() {
        assert_eq!(line_cells(Point::new(4, 4), Point::new(4, 4)), vec![Point::new(4, 4)]);
    }

    #[test]
    fn draw_segment_counts_fresh_cells() {
        let dims = Dimensions::new(10, 10);
        let mut grid = OccupancyGrid::matching(dims);
        assert_eq!(grid.draw_segment(Point::new(1, 1), Point::new(5, 1)), 5);
        assert_eq!(grid.draw_segment(Point::new(3, 1), Point::new(7, 1)), 2);
        assert_eq!(grid.count_on(), 7);
        assert!(grid.is_occupied(Point::new(7, 1)));
        assert!(!grid.is_occupied(Point::new(8, 1)));
    }

    #[test]
    fn out_of_mask_segment_is_ignored() {
        let mut grid = OccupancyGrid::matching(Dimensions::new(5, 5));
        assert_eq!(grid.draw_segment(Point::new(0, 0), Point::new(9, 0)), 0);
        assert!(grid.is_blank());
    }

    #[test]
    fn scaled_writes_land_in_output_cells() {
        let mut grid = OccupancyGrid::new(Dimensions::new(50, 50), Dimensions::new(100, 100));
        assert_eq!(grid.scale(), (0.5, 0.5));
        grid.draw_segment(Point::new(10, 20), Point::new(30, 20));
        assert!(grid.get(5, 10));
        assert!(grid.get(15, 10));
        assert!(!grid.get(16, 10));
        assert_eq!(grid.count_on(), 11);
    }

    #[test]
    fn upscaled_point_maps_and_clamps() {
        let grid = OccupancyGrid::new(Dimensions::new(300, 300), Dimensions::new(100, 100));
        assert_eq!(grid.to_output(Point::new(99, 0)), Point::new(297, 0));
        assert_eq!(grid.to_output(Point::new(500, -3)), Point::new(299, 0));
    }

    #[test]
    fn merge_is_logical_or() {
        let dims = Dimensions::new(8, 8);
        let mut a = OccupancyGrid::matching(dims);
        let mut b = OccupancyGrid::matching(dims);
        a.mark(Point::new(1, 1));
        b.mark(Point::new(6, 6));
        b.mark(Point::new(1, 1));
        a.merge(&b);
        assert_eq!(a.count_on(), 2);
        assert!(a.get(6, 6));
    }

    #[test]
    fn resample_to_source_keeps_coarse_cells() {
        let mut grid = OccupancyGrid::new(Dimensions::new(10, 10), Dimensions::new(20, 20));
        grid.mark(Point::new(4, 4));
        let view = grid.at_source_resolution();
        assert_eq!(view.dimensions(), (20, 20));
        assert!(raster_on(&view, Point::new(4, 4)));
        assert!(!raster_on(&view, Point::new(15, 15)));
    }

    #[test]
    fn upscaled_lines_survive_source_view() {
        let mut grid = OccupancyGrid::new(Dimensions::new(90, 90), Dimensions::new(30, 30));
        grid.draw_segment(Point::new(0, 5), Point::new(29, 5));
        grid.draw_segment(Point::new(7, 10), Point::new(7, 20));
        let view = grid.at_source_resolution();
        assert_eq!(view.dimensions(), (30, 30));
        assert!((0..30).all(|x| raster_on(&view, Point::new(x, 5))));
        assert!(!raster_on(&view, Point::new(3, 4)));
        assert!(!raster_on(&view, Point::new(3, 6)));
        assert!((10..=20).all(|y| raster_on(&view, Point::new(7, y))));
        assert!(!raster_on(&view, Point::new(6, 15)));
        assert!(!raster_on(&view, Point::new(8, 15)));
    }

    #[test]
    fn source_view_agrees_with_is_occupied() {
        for output in [Dimensions::new(13, 17), Dimensions::new(90, 45), Dimensions::new(30, 30)] {
            let mut grid = OccupancyGrid::new(output, Dimensions::new(30, 30));
            grid.draw_segment(Point::new(2, 3), Point::new(25, 3));
            grid.draw_segment(Point::new(25, 3), Point::new(24, 12));
            grid.stamp(Point::new(10, 20), 1);
            let view = grid.at_source_resolution();
            for y in 0..30 {
                for x in 0..30 {
                    let p = Point::new(x, y);
                    if grid.is_occupied(p) {
                        assert!(raster_on(&view, p), "{p:?} lost at {output:?}");
                    }
                }
            }
        }
    }

    #[test]
    fn stamp_turns_on_centre() {
        let mut grid = OccupancyGrid::matching(Dimensions::new(9, 9));
        grid.stamp(Point::new(4, 4), 1);
        assert!(grid.get(4, 4));
        assert!(grid.get(3, 4));
        assert!(grid.get(4, 5));
        assert!(!grid.get(0, 0));
    }

    #[test]
    fn bits_are_zero_or_one() {
        let mut grid = OccupancyGrid::matching(Dimensions::new(3, 1));
        grid.mark(Point::new(2, 0));
        assert_eq!(grid.to_bits(), vec![0, 0, 1]);
    }
}
