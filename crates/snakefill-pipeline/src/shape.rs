//! Binary shape masks: the fillable region.
//!
//! A [`ShapeMask`] is an immutable boolean raster. Every query is
//! bounds-checked, so callers may probe arbitrary coordinates.
//!
//! Masks are usually built by thresholding a grayscale image
//! ([`ShapeMask::from_gray`]) or straight from encoded bytes
//! ([`decode_mask`]).

use image::GrayImage;

use crate::types::{Dimensions, PatternError, Point};

/// Luminance above which a pixel counts as inside the shape.
pub const DEFAULT_THRESHOLD: u8 = 127;

/// Immutable binary raster defining the fillable region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeMask {
    dimensions: Dimensions,
    cells: Vec<bool>,
    row_counts: Vec<u32>,
}

impl ShapeMask {
    /// Build a mask by evaluating `inside(x, y)` for every cell.
    #[must_use]
    pub fn from_fn(width: u32, height: u32, mut inside: impl FnMut(u32, u32) -> bool) -> Self {
        let dimensions = Dimensions::new(width, height);
        let mut cells = Vec::with_capacity(dimensions.area());
        let mut row_counts = Vec::with_capacity(height as usize);
        for y in 0..height {
            let mut count = 0;
            for x in 0..width {
                let v = inside(x, y);
                count += u32::from(v);
                cells.push(v);
            }
            row_counts.push(count);
        }
        Self {
            dimensions,
            cells,
            row_counts,
        }
    }

    /// Threshold a grayscale image: luminance strictly above `threshold`
    /// is inside.
    #[must_use]
    pub fn from_gray(image: &GrayImage, threshold: u8) -> Self {
        Self::from_fn(image.width(), image.height(), |x, y| {
            image.get_pixel(x, y).0[0] > threshold
        })
    }

    /// A mask with no inside cells.
    #[must_use]
    pub fn empty(width: u32, height: u32) -> Self {
        Self::from_fn(width, height, |_, _| false)
    }

    /// Mask dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Mask width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.dimensions.width
    }

    /// Mask height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.dimensions.height
    }

    /// Whether `(x, y)` is in bounds and inside the shape.
    #[must_use]
    pub fn is_inside(&self, x: i32, y: i32) -> bool {
        self.dimensions
            .index(x, y)
            .is_some_and(|i| self.cells[i])
    }

    /// [`is_inside`](Self::is_inside) for a [`Point`].
    #[must_use]
    pub fn contains(&self, p: Point) -> bool {
        self.is_inside(p.x, p.y)
    }

    /// Whether row `y` has at least one inside cell.
    #[must_use]
    pub fn row_has_shape(&self, y: i32) -> bool {
        self.row_count(y) > 0
    }

    /// Number of inside cells in row `y` (0 when out of bounds).
    #[must_use]
    pub fn row_count(&self, y: i32) -> u32 {
        usize::try_from(y)
            .ok()
            .and_then(|y| self.row_counts.get(y))
            .copied()
            .unwrap_or(0)
    }

    /// Total inside cells.
    #[must_use]
    pub fn inside_count(&self) -> usize {
        self.row_counts.iter().map(|&c| c as usize).sum()
    }

    /// Whether the mask has no inside cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.row_counts.iter().all(|&c| c == 0)
    }

    /// Topmost inside point: the floor of the mean x over the first
    /// populated row.
    #[must_use]
    pub fn topmost(&self) -> Option<Point> {
        let y = self.row_counts.iter().position(|&c| c > 0)?;
        self.row_center(to_coord(y))
    }

    /// Bottommost inside point: the floor of the mean x over the last
    /// populated row.
    #[must_use]
    pub fn bottommost(&self) -> Option<Point> {
        let y = self.row_counts.iter().rposition(|&c| c > 0)?;
        self.row_center(to_coord(y))
    }

    /// Leftmost inside point: the floor of the mean y over the first
    /// populated column.
    #[must_use]
    pub fn leftmost(&self) -> Option<Point> {
        (0..to_coord(self.width() as usize)).find_map(|x| self.column_center(x))
    }

    /// Rightmost inside point: the floor of the mean y over the last
    /// populated column.
    #[must_use]
    pub fn rightmost(&self) -> Option<Point> {
        (0..to_coord(self.width() as usize))
            .rev()
            .find_map(|x| self.column_center(x))
    }

    /// Maximal horizontal runs of inside cells in row `y`, as inclusive
    /// `(start_x, end_x)` pairs, left to right.
    #[must_use]
    pub fn row_runs(&self, y: i32) -> Vec<(i32, i32)> {
        let mut runs = Vec::new();
        let mut start = None;
        for x in 0..=to_coord(self.width() as usize) {
            match (start, self.is_inside(x, y)) {
                (None, true) => start = Some(x),
                (Some(s), false) => {
                    runs.push((s, x - 1));
                    start = None;
                }
                _ => {}
            }
        }
        runs
    }

    /// Distance to the last inside cell walking from `p` in direction
    /// `dx` (−1 or 1) along the row. Zero when the neighbour is outside.
    #[must_use]
    pub fn clearance(&self, p: Point, dx: i32) -> u32 {
        let dx = dx.signum();
        if dx == 0 {
            return 0;
        }
        let mut n = 0;
        let mut x = p.x + dx;
        while self.is_inside(x, p.y) {
            n += 1;
            x += dx;
        }
        n
    }

    fn row_center(&self, y: i32) -> Option<Point> {
        let (sum, count) = (0..to_coord(self.width() as usize))
            .filter(|&x| self.is_inside(x, y))
            .fold((0_i64, 0_i64), |(s, c), x| (s + i64::from(x), c + 1));
        (count > 0).then(|| Point::new(to_coord_i64(sum.div_euclid(count)), y))
    }

    fn column_center(&self, x: i32) -> Option<Point> {
        let (sum, count) = (0..to_coord(self.height() as usize))
            .filter(|&y| self.is_inside(x, y))
            .fold((0_i64, 0_i64), |(s, c), y| (s + i64::from(y), c + 1));
        (count > 0).then(|| Point::new(x, to_coord_i64(sum.div_euclid(count))))
    }
}

/// Convert an index into a coordinate, saturating on absurd sizes.
pub(crate) fn to_coord(v: usize) -> i32 {
    i32::try_from(v).unwrap_or(i32::MAX)
}

/// Convert a configured length into a coordinate offset.
pub(crate) fn to_offset(v: u32) -> i32 {
    i32::try_from(v).unwrap_or(i32::MAX)
}

fn to_coord_i64(v: i64) -> i32 {
    i32::try_from(v).unwrap_or(i32::MAX)
}

/// Decode raw image bytes and threshold them into a [`ShapeMask`].
///
/// Supports PNG, JPEG, BMP, and WebP. The image is converted to
/// luminance first, then binarized with [`ShapeMask::from_gray`].
///
/// # Errors
///
/// Returns [`PatternError::EmptyInput`] if `bytes` is empty.
/// Returns [`PatternError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
pub fn decode_mask(bytes: &[u8], threshold: u8) -> Result<ShapeMask, PatternError> {
    if bytes.is_empty() {
        return Err(PatternError::EmptyInput);
    }

    let img = image::load_from_memory(bytes)?;
    Ok(ShapeMask::from_gray(&img.to_luma8(), threshold))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn rect(width: u32, height: u32, x0: u32, y0: u32, x1: u32, y1: u32) -> ShapeMask {
        ShapeMask::from_fn(width, height, |x, y| {
            (x0..=x1).contains(&x) && (y0..=y1).contains(&y)
        })
    }

    fn encode_gray(img: &GrayImage) -> Vec<u8> {
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::L8,
        )
        .unwrap();
        buf
    }

    #[test]
    fn out_of_bounds_queries_are_outside() {
        let mask = rect(10, 10, 0, 0, 9, 9);
        assert!(mask.is_inside(0, 0));
        assert!(!mask.is_inside(-1, 0));
        assert!(!mask.is_inside(10, 3));
        assert!(!mask.row_has_shape(-4));
        assert!(!mask.row_has_shape(10));
    }

    #[test]
    fn extremal_points_of_rectangle() {
        let mask = rect(20, 20, 4, 6, 10, 12);
        assert_eq!(mask.topmost(), Some(Point::new(7, 6)));
        assert_eq!(mask.bottommost(), Some(Point::new(7, 12)));
        assert_eq!(mask.leftmost(), Some(Point::new(4, 9)));
        assert_eq!(mask.rightmost(), Some(Point::new(10, 9)));
    }

    #[test]
    fn empty_mask_has_no_extremes() {
        let mask = ShapeMask::empty(8, 8);
        assert!(mask.is_empty());
        assert_eq!(mask.topmost(), None);
        assert_eq!(mask.rightmost(), None);
        assert_eq!(mask.inside_count(), 0);
    }

    #[test]
    fn row_runs_split_on_gaps() {
        let mask = ShapeMask::from_fn(12, 1, |x, _| x != 3 && x != 4 && x < 10);
        assert_eq!(mask.row_runs(0), vec![(0, 2), (5, 9)]);
        assert!(mask.row_runs(1).is_empty());
    }

    #[test]
    fn clearance_counts_inside_neighbours() {
        let mask = rect(20, 3, 2, 0, 12, 2);
        let p = Point::new(5, 1);
        assert_eq!(mask.clearance(p, -1), 3);
        assert_eq!(mask.clearance(p, 1), 7);
    }

    #[test]
    fn threshold_is_strict() {
        let img = GrayImage::from_fn(3, 1, |x, _| image::Luma([[0, 127, 128][x as usize]]));
        let mask = ShapeMask::from_gray(&img, DEFAULT_THRESHOLD);
        assert!(!mask.is_inside(0, 0));
        assert!(!mask.is_inside(1, 0));
        assert!(mask.is_inside(2, 0));
    }

    #[test]
    fn decode_empty_input_is_error() {
        assert!(matches!(
            decode_mask(&[], DEFAULT_THRESHOLD),
            Err(PatternError::EmptyInput)
        ));
    }

    #[test]
    fn decode_corrupt_input_is_error() {
        assert!(matches!(
            decode_mask(&[0xFF, 0x00, 0x12], DEFAULT_THRESHOLD),
            Err(PatternError::ImageDecode(_))
        ));
    }

    #[test]
    fn decode_png_round_trips_shape() {
        let img = GrayImage::from_fn(6, 4, |x, y| image::Luma([if x > 2 && y > 0 { 255 } else { 0 }]));
        let mask = decode_mask(&encode_gray(&img), DEFAULT_THRESHOLD).unwrap();
        assert_eq!(mask.dimensions(), Dimensions::new(6, 4));
        assert_eq!(mask.inside_count(), 9);
        assert_eq!(mask.topmost(), Some(Point::new(4, 1)));
    }
}
