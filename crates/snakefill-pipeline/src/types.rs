//! Shared types for the snakefill pattern engine.

use serde::{Deserialize, Serialize};

use crate::occupancy::OccupancyGrid;

/// Re-export `GrayImage` so downstream crates can reference raster
/// data without depending on `image` directly.
pub use image::GrayImage;

/// Hard ceiling on recursive passes, regardless of configuration.
pub const MAX_RECURSION_BUDGET: u32 = 32;

/// Largest pixel distance a single stride-like setting may take (step
/// size, nudge radius, probe step, connector arms and gaps).
pub const MAX_STRIDE: u32 = 4096;

/// Largest number of connector candidates per row pair.
pub const MAX_CANDIDATES_PER_PAIR: usize = 256;

/// A 2D point in mask coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: i32,
    /// Vertical position (pixels from top edge).
    pub y: i32,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Return this point shifted by `(dx, dy)`.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Manhattan (L1) distance to another point.
    #[must_use]
    pub const fn manhattan(self, other: Self) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// Chebyshev (L-infinity) distance to another point.
    #[must_use]
    pub fn chebyshev(self, other: Self) -> u32 {
        self.x.abs_diff(other.x).max(self.y.abs_diff(other.y))
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        let dx = f64::from(self.x) - f64::from(other.x);
        let dy = f64::from(self.y) - f64::from(other.y);
        dx.hypot(dy)
    }

    /// Floor of the coordinate-wise average of two points.
    #[must_use]
    pub const fn midpoint(self, other: Self) -> Self {
        Self::new(
            (self.x + other.x).div_euclid(2),
            (self.y + other.y).div_euclid(2),
        )
    }
}

/// An ordered, append-only sequence of points.
///
/// Paths are grown by the engine while an agent is active and are
/// never mutated once handed out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Path(Vec<Point>);

impl Path {
    /// Create a new path from a vector of points.
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    /// Append a point.
    pub(crate) fn push(&mut self, point: Point) {
        self.0.push(point);
    }

    /// Returns `true` if the path has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of points in the path.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns the first point, if any.
    #[must_use]
    pub fn first(&self) -> Option<&Point> {
        self.0.first()
    }

    /// Returns the last point, if any.
    #[must_use]
    pub fn last(&self) -> Option<&Point> {
        self.0.last()
    }

    /// Returns a slice of all points.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.0
    }

    /// Returns the most recent `n` points (fewer if the path is shorter).
    #[must_use]
    pub fn recent(&self, n: usize) -> &[Point] {
        &self.0[self.0.len().saturating_sub(n)..]
    }
}

/// Raster dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Create new dimensions.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total number of cells.
    #[must_use]
    pub const fn area(self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Whether `(x, y)` addresses a cell inside these dimensions.
    #[must_use]
    pub const fn contains(self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width && (y as u32) < self.height
    }

    /// Row-major index of an in-bounds point.
    #[must_use]
    pub(crate) const fn index(self, x: i32, y: i32) -> Option<usize> {
        if self.contains(x, y) {
            Some(y as usize * self.width as usize + x as usize)
        } else {
            None
        }
    }
}

/// What a path is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathRole {
    /// Traced by the agent that starts heading left.
    PrimaryLeft,
    /// Traced by the agent that starts heading right.
    PrimaryRight,
    /// Relief branch emitted where two agents collided.
    CollisionBranch,
    /// Bracket bridging two nearby scaffold lines.
    Connector,
}

/// A path together with its role and the pass that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TracedPath {
    /// Role of the path in the scaffold.
    pub role: PathRole,
    /// Zero-based pass index (0 is the first-generation pass).
    pub pass: usize,
    /// The points.
    pub path: Path,
}

/// Tuning for [`connector::place_connectors`](crate::connector::place_connectors).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectorConfig {
    /// Minimum occupied cells for a row to count as a scaffold line.
    pub min_row_pixels: usize,
    /// Half the vertical extent of a bracket.
    pub arm_half_height: u32,
    /// Clearance kept between a bracket and the lines it bridges.
    pub gap: u32,
    /// Row pairs farther apart than this are not bridged.
    pub max_separation: u32,
    /// Overlap of the two rows' extents must exceed this.
    pub min_overlap: u32,
    /// Candidate centers distributed along each overlap.
    pub candidates_per_pair: usize,
    /// Shortest horizontal arm.
    pub min_arm: u32,
    /// Longest horizontal arm.
    pub max_arm: u32,
    /// Brackets with fewer points are discarded.
    pub min_points: usize,
    /// Brackets with a larger share of already-drawn points are discarded.
    pub max_on_fraction: f64,
    /// Upper bound on connectors per pass.
    pub max_connectors: usize,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            min_row_pixels: 10,
            arm_half_height: 2,
            gap: 2,
            max_separation: 24,
            min_overlap: 10,
            candidates_per_pair: 3,
            min_arm: 3,
            max_arm: 6,
            min_points: 8,
            max_on_fraction: 1.0 / 3.0,
            max_connectors: 20,
        }
    }
}

/// Configuration for pattern generation.
///
/// All parameters have defaults tuned for masks a few hundred pixels
/// across. Use [`validate`](Self::validate) before running untrusted
/// configurations; [`generate`](crate::generate) calls it for you.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    /// Pixels advanced per horizontal step.
    pub step_size: u32,

    /// Rows descended between two horizontal sweeps.
    pub down_rows: u32,

    /// Agents stop once they are this close to the bottom of the mask.
    pub bottom_margin: u32,

    /// How many of the sibling's most recent points are checked for
    /// collisions.
    pub collision_window: usize,

    /// A destination within this Chebyshev distance of a recent sibling
    /// point is a collision.
    pub collision_radius: u32,

    /// How far a blocked down-step may slide sideways to find shape
    /// below.
    pub nudge_radius: u32,

    /// Consult `row_has_shape` every this many down rows.
    pub row_check_interval: u32,

    /// Consecutive zero-row down-runs tolerated before an agent stops.
    pub max_stalled_turns: u32,

    /// Iteration ceiling for one pass.
    pub max_iterations: usize,

    /// Additional passes allowed after the first.
    ///
    /// Clamped to [`MAX_RECURSION_BUDGET`].
    pub recursion_budget: u32,

    /// Smallest uncovered region that earns a new pass.
    pub min_region_area: usize,

    /// Smallest bounding-box width and height for such a region.
    pub min_region_dimension: u32,

    /// New starts must be farther than this from every used start.
    pub min_start_distance: f64,

    /// Rows between probes when searching for a wider start row.
    pub start_probe_step: u32,

    /// Probes attempted before keeping the original start.
    pub start_probe_limit: u32,

    /// Resolution of the returned occupancy grid. `None` uses the mask
    /// resolution.
    pub output_resolution: Option<Dimensions>,

    /// Spacing of crossover marks along long horizontal runs. `None`
    /// disables crossovers.
    pub crossover_spacing: Option<u32>,

    /// Connector placement tuning.
    pub connector: ConnectorConfig,
}

impl PatternConfig {
    /// Default horizontal step.
    pub const DEFAULT_STEP_SIZE: u32 = 5;
    /// Default rows per down-run.
    pub const DEFAULT_DOWN_ROWS: u32 = 8;
    /// Default sibling collision window.
    pub const DEFAULT_COLLISION_WINDOW: usize = 8;
    /// Default number of recursive passes.
    pub const DEFAULT_RECURSION_BUDGET: u32 = 3;
    /// Default per-pass iteration ceiling.
    pub const DEFAULT_MAX_ITERATIONS: usize = 15_000;
    /// Default minimum region area.
    pub const DEFAULT_MIN_REGION_AREA: usize = 400;
    /// Default minimum distance between pass starts.
    pub const DEFAULT_MIN_START_DISTANCE: f64 = 20.0;

    /// Check the configuration for values the engine cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError::InvalidConfig`] naming the first offending
    /// field.
    pub fn validate(&self) -> Result<(), PatternError> {
        let invalid = |msg: &str| Err(PatternError::InvalidConfig(msg.to_string()));

        if self.step_size == 0 {
            return invalid("step_size must be at least 1");
        }
        if self.down_rows == 0 {
            return invalid("down_rows must be at least 1");
        }
        if self.collision_window == 0 {
            return invalid("collision_window must be at least 1");
        }
        if self.row_check_interval == 0 {
            return invalid("row_check_interval must be at least 1");
        }
        if self.max_stalled_turns == 0 {
            return invalid("max_stalled_turns must be at least 1");
        }
        if !self.min_start_distance.is_finite() || self.min_start_distance < 0.0 {
            return invalid("min_start_distance must be finite and non-negative");
        }
        if self
            .output_resolution
            .is_some_and(|d| d.width == 0 || d.height == 0)
        {
            return invalid("output_resolution must be non-zero in both axes");
        }
        if self.crossover_spacing == Some(0) {
            return invalid("crossover_spacing must be at least 1");
        }
        let c = &self.connector;
        let strides = [
            ("step_size", self.step_size),
            ("nudge_radius", self.nudge_radius),
            ("start_probe_step", self.start_probe_step),
            ("start_probe_limit", self.start_probe_limit),
            ("connector.arm_half_height", c.arm_half_height),
            ("connector.gap", c.gap),
            ("connector.max_arm", c.max_arm),
        ];
        if let Some((name, _)) = strides.iter().find(|&&(_, v)| v > MAX_STRIDE) {
            return Err(PatternError::InvalidConfig(format!(
                "{name} must be at most {MAX_STRIDE}"
            )));
        }
        if c.candidates_per_pair > MAX_CANDIDATES_PER_PAIR {
            return Err(PatternError::InvalidConfig(format!(
                "connector.candidates_per_pair must be at most {MAX_CANDIDATES_PER_PAIR}"
            )));
        }
        if c.min_arm == 0 || c.min_arm > c.max_arm {
            return invalid("connector arms must satisfy 1 <= min_arm <= max_arm");
        }
        if !(0.0..=1.0).contains(&c.max_on_fraction) {
            return invalid("connector max_on_fraction must be within 0.0..=1.0");
        }
        Ok(())
    }

    /// Recursion budget after applying the hard ceiling.
    #[must_use]
    pub fn effective_recursion_budget(&self) -> u32 {
        self.recursion_budget.min(MAX_RECURSION_BUDGET)
    }
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            step_size: Self::DEFAULT_STEP_SIZE,
            down_rows: Self::DEFAULT_DOWN_ROWS,
            bottom_margin: 5,
            collision_window: Self::DEFAULT_COLLISION_WINDOW,
            collision_radius: Self::DEFAULT_STEP_SIZE,
            nudge_radius: 2 * Self::DEFAULT_STEP_SIZE,
            row_check_interval: 1,
            max_stalled_turns: 1,
            max_iterations: Self::DEFAULT_MAX_ITERATIONS,
            recursion_budget: Self::DEFAULT_RECURSION_BUDGET,
            min_region_area: Self::DEFAULT_MIN_REGION_AREA,
            min_region_dimension: 10,
            min_start_distance: Self::DEFAULT_MIN_START_DISTANCE,
            start_probe_step: 2,
            start_probe_limit: 40,
            output_resolution: None,
            crossover_spacing: None,
            connector: ConnectorConfig::default(),
        }
    }
}

/// Per-pass record kept alongside the generated pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassSummary {
    /// Zero-based pass index.
    pub pass: usize,
    /// Recursion depth (0 for the first-generation pass).
    pub depth: u32,
    /// Where both agents started.
    pub start: Point,
    /// Iterations of the alternating step loop.
    pub iterations: usize,
    /// Whether the iteration ceiling cut the pass short.
    pub hit_iteration_ceiling: bool,
    /// Points in the left agent's path.
    pub left_points: usize,
    /// Points in the right agent's path.
    pub right_points: usize,
    /// Collision branches emitted.
    pub branches: usize,
    /// Connectors placed.
    pub connectors: usize,
    /// Occupancy cells this pass turned on.
    pub cells_drawn: usize,
}

/// Result of a generation run.
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    /// Primary agent paths, two per pass, in pass order.
    pub paths: Vec<TracedPath>,
    /// Collision relief branches.
    pub branches: Vec<TracedPath>,
    /// Bracket connectors.
    pub connectors: Vec<TracedPath>,
    /// Crossover marks (empty unless crossovers are enabled).
    pub crossovers: Vec<Point>,
    /// Final merged occupancy at the configured output resolution.
    pub occupancy: OccupancyGrid,
    /// One summary per executed pass.
    pub passes: Vec<PassSummary>,
}

impl Pattern {
    /// Iterate every path of every role.
    pub fn all_paths(&self) -> impl Iterator<Item = &TracedPath> {
        self.paths
            .iter()
            .chain(&self.branches)
            .chain(&self.connectors)
    }

    /// Total points across all primary paths.
    #[must_use]
    pub fn primary_point_count(&self) -> usize {
        self.paths.iter().map(|p| p.path.len()).sum()
    }
}

/// Errors that can occur while building a mask or generating a pattern.
///
/// Uses custom `Serialize`/`Deserialize` because `image::ImageError`
/// does not implement serde traits. The `ImageDecode` variant is
/// serialized as its `Display` string.
#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// Pattern configuration is invalid.
    #[error("invalid pattern configuration: {0}")]
    InvalidConfig(String),
}

/// Serde-compatible proxy for `PatternError`.
#[derive(Serialize, Deserialize)]
enum PatternErrorProxy {
    ImageDecode(String),
    EmptyInput,
    InvalidConfig(String),
}

impl Serialize for PatternError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let proxy = match self {
            Self::ImageDecode(e) => PatternErrorProxy::ImageDecode(e.to_string()),
            Self::EmptyInput => PatternErrorProxy::EmptyInput,
            Self::InvalidConfig(s) => PatternErrorProxy::InvalidConfig(s.clone()),
        };
        proxy.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PatternError {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let proxy = PatternErrorProxy::deserialize(deserializer)?;
        Ok(match proxy {
            // The typed image error cannot be rebuilt; keep its message.
            PatternErrorProxy::ImageDecode(msg) => {
                Self::InvalidConfig(format!("image decode error: {msg}"))
            }
            PatternErrorProxy::EmptyInput => Self::EmptyInput,
            PatternErrorProxy::InvalidConfig(s) => Self::InvalidConfig(s),
        })
    }
}
