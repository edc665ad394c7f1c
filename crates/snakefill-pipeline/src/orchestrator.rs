//! Pass orchestration: start selection, agent pairs, recursion into
//! uncovered regions.

use image::GrayImage;
use tracing::debug;

use crate::agent::{AgentParams, Side, SnakeAgent};
use crate::connector::place_connectors;
use crate::crossover::crossover_points;
use crate::ledger::PassState;
use crate::occupancy::{OccupancyGrid, raster_on};
use crate::random::RandomSource;
use crate::region::{RegionCriteria, next_region};
use crate::shape::{ShapeMask, to_coord, to_offset};
use crate::types::{
    Dimensions, MAX_STRIDE, PassSummary, PathRole, Pattern, PatternConfig, PatternError, Point,
    TracedPath,
};

/// Radius of the disc stamped for each crossover mark.
const CROSSOVER_RADIUS: u32 = 1;

/// Fill `mask` with zigzag scaffold paths.
///
/// # Steps
///
/// 1. Validate the configuration
/// 2. Locate the start point (topmost point, re-anchored on a wider row
///    when the top is too narrow)
/// 3. Run a left/right agent pair until both stop or the iteration
///    ceiling is reached
/// 4. Place connectors on the pass occupancy and merge it into the
///    accumulated grid
/// 5. While recursion budget remains, seed another pass in the first
///    qualifying uncovered region
/// 6. Optionally stamp crossover marks
///
/// An empty mask yields an empty [`Pattern`] with an all-zero grid.
///
/// # Errors
///
/// Returns [`PatternError::InvalidConfig`] if `config` fails
/// [`PatternConfig::validate`].
pub fn generate<R: RandomSource + ?Sized>(
    mask: &ShapeMask,
    config: &PatternConfig,
    rng: &mut R,
) -> Result<Pattern, PatternError> {
    generate_observed(mask, config, rng, &mut |_: &PassSummary| {})
}

/// [`generate`], calling `on_pass` after every finished pass.
pub(crate) fn generate_observed<R: RandomSource + ?Sized>(
    mask: &ShapeMask,
    config: &PatternConfig,
    rng: &mut R,
    on_pass: &mut dyn FnMut(&PassSummary),
) -> Result<Pattern, PatternError> {
    // 1. Validate.
    config.validate()?;

    let source = mask.dimensions();
    let output = config.output_resolution.unwrap_or(source);
    let mut acc = Accumulator::new(OccupancyGrid::new(output, source));

    // 2. Locate the start point.
    let Some(seed) = mask.topmost() else {
        debug!("mask has no inside pixels");
        return Ok(acc.into_pattern(Vec::new()));
    };
    let start = locate_start(mask, seed, None, config);
    acc.used_starts.push(start);

    // 3-5. Passes, recursing into uncovered regions.
    let ctx = Context {
        mask,
        config,
        params: AgentParams::from(config),
        criteria: RegionCriteria::from(config),
        output,
    };
    fill(&ctx, start, 0, config.effective_recursion_budget(), &mut acc, rng, on_pass);

    // 6. Crossovers.
    let crossovers = match config.crossover_spacing {
        Some(spacing) => acc.stamp_crossovers(spacing),
        None => Vec::new(),
    };

    Ok(acc.into_pattern(crossovers))
}

/// Pick where a pass begins.
///
/// `seed` is kept when it is free and has at least `step_size` free
/// pixels on both sides. Otherwise rows below it are probed every
/// `start_probe_step` rows (up to `start_probe_limit` probes) and the
/// start re-anchors at the midpoint of the free run containing `seed.x`,
/// or of the row's longest free run. Free means inside `mask` and, when
/// `obstacles` is given, off in that mask-resolution raster.
///
/// Falls back to the midpoint of the longest free run on the seed row,
/// then to `seed` itself.
#[must_use]
pub fn locate_start(
    mask: &ShapeMask,
    seed: Point,
    obstacles: Option<&GrayImage>,
    config: &PatternConfig,
) -> Point {
    let free = |p: Point| mask.contains(p) && !obstacles.is_some_and(|o| raster_on(o, p));
    let step = to_offset(config.step_size.min(MAX_STRIDE));
    let clearance = |p: Point, dx: i32| {
        (1..=step)
            .take_while(|&k| free(p.offset(dx * k, 0)))
            .count()
    };
    let step_len = usize::try_from(step).unwrap_or(usize::MAX);
    let roomy = |p: Point| free(p) && clearance(p, -1) >= step_len && clearance(p, 1) >= step_len;

    if roomy(seed) {
        return seed;
    }

    let probe_step = to_offset(config.start_probe_step.clamp(1, MAX_STRIDE));
    for k in 1..=to_offset(config.start_probe_limit.min(MAX_STRIDE)) {
        let y = seed.y + k * probe_step;
        if !mask.row_has_shape(y) {
            continue;
        }
        let runs = free_runs(mask.width(), y, &free);
        let run = runs
            .iter()
            .find(|&&(a, b)| (a..=b).contains(&seed.x))
            .or_else(|| runs.iter().max_by_key(|&&(a, b)| b - a));
        if let Some(&(a, b)) = run {
            let mid = Point::new((a + b).div_euclid(2), y);
            if roomy(mid) {
                debug!(from_y = seed.y, x = mid.x, y = mid.y, "re-anchored start on a wider row");
                return mid;
            }
        }
    }

    if free(seed) {
        return seed;
    }
    free_runs(mask.width(), seed.y, &free)
        .into_iter()
        .max_by_key(|&(a, b)| b - a)
        .map_or(seed, |(a, b)| Point::new((a + b).div_euclid(2), seed.y))
}

/// Inclusive runs of free cells in row `y`.
fn free_runs(width: u32, y: i32, free: &impl Fn(Point) -> bool) -> Vec<(i32, i32)> {
    let mut runs = Vec::new();
    let mut start = None;
    for x in 0..=to_coord(width as usize) {
        match (start, free(Point::new(x, y))) {
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

/// Everything that stays fixed across passes.
struct Context<'a> {
    mask: &'a ShapeMask,
    config: &'a PatternConfig,
    params: AgentParams,
    criteria: RegionCriteria,
    output: Dimensions,
}

/// Artifacts merged across passes.
struct Accumulator {
    paths: Vec<TracedPath>,
    branches: Vec<TracedPath>,
    connectors: Vec<TracedPath>,
    occupancy: OccupancyGrid,
    used_starts: Vec<Point>,
    passes: Vec<PassSummary>,
}

impl Accumulator {
    const fn new(occupancy: OccupancyGrid) -> Self {
        Self {
            paths: Vec::new(),
            branches: Vec::new(),
            connectors: Vec::new(),
            occupancy,
            used_starts: Vec::new(),
            passes: Vec::new(),
        }
    }

    fn stamp_crossovers(&mut self, spacing: u32) -> Vec<Point> {
        let marks: Vec<Point> = self
            .paths
            .iter()
            .flat_map(|p| crossover_points(&p.path, spacing))
            .collect();
        for &m in &marks {
            self.occupancy.stamp(m, CROSSOVER_RADIUS);
        }
        debug!(count = marks.len(), spacing, "stamped crossovers");
        marks
    }

    fn into_pattern(self, crossovers: Vec<Point>) -> Pattern {
        Pattern {
            paths: self.paths,
            branches: self.branches,
            connectors: self.connectors,
            crossovers,
            occupancy: self.occupancy,
            passes: self.passes,
        }
    }
}

/// Run one pass from `start`, then recurse while budget remains.
fn fill<R: RandomSource + ?Sized>(
    ctx: &Context<'_>,
    start: Point,
    depth: u32,
    budget: u32,
    acc: &mut Accumulator,
    rng: &mut R,
    on_pass: &mut dyn FnMut(&PassSummary),
) {
    let pass_index = acc.passes.len();
    let is_recursive = depth > 0;
    let prior = is_recursive.then(|| acc.occupancy.at_source_resolution().into_owned());
    let mut pass = PassState::new(ctx.output, ctx.mask.dimensions(), start, prior);
    let mut left = SnakeAgent::new(Side::Left, start, ctx.params, is_recursive);
    let mut right = SnakeAgent::new(Side::Right, start, ctx.params, is_recursive);

    let mut iterations = 0;
    while iterations < ctx.config.max_iterations {
        let left_active = left.move_step(ctx.mask, &mut pass, &right, rng);
        let right_active = right.move_step(ctx.mask, &mut pass, &left, rng);
        if !left_active && !right_active {
            break;
        }
        iterations += 1;
    }
    let hit_iteration_ceiling = left.is_active() || right.is_active();
    if hit_iteration_ceiling {
        debug!(pass = pass_index, iterations, "iteration ceiling reached");
    }

    let connectors = place_connectors(ctx.mask, &pass.occupancy, &ctx.config.connector, rng);

    let before = acc.occupancy.count_on();
    acc.occupancy.merge(&pass.occupancy);
    let cells_drawn = acc.occupancy.count_on() - before;

    let (left_path, left_branches) = left.into_parts();
    let (right_path, right_branches) = right.into_parts();
    let summary = PassSummary {
        pass: pass_index,
        depth,
        start,
        iterations,
        hit_iteration_ceiling,
        left_points: left_path.len(),
        right_points: right_path.len(),
        branches: left_branches.len() + right_branches.len(),
        connectors: connectors.len(),
        cells_drawn,
    };
    debug!(
        pass = pass_index,
        depth,
        x = start.x,
        y = start.y,
        iterations,
        left_points = summary.left_points,
        right_points = summary.right_points,
        branches = summary.branches,
        connectors = summary.connectors,
        cells_drawn,
        "pass finished"
    );

    let traced = |role, path| TracedPath {
        role,
        pass: pass_index,
        path,
    };
    acc.paths.push(traced(PathRole::PrimaryLeft, left_path));
    acc.paths.push(traced(PathRole::PrimaryRight, right_path));
    acc.branches.extend(
        left_branches
            .into_iter()
            .chain(right_branches)
            .map(|b| traced(PathRole::CollisionBranch, b)),
    );
    acc.connectors
        .extend(connectors.into_iter().map(|c| traced(PathRole::Connector, c)));
    on_pass(&summary);
    acc.passes.push(summary);

    if budget == 0 {
        debug!(depth, "recursion budget exhausted");
        return;
    }

    let Some(region) = next_region(ctx.mask, &acc.occupancy, &acc.used_starts, &ctx.criteria)
    else {
        return;
    };
    let covered = acc.occupancy.at_source_resolution().into_owned();
    let mut next = locate_start(ctx.mask, region.topmost, Some(&covered), ctx.config);
    if !ctx.mask.contains(next) || raster_on(&covered, next) {
        next = region.pixels.first().copied().unwrap_or(region.topmost);
    }
    acc.used_starts.push(region.topmost);
    if next != region.topmost {
        acc.used_starts.push(next);
    }

    fill(ctx, next, depth + 1, budget - 1, acc, rng, on_pass);
}
