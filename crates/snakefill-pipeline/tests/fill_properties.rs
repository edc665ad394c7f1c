//! End-to-end properties of the fill engine on synthetic masks.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashSet;

use snakefill_pipeline::occupancy::line_cells;
use snakefill_pipeline::types::GrayImage;
use snakefill_pipeline::{
    Dimensions, OccupancyGrid, PathRole, Pattern, PatternConfig, Point, RegionCriteria,
    SeededRandom, ShapeMask, TracedPath, decode_mask, find_next_region, generate,
};

fn rect(width: u32, height: u32, x0: u32, y0: u32, x1: u32, y1: u32) -> ShapeMask {
    ShapeMask::from_fn(width, height, |x, y| {
        (x0..=x1).contains(&x) && (y0..=y1).contains(&y)
    })
}

fn disc(size: u32, radius: f64) -> ShapeMask {
    let c = f64::from(size) / 2.0;
    ShapeMask::from_fn(size, size, |x, y| {
        let dx = f64::from(x) - c;
        let dy = f64::from(y) - c;
        dx.hypot(dy) <= radius
    })
}

fn run(mask: &ShapeMask, config: &PatternConfig, seed: u64) -> Pattern {
    generate(mask, config, &mut SeededRandom::new(seed)).expect("valid config")
}

fn primary(pattern: &Pattern, pass: usize, role: PathRole) -> &TracedPath {
    pattern
        .paths
        .iter()
        .find(|p| p.pass == pass && p.role == role)
        .expect("pass has both primary paths")
}

fn cells_of(path: &TracedPath) -> HashSet<Point> {
    let pts = path.path.points();
    let mut cells: HashSet<Point> = pts.iter().copied().collect();
    for w in pts.windows(2) {
        cells.extend(line_cells(w[0], w[1]));
    }
    cells
}

#[test]
fn every_point_lies_inside_the_mask() {
    let mask = disc(160, 70.0);
    let config = PatternConfig {
        crossover_spacing: Some(10),
        ..PatternConfig::default()
    };
    let pattern = run(&mask, &config, 17);

    assert!(!pattern.paths.is_empty());
    for traced in pattern.all_paths() {
        for &p in traced.path.points() {
            assert!(mask.contains(p), "{:?} point {p:?} is outside", traced.role);
        }
    }
    for &c in &pattern.crossovers {
        assert!(mask.contains(c), "crossover {c:?} is outside");
    }
}

#[test]
fn siblings_never_overlap_within_a_pass() {
    let mask = disc(160, 70.0);
    let pattern = run(&mask, &PatternConfig::default(), 5);

    for summary in &pattern.passes {
        let left = cells_of(primary(&pattern, summary.pass, PathRole::PrimaryLeft));
        let right = cells_of(primary(&pattern, summary.pass, PathRole::PrimaryRight));
        let shared: Vec<_> = left
            .intersection(&right)
            .filter(|&&c| c != summary.start)
            .collect();
        assert!(shared.is_empty(), "pass {} shares {shared:?}", summary.pass);
    }
}

#[test]
fn symmetric_rectangle_gives_mirror_paths() {
    // Symmetric about x = 60.
    let mask = rect(121, 120, 10, 10, 110, 100);
    let pattern = run(&mask, &PatternConfig::default(), 1);

    let left = primary(&pattern, 0, PathRole::PrimaryLeft);
    let right = primary(&pattern, 0, PathRole::PrimaryRight);
    let mirrored: Vec<Point> = left
        .path
        .points()
        .iter()
        .map(|p| Point::new(120 - p.x, p.y))
        .collect();
    assert_eq!(mirrored, right.path.points());

    let on_left = |left: bool| {
        pattern
            .branches
            .iter()
            .filter(|b| b.pass == 0)
            .filter(|b| b.path.first().is_some_and(|p| (p.x < 60) == left))
            .count()
    };
    assert_eq!(on_left(true), on_left(false));
}

#[test]
fn region_finder_on_full_grid_returns_none() {
    let mask = rect(50, 50, 5, 5, 44, 44);
    let mut grid = OccupancyGrid::matching(mask.dimensions());
    for y in 0..50 {
        grid.draw_segment(Point::new(0, y), Point::new(49, y));
    }
    let criteria = RegionCriteria {
        min_area: 1,
        min_dimension: 1,
        min_distance: 0.0,
    };
    assert_eq!(find_next_region(&mask, &grid, &[], &criteria), None);
}

#[test]
fn recursive_starts_are_never_reused() {
    let mask = disc(200, 90.0);
    let config = PatternConfig {
        recursion_budget: 8,
        min_region_area: 50,
        min_region_dimension: 5,
        ..PatternConfig::default()
    };
    let pattern = run(&mask, &config, 23);
    let starts: Vec<Point> = pattern.passes.iter().map(|p| p.start).collect();
    assert!(pattern.passes.len() <= 9);
    for (i, a) in starts.iter().enumerate() {
        for b in &starts[..i] {
            assert!(a != b, "start {a:?} reused");
        }
    }
}

#[test]
fn region_finder_skips_regions_near_used_starts() {
    let mask = ShapeMask::from_fn(60, 60, |x, y| {
        ((5..25).contains(&x) || (35..55).contains(&x)) && (5..25).contains(&y)
    });
    let grid = OccupancyGrid::matching(mask.dimensions());
    let criteria = RegionCriteria {
        min_area: 1,
        min_dimension: 1,
        min_distance: 10.0,
    };
    let used = [Point::new(14, 5)];
    let found = find_next_region(&mask, &grid, &used, &criteria).unwrap();
    assert_eq!(found, Point::new(44, 5));
    assert!(used.iter().all(|u| u.distance(found) > criteria.min_distance));
}

#[test]
fn same_seed_same_pattern() {
    let mask = disc(140, 60.0);
    let config = PatternConfig {
        crossover_spacing: Some(8),
        ..PatternConfig::default()
    };
    let a = run(&mask, &config, 99);
    let b = run(&mask, &config, 99);
    assert_eq!(a, b);
}

#[test]
fn one_pixel_corridors_terminate_within_budget() {
    // A comb of single-pixel teeth hanging from a bar.
    let mask = ShapeMask::from_fn(90, 90, |x, y| {
        (5..85).contains(&x) && (y == 5 || (y > 5 && y < 80 && x % 4 == 1))
    });
    let config = PatternConfig {
        recursion_budget: 1_000,
        min_region_area: 1,
        min_region_dimension: 1,
        min_start_distance: 0.0,
        ..PatternConfig::default()
    };
    let pattern = run(&mask, &config, 4);
    assert!(!pattern.passes.is_empty());
    assert!(pattern.passes.len() <= 33);
    assert!(pattern.passes.iter().all(|p| p.iterations <= config.max_iterations));
}

#[test]
fn empty_mask_gives_empty_outputs() {
    let mask = ShapeMask::empty(64, 48);
    let pattern = run(&mask, &PatternConfig::default(), 0);
    assert!(pattern.paths.is_empty());
    assert!(pattern.branches.is_empty());
    assert!(pattern.connectors.is_empty());
    assert!(pattern.occupancy.is_blank());
    assert_eq!(pattern.occupancy.dimensions(), Dimensions::new(64, 48));
}

#[test]
fn small_island_never_seeds_a_pass() {
    let island = |x: u32, y: u32| (100..105).contains(&x) && (100..105).contains(&y);
    let mask = ShapeMask::from_fn(120, 120, |x, y| {
        (10..90).contains(&x) && (10..90).contains(&y) || island(x, y)
    });
    let pattern = run(&mask, &PatternConfig::default(), 8);
    for summary in &pattern.passes {
        let s = summary.start;
        assert!(!(100..105).contains(&s.x) || !(100..105).contains(&s.y));
    }

    let alone =
        ShapeMask::from_fn(50, 50, |x, y| (20..25).contains(&x) && (20..25).contains(&y));
    let pattern = run(&alone, &PatternConfig::default(), 8);
    assert_eq!(pattern.passes.len(), 1, "only the initial pass runs");
}

#[test]
fn filled_square_zigzags_downward() {
    let n: usize = 100;
    let mask = rect(120, 120, 10, 10, 109, 109);
    let config = PatternConfig::default();
    let pattern = run(&mask, &config, 12);

    let initial: Vec<&TracedPath> = pattern.paths.iter().filter(|p| p.pass == 0).collect();
    assert_eq!(initial.len(), 2);

    let step = config.step_size as usize;
    let down = config.down_rows as usize;
    let points: usize = initial.iter().map(|p| p.path.len()).sum();
    assert!(points >= 2 * n / step, "only {points} points");
    assert!(points <= 2 * (n / step + 1 + down) * (n / down + 2), "{points} points");

    for traced in &initial {
        let ys: Vec<i32> = traced.path.points().iter().map(|p| p.y).collect();
        assert!(ys.windows(2).all(|w| w[0] <= w[1]), "{:?} climbs", traced.role);
    }
}

#[test]
fn output_resolution_is_independent_of_paths() {
    let mask = disc(120, 50.0);
    let native = run(&mask, &PatternConfig::default(), 3);
    let config = PatternConfig {
        output_resolution: Some(Dimensions::new(60, 60)),
        ..PatternConfig::default()
    };
    let scaled = run(&mask, &config, 3);

    assert_eq!(scaled.occupancy.dimensions(), Dimensions::new(60, 60));
    assert_eq!(scaled.occupancy.source_dimensions(), mask.dimensions());
    let pass0 = |p: &Pattern| -> Vec<TracedPath> {
        p.paths.iter().filter(|t| t.pass == 0).cloned().collect()
    };
    assert_eq!(pass0(&native), pass0(&scaled));
    assert!(!scaled.occupancy.is_blank());
}

#[test]
fn upscaled_output_keeps_recursion_and_connectors() {
    let mask = rect(120, 120, 10, 10, 109, 109);
    let native = run(&mask, &PatternConfig::default(), 6);
    let config = PatternConfig {
        output_resolution: Some(Dimensions::new(360, 360)),
        ..PatternConfig::default()
    };
    let scaled = run(&mask, &config, 6);

    assert_eq!(scaled.occupancy.dimensions(), Dimensions::new(360, 360));
    assert!(!scaled.connectors.is_empty());
    assert_eq!(scaled.connectors, native.connectors);
    assert_eq!(scaled.paths, native.paths);
    assert_eq!(scaled.branches, native.branches);
    let starts = |p: &Pattern| -> Vec<Point> { p.passes.iter().map(|s| s.start).collect() };
    assert_eq!(starts(&scaled), starts(&native));
}

#[test]
fn decoded_png_fills_like_the_source_mask() {
    let img = GrayImage::from_fn(80, 80, |x, y| {
        image::Luma([if (10..70).contains(&x) && (10..70).contains(&y) { 255 } else { 0 }])
    });
    let mut bytes = Vec::new();
    image::ImageEncoder::write_image(
        image::codecs::png::PngEncoder::new(&mut bytes),
        img.as_raw(),
        img.width(),
        img.height(),
        image::ExtendedColorType::L8,
    )
    .unwrap();

    let decoded = decode_mask(&bytes, 127).unwrap();
    let direct = ShapeMask::from_gray(&img, 127);
    assert_eq!(decoded, direct);
    assert_eq!(
        run(&decoded, &PatternConfig::default(), 2),
        run(&direct, &PatternConfig::default(), 2)
    );
}
