//! Crossover marks along long horizontal runs.

use crate::types::{Path, Point};

/// Evenly spaced marks along every horizontal run of `path` longer than
/// `spacing`.
///
/// Consecutive collinear horizontal segments are merged into one run
/// first. A run of length `len` gets `n = len / spacing` marks at
/// fractions `j / (n + 1)` of its length, with x rounded down.
#[must_use]
pub fn crossover_points(path: &Path, spacing: u32) -> Vec<Point> {
    let spacing = spacing.max(1);
    horizontal_runs(path.points())
        .into_iter()
        .flat_map(|(start, end)| {
            let dx = end.x - start.x;
            let len = dx.unsigned_abs();
            let n = if len > spacing { len / spacing } else { 0 };
            let n = i32::try_from(n).unwrap_or(0);
            (1..=n).map(move |j| Point::new(start.x + (j * dx).div_euclid(n + 1), start.y))
        })
        .collect()
}

/// Maximal runs of consecutive horizontal segments heading the same way.
fn horizontal_runs(points: &[Point]) -> Vec<(Point, Point)> {
    let mut runs = Vec::new();
    let mut current: Option<(Point, Point)> = None;

    for w in points.windows(2) {
        let (a, b) = (w[0], w[1]);
        if a == b {
            continue;
        }
        if a.y != b.y {
            runs.extend(current.take());
            continue;
        }
        current = match current {
            Some((start, end)) if end == a && (end.x - start.x).signum() == (b.x - a.x).signum() => {
                Some((start, b))
            }
            other => {
                runs.extend(other);
                Some((a, b))
            }
        };
    }
    runs.extend(current);
    runs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(points: &[(i32, i32)]) -> Path {
        Path::new(points.iter().map(|&(x, y)| Point::new(x, y)).collect())
    }

    #[test]
    fn short_steps_merge_into_one_run() {
        let p = path(&[(0, 0), (5, 0), (10, 0), (15, 0), (20, 0), (25, 0), (30, 0)]);
        assert_eq!(
            crossover_points(&p, 10),
            vec![Point::new(7, 0), Point::new(15, 0), Point::new(22, 0)]
        );
    }

    #[test]
    fn runs_break_at_turns() {
        let p = path(&[(0, 0), (5, 0), (10, 0), (10, 1), (10, 2), (5, 2), (0, 2)]);
        assert_eq!(
            crossover_points(&p, 10),
            Vec::<Point>::new(),
            "each run is exactly 10 long, not longer"
        );
        let marks = crossover_points(&p, 4);
        assert_eq!(marks.len(), 4);
        assert!(marks[..2].iter().all(|m| m.y == 0));
        assert!(marks[2..].iter().all(|m| m.y == 2));
    }

    #[test]
    fn leftward_runs_count_from_their_start() {
        let p = path(&[(30, 4), (20, 4), (10, 4), (0, 4)]);
        assert_eq!(
            crossover_points(&p, 10),
            vec![Point::new(22, 4), Point::new(15, 4), Point::new(7, 4)]
        );
    }

    #[test]
    fn vertical_paths_have_no_crossovers() {
        let p = path(&[(3, 0), (3, 20), (3, 40)]);
        assert!(crossover_points(&p, 5).is_empty());
    }
}
