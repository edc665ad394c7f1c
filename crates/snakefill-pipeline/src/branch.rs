//! Collision relief branches.
//!
//! When two agents meet, the one that gave way leaves a short straight
//! stub centred between the two lines. The stub's half-length follows the
//! local vertical spread of the scaffold, so branches in tight spots stay
//! short.

use crate::ledger::PointSet;
use crate::random::RandomSource;
use crate::shape::ShapeMask;
use crate::types::{Path, Point};

/// Neighbourhood (Chebyshev) sampled for the bump height.
const HEIGHT_SEARCH_RADIUS: i32 = 10;
/// Neighbourhood (Manhattan) searched for the opposing line.
const MIDPOINT_SEARCH_RADIUS: u32 = 3;
const MIN_BUMP_HEIGHT: i32 = 1;
const MAX_BUMP_HEIGHT: i32 = 20;
const DEFAULT_BUMP_HEIGHT: i32 = 5;

/// Half-length of a branch at `point`: the vertical spread of occupied
/// points nearby, clamped to `1..=20` (5 when fewer than two are found).
#[must_use]
pub fn bump_height(point: Point, occupied: &(impl PointSet + ?Sized)) -> i32 {
    let r = HEIGHT_SEARCH_RADIUS;
    let ys: Vec<i32> = (-r..=r)
        .flat_map(|dy| (-r..=r).map(move |dx| point.offset(dx, dy)))
        .filter(|&p| occupied.contains_point(p))
        .map(|p| p.y)
        .collect();
    match (ys.iter().min(), ys.iter().max()) {
        (Some(&lo), Some(&hi)) if ys.len() >= 2 => (hi - lo).clamp(MIN_BUMP_HEIGHT, MAX_BUMP_HEIGHT),
        _ => DEFAULT_BUMP_HEIGHT,
    }
}

/// Centre of a branch: halfway between `point` and the nearest other
/// occupied point, or `point` itself when there is none nearby or the
/// halfway point falls outside the shape.
#[must_use]
pub fn branch_midpoint(point: Point, mask: &ShapeMask, occupied: &(impl PointSet + ?Sized)) -> Point {
    let r = MIDPOINT_SEARCH_RADIUS.cast_signed();
    let mut nearest: Option<(u32, Point)> = None;
    for dy in -r..=r {
        for dx in -r..=r {
            let q = point.offset(dx, dy);
            let d = point.manhattan(q);
            if q == point || d > MIDPOINT_SEARCH_RADIUS || !occupied.contains_point(q) {
                continue;
            }
            if nearest.is_none_or(|(best, _)| d < best) {
                nearest = Some((d, q));
            }
        }
    }
    nearest
        .map(|(_, q)| point.midpoint(q))
        .filter(|&mid| mask.contains(mid))
        .unwrap_or(point)
}

/// Build a relief branch for a collision at `point`.
///
/// The branch starts at [`branch_midpoint`], runs up to `H` pixels one
/// way along a random axis, then up to `H` pixels the other way, where
/// `H` is [`bump_height`]. Each half stops at the shape boundary, so the
/// result holds at most `2H + 1` points, all inside `mask`. Returns an
/// empty path if even the midpoint is outside.
pub fn build_branch<R: RandomSource + ?Sized>(
    point: Point,
    mask: &ShapeMask,
    occupied: &(impl PointSet + ?Sized),
    rng: &mut R,
) -> Path {
    let height = bump_height(point, occupied);
    let mid = branch_midpoint(point, mask, occupied);
    if !mask.contains(mid) {
        return Path::default();
    }

    let horizontal = rng.next_int(1, 2) == 1;
    let sign = if rng.next_int(1, 2) == 1 { 1 } else { -1 };
    let (dx, dy) = if horizontal { (sign, 0) } else { (0, sign) };

    let mut points = vec![mid];
    for dir in [1, -1] {
        for k in 1..=height {
            let p = mid.offset(dx * dir * k, dy * dir * k);
            if !mask.contains(p) {
                break;
            }
            points.push(p);
        }
    }
    Path::new(points)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::random::SeededRandom;

    fn set(points: &[(i32, i32)]) -> HashSet<Point> {
        points.iter().map(|&(x, y)| Point::new(x, y)).collect()
    }

    #[test]
    fn bump_height_defaults_when_sparse() {
        let occupied = set(&[(10, 10)]);
        assert_eq!(bump_height(Point::new(10, 10), &occupied), DEFAULT_BUMP_HEIGHT);
    }

    #[test]
    fn bump_height_is_vertical_spread() {
        let occupied = set(&[(10, 10), (12, 18), (30, 40)]);
        assert_eq!(bump_height(Point::new(10, 10), &occupied), 8);
    }

    #[test]
    fn bump_height_is_at_least_one() {
        let occupied = set(&[(10, 10), (15, 10)]);
        assert_eq!(bump_height(Point::new(10, 10), &occupied), 1);
    }

    #[test]
    fn midpoint_uses_nearest_neighbour() {
        let mask = ShapeMask::from_fn(30, 30, |_, _| true);
        let occupied = set(&[(10, 10), (10, 13), (12, 10)]);
        assert_eq!(
            branch_midpoint(Point::new(10, 10), &mask, &occupied),
            Point::new(11, 10)
        );
    }

    #[test]
    fn midpoint_falls_back_to_point() {
        let mask = ShapeMask::from_fn(30, 30, |_, _| true);
        let occupied = set(&[(20, 20)]);
        assert_eq!(
            branch_midpoint(Point::new(10, 10), &mask, &occupied),
            Point::new(10, 10)
        );
    }

    #[test]
    fn branch_stays_inside_and_bounded() {
        let mask = ShapeMask::from_fn(40, 40, |x, y| (5..35).contains(&x) && (8..12).contains(&y));
        let occupied = set(&[(20, 10), (20, 2), (21, 10)]);
        let mut rng = SeededRandom::new(4);
        for _ in 0..20 {
            let branch = build_branch(Point::new(20, 10), &mask, &occupied, &mut rng);
            let h = bump_height(Point::new(20, 10), &occupied);
            assert!(!branch.is_empty());
            assert!(branch.len() <= 2 * usize::try_from(h).unwrap_or(0) + 1);
            assert!(branch.points().iter().all(|&p| mask.contains(p)));
        }
    }

    #[test]
    fn branch_is_straight_through_midpoint() {
        let mask = ShapeMask::from_fn(60, 60, |_, _| true);
        let occupied = set(&[(30, 30)]);
        let mut rng = SeededRandom::new(11);
        let branch = build_branch(Point::new(30, 30), &mask, &occupied, &mut rng);
        let pts = branch.points();
        assert_eq!(pts.len(), 2 * usize::try_from(DEFAULT_BUMP_HEIGHT).unwrap_or(0) + 1);
        assert_eq!(pts[0], Point::new(30, 30));
        let same_row = pts.iter().all(|p| p.y == 30);
        let same_col = pts.iter().all(|p| p.x == 30);
        assert!(same_row || same_col);
    }
}
