//! Per-pass bookkeeping at mask resolution.
//!
//! The occupancy grid only records *that* a cell is drawn, possibly at a
//! coarser resolution. The [`PassLedger`] records *which* agent of the
//! current pass claimed each mask cell, which is what keeps siblings from
//! overlapping, and remembers the path vertices both agents laid down
//! (the "occupied points" collision branches are measured against).

use std::collections::HashSet;

use image::GrayImage;

use crate::agent::Side;
use crate::occupancy::OccupancyGrid;
use crate::types::{Dimensions, Point};

const FREE: u8 = 0;
const SHARED: u8 = u8::MAX;

/// Membership test over a set of points.
pub trait PointSet {
    /// Whether `p` is in the set.
    fn contains_point(&self, p: Point) -> bool;
}

impl PointSet for HashSet<Point> {
    fn contains_point(&self, p: Point) -> bool {
        self.contains(&p)
    }
}

impl PointSet for [Point] {
    fn contains_point(&self, p: Point) -> bool {
        self.contains(&p)
    }
}

/// Ownership of mask cells for the two agents of one pass.
#[derive(Debug, Clone)]
pub struct PassLedger {
    dimensions: Dimensions,
    owners: Vec<u8>,
    vertices: Vec<bool>,
    origin: Point,
}

impl PassLedger {
    /// A fresh ledger whose only entry is the shared start pixel.
    #[must_use]
    pub fn new(dimensions: Dimensions, origin: Point) -> Self {
        let mut ledger = Self {
            dimensions,
            owners: vec![FREE; dimensions.area()],
            vertices: vec![false; dimensions.area()],
            origin,
        };
        if let Some(i) = dimensions.index(origin.x, origin.y) {
            ledger.owners[i] = SHARED;
            ledger.vertices[i] = true;
        }
        ledger
    }

    /// The pass's shared start pixel.
    #[must_use]
    pub const fn origin(&self) -> Point {
        self.origin
    }

    /// Which agent claimed `p`, if exactly one did.
    #[must_use]
    pub fn owner(&self, p: Point) -> Option<Side> {
        let i = self.dimensions.index(p.x, p.y)?;
        Side::from_tag(self.owners[i])
    }

    /// Whether `p` belongs to the sibling of `me`.
    #[must_use]
    pub fn is_claimed_by_other(&self, p: Point, me: Side) -> bool {
        self.owner(p) == Some(me.sibling())
    }

    /// Claim free cells for `me`. Cells already claimed are left alone.
    pub fn claim(&mut self, cells: &[Point], me: Side) {
        for p in cells {
            if let Some(i) = self.dimensions.index(p.x, p.y)
                && self.owners[i] == FREE
            {
                self.owners[i] = me.tag();
            }
        }
    }

    /// Record a path vertex.
    pub fn add_vertex(&mut self, p: Point) {
        if let Some(i) = self.dimensions.index(p.x, p.y) {
            self.vertices[i] = true;
        }
    }

    /// Number of cells claimed by `side`.
    #[must_use]
    pub fn claimed_count(&self, side: Side) -> usize {
        self.owners.iter().filter(|&&o| o == side.tag()).count()
    }
}

impl PointSet for PassLedger {
    fn contains_point(&self, p: Point) -> bool {
        self.dimensions
            .index(p.x, p.y)
            .is_some_and(|i| self.vertices[i])
    }
}

/// Everything the two agents of one pass share.
#[derive(Debug, Clone)]
pub struct PassState {
    /// Cells drawn during this pass, at output resolution.
    pub occupancy: OccupancyGrid,
    /// Mask-resolution ownership of those cells.
    pub ledger: PassLedger,
    /// Coverage left by earlier passes, at mask resolution. `None` for the
    /// first-generation pass.
    pub prior: Option<GrayImage>,
}

impl PassState {
    /// Start a pass at `origin`, marking the origin as drawn.
    #[must_use]
    pub fn new(
        output: Dimensions,
        source: Dimensions,
        origin: Point,
        prior: Option<GrayImage>,
    ) -> Self {
        let mut occupancy = OccupancyGrid::new(output, source);
        occupancy.mark(origin);
        Self {
            occupancy,
            ledger: PassLedger::new(source, origin),
            prior,
        }
    }
}
