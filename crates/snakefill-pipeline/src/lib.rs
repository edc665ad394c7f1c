//! snakefill-pipeline: zigzag scaffold fill for binary shapes (sans-IO).
//!
//! Fills the inside of a [`ShapeMask`] with continuous zigzag "snake"
//! paths:
//! shape mask -> start point -> paired agents -> collision branches ->
//! connectors -> recursive passes into uncovered regions -> crossovers.
//!
//! This crate has **no I/O dependencies** -- masks come from in-memory
//! byte slices or images, and results are plain data. All randomness
//! goes through an injected [`RandomSource`], so a seeded source makes a
//! run reproducible.

pub mod agent;
pub mod branch;
pub mod connector;
pub mod crossover;
pub mod diagnostics;
pub mod ledger;
pub mod occupancy;
pub mod orchestrator;
pub mod random;
pub mod region;
pub mod shape;
pub mod types;

pub use agent::{Side, SnakeAgent, Termination};
pub use occupancy::OccupancyGrid;
pub use orchestrator::{generate, locate_start};
pub use random::{RandomSource, SeededRandom};
pub use region::{Region, RegionCriteria, find_next_region};
pub use shape::{ShapeMask, decode_mask};
pub use types::{
    ConnectorConfig, Dimensions, PassSummary, Path, PathRole, Pattern, PatternConfig,
    PatternError, Point, TracedPath,
};
