//! Snake agents: the zigzag traversal state machine.
//!
//! An agent sweeps horizontally in steps of `step_size` until it reaches
//! the shape boundary (or its sibling), turns down for `down_rows` rows,
//! and turns again so that the next sweep runs the opposite way. Two
//! agents start from the same point with opposite headings and take turns.
//!
//! The decision logic lives in [`advance`], a pure function from the
//! current [`AgentState`] and a read-only [`StepView`] to a
//! [`Transition`]. [`SnakeAgent::move_step`] applies the resulting
//! [`Effect`] to the path, the pass occupancy, and the pass ledger.

use image::GrayImage;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::branch::build_branch;
use crate::ledger::{PassLedger, PassState};
use crate::occupancy::{line_cells, raster_on};
use crate::random::RandomSource;
use crate::shape::{ShapeMask, to_offset};
use crate::types::{MAX_STRIDE, Path, PatternConfig, Point};

/// Which of the two agents of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Starts heading left.
    Left,
    /// Starts heading right.
    Right,
}

impl Side {
    /// Initial heading of an agent on this side.
    #[must_use]
    pub const fn initial_heading(self) -> Heading {
        match self {
            Self::Left => Heading::Left,
            Self::Right => Heading::Right,
        }
    }

    /// The other agent.
    #[must_use]
    pub const fn sibling(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }

    pub(crate) const fn tag(self) -> u8 {
        match self {
            Self::Left => 1,
            Self::Right => 2,
        }
    }

    pub(crate) const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Self::Left),
            2 => Some(Self::Right),
            _ => None,
        }
    }
}

/// Axis-aligned unit heading. `y` grows downward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Heading {
    Left,
    Right,
    Up,
    Down,
}

impl Heading {
    /// Unit vector `(dx, dy)`.
    #[must_use]
    pub const fn delta(self) -> (i32, i32) {
        match self {
            Self::Left => (-1, 0),
            Self::Right => (1, 0),
            Self::Up => (0, -1),
            Self::Down => (0, 1),
        }
    }

    const fn from_delta(dx: i32, dy: i32) -> Self {
        match (dx, dy) {
            (-1, 0) => Self::Left,
            (1, 0) => Self::Right,
            (0, -1) => Self::Up,
            _ => Self::Down,
        }
    }

    /// Rotate 90°: right maps `(dx, dy)` to `(-dy, dx)`, left maps it to
    /// `(dy, -dx)`.
    #[must_use]
    pub const fn turned(self, turn: Turn) -> Self {
        let (dx, dy) = self.delta();
        match turn {
            Turn::Right => Self::from_delta(-dy, dx),
            Turn::Left => Self::from_delta(dy, -dx),
        }
    }
}

/// Direction of a 90° turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Turn {
    Left,
    Right,
}

impl Turn {
    /// The opposite turn.
    #[must_use]
    pub const fn flipped(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

/// Phase of the zigzag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraversalState {
    /// Sweeping horizontally toward the boundary.
    ToEdge,
    /// Descending after a right turn.
    TurnRightDown,
    /// Descending after a left turn.
    TurnLeftDown,
}

impl TraversalState {
    /// The descending state entered by `turn`.
    #[must_use]
    pub const fn descending(turn: Turn) -> Self {
        match turn {
            Turn::Right => Self::TurnRightDown,
            Turn::Left => Self::TurnLeftDown,
        }
    }
}

/// Why an agent stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    /// Reached the bottom margin of the mask.
    BottomMargin,
    /// The next row holds no shape at all.
    EmptyRow,
    /// Too many down-runs in a row ended without descending.
    DeadEnd,
    /// Hit the sibling or earlier coverage during a recursive pass.
    Collision,
}

/// Geometry knobs an agent needs, taken from [`PatternConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentParams {
    pub step_size: u32,
    pub down_rows: u32,
    pub bottom_margin: u32,
    pub collision_window: usize,
    pub collision_radius: u32,
    pub nudge_radius: u32,
    pub row_check_interval: u32,
    pub max_stalled_turns: u32,
}

impl From<&PatternConfig> for AgentParams {
    fn from(config: &PatternConfig) -> Self {
        Self {
            step_size: config.step_size,
            down_rows: config.down_rows,
            bottom_margin: config.bottom_margin,
            collision_window: config.collision_window,
            collision_radius: config.collision_radius,
            nudge_radius: config.nudge_radius,
            row_check_interval: config.row_check_interval.max(1),
            max_stalled_turns: config.max_stalled_turns.max(1),
        }
    }
}

/// Complete traversal state of one agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentState {
    pub position: Point,
    pub heading: Heading,
    pub traversal: TraversalState,
    /// Rows descended in the current down-run.
    pub down_counter: u32,
    /// Turn taken at the next boundary.
    pub bias: Turn,
    /// Consecutive down-runs that ended without descending.
    pub stalls: u32,
}

impl AgentState {
    /// Sweeping from `position` along `heading`.
    #[must_use]
    pub const fn new(position: Point, heading: Heading) -> Self {
        Self {
            position,
            heading,
            traversal: TraversalState::ToEdge,
            down_counter: 0,
            bias: Turn::Right,
            stalls: 0,
        }
    }
}

/// What one step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Turned or gave up a down-run without moving.
    Idle,
    /// Moved along the segment `from -> to`.
    Advanced { from: Point, to: Point },
    /// Blocked by the sibling at `at`; a relief branch belongs there.
    Collided { at: Point },
    /// Stopped for good.
    Terminated(Termination),
}

/// Result of [`advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub state: AgentState,
    pub effect: Effect,
}

impl Transition {
    const fn idle(state: AgentState) -> Self {
        Self {
            state,
            effect: Effect::Idle,
        }
    }

    const fn terminate(state: AgentState, reason: Termination) -> Self {
        Self {
            state,
            effect: Effect::Terminated(reason),
        }
    }
}

/// Read-only world an agent decides against.
#[derive(Debug, Clone, Copy)]
pub struct StepView<'a> {
    pub mask: &'a ShapeMask,
    pub params: &'a AgentParams,
    pub side: Side,
    pub ledger: &'a PassLedger,
    /// The sibling's most recent path points.
    pub sibling_trail: &'a [Point],
    /// Earlier passes' coverage at mask resolution.
    pub prior: Option<&'a GrayImage>,
    pub is_recursive: bool,
}

enum Below {
    Free(Point),
    Blocked,
    Outside,
}

impl StepView<'_> {
    fn blocked(&self, p: Point) -> bool {
        self.ledger.is_claimed_by_other(p, self.side) || self.prior.is_some_and(|raster| raster_on(raster, p))
    }

    /// Whether stepping onto `to` through `cells` (excluding the current
    /// position) runs into the sibling or earlier coverage.
    fn collides(&self, to: Point, cells: &[Point]) -> bool {
        let origin = self.ledger.origin();
        let radius = self.params.collision_radius;
        self.sibling_trail
            .iter()
            .any(|&q| q != origin && q.chebyshev(to) <= radius)
            || cells.iter().any(|&c| self.blocked(c))
    }

    fn below(&self, from: Point, exit: Heading) -> Below {
        let below = from.offset(0, 1);
        if self.mask.contains(below) {
            return if self.blocked(below) {
                Below::Blocked
            } else {
                Below::Free(below)
            };
        }
        let (dx, _) = exit.delta();
        for d in 1..=to_offset(self.params.nudge_radius.min(MAX_STRIDE)) {
            let to = below.offset(dx * d, 0);
            if !self.mask.contains(to) {
                continue;
            }
            let cells = line_cells(from, to);
            if cells.iter().all(|&c| self.mask.contains(c))
                && !cells[1..].iter().any(|&c| self.blocked(c))
            {
                return Below::Free(to);
            }
        }
        Below::Outside
    }
}

/// Decide the next step. Pure: the caller applies the [`Effect`].
#[must_use]
pub fn advance(state: &AgentState, view: &StepView<'_>) -> Transition {
    let floor = i64::from(view.mask.height()) - i64::from(view.params.bottom_margin);
    if i64::from(state.position.y) >= floor {
        return Transition::terminate(*state, Termination::BottomMargin);
    }
    match state.traversal {
        TraversalState::ToEdge => sweep(state, view),
        TraversalState::TurnRightDown => descend(state, view, Turn::Right),
        TraversalState::TurnLeftDown => descend(state, view, Turn::Left),
    }
}

fn sweep(state: &AgentState, view: &StepView<'_>) -> Transition {
    let (dx, dy) = state.heading.delta();
    let step = to_offset(view.params.step_size.min(MAX_STRIDE));
    let from = state.position;
    let to = from.offset(dx * step, dy * step);
    // Only rasterize segments whose destination is inside.
    let cells = if view.mask.contains(to) {
        line_cells(from, to)
    } else {
        Vec::new()
    };

    if cells.is_empty() || !cells.iter().all(|&c| view.mask.contains(c)) {
        return Transition::idle(AgentState {
            heading: state.heading.turned(state.bias),
            traversal: TraversalState::descending(state.bias),
            down_counter: 0,
            ..*state
        });
    }

    if view.collides(to, &cells[1..]) {
        if view.is_recursive {
            return Transition::terminate(*state, Termination::Collision);
        }
        let turn = state.bias.flipped();
        return Transition {
            state: AgentState {
                heading: state.heading.turned(turn),
                traversal: TraversalState::descending(turn),
                down_counter: 0,
                bias: turn,
                ..*state
            },
            effect: Effect::Collided { at: from },
        };
    }

    Transition {
        state: AgentState {
            position: to,
            ..*state
        },
        effect: Effect::Advanced { from, to },
    }
}

fn descend(state: &AgentState, view: &StepView<'_>, turn: Turn) -> Transition {
    let params = view.params;
    let from = state.position;

    if state.down_counter % params.row_check_interval == 0 && !view.mask.row_has_shape(from.y + 1) {
        return Transition::terminate(*state, Termination::EmptyRow);
    }

    match view.below(from, state.heading.turned(turn)) {
        Below::Free(to) => {
            let moved = AgentState {
                position: to,
                down_counter: state.down_counter + 1,
                stalls: 0,
                ..*state
            };
            let next = if moved.down_counter >= params.down_rows {
                finish_run(&moved, turn)
            } else {
                moved
            };
            Transition {
                state: next,
                effect: Effect::Advanced { from, to },
            }
        }
        Below::Blocked if view.is_recursive => {
            Transition::terminate(*state, Termination::Collision)
        }
        Below::Blocked | Below::Outside => {
            if state.down_counter > 0 {
                return Transition::idle(finish_run(state, turn));
            }
            let stalls = state.stalls + 1;
            if stalls >= params.max_stalled_turns {
                return Transition::terminate(*state, Termination::DeadEnd);
            }
            Transition::idle(finish_run(&AgentState { stalls, ..*state }, turn))
        }
    }
}

/// Second turn of a down-run: back to sweeping, opposite bias next time.
const fn finish_run(state: &AgentState, turn: Turn) -> AgentState {
    AgentState {
        heading: state.heading.turned(turn),
        traversal: TraversalState::ToEdge,
        down_counter: 0,
        bias: turn.flipped(),
        ..*state
    }
}

/// One traversal entity and the path it has traced.
#[derive(Debug, Clone)]
pub struct SnakeAgent {
    side: Side,
    params: AgentParams,
    state: AgentState,
    path: Path,
    branches: Vec<Path>,
    collisions: usize,
    is_recursive: bool,
    termination: Option<Termination>,
}

impl SnakeAgent {
    /// An active agent at `start`, heading according to `side`.
    #[must_use]
    pub fn new(side: Side, start: Point, params: AgentParams, is_recursive: bool) -> Self {
        Self {
            side,
            params,
            state: AgentState::new(start, side.initial_heading()),
            path: Path::new(vec![start]),
            branches: Vec::new(),
            collisions: 0,
            is_recursive,
            termination: None,
        }
    }

    #[must_use]
    pub const fn side(&self) -> Side {
        self.side
    }

    #[must_use]
    pub const fn state(&self) -> &AgentState {
        &self.state
    }

    #[must_use]
    pub const fn path(&self) -> &Path {
        &self.path
    }

    /// Relief branches emitted at collisions so far.
    #[must_use]
    pub fn branches(&self) -> &[Path] {
        &self.branches
    }

    /// Sibling collisions seen so far (including ones that yielded no
    /// branch).
    #[must_use]
    pub const fn collisions(&self) -> usize {
        self.collisions
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.termination.is_none()
    }

    #[must_use]
    pub const fn termination(&self) -> Option<Termination> {
        self.termination
    }

    /// Consume the agent, returning its path and branches.
    #[must_use]
    pub fn into_parts(self) -> (Path, Vec<Path>) {
        (self.path, self.branches)
    }

    /// Take one step. Returns whether the agent is still active.
    ///
    /// An inactive agent never moves again.
    pub fn move_step<R: RandomSource + ?Sized>(
        &mut self,
        mask: &ShapeMask,
        pass: &mut PassState,
        sibling: &Self,
        rng: &mut R,
    ) -> bool {
        if !self.is_active() {
            return false;
        }

        let transition = {
            let view = StepView {
                mask,
                params: &self.params,
                side: self.side,
                ledger: &pass.ledger,
                sibling_trail: sibling.path.recent(self.params.collision_window),
                prior: pass.prior.as_ref(),
                is_recursive: self.is_recursive,
            };
            advance(&self.state, &view)
        };
        self.state = transition.state;

        match transition.effect {
            Effect::Idle => {}
            Effect::Advanced { from, to } => {
                pass.ledger.claim(&line_cells(from, to), self.side);
                pass.ledger.add_vertex(to);
                pass.occupancy.draw_segment(from, to);
                self.path.push(to);
            }
            Effect::Collided { at } => {
                self.collisions += 1;
                let branch = build_branch(at, mask, &pass.ledger, rng);
                trace!(side = ?self.side, x = at.x, y = at.y, points = branch.len(), "collision branch");
                if !branch.is_empty() {
                    self.branches.push(branch);
                }
            }
            Effect::Terminated(reason) => {
                trace!(side = ?self.side, ?reason, points = self.path.len(), "agent stopped");
                self.termination = Some(reason);
            }
        }
        self.is_active()
    }
}
