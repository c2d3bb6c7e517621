//! Movement rules.
//!
//! Pure functions over [`BoardState`]; callers hold the exclusive board lock
//! for the whole call so every thread observes either the board before a move
//! or the board after it.

use rand::Rng;
use shared::Direction;

use crate::board::{Action, BoardState, CellContent, Command, Program};

/// Result of applying one command to one actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The actor changed position.
    Moved,
    /// The turn was consumed without movement (waiting, wait, charge).
    Idle,
    Blocked,
    /// The controllable actor stepped onto the portal.
    ReachedExit,
    /// The controllable actor was killed by this move.
    Died,
}

pub fn random_direction<R: Rng + ?Sized>(rng: &mut R) -> Direction {
    Direction::ALL[rng.gen_range(0..Direction::ALL.len())]
}

/// Holds the program on a wait command until its turns run out, then rearms
/// it and moves on.
fn hold_or_advance(program: &mut Program, command: &mut Command) {
    if command.turns_left <= 1 {
        command.turns_left = command.turns;
        program.advance();
    } else {
        command.turns_left -= 1;
    }
}

pub fn move_controllable<R: Rng + ?Sized>(
    state: &mut BoardState,
    index: usize,
    command: &mut Command,
    rng: &mut R,
) -> MoveOutcome {
    let Some(actor) = state.controllables.get_mut(index) else {
        return MoveOutcome::Died;
    };
    if !actor.alive {
        return MoveOutcome::Died;
    }
    if actor.waiting > 0 {
        actor.waiting -= 1;
        return MoveOutcome::Idle;
    }
    actor.waiting = actor.step_delay;

    let direction = match command.action {
        Action::Step(direction) => direction,
        Action::Random => random_direction(rng),
        Action::Wait => {
            hold_or_advance(&mut actor.program, command);
            return MoveOutcome::Idle;
        }
        Action::Charge => {
            actor.program.advance();
            return MoveOutcome::Blocked;
        }
    };
    actor.program.advance();

    let (from_x, from_y) = (actor.x, actor.y);
    let Some((x, y)) = state.neighbour(from_x, from_y, direction) else {
        return MoveOutcome::Blocked;
    };

    let from = state.index(from_x, from_y);
    let to = state.index(x, y);

    if state.cells[to].has_portal {
        state.cells[from].content = CellContent::Empty;
        state.cells[to].content = CellContent::Controllable;
        let actor = &mut state.controllables[index];
        actor.x = x;
        actor.y = y;
        state.level_finished = true;
        return MoveOutcome::ReachedExit;
    }

    match state.cells[to].content {
        CellContent::Wall | CellContent::Controllable => MoveOutcome::Blocked,
        CellContent::Autonomous => {
            kill_controllable(state, index);
            MoveOutcome::Died
        }
        CellContent::Empty => {
            let gained = if state.cells[to].has_dot {
                state.cells[to].has_dot = false;
                // Dots are worth the destination's linear index.
                u32::try_from(to).unwrap_or(u32::MAX)
            } else {
                0
            };

            state.cells[from].content = CellContent::Empty;
            state.cells[to].content = CellContent::Controllable;
            let actor = &mut state.controllables[index];
            actor.x = x;
            actor.y = y;
            actor.points = actor.points.saturating_add(gained);
            MoveOutcome::Moved
        }
    }
}

pub fn move_autonomous<R: Rng + ?Sized>(
    state: &mut BoardState,
    index: usize,
    command: &mut Command,
    rng: &mut R,
) -> MoveOutcome {
    let Some(actor) = state.autonomous.get_mut(index) else {
        return MoveOutcome::Blocked;
    };
    if actor.waiting > 0 {
        actor.waiting -= 1;
        return MoveOutcome::Idle;
    }
    actor.waiting = actor.step_delay;

    let direction = match command.action {
        Action::Step(direction) => direction,
        Action::Random => random_direction(rng),
        Action::Wait => {
            hold_or_advance(&mut actor.program, command);
            return MoveOutcome::Idle;
        }
        Action::Charge => {
            actor.program.advance();
            actor.charged = true;
            return MoveOutcome::Idle;
        }
    };
    actor.program.advance();

    if actor.charged {
        actor.charged = false;
        return slide(state, index, direction);
    }

    let (from_x, from_y) = (actor.x, actor.y);
    let Some((x, y)) = state.neighbour(from_x, from_y, direction) else {
        return MoveOutcome::Blocked;
    };
    let target = *state.cell(x, y);
    if target.has_portal {
        return MoveOutcome::Blocked;
    }

    match target.content {
        CellContent::Wall | CellContent::Autonomous => MoveOutcome::Blocked,
        CellContent::Controllable => {
            kill_controllable_at(state, x, y);
            relocate_autonomous(state, index, x, y);
            MoveOutcome::Died
        }
        CellContent::Empty => {
            relocate_autonomous(state, index, x, y);
            MoveOutcome::Moved
        }
    }
}

/// Charged movement: travel in `direction` until the next cell is a wall,
/// another autonomous actor, a portal or the edge. Running into the
/// controllable actor ends the slide on its cell.
fn slide(state: &mut BoardState, index: usize, direction: Direction) -> MoveOutcome {
    let origin = (state.autonomous[index].x, state.autonomous[index].y);
    let (mut x, mut y) = origin;
    let mut outcome = MoveOutcome::Moved;

    while let Some((nx, ny)) = state.neighbour(x, y, direction) {
        let cell = state.cell(nx, ny);
        if cell.has_portal || matches!(cell.content, CellContent::Wall | CellContent::Autonomous) {
            break;
        }
        x = nx;
        y = ny;
        if cell.content == CellContent::Controllable {
            outcome = MoveOutcome::Died;
            break;
        }
    }

    if (x, y) == origin {
        return MoveOutcome::Blocked;
    }
    if outcome == MoveOutcome::Died {
        kill_controllable_at(state, x, y);
    }
    relocate_autonomous(state, index, x, y);
    outcome
}

fn relocate_autonomous(state: &mut BoardState, index: usize, x: usize, y: usize) {
    let (old_x, old_y) = (state.autonomous[index].x, state.autonomous[index].y);
    state.cell_mut(old_x, old_y).content = CellContent::Empty;
    state.cell_mut(x, y).content = CellContent::Autonomous;
    let actor = &mut state.autonomous[index];
    actor.x = x;
    actor.y = y;
}

fn kill_controllable(state: &mut BoardState, index: usize) {
    let (x, y) = (state.controllables[index].x, state.controllables[index].y);
    state.controllables[index].alive = false;
    state.cell_mut(x, y).content = CellContent::Empty;
}

fn kill_controllable_at(state: &mut BoardState, x: usize, y: usize) {
    if let Some(index) = state
        .controllables
        .iter()
        .position(|actor| actor.alive && actor.x == x && actor.y == y)
    {
        kill_controllable(state, index);
    }
}
