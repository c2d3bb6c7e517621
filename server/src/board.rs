//! Shared board state for a single level.
//!
//! A [`Board`] owns the grid, every actor on it and the level flags behind one
//! reader-writer lock. Entity threads and the input listener mutate it through
//! the exclusive side of the lock; the broadcaster only ever reads. Actors are
//! addressed by their index in the board's actor tables.

use log::debug;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use shared::{
    Direction, GameStatus, Snapshot, AUTONOMOUS_GLYPH, BLANK_GLYPH, CONTROLLABLE_GLYPH,
    DOT_GLYPH, PORTAL_GLYPH, WALL_GLYPH,
};
use std::time::Duration;

use crate::movement::{self, MoveOutcome};

/// What occupies a cell, independent of its dot/portal flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CellContent {
    #[default]
    Empty,
    Wall,
    Controllable,
    Autonomous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cell {
    pub content: CellContent,
    pub has_dot: bool,
    pub has_portal: bool,
}

impl Cell {
    pub fn wall() -> Self {
        Self {
            content: CellContent::Wall,
            ..Self::default()
        }
    }

    /// Glyph sent to clients for this cell.
    pub fn glyph(&self) -> u8 {
        match self.content {
            CellContent::Wall => WALL_GLYPH,
            CellContent::Controllable => CONTROLLABLE_GLYPH,
            CellContent::Autonomous => AUTONOMOUS_GLYPH,
            CellContent::Empty if self.has_portal => PORTAL_GLYPH,
            CellContent::Empty if self.has_dot => DOT_GLYPH,
            CellContent::Empty => BLANK_GLYPH,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Step(Direction),
    Random,
    Wait,
    Charge,
}

/// One entry of a movement program.
///
/// `turns`/`turns_left` only matter for [`Action::Wait`], which holds the
/// program position until `turns_left` runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub action: Action,
    pub turns: u32,
    pub turns_left: u32,
}

impl Command {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            turns: 1,
            turns_left: 1,
        }
    }

    pub fn step(direction: Direction) -> Self {
        Self::new(Action::Step(direction))
    }

    pub fn wait(turns: u32) -> Self {
        Self {
            action: Action::Wait,
            turns,
            turns_left: turns,
        }
    }
}

/// A cyclic command list plus the position of the next command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    commands: Vec<Command>,
    cursor: usize,
}

impl Program {
    pub fn new(commands: Vec<Command>) -> Self {
        Self {
            commands,
            cursor: 0,
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn current(&self) -> Option<Command> {
        self.commands.get(self.cursor).copied()
    }

    pub fn advance(&mut self) {
        if !self.commands.is_empty() {
            self.cursor = (self.cursor + 1) % self.commands.len();
        }
    }

    /// Writes back a command taken with [`Program::current`] from `slot`.
    pub fn store(&mut self, slot: usize, command: Command) {
        if let Some(entry) = self.commands.get_mut(slot) {
            *entry = command;
        }
    }
}

/// The client-steered actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Controllable {
    pub x: usize,
    pub y: usize,
    pub alive: bool,
    pub points: u32,
    /// Ticks skipped between effective moves.
    pub step_delay: u32,
    pub program: Program,
    pub waiting: u32,
    /// Latest direction published by the input listener, not yet applied.
    pub pending: Option<Direction>,
}

impl Controllable {
    pub fn new(x: usize, y: usize, points: u32, step_delay: u32, program: Program) -> Self {
        Self {
            x,
            y,
            alive: true,
            points,
            step_delay,
            program,
            waiting: 0,
            pending: None,
        }
    }
}

/// A server-driven adversary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Autonomous {
    pub x: usize,
    pub y: usize,
    pub step_delay: u32,
    pub program: Program,
    pub waiting: u32,
    /// Set by a charge command; the next directional move slides.
    pub charged: bool,
}

impl Autonomous {
    pub fn new(x: usize, y: usize, step_delay: u32, program: Program) -> Self {
        Self {
            x,
            y,
            step_delay,
            program,
            waiting: 0,
            charged: false,
        }
    }
}

/// Everything guarded by the board lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardState {
    pub width: usize,
    pub height: usize,
    pub cells: Vec<Cell>,
    pub controllables: Vec<Controllable>,
    pub autonomous: Vec<Autonomous>,
    pub level_finished: bool,
    pub shutdown: bool,
}

impl BoardState {
    /// An empty `width * height` grid with no actors.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![Cell::default(); width * height],
            controllables: Vec::new(),
            autonomous: Vec::new(),
            level_finished: false,
            shutdown: false,
        }
    }

    pub fn index(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    pub fn cell(&self, x: usize, y: usize) -> &Cell {
        &self.cells[self.index(x, y)]
    }

    pub fn cell_mut(&mut self, x: usize, y: usize) -> &mut Cell {
        let index = self.index(x, y);
        &mut self.cells[index]
    }

    /// The cell one step away in `direction`, or `None` past the edge.
    pub fn neighbour(&self, x: usize, y: usize, direction: Direction) -> Option<(usize, usize)> {
        let (dx, dy) = direction.delta();
        let nx = x.checked_add_signed(dx)?;
        let ny = y.checked_add_signed(dy)?;
        (nx < self.width && ny < self.height).then_some((nx, ny))
    }

    /// Whether an actor may be placed on `(x, y)` at level start.
    pub fn is_playable(&self, x: usize, y: usize) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        let cell = self.cell(x, y);
        cell.content == CellContent::Empty && !cell.has_portal
    }

    pub fn first_playable(&self) -> Option<(usize, usize)> {
        (0..self.height)
            .flat_map(|y| (0..self.width).map(move |x| (x, y)))
            .find(|&(x, y)| self.is_playable(x, y))
    }

    pub fn status(&self) -> GameStatus {
        if self.level_finished {
            GameStatus::Won
        } else if self.controllables.first().is_some_and(|actor| !actor.alive) {
            GameStatus::Lost
        } else {
            GameStatus::Playing
        }
    }

    pub fn snapshot(&self, level_name: &str) -> Snapshot {
        let actor = self.controllables.first();
        Snapshot {
            status: self.status(),
            width: u16::try_from(self.width).unwrap_or(u16::MAX),
            height: u16::try_from(self.height).unwrap_or(u16::MAX),
            points: actor.map_or(0, |actor| actor.points),
            lives: actor.map_or(0, |actor| u16::from(actor.alive)),
            level_name: level_name.to_string(),
            board: self.cells.iter().map(Cell::glyph).collect(),
        }
    }

    /// Verifies that the grid markers and the actor tables agree.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.cells.len() != self.width * self.height {
            return Err(format!(
                "{} cells for a {}x{} board",
                self.cells.len(),
                self.width,
                self.height
            ));
        }

        let mut controllable_markers = 0;
        let mut autonomous_markers = 0;
        for (index, cell) in self.cells.iter().enumerate() {
            match cell.content {
                CellContent::Wall if cell.has_dot || cell.has_portal => {
                    return Err(format!("wall at index {} carries a dot or portal", index));
                }
                CellContent::Autonomous if cell.has_portal => {
                    return Err(format!("autonomous actor on portal at index {}", index));
                }
                CellContent::Controllable if cell.has_portal && !self.level_finished => {
                    return Err(format!("controllable actor on portal at index {}", index));
                }
                CellContent::Controllable => controllable_markers += 1,
                CellContent::Autonomous => autonomous_markers += 1,
                _ => {}
            }
        }

        let mut alive = 0;
        for (i, actor) in self.controllables.iter().enumerate() {
            if !actor.alive {
                continue;
            }
            alive += 1;
            if actor.x >= self.width || actor.y >= self.height {
                return Err(format!("controllable {} out of bounds", i));
            }
            if self.cell(actor.x, actor.y).content != CellContent::Controllable {
                return Err(format!(
                    "controllable {} at ({}, {}) has no marker",
                    i, actor.x, actor.y
                ));
            }
        }
        if alive != controllable_markers {
            return Err(format!(
                "{} live controllable actors but {} markers",
                alive, controllable_markers
            ));
        }

        for (i, actor) in self.autonomous.iter().enumerate() {
            if actor.x >= self.width || actor.y >= self.height {
                return Err(format!("autonomous {} out of bounds", i));
            }
            if self.cell(actor.x, actor.y).content != CellContent::Autonomous {
                return Err(format!(
                    "autonomous {} at ({}, {}) has no marker",
                    i, actor.x, actor.y
                ));
            }
        }
        if self.autonomous.len() != autonomous_markers {
            return Err(format!(
                "{} autonomous actors but {} markers",
                self.autonomous.len(),
                autonomous_markers
            ));
        }

        Ok(())
    }
}

/// A level's state plus its immutable parameters.
#[derive(Debug)]
pub struct Board {
    name: String,
    tempo: Duration,
    state: RwLock<BoardState>,
}

impl Board {
    pub fn new(name: impl Into<String>, tempo: Duration, state: BoardState) -> Self {
        Self {
            name: name.into(),
            tempo,
            state: RwLock::new(state),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Base tick from which every actor interval is scaled.
    pub fn tempo(&self) -> Duration {
        self.tempo
    }

    pub fn read(&self) -> RwLockReadGuard<'_, BoardState> {
        self.state.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, BoardState> {
        self.state.write()
    }

    /// Applies `command` to controllable actor `index` under the exclusive lock.
    pub fn apply_controllable_move(&self, index: usize, command: &mut Command) -> MoveOutcome {
        let mut state = self.write();
        movement::move_controllable(&mut state, index, command, &mut rand::thread_rng())
    }

    /// Applies `command` to autonomous actor `index` under the exclusive lock.
    pub fn apply_autonomous_move(&self, index: usize, command: &mut Command) -> MoveOutcome {
        let mut state = self.write();
        movement::move_autonomous(&mut state, index, command, &mut rand::thread_rng())
    }

    /// One tick of the controllable actor. A tick inside the step delay only
    /// counts it down and leaves any pending input for the next effective
    /// tick. Otherwise the pending external command wins over the program.
    /// Selection and application share one lock hold.
    pub fn step_controllable(&self, index: usize) -> MoveOutcome {
        let mut state = self.write();
        let mut rng = rand::thread_rng();

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

        if let Some(direction) = actor.pending.take() {
            let mut command = Command::step(direction);
            return movement::move_controllable(&mut state, index, &mut command, &mut rng);
        }

        let slot = actor.program.cursor();
        let Some(mut command) = actor.program.current() else {
            return MoveOutcome::Idle;
        };
        let outcome = movement::move_controllable(&mut state, index, &mut command, &mut rng);
        state.controllables[index].program.store(slot, command);
        outcome
    }

    /// One tick of an autonomous actor; without a program it wanders randomly.
    pub fn step_autonomous(&self, index: usize) -> MoveOutcome {
        let mut state = self.write();
        let mut rng = rand::thread_rng();

        let Some(actor) = state.autonomous.get(index) else {
            return MoveOutcome::Blocked;
        };

        let slot = actor.program.cursor();
        match actor.program.current() {
            Some(mut command) => {
                let outcome = movement::move_autonomous(&mut state, index, &mut command, &mut rng);
                state.autonomous[index].program.store(slot, command);
                outcome
            }
            None => {
                let mut command = Command::new(Action::Random);
                movement::move_autonomous(&mut state, index, &mut command, &mut rng)
            }
        }
    }

    /// Overwrites the pending command slot; an undrained older command is lost.
    pub fn publish_input(&self, index: usize, direction: Direction) {
        let mut state = self.write();
        if let Some(actor) = state.controllables.get_mut(index) {
            if let Some(previous) = actor.pending.replace(direction) {
                debug!("pending {:?} replaced by {:?}", previous, direction);
            }
        }
    }

    pub fn request_shutdown(&self) {
        self.write().shutdown = true;
    }

    pub fn is_shutdown(&self) -> bool {
        self.read().shutdown
    }

    pub fn controllable(&self, index: usize) -> Option<Controllable> {
        self.read().controllables.get(index).cloned()
    }

    pub fn autonomous_count(&self) -> usize {
        self.read().autonomous.len()
    }

    pub fn status(&self) -> GameStatus {
        self.read().status()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.read().snapshot(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_board() -> BoardState {
        let mut state = BoardState::new(4, 3);
        state.cell_mut(0, 0).content = CellContent::Wall;
        state.cell_mut(2, 1).has_dot = true;
        state.cell_mut(3, 2).has_portal = true;
        state.cell_mut(1, 1).content = CellContent::Controllable;
        state
            .controllables
            .push(Controllable::new(1, 1, 0, 0, Program::default()));
        state.cell_mut(3, 0).content = CellContent::Autonomous;
        state
            .autonomous
            .push(Autonomous::new(3, 0, 0, Program::default()));
        state
    }

    #[test]
    fn test_cell_glyphs() {
        let state = open_board();
        let glyphs: Vec<u8> = state.cells.iter().map(Cell::glyph).collect();
        assert_eq!(glyphs, b"#  M C.    @".to_vec());
    }

    #[test]
    fn test_neighbour_stops_at_edges() {
        let state = BoardState::new(3, 3);
        assert_eq!(state.neighbour(0, 0, Direction::Left), None);
        assert_eq!(state.neighbour(0, 0, Direction::Up), None);
        assert_eq!(state.neighbour(2, 2, Direction::Right), None);
        assert_eq!(state.neighbour(2, 2, Direction::Down), None);
        assert_eq!(state.neighbour(1, 1, Direction::Right), Some((2, 1)));
        assert_eq!(state.neighbour(1, 1, Direction::Up), Some((1, 0)));
    }

    #[test]
    fn test_first_playable_skips_walls_and_portals() {
        let mut state = BoardState::new(3, 1);
        state.cell_mut(0, 0).content = CellContent::Wall;
        state.cell_mut(1, 0).has_portal = true;
        assert_eq!(state.first_playable(), Some((2, 0)));
    }

    #[test]
    fn test_program_cursor_wraps() {
        let mut program = Program::new(vec![
            Command::step(Direction::Up),
            Command::step(Direction::Down),
        ]);
        assert_eq!(program.cursor(), 0);
        program.advance();
        assert_eq!(program.current(), Some(Command::step(Direction::Down)));
        program.advance();
        assert_eq!(program.cursor(), 0);

        let mut empty = Program::default();
        empty.advance();
        assert_eq!(empty.cursor(), 0);
        assert_eq!(empty.current(), None);
    }

    #[test]
    fn test_invariants_hold_for_consistent_board() {
        assert_eq!(open_board().check_invariants(), Ok(()));
    }

    #[test]
    fn test_invariants_catch_missing_marker() {
        let mut state = open_board();
        state.cell_mut(1, 1).content = CellContent::Empty;
        assert!(state.check_invariants().is_err());
    }

    #[test]
    fn test_invariants_catch_stacked_autonomous_actors() {
        let mut state = open_board();
        state
            .autonomous
            .push(Autonomous::new(3, 0, 0, Program::default()));
        assert!(state.check_invariants().is_err());
    }

    #[test]
    fn test_status_tracks_flags() {
        let mut state = open_board();
        assert_eq!(state.status(), GameStatus::Playing);
        state.controllables[0].alive = false;
        assert_eq!(state.status(), GameStatus::Lost);
        state.level_finished = true;
        assert_eq!(state.status(), GameStatus::Won);
    }

    #[test]
    fn test_publish_input_overwrites_pending() {
        let board = Board::new("overwrite", Duration::from_millis(10), open_board());
        board.publish_input(0, Direction::Up);
        board.publish_input(0, Direction::Left);
        assert_eq!(board.controllable(0).unwrap().pending, Some(Direction::Left));

        assert_eq!(board.step_controllable(0), MoveOutcome::Moved);
        let actor = board.controllable(0).unwrap();
        assert_eq!((actor.x, actor.y), (0, 1));
        assert_eq!(actor.pending, None);
    }

    fn delayed_runner(step_delay: u32) -> Board {
        let mut state = BoardState::new(5, 1);
        state.cell_mut(0, 0).content = CellContent::Controllable;
        state
            .controllables
            .push(Controllable::new(0, 0, 0, step_delay, Program::default()));
        Board::new("delay", Duration::from_millis(10), state)
    }

    #[test]
    fn test_idle_ticks_drain_step_delay() {
        let board = delayed_runner(1);
        board.publish_input(0, Direction::Right);
        assert_eq!(board.step_controllable(0), MoveOutcome::Moved);
        assert_eq!(board.controllable(0).unwrap().waiting, 1);

        for _ in 0..5 {
            assert_eq!(board.step_controllable(0), MoveOutcome::Idle);
            assert_eq!(board.controllable(0).unwrap().waiting, 0);
        }

        board.publish_input(0, Direction::Right);
        assert_eq!(board.step_controllable(0), MoveOutcome::Moved);
        let actor = board.controllable(0).unwrap();
        assert_eq!(actor.x, 2);
        assert_eq!(actor.pending, None);
    }

    #[test]
    fn test_input_during_step_delay_is_kept() {
        let board = delayed_runner(2);
        board.publish_input(0, Direction::Right);
        assert_eq!(board.step_controllable(0), MoveOutcome::Moved);

        board.publish_input(0, Direction::Right);
        assert_eq!(board.step_controllable(0), MoveOutcome::Idle);
        assert_eq!(board.step_controllable(0), MoveOutcome::Idle);
        assert_eq!(board.controllable(0).unwrap().pending, Some(Direction::Right));

        assert_eq!(board.step_controllable(0), MoveOutcome::Moved);
        assert_eq!(board.controllable(0).unwrap().x, 2);
    }

    #[test]
    fn test_dead_actor_ignores_input() {
        let mut state = open_board();
        state.controllables[0].alive = false;
        state.cell_mut(1, 1).content = CellContent::Empty;
        let board = Board::new("dead", Duration::from_millis(10), state);

        board.publish_input(0, Direction::Right);
        assert_eq!(board.step_controllable(0), MoveOutcome::Died);
        assert_eq!(board.controllable(0).unwrap().pending, Some(Direction::Right));
    }

    #[test]
    fn test_repeated_single_turn_waits_walk_the_program() {
        let mut state = open_board();
        state.controllables[0].program = Program::new(vec![Command::wait(1); 3]);
        let board = Board::new("waits", Duration::from_millis(10), state);

        for expected_cursor in [1, 2, 0, 1] {
            assert_eq!(board.step_controllable(0), MoveOutcome::Idle);
            let actor = board.controllable(0).unwrap();
            assert_eq!(actor.program.cursor(), expected_cursor);
            assert_eq!((actor.x, actor.y), (1, 1));
        }
        assert_eq!(board.read().check_invariants(), Ok(()));
    }

    #[test]
    fn test_apply_moves_take_explicit_commands() {
        let board = Board::new("apply", Duration::from_millis(10), open_board());

        let mut step = Command::step(Direction::Right);
        assert_eq!(board.apply_controllable_move(0, &mut step), MoveOutcome::Moved);
        let actor = board.controllable(0).unwrap();
        assert_eq!((actor.x, actor.y), (2, 1));
        assert_eq!(actor.points, 6);

        let mut step = Command::step(Direction::Left);
        assert_eq!(board.apply_autonomous_move(0, &mut step), MoveOutcome::Moved);
        let state = board.read();
        assert_eq!((state.autonomous[0].x, state.autonomous[0].y), (2, 0));
        assert_eq!(state.check_invariants(), Ok(()));
    }

    #[test]
    fn test_apply_move_past_edge_is_blocked() {
        let board = Board::new("blocked", Duration::from_millis(10), open_board());
        let mut step = Command::step(Direction::Up);
        assert_eq!(board.apply_autonomous_move(0, &mut step), MoveOutcome::Blocked);
        let mut step = Command::step(Direction::Left);
        assert_eq!(board.apply_controllable_move(0, &mut step), MoveOutcome::Moved);
        assert_eq!(board.controllable(0).unwrap().x, 0);
    }

    #[test]
    fn test_pending_input_beats_program() {
        let mut state = open_board();
        state.controllables[0].program = Program::new(vec![Command::step(Direction::Up)]);
        let board = Board::new("priority", Duration::from_millis(10), state);

        board.publish_input(0, Direction::Right);
        assert_eq!(board.step_controllable(0), MoveOutcome::Moved);

        let actor = board.controllable(0).unwrap();
        assert_eq!((actor.x, actor.y), (2, 1));
        assert!(actor.pending.is_none());
    }

    #[test]
    fn test_snapshot_reflects_state() {
        let board = Board::new("snap.lvl", Duration::from_millis(10), open_board());
        let snapshot = board.snapshot();
        assert_eq!(snapshot.width, 4);
        assert_eq!(snapshot.height, 3);
        assert_eq!(snapshot.lives, 1);
        assert_eq!(snapshot.status, GameStatus::Playing);
        assert_eq!(snapshot.level_name, "snap.lvl");
        assert_eq!(snapshot.board, b"#  M C.    @".to_vec());
    }

    #[test]
    fn test_shutdown_flag() {
        let board = Board::new("flags", Duration::from_millis(10), open_board());
        assert!(!board.is_shutdown());
        board.request_shutdown();
        assert!(board.is_shutdown());
    }
}
