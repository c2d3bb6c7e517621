//! Per-session run-loop and the thread group that plays one level.
//!
//! Each level runs inside a thread scope: one thread for the controllable
//! actor, one per autonomous actor, an input listener and a snapshot
//! broadcaster. The controllable thread alone decides how the level ends;
//! everything else runs until the board's shutdown flag is raised.

use log::{debug, error, info, warn};
use shared::{read_request, GameStatus, ProtocolError, Request};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::thread::{self, Scope, ScopedJoinHandle};
use std::time::Duration;

use crate::board::Board;
use crate::error::SessionError;
use crate::level::Level;
use crate::movement::MoveOutcome;

/// Points from which the controllable actor slows down by one extra tempo.
pub const DIFFICULTY_THRESHOLD: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelOutcome {
    Won,
    Lost,
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelReport {
    pub outcome: LevelOutcome,
    pub points: u32,
    /// The client closed its request channel or asked to disconnect.
    pub peer_left: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListenerExit {
    LevelOver,
    PeerLeft,
}

/// Sleep between two controllable-actor ticks.
pub fn controllable_interval(tempo: Duration, step_delay: u32, points: u32) -> Duration {
    let mut ticks = step_delay.saturating_add(1);
    if points >= DIFFICULTY_THRESHOLD {
        ticks = ticks.saturating_add(1);
    }
    tempo.saturating_mul(ticks)
}

fn controllable_loop(board: &Board, index: usize) -> LevelOutcome {
    loop {
        let Some(actor) = board.controllable(index) else {
            return LevelOutcome::Lost;
        };
        if !actor.alive {
            return LevelOutcome::Lost;
        }
        thread::sleep(controllable_interval(
            board.tempo(),
            actor.step_delay,
            actor.points,
        ));

        match board.step_controllable(index) {
            MoveOutcome::ReachedExit => return LevelOutcome::Won,
            MoveOutcome::Died => return LevelOutcome::Lost,
            _ => {}
        }
        if board.is_shutdown() {
            return LevelOutcome::Disconnected;
        }
    }
}

fn autonomous_loop(board: &Board, index: usize) {
    loop {
        let Some(step_delay) = board.read().autonomous.get(index).map(|actor| actor.step_delay)
        else {
            return;
        };
        thread::sleep(board.tempo().saturating_mul(step_delay.saturating_add(1)));
        if board.is_shutdown() {
            return;
        }
        board.step_autonomous(index);
    }
}

fn listen_loop<R: Read>(board: &Board, index: usize, requests: &mut R) -> ListenerExit {
    loop {
        if board.is_shutdown() {
            return ListenerExit::LevelOver;
        }
        match read_request(requests) {
            Ok(Some(Request::Move(direction))) => {
                debug!("move {:?}", direction);
                board.publish_input(index, direction);
            }
            Ok(Some(Request::Disconnect)) => {
                info!("client asked to disconnect");
                board.request_shutdown();
                return ListenerExit::PeerLeft;
            }
            Ok(None) => {
                info!("request channel closed");
                board.request_shutdown();
                return ListenerExit::PeerLeft;
            }
            Err(ProtocolError::Io(e)) => {
                warn!("request channel failed: {}", e);
                board.request_shutdown();
                return ListenerExit::PeerLeft;
            }
            Err(e) => warn!("dropping malformed request: {}", e),
        }
    }
}

fn send_snapshot<W: Write>(board: &Board, notifications: &mut W) {
    let frame = board.snapshot().encode();
    if let Err(e) = notifications
        .write_all(&frame)
        .and_then(|()| notifications.flush())
    {
        debug!("snapshot not delivered: {}", e);
    }
}

/// Streams snapshots every tempo. Once shutdown is observed, a level that
/// ended in a win or a loss gets one closing snapshot.
fn broadcast_loop<W: Write>(board: &Board, notifications: &mut W) {
    send_snapshot(board, notifications);
    loop {
        thread::sleep(board.tempo());
        if board.is_shutdown() {
            if board.status() != GameStatus::Playing {
                send_snapshot(board, notifications);
            }
            return;
        }
        send_snapshot(board, notifications);
    }
}

fn spawn_role<'scope, 'env, T, F>(
    scope: &'scope Scope<'scope, 'env>,
    board: &Board,
    role: String,
    f: F,
) -> Result<ScopedJoinHandle<'scope, T>, SessionError>
where
    F: FnOnce() -> T + Send + 'scope,
    T: Send + 'scope,
{
    thread::Builder::new()
        .name(role.clone())
        .spawn_scoped(scope, f)
        .map_err(|source| {
            board.request_shutdown();
            SessionError::Spawn { role, source }
        })
}

fn join_role<T>(handle: ScopedJoinHandle<'_, T>, role: &str) -> Option<T> {
    match handle.join() {
        Ok(value) => Some(value),
        Err(_) => {
            error!("{} thread panicked", role);
            None
        }
    }
}

/// Plays one level to its end and reports the outcome.
pub fn run_level<R, W>(
    board: &Board,
    requests: &mut R,
    notifications: &mut W,
) -> Result<LevelReport, SessionError>
where
    R: Read + Send,
    W: Write + Send,
{
    thread::scope(|scope| {
        let broadcaster = spawn_role(scope, board, "broadcaster".into(), || {
            broadcast_loop(board, notifications)
        })?;
        let controllable = spawn_role(scope, board, "controllable".into(), || {
            controllable_loop(board, 0)
        })?;
        let listener = spawn_role(scope, board, "listener".into(), || {
            listen_loop(board, 0, requests)
        })?;
        let autonomous = (0..board.autonomous_count())
            .map(|i| {
                spawn_role(scope, board, format!("ghost-{}", i), move || {
                    autonomous_loop(board, i)
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let outcome =
            join_role(controllable, "controllable").unwrap_or(LevelOutcome::Disconnected);
        board.request_shutdown();

        for handle in autonomous {
            join_role(handle, "ghost");
        }
        join_role(broadcaster, "broadcaster");
        let listener_exit = join_role(listener, "listener").unwrap_or(ListenerExit::PeerLeft);

        let points = board.controllable(0).map_or(0, |actor| actor.points);
        Ok(LevelReport {
            outcome,
            points,
            peer_left: listener_exit == ListenerExit::PeerLeft,
        })
    })
}

/// One client's walk through the level list.
pub struct Session<R, W> {
    levels: Vec<PathBuf>,
    requests: R,
    notifications: W,
    points: u32,
    levels_won: usize,
}

impl<R, W> Session<R, W>
where
    R: Read + Send,
    W: Write + Send,
{
    pub fn new(levels: Vec<PathBuf>, requests: R, notifications: W) -> Self {
        Self {
            levels,
            requests,
            notifications,
            points: 0,
            levels_won: 0,
        }
    }

    /// Points carried so far.
    pub fn points(&self) -> u32 {
        self.points
    }

    pub fn levels_won(&self) -> usize {
        self.levels_won
    }

    /// Plays levels in order until one is not won. `on_level_end` sees every
    /// finished level, e.g. to publish the running score.
    pub fn play<F>(&mut self, mut on_level_end: F) -> Result<LevelOutcome, SessionError>
    where
        F: FnMut(&LevelReport),
    {
        let mut last = LevelOutcome::Disconnected;
        for path in &self.levels {
            let level = Level::load(path)?;
            let board = level.build_board(self.points)?;
            info!(
                "level {} started ({}x{}, {} autonomous)",
                board.name(),
                level.layout.width,
                level.layout.height,
                board.autonomous_count()
            );

            let report = run_level(&board, &mut self.requests, &mut self.notifications)?;
            self.points = report.points;
            info!(
                "level {} ended: {:?} with {} points",
                board.name(),
                report.outcome,
                report.points
            );
            on_level_end(&report);

            last = report.outcome;
            if report.outcome != LevelOutcome::Won {
                break;
            }
            self.levels_won += 1;
            if report.peer_left {
                last = LevelOutcome::Disconnected;
                break;
            }
        }
        Ok(last)
    }
}
