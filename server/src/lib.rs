//! # Maze Game Server Library
//!
//! This library provides the authoritative server for the maze arcade game.
//! Each admitted client plays a sequence of levels against server-driven
//! adversaries while the server streams full board snapshots back to it.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! All movement rules run on the server. Clients only send directional input
//! and render what the server broadcasts; no game decision is made client-side.
//!
//! ### Session Management
//! Handles the complete lifecycle of a client session:
//! - Admission through the rendezvous FIFO and a bounded queue
//! - Level progression with points carried between levels
//! - Disconnection handling and scoreboard bookkeeping
//!
//! ### Scoreboard Reporting
//! A process-wide score table that administrators query over a small TCP
//! protocol, or dump to a text report on request.
//!
//! ## Architecture Design
//!
//! ### Threads Per Level
//! Every level runs as a scoped group of OS threads: the controllable actor,
//! one thread per autonomous actor, an input listener and a broadcaster. All
//! of them share one reader-writer lock around the board, so each thread sees
//! either the board before a move or the board after it, never a mix.
//!
//! ### Bounded Admission
//! A fixed number of worker threads play sessions. Accepted connections wait
//! in a ring buffer of the same capacity; when it is full the acceptor blocks
//! and later clients wait on the rendezvous FIFO.
//!
//! ### Async Edges Only
//! The tokio runtime drives the process entry point, the admin endpoint and
//! Ctrl-C handling. Game threads never await.
//!
//! ## Module Organization
//!
//! ### Board Module (`board`)
//! Cells, actors, movement programs and the locked per-level state.
//!
//! ### Movement Module (`movement`)
//! The rules applied to a single actor for a single command.
//!
//! ### Level Module (`level`)
//! Level and motion file parsing, level discovery and board construction.
//!
//! ### Session Module (`session`)
//! The per-level thread group and the per-session run-loop.
//!
//! ### Admission and Worker Modules (`admission`, `worker`)
//! The semaphore-guarded ring buffer and the worker pool draining it.
//!
//! ### Acceptor Module (`acceptor`)
//! The rendezvous FIFO and the connect handshake.
//!
//! ### Scoreboard and Admin Modules (`scoreboard`, `admin`)
//! Score bookkeeping and the TCP endpoint exposing it.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::context::ServerContext;
//! use server::worker::{self, WorkerPool};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let ctx = Arc::new(ServerContext::new(ServerConfig::new("levels", 4))?);
//! let handler_ctx = Arc::clone(&ctx);
//! let pool = WorkerPool::spawn(ctx.queue(), 4, move |id, session| {
//!     worker::serve_session(&handler_ctx, id, session)
//! })?;
//! # pool.shutdown();
//! # Ok(())
//! # }
//! ```

pub mod acceptor;
pub mod admin;
pub mod admission;
pub mod board;
pub mod config;
pub mod context;
pub mod error;
pub mod level;
pub mod movement;
pub mod scoreboard;
pub mod session;
pub mod worker;
