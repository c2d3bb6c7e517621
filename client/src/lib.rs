//! # Maze Game Client Library
//!
//! This library provides the terminal client for the maze arcade game. The
//! client owns no game logic: it forwards directional input to the server and
//! draws every board snapshot the server streams back.
//!
//! ## Architecture Overview
//!
//! A session talks to the server over two private named pipes created by the
//! client. The request pipe carries moves and the disconnect request; the
//! notification pipe carries the connect response followed by snapshots.
//! Input and display run concurrently, so a slow terminal never delays moves.
//!
//! ## Module Organization
//!
//! ### Network Module (`network`)
//! FIFO setup and the connect handshake:
//! - Private request and notification pipe creation
//! - Connect request over the server's rendezvous pipe
//! - Split sender/receiver halves for the input and display tasks
//!
//! ### Input Module (`input`)
//! Turns keyboard lines or a scripted moves file into requests.
//!
//! ### Rendering Module (`rendering`)
//! Plain-text frames for board snapshots.

pub mod input;
pub mod network;
pub mod rendering;
