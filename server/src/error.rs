use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

use crate::level::LevelError;

/// Failures that stop the server from starting.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("max games must be at least 1")]
    ZeroCapacity,
    #[error("levels directory {0} does not exist")]
    MissingLevelsDir(PathBuf),
    #[error("failed to create rendezvous FIFO {path}: {source}")]
    Rendezvous {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to bind admin endpoint {addr}: {source}")]
    AdminBind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("failed to spawn thread {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },
}

/// Failures that end a single game session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Level(#[from] LevelError),
    #[error("failed to spawn {role} thread: {source}")]
    Spawn {
        role: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to open request channel {path}: {source}")]
    RequestChannel {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("no levels found in {0}")]
    NoLevels(PathBuf),
}
