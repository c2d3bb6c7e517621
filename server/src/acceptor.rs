//! Rendezvous FIFO and connection admission.
//!
//! Clients write fixed-size connect requests to the rendezvous FIFO. For each
//! one the acceptor opens the client's notification FIFO, answers, and queues
//! the session together with that open writer, so the client's reader never
//! sees the channel without a writer between admission and play.

use log::{error, info, warn};
use shared::fifo::{create_fifo, is_fifo, remove_fifo};
use shared::{read_full, ConnectRequest, ConnectResponse, CONNECT_REQUEST_SIZE};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::context::ServerContext;
use crate::error::ServerError;

/// An admitted session waiting for a worker.
#[derive(Debug)]
pub struct SessionRequest {
    pub request_path: PathBuf,
    pub notifications: File,
}

/// The server end of the rendezvous FIFO. The node is removed on drop.
#[derive(Debug)]
pub struct Rendezvous {
    path: PathBuf,
    channel: File,
}

impl Rendezvous {
    /// Creates the FIFO and opens it for reading. It is also opened for
    /// writing so reads block instead of hitting EOF between clients.
    pub fn create(path: &Path) -> Result<Self, ServerError> {
        let fail = |source| ServerError::Rendezvous {
            path: path.to_path_buf(),
            source,
        };
        create_fifo(path).map_err(fail)?;
        let channel = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(fail)?;
        Ok(Self {
            path: path.to_path_buf(),
            channel,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Blocks until the next well-formed connect request.
    pub fn next_request(&mut self) -> io::Result<ConnectRequest> {
        let mut buf = [0u8; CONNECT_REQUEST_SIZE];
        loop {
            let n = read_full(&mut self.channel, &mut buf)?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "rendezvous channel closed",
                ));
            }
            match ConnectRequest::decode(&buf[..n]) {
                Ok(request) => return Ok(request),
                Err(e) => warn!("discarding connect request: {}", e),
            }
        }
    }
}

impl Drop for Rendezvous {
    fn drop(&mut self) {
        if let Err(e) = remove_fifo(&self.path) {
            warn!("failed to remove {}: {}", self.path.display(), e);
        }
    }
}

/// Answers a connect request. Requests whose request channel is not a FIFO
/// are refused.
pub fn admit(request: &ConnectRequest) -> io::Result<Option<SessionRequest>> {
    let request_path = PathBuf::from(&request.request_channel);
    let accepted = is_fifo(&request_path);

    let mut notifications = OpenOptions::new()
        .write(true)
        .open(&request.notification_channel)?;
    notifications.write_all(&ConnectResponse { accepted }.encode())?;
    notifications.flush()?;

    Ok(accepted.then_some(SessionRequest {
        request_path,
        notifications,
    }))
}

/// Accept loop; runs on its own thread for the life of the server.
pub fn run(mut rendezvous: Rendezvous, ctx: Arc<ServerContext>) {
    info!("accepting connections on {}", rendezvous.path().display());
    loop {
        let request = match rendezvous.next_request() {
            Ok(request) => request,
            Err(e) => {
                error!("rendezvous channel failed: {}", e);
                return;
            }
        };

        match admit(&request) {
            Ok(Some(session)) => {
                info!("admitted {}", request.request_channel);
                ctx.admit(session);
            }
            Ok(None) => warn!(
                "refused {}: request channel is not a FIFO",
                request.request_channel
            ),
            Err(e) => warn!(
                "could not answer {}: {}",
                request.notification_channel, e
            ),
        }
    }
}
