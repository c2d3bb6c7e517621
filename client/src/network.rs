use log::{debug, info, warn};
use shared::fifo::{create_fifo, remove_fifo};
use shared::{
    read_snapshot, ConnectRequest, ConnectResponse, Direction, ProtocolError, Request, Snapshot,
    CONNECT_RESPONSE_SIZE,
};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_FIFO_DIR: &str = "/tmp";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("server refused the connection")]
    Rejected,
    #[error("FIFO path {0} is not valid UTF-8")]
    InvalidPath(PathBuf),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Request and notification FIFO paths for client `id` under `dir`.
pub fn fifo_paths(dir: &Path, id: &str) -> (PathBuf, PathBuf) {
    (
        dir.join(format!("mazerun_req_{}", id)),
        dir.join(format!("mazerun_notif_{}", id)),
    )
}

/// Removes the private FIFOs once the handshake is over. Both ends are open
/// by then, so the nodes are no longer needed.
struct FifoCleanup<'a>(&'a [&'a Path]);

impl Drop for FifoCleanup<'_> {
    fn drop(&mut self) {
        for path in self.0 {
            if let Err(e) = remove_fifo(path) {
                warn!("failed to remove {}: {}", path.display(), e);
            }
        }
    }
}

fn path_str(path: &Path) -> Result<&str, ClientError> {
    path.to_str()
        .ok_or_else(|| ClientError::InvalidPath(path.to_path_buf()))
}

/// Sending half of a session.
#[derive(Debug)]
pub struct RequestSender {
    channel: File,
}

impl RequestSender {
    pub fn send(&mut self, request: Request) -> io::Result<()> {
        self.channel.write_all(&request.encode())?;
        self.channel.flush()
    }

    pub fn send_move(&mut self, direction: Direction) -> io::Result<()> {
        self.send(Request::Move(direction))
    }

    pub fn disconnect(&mut self) -> io::Result<()> {
        self.send(Request::Disconnect)
    }
}

/// Receiving half of a session.
#[derive(Debug)]
pub struct SnapshotReceiver {
    channel: File,
}

impl SnapshotReceiver {
    /// Next board snapshot, or `None` once the server closed the session.
    pub fn next_snapshot(&mut self) -> Result<Option<Snapshot>, ProtocolError> {
        read_snapshot(&mut self.channel)
    }
}

#[derive(Debug)]
pub struct Connection {
    pub requests: RequestSender,
    pub snapshots: SnapshotReceiver,
}

impl Connection {
    /// Creates the private FIFOs, sends a connect request to the server's
    /// rendezvous FIFO and waits until a game worker picks the session up.
    pub fn connect(server: &Path, fifo_dir: &Path, id: &str) -> Result<Self, ClientError> {
        let (request_path, notification_path) = fifo_paths(fifo_dir, id);
        let request = ConnectRequest::new(
            path_str(&request_path)?,
            path_str(&notification_path)?,
        )?;

        create_fifo(&request_path)?;
        let paths = [request_path.as_path(), notification_path.as_path()];
        let _cleanup = FifoCleanup(&paths);
        create_fifo(&notification_path)?;

        let mut rendezvous = OpenOptions::new().write(true).open(server)?;
        rendezvous.write_all(&request.encode())?;
        debug!("connect request sent to {}", server.display());

        let mut notifications = File::open(&notification_path)?;
        let mut response = [0u8; CONNECT_RESPONSE_SIZE];
        notifications.read_exact(&mut response)?;
        if !ConnectResponse::decode(&response)?.accepted {
            return Err(ClientError::Rejected);
        }
        info!("connected as {}, waiting for a free game slot", id);

        // Blocks until a worker opens the other end.
        let requests = OpenOptions::new().write(true).open(&request_path)?;

        Ok(Self {
            requests: RequestSender { channel: requests },
            snapshots: SnapshotReceiver {
                channel: notifications,
            },
        })
    }

    pub fn split(self) -> (RequestSender, SnapshotReceiver) {
        (self.requests, self.snapshots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::CONNECT_REQUEST_SIZE;
    use std::thread;

    #[test]
    fn test_fifo_paths() {
        let (request, notification) = fifo_paths(Path::new("/tmp"), "7");
        assert_eq!(request, PathBuf::from("/tmp/mazerun_req_7"));
        assert_eq!(notification, PathBuf::from("/tmp/mazerun_notif_7"));
    }

    #[test]
    fn test_overlong_fifo_dir_rejected_before_touching_disk() {
        let dir = Path::new("/tmp/a/directory/name/far/too/long/for/the/wire");
        let err = Connection::connect(Path::new("/tmp/none"), dir, "1").unwrap_err();
        assert!(matches!(
            err,
            ClientError::Protocol(ProtocolError::NameTooLong { .. })
        ));
    }

    #[test]
    fn test_rejected_connection() {
        let dir = tempfile::tempdir().unwrap();
        let server_path = dir.path().join("server");
        create_fifo(&server_path).unwrap();

        let server = {
            let server_path = server_path.clone();
            thread::spawn(move || {
                let mut rendezvous = File::open(&server_path).unwrap();
                let mut buf = [0u8; CONNECT_REQUEST_SIZE];
                rendezvous.read_exact(&mut buf).unwrap();
                let request = ConnectRequest::decode(&buf).unwrap();
                let mut notify = OpenOptions::new()
                    .write(true)
                    .open(&request.notification_channel)
                    .unwrap();
                notify
                    .write_all(&ConnectResponse { accepted: false }.encode())
                    .unwrap();
            })
        };

        let err = Connection::connect(&server_path, dir.path(), "r").unwrap_err();
        assert!(matches!(err, ClientError::Rejected));
        server.join().unwrap();

        let (request, notification) = fifo_paths(dir.path(), "r");
        assert!(!request.exists());
        assert!(!notification.exists());
    }
}
