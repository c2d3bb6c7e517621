//! Administrative scoreboard protocol.
//!
//! Frames are a 4-byte big-endian length followed by a bincode payload.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io;

/// Upper bound on an admin frame; a full scoreboard is a few kilobytes.
pub const MAX_ADMIN_FRAME: u32 = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdminRequest {
    TopScores { limit: u32 },
    DumpScores,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdminResponse {
    Scores { entries: Vec<ScoreLine> },
    Dumped { path: String },
    Error { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreLine {
    pub client_id: u32,
    pub score: u32,
    pub active: bool,
}

/// Serializes `message` into a length-prefixed frame.
pub fn encode_frame<T: Serialize>(message: &T) -> io::Result<Vec<u8>> {
    let payload = bincode::serialize(message).map_err(to_io)?;
    let len = u32::try_from(payload.len())
        .ok()
        .filter(|&len| len <= MAX_ADMIN_FRAME)
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("admin frame of {} bytes is too large", payload.len()),
            )
        })?;

    let mut frame = Vec::with_capacity(4 + payload.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

pub fn decode_payload<T: DeserializeOwned>(payload: &[u8]) -> io::Result<T> {
    bincode::deserialize(payload).map_err(to_io)
}

/// Checks a received length prefix against [`MAX_ADMIN_FRAME`].
pub fn frame_len(prefix: [u8; 4]) -> io::Result<usize> {
    let len = u32::from_be_bytes(prefix);
    if len > MAX_ADMIN_FRAME {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("admin frame of {} bytes exceeds {}", len, MAX_ADMIN_FRAME),
        ));
    }
    Ok(len as usize)
}

fn to_io(err: bincode::Error) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, err)
}
