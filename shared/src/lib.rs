//! Wire protocol shared by the game server and its clients.
//!
//! Every game message starts with a one-byte operation code. Requests are
//! tiny (one or two bytes), the connect handshake carries two fixed-width
//! channel names, and state snapshots have a fixed layout so a reader can
//! pull exactly one message off a byte stream without extra framing.
//!
//! The administrative scoreboard endpoint uses a separate, length-prefixed
//! bincode protocol that lives in [`admin`].

use std::io::{self, Read};
use thiserror::Error;

pub mod admin;
#[cfg(unix)]
pub mod fifo;

pub const OP_CONNECT: u8 = 1;
pub const OP_DISCONNECT: u8 = 2;
pub const OP_MOVE: u8 = 3;
pub const OP_UPDATE: u8 = 4;

/// Width of a channel name field in the connect request, NUL padding included.
pub const PIPE_NAME_SIZE: usize = 40;
pub const MAX_BOARD_SIZE: usize = 2400;
pub const MAX_LEVEL_NAME: usize = 32;

pub const CONNECT_REQUEST_SIZE: usize = 1 + 2 * PIPE_NAME_SIZE;
pub const CONNECT_RESPONSE_SIZE: usize = 2;
pub const MOVE_REQUEST_SIZE: usize = 2;
pub const SNAPSHOT_SIZE: usize = 1 + 1 + 2 + 2 + 4 + 2 + MAX_LEVEL_NAME + MAX_BOARD_SIZE;

pub const WALL_GLYPH: u8 = b'#';
pub const DOT_GLYPH: u8 = b'.';
pub const PORTAL_GLYPH: u8 = b'@';
pub const BLANK_GLYPH: u8 = b' ';
pub const CONTROLLABLE_GLYPH: u8 = b'C';
pub const AUTONOMOUS_GLYPH: u8 = b'M';

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unknown op code {0}")]
    UnknownOpCode(u8),
    #[error("unexpected op code {found}, expected {expected}")]
    UnexpectedOpCode { expected: u8, found: u8 },
    #[error("invalid move key {0:#04x}")]
    InvalidKey(u8),
    #[error("truncated message: got {got} of {expected} bytes")]
    Truncated { expected: usize, got: usize },
    #[error("channel name is {len} bytes, at most {max} fit")]
    NameTooLong { len: usize, max: usize },
    #[error("channel name is empty or not valid UTF-8")]
    InvalidName,
    #[error("invalid game state tag {0}")]
    InvalidGameState(u8),
    #[error("a {width}x{height} board does not fit in a snapshot")]
    BoardTooLarge { width: usize, height: usize },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// One of the four movement directions a client may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    /// Maps a `W`/`A`/`S`/`D` key (either case) to a direction.
    pub fn from_key(key: u8) -> Option<Self> {
        match key.to_ascii_uppercase() {
            b'W' => Some(Direction::Up),
            b'S' => Some(Direction::Down),
            b'A' => Some(Direction::Left),
            b'D' => Some(Direction::Right),
            _ => None,
        }
    }

    pub fn key(self) -> u8 {
        match self {
            Direction::Up => b'W',
            Direction::Down => b'S',
            Direction::Left => b'A',
            Direction::Right => b'D',
        }
    }

    /// Column and row offset of one step in this direction.
    pub fn delta(self) -> (isize, isize) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }
}

/// Client to server messages sent on the per-session request channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    Move(Direction),
    Disconnect,
}

impl Request {
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Request::Move(direction) => vec![OP_MOVE, direction.key()],
            Request::Disconnect => vec![OP_DISCONNECT],
        }
    }
}

/// Reads one request from a byte stream.
///
/// Returns `Ok(None)` when the peer closed the channel before sending
/// anything. A stream that ends in the middle of a message yields
/// `ProtocolError::Truncated`.
pub fn read_request<R: Read>(reader: &mut R) -> Result<Option<Request>, ProtocolError> {
    let mut op = [0u8; 1];
    if read_full(reader, &mut op)? == 0 {
        return Ok(None);
    }

    match op[0] {
        OP_DISCONNECT => Ok(Some(Request::Disconnect)),
        OP_MOVE => {
            let mut key = [0u8; 1];
            if read_full(reader, &mut key)? == 0 {
                return Err(ProtocolError::Truncated {
                    expected: MOVE_REQUEST_SIZE,
                    got: 1,
                });
            }
            Direction::from_key(key[0])
                .map(|direction| Some(Request::Move(direction)))
                .ok_or(ProtocolError::InvalidKey(key[0]))
        }
        OP_CONNECT => Err(ProtocolError::UnexpectedOpCode {
            expected: OP_MOVE,
            found: OP_CONNECT,
        }),
        other => Err(ProtocolError::UnknownOpCode(other)),
    }
}

/// Connect request sent on the rendezvous channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    pub request_channel: String,
    pub notification_channel: String,
}

impl ConnectRequest {
    pub fn new(
        request_channel: impl Into<String>,
        notification_channel: impl Into<String>,
    ) -> Result<Self, ProtocolError> {
        let request_channel = request_channel.into();
        let notification_channel = notification_channel.into();
        check_name(&request_channel)?;
        check_name(&notification_channel)?;
        Ok(Self {
            request_channel,
            notification_channel,
        })
    }

    pub fn encode(&self) -> [u8; CONNECT_REQUEST_SIZE] {
        let mut out = [0u8; CONNECT_REQUEST_SIZE];
        out[0] = OP_CONNECT;
        write_padded(&mut out[1..1 + PIPE_NAME_SIZE], &self.request_channel);
        write_padded(&mut out[1 + PIPE_NAME_SIZE..], &self.notification_channel);
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() < CONNECT_REQUEST_SIZE {
            return Err(ProtocolError::Truncated {
                expected: CONNECT_REQUEST_SIZE,
                got: bytes.len(),
            });
        }
        if bytes[0] != OP_CONNECT {
            return Err(ProtocolError::UnexpectedOpCode {
                expected: OP_CONNECT,
                found: bytes[0],
            });
        }

        let request_channel = read_padded(&bytes[1..1 + PIPE_NAME_SIZE])?;
        let notification_channel = read_padded(&bytes[1 + PIPE_NAME_SIZE..CONNECT_REQUEST_SIZE])?;
        Self::new(request_channel, notification_channel)
    }
}

/// Admission answer written on the client's notification channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectResponse {
    pub accepted: bool,
}

impl ConnectResponse {
    pub fn encode(&self) -> [u8; CONNECT_RESPONSE_SIZE] {
        let result: i8 = if self.accepted { 0 } else { -1 };
        [OP_CONNECT, result as u8]
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() < CONNECT_RESPONSE_SIZE {
            return Err(ProtocolError::Truncated {
                expected: CONNECT_RESPONSE_SIZE,
                got: bytes.len(),
            });
        }
        if bytes[0] != OP_CONNECT {
            return Err(ProtocolError::UnexpectedOpCode {
                expected: OP_CONNECT,
                found: bytes[0],
            });
        }
        Ok(Self {
            accepted: bytes[1] as i8 == 0,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameStatus {
    Playing,
    Won,
    Lost,
}

impl GameStatus {
    pub fn tag(self) -> u8 {
        match self {
            GameStatus::Playing => 0,
            GameStatus::Won => 1,
            GameStatus::Lost => 2,
        }
    }

    pub fn from_tag(tag: u8) -> Result<Self, ProtocolError> {
        match tag {
            0 => Ok(GameStatus::Playing),
            1 => Ok(GameStatus::Won),
            2 => Ok(GameStatus::Lost),
            other => Err(ProtocolError::InvalidGameState(other)),
        }
    }
}

/// How a snapshot glyph reads back on the client side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellView {
    Wall,
    Dot,
    Portal,
    Blank,
    Controllable,
    Autonomous,
}

impl CellView {
    pub fn from_glyph(glyph: u8) -> Option<Self> {
        match glyph {
            WALL_GLYPH => Some(CellView::Wall),
            DOT_GLYPH => Some(CellView::Dot),
            PORTAL_GLYPH => Some(CellView::Portal),
            BLANK_GLYPH | 0 => Some(CellView::Blank),
            CONTROLLABLE_GLYPH => Some(CellView::Controllable),
            AUTONOMOUS_GLYPH => Some(CellView::Autonomous),
            _ => None,
        }
    }

    pub fn glyph(self) -> u8 {
        match self {
            CellView::Wall => WALL_GLYPH,
            CellView::Dot => DOT_GLYPH,
            CellView::Portal => PORTAL_GLYPH,
            CellView::Blank => BLANK_GLYPH,
            CellView::Controllable => CONTROLLABLE_GLYPH,
            CellView::Autonomous => AUTONOMOUS_GLYPH,
        }
    }
}

/// Fixed-layout board state pushed to the client every tempo tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub status: GameStatus,
    pub width: u16,
    pub height: u16,
    pub points: u32,
    pub lives: u16,
    pub level_name: String,
    /// Row-major glyphs, `width * height` bytes.
    pub board: Vec<u8>,
}

impl Snapshot {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(SNAPSHOT_SIZE);
        out.push(OP_UPDATE);
        out.push(self.status.tag());
        out.extend_from_slice(&self.width.to_le_bytes());
        out.extend_from_slice(&self.height.to_le_bytes());
        out.extend_from_slice(&self.points.to_le_bytes());
        out.extend_from_slice(&self.lives.to_le_bytes());

        let mut name = [0u8; MAX_LEVEL_NAME];
        write_padded(&mut name, truncate_utf8(&self.level_name, MAX_LEVEL_NAME - 1));
        out.extend_from_slice(&name);

        let mut board = [BLANK_GLYPH; MAX_BOARD_SIZE];
        let len = self.board.len().min(MAX_BOARD_SIZE);
        board[..len].copy_from_slice(&self.board[..len]);
        out.extend_from_slice(&board);

        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() < SNAPSHOT_SIZE {
            return Err(ProtocolError::Truncated {
                expected: SNAPSHOT_SIZE,
                got: bytes.len(),
            });
        }
        if bytes[0] != OP_UPDATE {
            return Err(ProtocolError::UnexpectedOpCode {
                expected: OP_UPDATE,
                found: bytes[0],
            });
        }

        let status = GameStatus::from_tag(bytes[1])?;
        let width = u16::from_le_bytes([bytes[2], bytes[3]]);
        let height = u16::from_le_bytes([bytes[4], bytes[5]]);
        let points = u32::from_le_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]);
        let lives = u16::from_le_bytes([bytes[10], bytes[11]]);

        let name_start = 12;
        let board_start = name_start + MAX_LEVEL_NAME;
        let name_field = &bytes[name_start..board_start];
        let name_end = name_field.iter().position(|&b| b == 0).unwrap_or(name_field.len());
        let level_name = String::from_utf8_lossy(&name_field[..name_end]).into_owned();

        let cells = usize::from(width) * usize::from(height);
        if cells > MAX_BOARD_SIZE {
            return Err(ProtocolError::BoardTooLarge {
                width: width.into(),
                height: height.into(),
            });
        }
        let board = bytes[board_start..board_start + cells].to_vec();

        Ok(Self {
            status,
            width,
            height,
            points,
            lives,
            level_name,
            board,
        })
    }

    /// Classification of the cell at `(x, y)`, if in bounds.
    pub fn cell(&self, x: usize, y: usize) -> Option<CellView> {
        let width = usize::from(self.width);
        if x >= width || y >= usize::from(self.height) {
            return None;
        }
        self.board
            .get(y * width + x)
            .and_then(|&glyph| CellView::from_glyph(glyph))
    }

    pub fn rows(&self) -> impl Iterator<Item = &[u8]> {
        self.board.chunks(usize::from(self.width).max(1))
    }
}

/// Reads one snapshot from a byte stream, `Ok(None)` on a clean close.
pub fn read_snapshot<R: Read>(reader: &mut R) -> Result<Option<Snapshot>, ProtocolError> {
    let mut buf = vec![0u8; SNAPSHOT_SIZE];
    match read_full(reader, &mut buf)? {
        0 => Ok(None),
        n if n < SNAPSHOT_SIZE => Err(ProtocolError::Truncated {
            expected: SNAPSHOT_SIZE,
            got: n,
        }),
        _ => Snapshot::decode(&buf).map(Some),
    }
}

/// Fills `buf` unless the stream ends first; returns the bytes read.
pub fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn check_name(name: &str) -> Result<(), ProtocolError> {
    if name.is_empty() || name.as_bytes().contains(&0) {
        return Err(ProtocolError::InvalidName);
    }
    // One byte stays reserved for the NUL terminator.
    if name.len() >= PIPE_NAME_SIZE {
        return Err(ProtocolError::NameTooLong {
            len: name.len(),
            max: PIPE_NAME_SIZE - 1,
        });
    }
    Ok(())
}

fn write_padded(field: &mut [u8], value: &str) {
    let len = value.len().min(field.len());
    field[..len].copy_from_slice(&value.as_bytes()[..len]);
    field[len..].fill(0);
}

fn read_padded(field: &[u8]) -> Result<String, ProtocolError> {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    std::str::from_utf8(&field[..end])
        .map(str::to_owned)
        .map_err(|_| ProtocolError::InvalidName)
}

fn truncate_utf8(value: &str, max: usize) -> &str {
    if value.len() <= max {
        return value;
    }
    let mut end = max;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}
