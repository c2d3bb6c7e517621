//! Player input: keyboard lines or a scripted moves file.

use log::debug;
use shared::{Direction, Request};
use std::io::{self, BufRead};
use std::thread;
use std::time::Duration;

use crate::network::RequestSender;

/// Pause between two moves replayed from a file.
pub const SCRIPT_PACING: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientInput {
    Move(Direction),
    Quit,
}

impl ClientInput {
    pub fn to_request(self) -> Request {
        match self {
            ClientInput::Move(direction) => Request::Move(direction),
            ClientInput::Quit => Request::Disconnect,
        }
    }
}

/// Interprets the first character of a line. Anything but `W/A/S/D/Q`
/// (either case) is ignored.
pub fn parse_input_line(line: &str) -> Option<ClientInput> {
    let key = line.trim_start().bytes().next()?;
    if key.eq_ignore_ascii_case(&b'q') {
        return Some(ClientInput::Quit);
    }
    Direction::from_key(key).map(ClientInput::Move)
}

/// Forwards every line of `source` to the server until a quit or the end of
/// input, either of which sends the disconnect request. `pacing` is slept
/// after each line.
pub fn pump<R: BufRead>(
    source: R,
    sender: &mut RequestSender,
    pacing: Option<Duration>,
) -> io::Result<()> {
    for line in source.lines() {
        let line = line?;
        match parse_input_line(&line) {
            Some(ClientInput::Quit) => break,
            Some(input) => sender.send(input.to_request())?,
            None => debug!("ignored input {:?}", line),
        }
        if let Some(pacing) = pacing {
            thread::sleep(pacing);
        }
    }
    sender.disconnect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_input_line() {
        assert_eq!(
            parse_input_line("w"),
            Some(ClientInput::Move(Direction::Up))
        );
        assert_eq!(
            parse_input_line("  D extra"),
            Some(ClientInput::Move(Direction::Right))
        );
        assert_eq!(parse_input_line("Q"), Some(ClientInput::Quit));
        assert_eq!(parse_input_line("x"), None);
        assert_eq!(parse_input_line(""), None);
    }

    #[test]
    fn test_quit_maps_to_disconnect() {
        assert_eq!(ClientInput::Quit.to_request(), Request::Disconnect);
        assert_eq!(
            ClientInput::Move(Direction::Left).to_request(),
            Request::Move(Direction::Left)
        );
    }
}
