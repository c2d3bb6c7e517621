use shared::{GameStatus, Snapshot};
use std::io::{self, Write};

/// ANSI clear screen and cursor home.
const CLEAR: &str = "\x1b[2J\x1b[H";

/// Plain-text frame for one snapshot.
pub fn render_frame(snapshot: &Snapshot) -> String {
    let mut frame = format!(
        "Level: {} | Points: {} | Lives: {}\n",
        snapshot.level_name, snapshot.points, snapshot.lives
    );
    for row in snapshot.rows() {
        frame.push_str(&String::from_utf8_lossy(row));
        frame.push('\n');
    }
    match snapshot.status {
        GameStatus::Playing => frame.push_str("W/A/S/D to move, Q to quit\n"),
        GameStatus::Won => frame.push_str("*** LEVEL COMPLETE ***\n"),
        GameStatus::Lost => frame.push_str("*** GAME OVER ***\n"),
    }
    frame
}

pub struct Renderer<W: Write> {
    out: W,
    clear_screen: bool,
}

impl<W: Write> Renderer<W> {
    pub fn new(out: W, clear_screen: bool) -> Self {
        Self { out, clear_screen }
    }

    pub fn render(&mut self, snapshot: &Snapshot) -> io::Result<()> {
        if self.clear_screen {
            self.out.write_all(CLEAR.as_bytes())?;
        }
        self.out.write_all(render_frame(snapshot).as_bytes())?;
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(status: GameStatus) -> Snapshot {
        Snapshot {
            status,
            width: 3,
            height: 2,
            points: 12,
            lives: 1,
            level_name: "1.lvl".to_string(),
            board: b"#C.M @".to_vec(),
        }
    }

    #[test]
    fn test_frame_layout() {
        assert_eq!(
            render_frame(&snapshot(GameStatus::Playing)),
            "Level: 1.lvl | Points: 12 | Lives: 1\n#C.\nM @\nW/A/S/D to move, Q to quit\n"
        );
    }

    #[test]
    fn test_status_banner() {
        assert!(render_frame(&snapshot(GameStatus::Won)).ends_with("*** LEVEL COMPLETE ***\n"));
        assert!(render_frame(&snapshot(GameStatus::Lost)).ends_with("*** GAME OVER ***\n"));
    }

    #[test]
    fn test_renderer_without_clear() {
        let mut out = Vec::new();
        Renderer::new(&mut out, false)
            .render(&snapshot(GameStatus::Playing))
            .unwrap();
        assert!(out.starts_with(b"Level: 1.lvl"));
    }
}
