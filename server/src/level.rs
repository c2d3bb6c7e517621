//! Level and motion file loading.
//!
//! A level file is line oriented. Blank lines and lines starting with `#`
//! are skipped; `DIM`, `TEMPO`, `PAC` and `MON` lines carry parameters and
//! every other line after `DIM` is a grid row. Motion files referenced by
//! `PAC`/`MON` are resolved relative to the level file's directory.

use log::{debug, warn};
use shared::MAX_BOARD_SIZE;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::board::{
    Action, Autonomous, Board, BoardState, Cell, CellContent, Command, Controllable, Program,
};

/// Commands kept per motion file; the rest are ignored.
pub const MAX_PROGRAM_LEN: usize = 20;
/// Levels played per session.
pub const MAX_LEVELS: usize = 32;
const DEFAULT_TEMPO_MS: u64 = 500;
const LEVEL_EXTENSIONS: [&str; 2] = ["lvl", "txt"];

#[derive(Debug, Error)]
pub enum LevelError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("level {0} has no DIM line")]
    MissingDimensions(String),
    #[error("level {name} is {width}x{height}, more than {max} cells")]
    TooLarge {
        name: String,
        width: usize,
        height: usize,
        max: usize,
    },
    #[error("invalid {keyword} value {value:?}")]
    InvalidNumber { keyword: &'static str, value: String },
    #[error("level {0} has no free cell to place an actor on")]
    NoPlayableCell(String),
}

/// Starting parameters of one actor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActorSetup {
    /// `POS` override; the map marker is used otherwise.
    pub start: Option<(usize, usize)>,
    pub step_delay: u32,
    pub commands: Vec<Command>,
}

/// Static content of a level file before any motion file is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelLayout {
    pub name: String,
    pub width: usize,
    pub height: usize,
    pub tempo: Duration,
    /// Walls, dots and portals only; actors are placed when a board is built.
    pub cells: Vec<Cell>,
    pub controllable_marker: Option<(usize, usize)>,
    pub autonomous_markers: Vec<(usize, usize)>,
    pub controllable_file: Option<String>,
    pub autonomous_files: Vec<String>,
}

/// A parsed level with its actor motion attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Level {
    pub layout: LevelLayout,
    pub controllable: ActorSetup,
    pub autonomous: Vec<ActorSetup>,
}

fn parse_number<T: FromStr>(keyword: &'static str, value: Option<&str>) -> Result<T, LevelError> {
    let value = value.unwrap_or_default();
    value.parse().map_err(|_| LevelError::InvalidNumber {
        keyword,
        value: value.to_string(),
    })
}

fn is_skipped(line: &str) -> bool {
    let trimmed = line.trim_start_matches([' ', '\t']);
    trimmed.is_empty() || trimmed.starts_with('#')
}

/// Parses the text of a level file named `name`.
pub fn parse_level(name: &str, text: &str) -> Result<LevelLayout, LevelError> {
    let mut dimensions: Option<(usize, usize)> = None;
    let mut tempo = Duration::from_millis(DEFAULT_TEMPO_MS);
    let mut cells = Vec::new();
    let mut controllable_marker = None;
    let mut autonomous_markers = Vec::new();
    let mut controllable_file = None;
    let mut autonomous_files = Vec::new();
    let mut row = 0;

    for line in text.lines().filter(|line| !is_skipped(line)) {
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("DIM") => {
                let height: usize = parse_number("DIM", tokens.next())?;
                let width: usize = parse_number("DIM", tokens.next())?;
                if width.saturating_mul(height) > MAX_BOARD_SIZE {
                    return Err(LevelError::TooLarge {
                        name: name.to_string(),
                        width,
                        height,
                        max: MAX_BOARD_SIZE,
                    });
                }
                dimensions = Some((width, height));
                cells = vec![Cell::default(); width * height];
                row = 0;
            }
            Some("TEMPO") => {
                tempo = Duration::from_millis(parse_number("TEMPO", tokens.next())?);
            }
            Some("PAC") => controllable_file = tokens.next().map(str::to_string),
            Some("MON") => autonomous_files.extend(tokens.map(str::to_string)),
            _ => {
                let Some((width, height)) = dimensions else {
                    debug!("{}: grid row before DIM ignored", name);
                    continue;
                };
                if row >= height {
                    debug!("{}: extra grid row ignored", name);
                    continue;
                }
                for (x, glyph) in line.bytes().take(width).enumerate() {
                    let cell = &mut cells[row * width + x];
                    match glyph {
                        b'X' | b'W' => *cell = Cell::wall(),
                        b'.' | b'o' => cell.has_dot = true,
                        b'@' => cell.has_portal = true,
                        b'P' => controllable_marker = Some((x, row)),
                        b'M' => autonomous_markers.push((x, row)),
                        _ => {}
                    }
                }
                row += 1;
            }
        }
    }

    let (width, height) = dimensions.ok_or_else(|| LevelError::MissingDimensions(name.into()))?;
    Ok(LevelLayout {
        name: name.to_string(),
        width,
        height,
        tempo,
        cells,
        controllable_marker,
        autonomous_markers,
        controllable_file,
        autonomous_files,
    })
}

/// Parses a motion file: `PASSO`, `POS` and up to [`MAX_PROGRAM_LEN`]
/// commands. Unknown tokens are skipped.
pub fn parse_motion(text: &str) -> Result<ActorSetup, LevelError> {
    let mut setup = ActorSetup::default();

    for line in text.lines().filter(|line| !is_skipped(line)) {
        let mut tokens = line.split_whitespace().peekable();
        while let Some(token) = tokens.next() {
            if token.starts_with('#') {
                break;
            }
            match token {
                "PASSO" => setup.step_delay = parse_number("PASSO", tokens.next())?,
                "POS" => {
                    let y = parse_number("POS", tokens.next())?;
                    let x = parse_number("POS", tokens.next())?;
                    setup.start = Some((x, y));
                }
                _ => {
                    if setup.commands.len() >= MAX_PROGRAM_LEN {
                        continue;
                    }
                    let Some(key) = token.bytes().next() else {
                        continue;
                    };
                    let command = match key.to_ascii_uppercase() {
                        b'R' => Command::new(Action::Random),
                        b'C' => Command::new(Action::Charge),
                        b'T' => {
                            let turns = tokens
                                .next_if(|next| next.parse::<u32>().is_ok())
                                .and_then(|next| next.parse().ok())
                                .unwrap_or(1);
                            Command::wait(turns)
                        }
                        other => match shared::Direction::from_key(other) {
                            Some(direction) => Command::step(direction),
                            None => {
                                warn!("unknown motion command {:?} skipped", token);
                                continue;
                            }
                        },
                    };
                    setup.commands.push(command);
                }
            }
        }
    }

    Ok(setup)
}

fn read_text(path: &Path) -> Result<String, LevelError> {
    fs::read_to_string(path).map_err(|source| LevelError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Loads a motion file, falling back to an empty program when it is missing
/// or malformed.
fn load_motion(dir: &Path, file: &str) -> ActorSetup {
    let path = dir.join(file);
    match read_text(&path).and_then(|text| parse_motion(&text)) {
        Ok(setup) => setup,
        Err(e) => {
            warn!("motion file ignored: {}", e);
            ActorSetup::default()
        }
    }
}

impl Level {
    /// A level whose actors start on their map markers without programs.
    pub fn from_layout(layout: LevelLayout) -> Self {
        let autonomous = vec![ActorSetup::default(); layout.autonomous_files.len()];
        Self {
            layout,
            controllable: ActorSetup::default(),
            autonomous,
        }
    }

    /// Reads a level file and the motion files it references.
    pub fn load(path: &Path) -> Result<Self, LevelError> {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let layout = parse_level(&name, &read_text(path)?)?;
        let dir = path.parent().unwrap_or_else(|| Path::new("."));

        let controllable = layout
            .controllable_file
            .as_deref()
            .map(|file| load_motion(dir, file))
            .unwrap_or_default();
        let autonomous = layout
            .autonomous_files
            .iter()
            .map(|file| load_motion(dir, file))
            .collect();

        Ok(Self {
            layout,
            controllable,
            autonomous,
        })
    }

    /// Builds a fresh board; the controllable actor starts with
    /// `carried_points` from earlier levels.
    pub fn build_board(&self, carried_points: u32) -> Result<Board, LevelError> {
        let layout = &self.layout;
        let mut state = BoardState::new(layout.width, layout.height);
        state.cells = layout.cells.clone();

        let (x, y) = self.place(&state, self.controllable.start.or(layout.controllable_marker))?;
        state.cell_mut(x, y).content = CellContent::Controllable;
        state.controllables.push(Controllable::new(
            x,
            y,
            carried_points,
            self.controllable.step_delay,
            Program::new(self.controllable.commands.clone()),
        ));

        let mut markers = layout.autonomous_markers.iter().copied();
        for setup in &self.autonomous {
            let wanted = setup.start.or_else(|| markers.next());
            let (x, y) = self.place(&state, wanted)?;
            state.cell_mut(x, y).content = CellContent::Autonomous;
            state.autonomous.push(Autonomous::new(
                x,
                y,
                setup.step_delay,
                Program::new(setup.commands.clone()),
            ));
        }

        Ok(Board::new(layout.name.clone(), layout.tempo, state))
    }

    fn place(
        &self,
        state: &BoardState,
        wanted: Option<(usize, usize)>,
    ) -> Result<(usize, usize), LevelError> {
        match wanted {
            Some((x, y)) if state.is_playable(x, y) => Ok((x, y)),
            _ => state
                .first_playable()
                .ok_or_else(|| LevelError::NoPlayableCell(self.layout.name.clone())),
        }
    }
}

/// Lists the level files in `dir` in play order.
pub fn discover_levels(dir: &Path) -> Result<Vec<PathBuf>, LevelError> {
    let entries = fs::read_dir(dir).map_err(|source| LevelError::Read {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut levels: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| LEVEL_EXTENSIONS.contains(&ext))
        })
        .collect();
    levels.sort();
    levels.truncate(MAX_LEVELS);
    Ok(levels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Direction;

    const LEVEL: &str = "\
# sample level
DIM 3 5
TEMPO 50
PAC pac.p
MON ghost1.m ghost2.m

XXXXX
XP.M@
XoXM
";

    #[test]
    fn test_parse_level_reads_parameters_and_grid() {
        let layout = parse_level("1.lvl", LEVEL).unwrap();

        assert_eq!((layout.width, layout.height), (5, 3));
        assert_eq!(layout.tempo, Duration::from_millis(50));
        assert_eq!(layout.controllable_file.as_deref(), Some("pac.p"));
        assert_eq!(layout.autonomous_files, vec!["ghost1.m", "ghost2.m"]);
        assert_eq!(layout.controllable_marker, Some((1, 1)));
        assert_eq!(layout.autonomous_markers, vec![(3, 1), (3, 2)]);

        let cell = |x: usize, y: usize| layout.cells[y * 5 + x];
        assert_eq!(cell(0, 0).content, CellContent::Wall);
        assert!(cell(2, 1).has_dot);
        assert!(cell(1, 2).has_dot);
        assert!(cell(4, 1).has_portal);
        assert_eq!(cell(4, 2), Cell::default());
    }

    #[test]
    fn test_parse_level_requires_dimensions() {
        let err = parse_level("empty.lvl", "TEMPO 10\nXXX\n").unwrap_err();
        assert!(matches!(err, LevelError::MissingDimensions(_)));
    }

    #[test]
    fn test_parse_level_rejects_oversized_board() {
        let err = parse_level("huge.lvl", "DIM 50 49\n").unwrap_err();
        assert!(matches!(err, LevelError::TooLarge { width: 49, height: 50, .. }));
    }

    #[test]
    fn test_parse_level_rejects_bad_numbers() {
        let err = parse_level("bad.lvl", "DIM three 4\n").unwrap_err();
        assert!(matches!(err, LevelError::InvalidNumber { keyword: "DIM", .. }));
    }

    #[test]
    fn test_parse_motion() {
        let setup = parse_motion("PASSO 2\nPOS 1 3\nD\nd\nT 4\nT\nR\nC # charge\nQ\n").unwrap();

        assert_eq!(setup.step_delay, 2);
        assert_eq!(setup.start, Some((3, 1)));
        assert_eq!(
            setup.commands,
            vec![
                Command::step(Direction::Right),
                Command::step(Direction::Right),
                Command::wait(4),
                Command::wait(1),
                Command::new(Action::Random),
                Command::new(Action::Charge),
            ]
        );
    }

    #[test]
    fn test_parse_motion_caps_program_length() {
        let text = "W\n".repeat(MAX_PROGRAM_LEN + 5);
        assert_eq!(parse_motion(&text).unwrap().commands.len(), MAX_PROGRAM_LEN);
    }

    #[test]
    fn test_build_board_places_actors_and_carries_points() {
        let layout = parse_level("1.lvl", LEVEL).unwrap();
        let level = Level::from_layout(layout);
        let board = level.build_board(42).unwrap();

        let state = board.read();
        assert_eq!(state.check_invariants(), Ok(()));
        assert_eq!(state.controllables[0].points, 42);
        assert_eq!((state.controllables[0].x, state.controllables[0].y), (1, 1));
        assert_eq!(state.autonomous.len(), 2);
        assert_eq!((state.autonomous[1].x, state.autonomous[1].y), (3, 2));
    }

    #[test]
    fn test_start_override_and_fallback() {
        let layout = parse_level("1.lvl", LEVEL).unwrap();
        let mut level = Level::from_layout(layout);
        level.controllable.start = Some((0, 0));
        level.autonomous[0].start = Some((2, 1));

        let board = level.build_board(0).unwrap();
        let state = board.read();
        // (0, 0) is a wall, so the first free cell is used instead.
        assert_eq!((state.controllables[0].x, state.controllables[0].y), (1, 1));
        assert_eq!((state.autonomous[0].x, state.autonomous[0].y), (2, 1));
        assert_eq!(state.check_invariants(), Ok(()));
    }

    #[test]
    fn test_load_resolves_motion_files_next_to_level() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("1.lvl"), LEVEL).unwrap();
        fs::write(dir.path().join("pac.p"), "PASSO 1\nD\n").unwrap();
        fs::write(dir.path().join("ghost1.m"), "POS 2 4\nC\nA\n").unwrap();

        let level = Level::load(&dir.path().join("1.lvl")).unwrap();

        assert_eq!(level.layout.name, "1.lvl");
        assert_eq!(level.controllable.step_delay, 1);
        assert_eq!(level.controllable.commands, vec![Command::step(Direction::Right)]);
        assert_eq!(level.autonomous[0].start, Some((4, 2)));
        // ghost2.m does not exist; that actor gets an empty program.
        assert_eq!(level.autonomous[1], ActorSetup::default());
    }

    #[test]
    fn test_load_missing_level_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Level::load(&dir.path().join("nope.lvl")).unwrap_err();
        assert!(matches!(err, LevelError::Read { .. }));
    }

    #[test]
    fn test_discover_levels_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["2.lvl", "1.lvl", "3.txt", "pac.p", "notes.md"] {
            fs::write(dir.path().join(name), "DIM 1 1\n").unwrap();
        }

        let levels = discover_levels(dir.path()).unwrap();
        let names: Vec<_> = levels
            .iter()
            .map(|path| path.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["1.lvl", "2.lvl", "3.txt"]);
    }
}
