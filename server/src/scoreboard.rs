//! Process-wide score table.

use parking_lot::Mutex;
use shared::admin::ScoreLine;
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::Path;

pub const SCOREBOARD_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScoreEntry {
    pub client_id: u32,
    pub score: u32,
    pub active: bool,
}

impl From<ScoreEntry> for ScoreLine {
    fn from(entry: ScoreEntry) -> Self {
        ScoreLine {
            client_id: entry.client_id,
            score: entry.score,
            active: entry.active,
        }
    }
}

/// Handle to a registered session's row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreSlot {
    index: usize,
    pub client_id: u32,
}

#[derive(Debug)]
struct Table {
    entries: Vec<ScoreEntry>,
    next_client_id: u32,
}

#[derive(Debug)]
pub struct Scoreboard {
    table: Mutex<Table>,
}

impl Default for Scoreboard {
    fn default() -> Self {
        Self::new()
    }
}

impl Scoreboard {
    pub fn new() -> Self {
        Self {
            table: Mutex::new(Table {
                entries: vec![ScoreEntry::default(); SCOREBOARD_CAPACITY],
                next_client_id: 1,
            }),
        }
    }

    /// Claims an inactive row for a new session. Returns `None` when every row
    /// belongs to a running session.
    pub fn register(&self) -> Option<ScoreSlot> {
        let mut table = self.table.lock();
        let client_id = table.next_client_id;
        table.next_client_id += 1;

        let index = table.entries.iter().position(|entry| !entry.active)?;
        table.entries[index] = ScoreEntry {
            client_id,
            score: 0,
            active: true,
        };
        Some(ScoreSlot { index, client_id })
    }

    pub fn update(&self, slot: ScoreSlot, score: u32) {
        let mut table = self.table.lock();
        if let Some(entry) = table.entries.get_mut(slot.index) {
            if entry.client_id == slot.client_id {
                entry.score = score;
            }
        }
    }

    /// Records the final score and frees the row for reuse.
    pub fn finish(&self, slot: ScoreSlot, score: u32) {
        let mut table = self.table.lock();
        if let Some(entry) = table.entries.get_mut(slot.index) {
            if entry.client_id == slot.client_id {
                entry.score = score;
                entry.active = false;
            }
        }
    }

    /// Every row ever used, highest score first.
    pub fn snapshot(&self) -> Vec<ScoreEntry> {
        let mut entries: Vec<ScoreEntry> = {
            let table = self.table.lock();
            table
                .entries
                .iter()
                .filter(|entry| entry.client_id != 0)
                .copied()
                .collect()
        };
        entries.sort_by(|a, b| b.score.cmp(&a.score));
        entries
    }

    pub fn top(&self, n: usize) -> Vec<ScoreEntry> {
        self.snapshot()
            .into_iter()
            .filter(|entry| entry.score > 0 || entry.active)
            .take(n)
            .collect()
    }

    pub fn report(&self, n: usize) -> String {
        render_report(&self.top(n), n)
    }

    pub fn write_report(&self, path: &Path, n: usize) -> io::Result<()> {
        fs::write(path, self.report(n))
    }
}

/// Renders the plain-text leaderboard written by score dumps.
pub fn render_report(entries: &[ScoreEntry], n: usize) -> String {
    let mut out = format!("=== TOP {} SCORES ===\n", n);
    if entries.is_empty() {
        out.push_str("No scores recorded yet.\n");
        return out;
    }
    for (rank, entry) in entries.iter().enumerate() {
        let _ = write!(
            out,
            "{}. Client {}: {} points",
            rank + 1,
            entry.client_id,
            entry.score
        );
        if entry.active {
            out.push_str(" (playing)");
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_assigns_increasing_ids() {
        let scoreboard = Scoreboard::new();
        let first = scoreboard.register().unwrap();
        let second = scoreboard.register().unwrap();
        assert_eq!(first.client_id, 1);
        assert_eq!(second.client_id, 2);
    }

    #[test]
    fn test_finished_slot_is_reused() {
        let scoreboard = Scoreboard::new();
        let slots: Vec<ScoreSlot> = (0..SCOREBOARD_CAPACITY)
            .map(|_| scoreboard.register().unwrap())
            .collect();
        assert!(scoreboard.register().is_none());

        scoreboard.finish(slots[10], 33);
        let reused = scoreboard.register().unwrap();
        assert_eq!(reused.index, 10);
        assert_eq!(reused.client_id, SCOREBOARD_CAPACITY as u32 + 2);
    }

    #[test]
    fn test_stale_slot_does_not_touch_new_owner() {
        let scoreboard = Scoreboard::new();
        let old = scoreboard.register().unwrap();
        scoreboard.finish(old, 5);
        let new = scoreboard.register().unwrap();
        assert_eq!(new.index, old.index);

        scoreboard.update(old, 999);
        let entry = scoreboard.snapshot()[0];
        assert_eq!(entry.client_id, new.client_id);
        assert_eq!(entry.score, 0);
    }

    #[test]
    fn test_top_sorts_and_filters() {
        let scoreboard = Scoreboard::new();
        let a = scoreboard.register().unwrap();
        let b = scoreboard.register().unwrap();
        let c = scoreboard.register().unwrap();
        let d = scoreboard.register().unwrap();

        scoreboard.finish(a, 10);
        scoreboard.update(b, 50);
        scoreboard.finish(c, 0);
        let _ = d;

        let top = scoreboard.top(5);
        let ids: Vec<u32> = top.iter().map(|entry| entry.client_id).collect();
        // c finished with nothing and is dropped; d is still playing.
        assert_eq!(ids, vec![b.client_id, a.client_id, d.client_id]);
        assert_eq!(scoreboard.top(1).len(), 1);
    }

    #[test]
    fn test_report_format() {
        let scoreboard = Scoreboard::new();
        assert_eq!(
            scoreboard.report(5),
            "=== TOP 5 SCORES ===\nNo scores recorded yet.\n"
        );

        let a = scoreboard.register().unwrap();
        let b = scoreboard.register().unwrap();
        scoreboard.finish(a, 120);
        scoreboard.update(b, 40);

        assert_eq!(
            scoreboard.report(5),
            "=== TOP 5 SCORES ===\n\
             1. Client 1: 120 points\n\
             2. Client 2: 40 points (playing)\n"
        );
    }

    #[test]
    fn test_write_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scores.txt");
        let scoreboard = Scoreboard::new();
        let slot = scoreboard.register().unwrap();
        scoreboard.finish(slot, 7);

        scoreboard.write_report(&path, 5).unwrap();
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("1. Client 1: 7 points"));
    }
}
