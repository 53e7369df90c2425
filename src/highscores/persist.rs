//! Highscore Snapshot Persistence
//!
//! The full tracked state of every board is serialized to one JSON file.
//! Writes go to a sibling temp file first and are moved into place with a
//! rename, so readers (and a crash mid-write) only ever see the previous
//! complete snapshot or the new one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

use super::board::HighscoreEntry;

/// On-disk snapshot of every leaderboard
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SnapshotFile {
    /// When the snapshot was written (UTC)
    pub saved_at: DateTime<Utc>,

    /// Full tracked entry list per category, in rank order.
    /// A `BTreeMap` keeps the file diffable between saves.
    pub boards: BTreeMap<String, Vec<HighscoreEntry>>,
}

impl SnapshotFile {
    /// Snapshot the given boards as of now
    pub fn new(boards: BTreeMap<String, Vec<HighscoreEntry>>) -> Self {
        Self {
            saved_at: Utc::now(),
            boards,
        }
    }
}

/// Write a snapshot atomically.
///
/// The temp file lands next to the target so the rename never crosses a
/// filesystem boundary.
pub fn save(path: &Path, snapshot: &SnapshotFile) -> Result<()> {
    let json = serde_json::to_string_pretty(snapshot)
        .map_err(|e| Error::Decode(format!("failed to serialize snapshot: {}", e)))?;

    let tmp_path = path.with_extension("json.tmp");
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(Error::persistence)?;
        }
    }
    fs::write(&tmp_path, json).map_err(Error::persistence)?;
    fs::rename(&tmp_path, path).map_err(Error::persistence)?;
    Ok(())
}

/// Load the most recent snapshot.
///
/// Returns `Ok(None)` when no snapshot exists (cold start). A present but
/// unreadable or unparsable file is an error; the caller decides whether
/// that is fatal.
pub fn load(path: &Path) -> Result<Option<SnapshotFile>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::persistence(e)),
    };

    let snapshot = serde_json::from_str(&content)
        .map_err(|e| Error::Decode(format!("failed to parse snapshot {:?}: {}", path, e)))?;
    Ok(Some(snapshot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_snapshot() -> SnapshotFile {
        let mut boards = BTreeMap::new();
        boards.insert(
            "266".to_string(),
            vec![
                HighscoreEntry {
                    entity_id: "s1".to_string(),
                    display_name: "TopPlayer".to_string(),
                    score: 1_234_567,
                },
                HighscoreEntry {
                    entity_id: "s2".to_string(),
                    display_name: "Runner Up".to_string(),
                    score: 900_000,
                },
            ],
        );
        boards.insert("total".to_string(), vec![]);
        SnapshotFile::new(boards)
    }

    #[test]
    fn test_round_trip_preserves_order_and_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("highscore_data.json");
        let snapshot = sample_snapshot();

        save(&path, &snapshot).unwrap();
        let loaded = load(&path).unwrap().unwrap();
        assert_eq!(loaded, snapshot);
    }

    #[test]
    fn test_missing_file_is_cold_start() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nothing_here.json");
        assert_eq!(load(&path).unwrap(), None);
    }

    #[test]
    fn test_corrupt_file_is_an_error_not_a_panic() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("highscore_data.json");
        fs::write(&path, "{not json").unwrap();

        assert!(matches!(load(&path), Err(Error::Decode(_))));
    }

    #[test]
    fn test_save_replaces_previous_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("highscore_data.json");

        save(&path, &sample_snapshot()).unwrap();
        let second = SnapshotFile::new(BTreeMap::new());
        save(&path, &second).unwrap();

        let loaded = load(&path).unwrap().unwrap();
        assert!(loaded.boards.is_empty());
        // No temp file left behind
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_save_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data").join("highscore_data.json");
        save(&path, &sample_snapshot()).unwrap();
        assert!(path.exists());
    }
}
