//! Highscore Store
//!
//! Owns every leaderboard and serializes mutation per category: one mutator
//! at a time per board, with boards for distinct categories updated
//! concurrently. The periodic saver snapshots each board under the same
//! per-category lock as updates, so it never observes a half-applied update.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::config::HighscoresConfig;
use crate::error::Result;
use crate::metrics;

use super::board::{HighscoreEntry, Leaderboard, UpdateOutcome};
use super::notify::ChangeNotifier;
use super::persist::{self, SnapshotFile};

/// Store of all leaderboards plus their persistence settings
pub struct HighscoreStore {
    /// Per-category boards. The outer lock only guards the map shape;
    /// board mutation happens under the per-board mutex.
    boards: RwLock<HashMap<String, Arc<Mutex<Leaderboard>>>>,

    track_limit: usize,
    display_limit: usize,
    data_path: PathBuf,
    notifier: Arc<dyn ChangeNotifier>,
}

impl HighscoreStore {
    /// Create an empty store from configuration
    pub fn new(config: &HighscoresConfig, notifier: Arc<dyn ChangeNotifier>) -> Self {
        Self {
            boards: RwLock::new(HashMap::new()),
            track_limit: config.track,
            display_limit: config.display,
            data_path: config.data_path.clone(),
            notifier,
        }
    }

    /// Create a store and load the most recent snapshot, if any.
    ///
    /// A missing snapshot is a normal cold start. A present but unreadable
    /// snapshot is logged loudly and treated as a cold start rather than
    /// refusing to come up.
    pub async fn open(config: &HighscoresConfig, notifier: Arc<dyn ChangeNotifier>) -> Self {
        let store = Self::new(config, notifier);
        match persist::load(&store.data_path) {
            Ok(Some(snapshot)) => {
                let categories = snapshot.boards.len();
                store.restore(snapshot).await;
                info!(
                    categories,
                    path = %store.data_path.display(),
                    "loaded highscore snapshot"
                );
            }
            Ok(None) => {
                info!(
                    path = %store.data_path.display(),
                    "no highscore snapshot found, starting cold"
                );
            }
            Err(e) => {
                warn!(
                    error = %e,
                    path = %store.data_path.display(),
                    "failed to load highscore snapshot, starting cold"
                );
            }
        }
        store
    }

    /// Replace all boards with the contents of a snapshot
    async fn restore(&self, snapshot: SnapshotFile) {
        let mut boards = self.boards.write().await;
        boards.clear();
        for (category, entries) in snapshot.boards {
            let board = Leaderboard::from_entries(entries, self.track_limit, self.display_limit);
            boards.insert(category, Arc::new(Mutex::new(board)));
        }
    }

    /// Handle to a category's board, created on first sighting
    async fn board(&self, category: &str) -> Arc<Mutex<Leaderboard>> {
        {
            let boards = self.boards.read().await;
            if let Some(board) = boards.get(category) {
                return Arc::clone(board);
            }
        }
        let mut boards = self.boards.write().await;
        Arc::clone(boards.entry(category.to_string()).or_insert_with(|| {
            Arc::new(Mutex::new(Leaderboard::new(
                self.track_limit,
                self.display_limit,
            )))
        }))
    }

    /// Apply one sighting of a scored entity to a category's board.
    ///
    /// Serialized per category; the notifier hears about every outcome that
    /// changed the board.
    pub async fn update(
        &self,
        category: &str,
        entity_id: &str,
        display_name: &str,
        score: i64,
    ) -> UpdateOutcome {
        let board = self.board(category).await;
        let outcome = {
            let mut board = board.lock().await;
            board.update(entity_id, display_name, score)
        };

        metrics::HIGHSCORE_UPDATES_TOTAL
            .with_label_values(&[outcome_label(&outcome)])
            .inc();

        match outcome {
            UpdateOutcome::Unchanged | UpdateOutcome::NotAdmitted => {}
            _ => {
                let entry = HighscoreEntry {
                    entity_id: entity_id.to_string(),
                    display_name: display_name.to_string(),
                    score,
                };
                self.notifier.notify(category, &entry, &outcome);
            }
        }
        outcome
    }

    /// The display slice of one category's board
    pub async fn display(&self, category: &str) -> Vec<HighscoreEntry> {
        let boards = self.boards.read().await;
        match boards.get(category) {
            Some(board) => board.lock().await.display().to_vec(),
            None => Vec::new(),
        }
    }

    /// Names of all categories with a board
    pub async fn categories(&self) -> Vec<String> {
        self.boards.read().await.keys().cloned().collect()
    }

    /// Consistent snapshot of every board's full tracked list
    pub async fn snapshot(&self) -> SnapshotFile {
        let handles: Vec<(String, Arc<Mutex<Leaderboard>>)> = {
            let boards = self.boards.read().await;
            boards
                .iter()
                .map(|(category, board)| (category.clone(), Arc::clone(board)))
                .collect()
        };

        let mut snapshot = BTreeMap::new();
        for (category, board) in handles {
            let entries = board.lock().await.tracked().to_vec();
            snapshot.insert(category, entries);
        }
        SnapshotFile::new(snapshot)
    }

    /// Write the current state to the snapshot file.
    ///
    /// A write failure is reported but leaves the boards untouched; the next
    /// save tick retries with fresh state.
    pub async fn save(&self) -> Result<()> {
        let snapshot = self.snapshot().await;
        let categories = snapshot.boards.len();
        match persist::save(&self.data_path, &snapshot) {
            Ok(()) => {
                metrics::SNAPSHOT_SAVES_TOTAL.inc();
                info!(categories, path = %self.data_path.display(), "saved highscores");
                Ok(())
            }
            Err(e) => {
                metrics::SNAPSHOT_SAVE_ERRORS_TOTAL.inc();
                warn!(error = %e, "failed to save highscores, will retry next tick");
                Err(e)
            }
        }
    }
}

fn outcome_label(outcome: &UpdateOutcome) -> &'static str {
    match outcome {
        UpdateOutcome::NewEntry { .. } => "new",
        UpdateOutcome::RankChanged { .. } => "rank_changed",
        UpdateOutcome::ValueChanged { .. } => "value_changed",
        UpdateOutcome::Unchanged => "unchanged",
        UpdateOutcome::NotAdmitted => "not_admitted",
    }
}
