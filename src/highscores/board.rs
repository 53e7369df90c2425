//! Leaderboard State and Update Logic
//!
//! A leaderboard is a sequence of entries sorted by score descending. On
//! equal scores the earlier entry keeps the higher rank: a new or updated
//! entry that merely ties never reorders the board, its values are updated
//! in place.

use serde::{Deserialize, Serialize};

/// One scored entity on a leaderboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighscoreEntry {
    /// Stable upstream identifier for the entity
    pub entity_id: String,

    /// Name shown to readers; may change between sightings
    pub display_name: String,

    /// The entity's score in this category
    pub score: i64,
}

/// What an update did to the board.
///
/// Ranks are zero-based positions in the tracked list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The entity was admitted onto the board
    NewEntry { rank: usize },

    /// The entity was already on the board and moved
    RankChanged { from: usize, to: usize },

    /// Score or display name changed but the rank did not
    ValueChanged { rank: usize },

    /// The update carried nothing new
    Unchanged,

    /// The board is full and the score did not beat the lowest entry
    NotAdmitted,
}

/// A bounded, score-ordered list for one category
#[derive(Debug, Clone, PartialEq)]
pub struct Leaderboard {
    entries: Vec<HighscoreEntry>,
    track_limit: usize,
    display_limit: usize,
}

impl Leaderboard {
    /// Create an empty board. `display_limit` is clamped to `track_limit`;
    /// configuration validation rejects that case before it gets here.
    pub fn new(track_limit: usize, display_limit: usize) -> Self {
        Self {
            entries: Vec::with_capacity(track_limit.min(1024)),
            track_limit,
            display_limit: display_limit.min(track_limit),
        }
    }

    /// Rebuild a board from persisted entries, re-sorting and truncating in
    /// case the limits shrank since the snapshot was written
    pub fn from_entries(
        mut entries: Vec<HighscoreEntry>,
        track_limit: usize,
        display_limit: usize,
    ) -> Self {
        entries.sort_by(|a, b| b.score.cmp(&a.score));
        entries.truncate(track_limit);
        Self {
            entries,
            track_limit,
            display_limit: display_limit.min(track_limit),
        }
    }

    /// Apply one sighting of an entity.
    ///
    /// Absent entities are inserted in sorted position, evicting the lowest
    /// entry when the board would exceed its track limit (possibly the new
    /// entry itself). Present entities are updated in place and re-ranked
    /// only when the new score actually changes their relative order.
    pub fn update(&mut self, entity_id: &str, display_name: &str, score: i64) -> UpdateOutcome {
        match self.entries.iter().position(|e| e.entity_id == entity_id) {
            Some(current) => self.update_existing(current, display_name, score),
            None => self.insert_new(entity_id, display_name, score),
        }
    }

    fn update_existing(&mut self, current: usize, display_name: &str, score: i64) -> UpdateOutcome {
        let entry = &self.entries[current];
        if entry.display_name == display_name && entry.score == score {
            return UpdateOutcome::Unchanged;
        }

        // In place when the neighbors still bracket the new score. Ties keep
        // the current order.
        let fits_above = current == 0 || self.entries[current - 1].score >= score;
        let fits_below =
            current + 1 >= self.entries.len() || score >= self.entries[current + 1].score;
        if fits_above && fits_below {
            let entry = &mut self.entries[current];
            entry.display_name = display_name.to_string();
            entry.score = score;
            return UpdateOutcome::ValueChanged { rank: current };
        }

        let mut entry = self.entries.remove(current);
        entry.display_name = display_name.to_string();
        entry.score = score;
        let to = self.sorted_position(score);
        self.entries.insert(to, entry);
        UpdateOutcome::RankChanged { from: current, to }
    }

    fn insert_new(&mut self, entity_id: &str, display_name: &str, score: i64) -> UpdateOutcome {
        let rank = self.sorted_position(score);
        if self.entries.len() >= self.track_limit && rank >= self.track_limit {
            // A no-op admission: the newcomer is the entry that gets dropped.
            return UpdateOutcome::NotAdmitted;
        }

        self.entries.insert(
            rank,
            HighscoreEntry {
                entity_id: entity_id.to_string(),
                display_name: display_name.to_string(),
                score,
            },
        );
        self.entries.truncate(self.track_limit);
        UpdateOutcome::NewEntry { rank }
    }

    /// First index whose score is strictly below `score`. Placing behind all
    /// ties keeps the board stable under repeated equal updates.
    fn sorted_position(&self, score: i64) -> usize {
        self.entries.partition_point(|e| e.score >= score)
    }

    /// The slice readers are allowed to see
    pub fn display(&self) -> &[HighscoreEntry] {
        let shown = self.display_limit.min(self.entries.len());
        &self.entries[..shown]
    }

    /// The full tracked list, for persistence
    pub fn tracked(&self) -> &[HighscoreEntry] {
        &self.entries
    }

    /// Number of tracked entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the board has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
