//! Highscore Change Notification
//!
//! Board mutations emit events to a notifier so operators can watch the
//! lists move. Notification is best-effort: the store never waits on it and
//! board state is correct whether or not anything observes the events.

use tracing::{debug, info};

use super::board::{HighscoreEntry, UpdateOutcome};

/// Receives highscore change events
pub trait ChangeNotifier: Send + Sync {
    /// Called after every update that changed a board. `Unchanged` and
    /// `NotAdmitted` outcomes are not reported.
    fn notify(&self, category: &str, entry: &HighscoreEntry, outcome: &UpdateOutcome);
}

/// Default notifier that logs through `tracing`.
///
/// Rank changes and value-only updates are toggled separately, mirroring the
/// two logging switches in the highscores configuration.
pub struct TracingNotifier {
    log_rank_changes: bool,
    log_value_updates: bool,
}

impl TracingNotifier {
    pub fn new(log_rank_changes: bool, log_value_updates: bool) -> Self {
        Self {
            log_rank_changes,
            log_value_updates,
        }
    }
}

impl ChangeNotifier for TracingNotifier {
    fn notify(&self, category: &str, entry: &HighscoreEntry, outcome: &UpdateOutcome) {
        match outcome {
            UpdateOutcome::NewEntry { rank } if self.log_rank_changes => {
                info!(
                    category,
                    name = %entry.display_name,
                    score = entry.score,
                    rank = rank + 1,
                    "new highscore entry"
                );
            }
            UpdateOutcome::RankChanged { from, to } if self.log_rank_changes => {
                info!(
                    category,
                    name = %entry.display_name,
                    score = entry.score,
                    from = from + 1,
                    to = to + 1,
                    "highscore ranking changed"
                );
            }
            UpdateOutcome::ValueChanged { rank } if self.log_value_updates => {
                debug!(
                    category,
                    name = %entry.display_name,
                    score = entry.score,
                    rank = rank + 1,
                    "highscore entry updated"
                );
            }
            _ => {}
        }
    }
}

/// Notifier that drops every event; used where logging is unwanted
pub struct NullNotifier;

impl ChangeNotifier for NullNotifier {
    fn notify(&self, _category: &str, _entry: &HighscoreEntry, _outcome: &UpdateOutcome) {}
}
