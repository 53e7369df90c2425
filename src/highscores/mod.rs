//! Highscore Tracking Module
//!
//! Maintains one bounded, score-ordered leaderboard per category, fed from
//! resolved upstream responses. Each board keeps the best `track` scores ever
//! seen and exposes only the best `display` of them to readers. The full
//! tracked state is persisted to a JSON snapshot on a timer and at shutdown,
//! written atomically so a crash mid-save never corrupts the previous state.
//!
//! Rank changes and value-only updates are reported to a [`ChangeNotifier`];
//! the notifier is best-effort and never affects board state.

pub mod board;
pub mod notify;
pub mod persist;
pub mod store;

pub use board::{HighscoreEntry, Leaderboard, UpdateOutcome};
pub use notify::{ChangeNotifier, NullNotifier, TracingNotifier};
pub use persist::SnapshotFile;
pub use store::HighscoreStore;
