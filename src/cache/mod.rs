//! Response Cache Module
//!
//! Shields the upstream API behind a keyed response cache. A fresh entry is
//! served with no upstream call; a miss triggers exactly one fetch per key no
//! matter how many callers race on it (single-flight), and every caller for
//! that key receives the fetch's result or its failure.
//!
//! The in-flight fetch runs as its own task, so a caller that abandons its
//! request never abandons the fetch for the other waiters.

pub mod response;

pub use response::ResponseCache;
