//! MasteryHub Gateway Library
//!
//! This library provides the core of the MasteryHub backend: a composite
//! rate limiter for the upstream API key, a single-flight response cache,
//! and persistent highscore tracking, composed behind a thin gateway facade.

pub mod cache;
pub mod config;
pub mod error;
pub mod gateway;
pub mod highscores;
pub mod metrics;
pub mod rate_limit;
pub mod upstream;
