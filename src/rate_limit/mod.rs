//! Rate Limiting Module
//!
//! This module gates every upstream call behind the API key's rate limits.
//! A key carries application-wide windows shared by all calls plus per-method
//! windows, and a call is admitted only when every window of both classes
//! simultaneously has capacity.
//!
//! # Features
//!
//! - Sliding-window log per window (no fixed-bucket bursts at boundaries)
//! - Composite admission across application and method windows
//! - Callers suspend until capacity frees; no request is ever rejected
//! - Cooldown support for upstream-reported 429s
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                     RateLimiter                      │
//! ├──────────────────────────────────────────────────────┤
//! │  Application class      Method classes               │
//! │  ┌────────┬────────┐   ┌──────────┐ ┌────────────┐  │
//! │  │ 10s/3k │600s/180k│  │ summoner │ │ champion   │  │
//! │  └────────┴────────┘   │  1s/2000 │ │ Mastery    │  │
//! │                        └──────────┘ │  1s/2000   │  │
//! │                                     └────────────┘  │
//! └──────────────────────────────────────────────────────┘
//! ```

pub mod limiter;
pub mod window;

pub use limiter::RateLimiter;
pub use window::WindowConfig;
