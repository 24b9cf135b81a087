//! Trace-driven cache simulator: replays instruction-fetch, load, and
//! store records against a configurable one-level cache model and counts
//! hits, misses, replacements, and word-granularity memory traffic. No
//! data is stored or moved; only tags and dirty bits are modeled.

pub mod cache;
pub mod config;
pub mod sim;
pub mod stats;
pub mod trace;
