//! Offline evaluation of conversational agent sessions.
//!
//! Traces are scored per category by a judging oracle (with a rule-based
//! fallback) and rolled up into reproducible session aggregations.

pub mod aggregate;
pub mod config;
pub mod errors;
pub mod fingerprint;
pub mod judge;
pub mod model;
pub mod pipeline;
pub mod providers;
pub mod report;
pub mod rubric;
pub mod storage;
pub mod trace;
