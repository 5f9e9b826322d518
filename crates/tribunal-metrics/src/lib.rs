//! Model-independent checks that run alongside judged evaluation:
//! pattern-based safety scanning and performance rollups.
//!
//! Both accumulators are explicit instances over an injectable
//! [`EventLog`](event_log::EventLog); nothing here is process-global.

pub mod event_log;
pub mod perf;
pub mod safety;

pub use event_log::{EventLog, InMemoryLog};
pub use perf::{PerformanceMetricsCollector, PerformanceReport, PerformanceSample};
pub use safety::{SafetyAccumulator, SafetyFinding, SafetyReport, SafetyScanner};
