//! Latency, token, cost and tool-execution rollups over recorded executions.

pub mod collector;
pub mod percentile;
pub mod pricing;
pub mod report;

pub use collector::{PerfEvent, PerformanceMetricsCollector, PerformanceSample, ToolSpan};
pub use percentile::percentile;
pub use pricing::PriceTable;
pub use report::{ErrorKind, PerformanceReport, ToolStats};
