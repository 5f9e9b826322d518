use super::pricing::PriceTable;
use super::report::PerformanceReport;
use crate::event_log::{EventLog, InMemoryLog};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpan {
    pub name: String,
    pub start: DateTime<Utc>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

impl ToolSpan {
    pub fn duration_ms(&self) -> Option<f64> {
        self.end.map(|end| millis_between(self.start, end))
    }
}

/// One execution. `end` is `None` while it is still in flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSample {
    pub test_id: String,
    #[serde(default)]
    pub model: Option<String>,
    pub start: DateTime<Utc>,
    #[serde(default)]
    pub first_token: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub tool_spans: Vec<ToolSpan>,
    #[serde(default)]
    pub error: Option<String>,
}

impl PerformanceSample {
    pub fn latency_ms(&self) -> Option<f64> {
        self.end.map(|end| millis_between(self.start, end))
    }

    pub fn ttft_ms(&self) -> Option<f64> {
        self.first_token.map(|t| millis_between(self.start, t))
    }
}

pub(crate) fn millis_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    let d = end - start;
    match d.num_microseconds() {
        Some(us) => us as f64 / 1000.0,
        None => d.num_milliseconds() as f64,
    }
}

/// Recorded event, keyed by execution id. Also the JSONL replay format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PerfEvent {
    Start {
        execution_id: String,
        #[serde(default)]
        test_id: Option<String>,
        #[serde(default)]
        model: Option<String>,
        at: DateTime<Utc>,
    },
    FirstToken {
        execution_id: String,
        at: DateTime<Utc>,
    },
    ToolStart {
        execution_id: String,
        tool: String,
        at: DateTime<Utc>,
    },
    ToolEnd {
        execution_id: String,
        tool: String,
        at: DateTime<Utc>,
        #[serde(default = "default_true")]
        success: bool,
        #[serde(default)]
        error: Option<String>,
    },
    End {
        execution_id: String,
        at: DateTime<Utc>,
        #[serde(default)]
        input_tokens: u64,
        #[serde(default)]
        output_tokens: u64,
        #[serde(default)]
        error: Option<String>,
    },
    Sample {
        execution_id: String,
        sample: PerformanceSample,
    },
}

fn default_true() -> bool {
    true
}

/// Accumulates execution events and computes [`PerformanceReport`]s on demand.
///
/// Recording only appends to the event log. A report folds a snapshot of
/// the log, so events recorded while it runs land in the next report.
pub struct PerformanceMetricsCollector {
    log: Arc<dyn EventLog<PerfEvent>>,
    prices: PriceTable,
}

impl Default for PerformanceMetricsCollector {
    fn default() -> Self {
        Self::new(PriceTable::default())
    }
}

impl PerformanceMetricsCollector {
    pub fn new(prices: PriceTable) -> Self {
        Self::with_log(prices, Arc::new(InMemoryLog::new()))
    }

    pub fn with_log(prices: PriceTable, log: Arc<dyn EventLog<PerfEvent>>) -> Self {
        Self { log, prices }
    }

    pub fn record(&self, event: PerfEvent) {
        self.log.append(event);
    }

    pub fn start(&self, execution_id: &str, test_id: &str, model: Option<&str>, at: DateTime<Utc>) {
        self.record(PerfEvent::Start {
            execution_id: execution_id.to_string(),
            test_id: Some(test_id.to_string()),
            model: model.map(str::to_string),
            at,
        });
    }

    pub fn first_token(&self, execution_id: &str, at: DateTime<Utc>) {
        self.record(PerfEvent::FirstToken {
            execution_id: execution_id.to_string(),
            at,
        });
    }

    pub fn tool_start(&self, execution_id: &str, tool: &str, at: DateTime<Utc>) {
        self.record(PerfEvent::ToolStart {
            execution_id: execution_id.to_string(),
            tool: tool.to_string(),
            at,
        });
    }

    pub fn tool_end(
        &self,
        execution_id: &str,
        tool: &str,
        at: DateTime<Utc>,
        success: bool,
        error: Option<&str>,
    ) {
        self.record(PerfEvent::ToolEnd {
            execution_id: execution_id.to_string(),
            tool: tool.to_string(),
            at,
            success,
            error: error.map(str::to_string),
        });
    }

    pub fn end(
        &self,
        execution_id: &str,
        at: DateTime<Utc>,
        input_tokens: u64,
        output_tokens: u64,
        error: Option<&str>,
    ) {
        self.record(PerfEvent::End {
            execution_id: execution_id.to_string(),
            at,
            input_tokens,
            output_tokens,
            error: error.map(str::to_string),
        });
    }

    /// Records an execution captured elsewhere in one piece.
    pub fn record_sample(&self, execution_id: &str, sample: PerformanceSample) {
        self.record(PerfEvent::Sample {
            execution_id: execution_id.to_string(),
            sample,
        });
    }

    /// Executions reconstructed from the current log snapshot, by execution id.
    pub fn samples(&self) -> BTreeMap<String, PerformanceSample> {
        fold_events(self.log.snapshot())
    }

    pub fn report(&self) -> PerformanceReport {
        PerformanceReport::compute(self.samples().values(), &self.prices)
    }

    /// Drops everything recorded so far.
    pub fn reset(&self) {
        self.log.clear();
    }
}

#[derive(Default)]
struct Partial {
    test_id: Option<String>,
    model: Option<String>,
    start: Option<DateTime<Utc>>,
    first_token: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    input_tokens: u64,
    output_tokens: u64,
    tool_spans: Vec<ToolSpan>,
    error: Option<String>,
}

fn fold_events(events: Vec<PerfEvent>) -> BTreeMap<String, PerformanceSample> {
    let mut partials: BTreeMap<String, Partial> = BTreeMap::new();
    let mut complete: BTreeMap<String, PerformanceSample> = BTreeMap::new();

    for event in events {
        match event {
            PerfEvent::Sample {
                execution_id,
                sample,
            } => {
                complete.insert(execution_id, sample);
            }
            PerfEvent::Start {
                execution_id,
                test_id,
                model,
                at,
            } => {
                let p = partials.entry(execution_id).or_default();
                p.start = Some(at);
                p.test_id = test_id;
                p.model = model;
            }
            PerfEvent::FirstToken { execution_id, at } => {
                let p = partials.entry(execution_id).or_default();
                if p.first_token.is_none() {
                    p.first_token = Some(at);
                }
            }
            PerfEvent::ToolStart {
                execution_id,
                tool,
                at,
            } => {
                partials
                    .entry(execution_id)
                    .or_default()
                    .tool_spans
                    .push(ToolSpan {
                        name: tool,
                        start: at,
                        end: None,
                        success: false,
                        error: None,
                    });
            }
            PerfEvent::ToolEnd {
                execution_id,
                tool,
                at,
                success,
                error,
            } => {
                let p = partials.entry(execution_id.clone()).or_default();
                match p
                    .tool_spans
                    .iter_mut()
                    .find(|s| s.name == tool && s.end.is_none())
                {
                    Some(span) => {
                        span.end = Some(at);
                        span.success = success;
                        span.error = error;
                    }
                    None => tracing::debug!(
                        execution_id = %execution_id,
                        tool = %tool,
                        "tool end without matching start ignored"
                    ),
                }
            }
            PerfEvent::End {
                execution_id,
                at,
                input_tokens,
                output_tokens,
                error,
            } => {
                let p = partials.entry(execution_id).or_default();
                p.end = Some(at);
                p.input_tokens += input_tokens;
                p.output_tokens += output_tokens;
                if error.is_some() {
                    p.error = error;
                }
            }
        }
    }

    for (execution_id, p) in partials {
        let Some(start) = p.start else {
            tracing::debug!(execution_id = %execution_id, "events without a start event ignored");
            continue;
        };
        complete.entry(execution_id.clone()).or_insert(PerformanceSample {
            test_id: p.test_id.unwrap_or(execution_id),
            model: p.model,
            start,
            first_token: p.first_token,
            end: p.end,
            input_tokens: p.input_tokens,
            output_tokens: p.output_tokens,
            tool_spans: p.tool_spans,
            error: p.error,
        });
    }
    complete
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t(ms: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + Duration::milliseconds(ms)
    }

    #[test]
    fn events_fold_into_samples() {
        let c = PerformanceMetricsCollector::default();
        c.start("e1", "case-1", Some("m"), t(0));
        c.first_token("e1", t(40));
        c.tool_start("e1", "search", t(50));
        c.tool_end("e1", "search", t(80), true, None);
        c.end("e1", t(120), 10, 5, None);

        let samples = c.samples();
        let s = &samples["e1"];
        assert_eq!(s.test_id, "case-1");
        assert_eq!(s.latency_ms(), Some(120.0));
        assert_eq!(s.ttft_ms(), Some(40.0));
        assert_eq!(s.tool_spans[0].duration_ms(), Some(30.0));
        assert!(s.tool_spans[0].success);
    }

    #[test]
    fn repeated_tool_calls_pair_in_order() {
        let c = PerformanceMetricsCollector::default();
        c.start("e1", "case-1", None, t(0));
        c.tool_start("e1", "db", t(10));
        c.tool_start("e1", "db", t(20));
        c.tool_end("e1", "db", t(30), true, None);
        c.tool_end("e1", "db", t(60), false, Some("deadlock"));
        let s = &c.samples()["e1"];
        assert_eq!(s.tool_spans[0].duration_ms(), Some(20.0));
        assert_eq!(s.tool_spans[1].duration_ms(), Some(40.0));
        assert_eq!(s.tool_spans[1].error.as_deref(), Some("deadlock"));
    }

    #[test]
    fn orphan_events_are_dropped() {
        let c = PerformanceMetricsCollector::default();
        c.end("ghost", t(10), 1, 1, None);
        assert!(c.samples().is_empty());
    }

    #[test]
    fn reset_clears_state() {
        let c = PerformanceMetricsCollector::default();
        c.start("e1", "case-1", None, t(0));
        c.reset();
        assert!(c.samples().is_empty());
        assert_eq!(c.report().executions, 0);
    }

    #[test]
    fn tool_end_success_defaults_to_true() {
        let line = r#"{"event":"tool_end","execution_id":"e1","tool":"db","at":"2024-05-01T12:00:00Z"}"#;
        let ev: PerfEvent = serde_json::from_str(line).unwrap();
        assert!(matches!(ev, PerfEvent::ToolEnd { success: true, .. }));
    }
}
