use super::collector::{millis_between, PerformanceSample};
use super::percentile::{percentile, sorted};
use super::pricing::PriceTable;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Timeout,
    Network,
    Tool,
    Other,
}

impl ErrorKind {
    /// Substring bucketing for reporting only.
    pub fn classify(message: &str) -> Self {
        let m = message.to_ascii_lowercase();
        if m.contains("timeout") || m.contains("timed out") || m.contains("deadline") {
            ErrorKind::Timeout
        } else if ["network", "connection", "connect", "dns", "unreachable", "refused", "reset by peer"]
            .iter()
            .any(|k| m.contains(k))
        {
            ErrorKind::Network
        } else if m.contains("tool") {
            ErrorKind::Tool
        } else {
            ErrorKind::Other
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Percentiles {
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

impl Percentiles {
    fn of(values: &[f64]) -> Self {
        let v = sorted(values);
        Self {
            p50: percentile(&v, 50),
            p95: percentile(&v, 95),
            p99: percentile(&v, 99),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TokenTotals {
    pub input: u64,
    pub output: u64,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CostSummary {
    pub total: f64,
    pub by_model: BTreeMap<String, f64>,
    /// Models with no configured price; costed at 0.
    pub unpriced_models: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Throughput {
    pub requests_per_sec: f64,
    pub tokens_per_sec: f64,
    /// Earliest start to latest end over completed executions.
    pub window_ms: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ToolStats {
    /// Includes spans still open at report time.
    pub calls: usize,
    pub successes: usize,
    pub failures: usize,
    /// Successes over finished spans.
    pub success_rate: f64,
    /// Mean over spans with both start and end.
    pub avg_time_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PerformanceReport {
    pub executions: usize,
    pub completed: usize,
    pub in_flight: usize,
    pub latency_ms: Percentiles,
    pub ttft_ms: Percentiles,
    pub tokens: TokenTotals,
    pub cost: CostSummary,
    pub throughput: Throughput,
    pub errors: BTreeMap<ErrorKind, usize>,
    pub tools: BTreeMap<String, ToolStats>,
}

impl PerformanceReport {
    pub fn compute<'a>(
        samples: impl IntoIterator<Item = &'a PerformanceSample>,
        prices: &PriceTable,
    ) -> Self {
        let mut report = PerformanceReport::default();
        let mut latencies = Vec::new();
        let mut ttfts = Vec::new();
        let mut window: Option<(chrono::DateTime<chrono::Utc>, chrono::DateTime<chrono::Utc>)> =
            None;
        let mut completed_tokens = 0u64;
        let mut unpriced = BTreeSet::new();
        let mut tool_times: BTreeMap<String, Vec<f64>> = BTreeMap::new();

        for sample in samples {
            report.executions += 1;

            report.tokens.input += sample.input_tokens;
            report.tokens.output += sample.output_tokens;

            let model = sample.model.as_deref();
            match prices.price_for(model) {
                Some(price) => {
                    let cost = PriceTable::cost(price, sample.input_tokens, sample.output_tokens);
                    report.cost.total += cost;
                    *report
                        .cost
                        .by_model
                        .entry(model.unwrap_or("default").to_string())
                        .or_default() += cost;
                }
                None => {
                    if sample.input_tokens + sample.output_tokens > 0 {
                        unpriced.insert(model.unwrap_or("unknown").to_string());
                    }
                }
            }

            for span in &sample.tool_spans {
                let stats = report.tools.entry(span.name.clone()).or_default();
                stats.calls += 1;
                if let Some(ms) = span.duration_ms() {
                    if span.success {
                        stats.successes += 1;
                    } else {
                        stats.failures += 1;
                    }
                    tool_times.entry(span.name.clone()).or_default().push(ms);
                }
            }

            if let Some(err) = &sample.error {
                *report.errors.entry(ErrorKind::classify(err)).or_default() += 1;
            }

            let Some(end) = sample.end else {
                report.in_flight += 1;
                continue;
            };
            report.completed += 1;
            latencies.push(millis_between(sample.start, end));
            if let Some(ttft) = sample.ttft_ms() {
                ttfts.push(ttft);
            }
            completed_tokens += sample.input_tokens + sample.output_tokens;
            window = Some(match window {
                None => (sample.start, end),
                Some((lo, hi)) => (lo.min(sample.start), hi.max(end)),
            });
        }

        report.tokens.total = report.tokens.input + report.tokens.output;
        report.latency_ms = Percentiles::of(&latencies);
        report.ttft_ms = Percentiles::of(&ttfts);

        for (name, stats) in report.tools.iter_mut() {
            let finished = stats.successes + stats.failures;
            if finished > 0 {
                stats.success_rate = stats.successes as f64 / finished as f64;
            }
            if let Some(times) = tool_times.get(name) {
                stats.avg_time_ms = times.iter().sum::<f64>() / times.len() as f64;
            }
        }

        if let Some((lo, hi)) = window {
            let window_ms = millis_between(lo, hi);
            report.throughput.window_ms = window_ms;
            if window_ms > 0.0 {
                let secs = window_ms / 1000.0;
                report.throughput.requests_per_sec = report.completed as f64 / secs;
                report.throughput.tokens_per_sec = completed_tokens as f64 / secs;
            }
        }

        if !unpriced.is_empty() {
            tracing::warn!(models = ?unpriced, "no unit price configured; costed at 0");
        }
        report.cost.unpriced_models = unpriced.into_iter().collect();
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_taxonomy() {
        assert_eq!(ErrorKind::classify("request timed out after 30s"), ErrorKind::Timeout);
        assert_eq!(ErrorKind::classify("Connection refused"), ErrorKind::Network);
        assert_eq!(ErrorKind::classify("tool 'search' failed"), ErrorKind::Tool);
        assert_eq!(ErrorKind::classify("bad json"), ErrorKind::Other);
    }

    #[test]
    fn empty_report_is_all_zero() {
        let report = PerformanceReport::compute(std::iter::empty(), &PriceTable::new());
        assert_eq!(report, PerformanceReport::default());
    }
}
