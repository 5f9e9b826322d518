use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;
use tribunal_core::config::UnitPrice;
use tribunal_metrics::perf::{ErrorKind, PerformanceMetricsCollector, PerformanceSample, PriceTable, ToolSpan};

fn t(ms: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + Duration::milliseconds(ms)
}

#[test]
fn latency_percentiles_are_exact() {
    let c = PerformanceMetricsCollector::default();
    for (i, latency) in [300, 100, 500, 200, 400].into_iter().enumerate() {
        let id = format!("e{}", i);
        let start = i as i64 * 1000;
        c.start(&id, &id, None, t(start));
        c.end(&id, t(start + latency), 0, 0, None);
    }
    let report = c.report();
    assert_eq!(report.completed, 5);
    assert_eq!(report.latency_ms.p50, 300.0);
    assert_eq!(report.latency_ms.p95, 480.0);
    assert_eq!(report.latency_ms.p99, 496.0);
}

#[test]
fn tokens_cost_and_throughput() {
    let prices = PriceTable::new().with_model(
        "small",
        UnitPrice {
            input: 0.001,
            output: 0.002,
        },
    );
    let c = PerformanceMetricsCollector::new(prices);
    c.start("a", "case-a", Some("small"), t(0));
    c.first_token("a", t(100));
    c.end("a", t(1000), 100, 50, None);
    // idle gap between executions does not count
    c.start("b", "case-b", Some("mystery"), t(500));
    c.first_token("b", t(700));
    c.end("b", t(2000), 200, 100, Some("upstream timeout"));

    let r = c.report();
    assert_eq!(r.tokens.input, 300);
    assert_eq!(r.tokens.output, 150);
    assert_eq!(r.tokens.total, 450);
    assert!((r.cost.total - 0.2).abs() < 1e-12);
    assert_eq!(r.cost.unpriced_models, vec!["mystery".to_string()]);
    assert_eq!(r.throughput.window_ms, 2000.0);
    assert_eq!(r.throughput.requests_per_sec, 1.0);
    assert_eq!(r.throughput.tokens_per_sec, 225.0);
    assert_eq!(r.ttft_ms.p50, 150.0);
    assert_eq!(r.errors.get(&ErrorKind::Timeout), Some(&1));
}

#[test]
fn in_flight_executions_count_tool_calls_but_not_latency() {
    let c = PerformanceMetricsCollector::default();
    c.start("done", "x", None, t(0));
    c.tool_start("done", "search", t(10));
    c.tool_end("done", "search", t(30), true, None);
    c.end("done", t(100), 1, 1, None);

    c.start("running", "y", None, t(50));
    c.tool_start("running", "search", t(60));

    let r = c.report();
    assert_eq!(r.executions, 2);
    assert_eq!(r.completed, 1);
    assert_eq!(r.in_flight, 1);
    assert_eq!(r.latency_ms.p99, 100.0);
    let search = r.tools["search"];
    assert_eq!(search.calls, 2);
    assert_eq!(search.successes, 1);
    assert_eq!(search.success_rate, 1.0);
    assert_eq!(search.avg_time_ms, 20.0);
    assert_eq!(r.throughput.window_ms, 100.0);
}

#[test]
fn recorded_samples_join_event_built_ones() {
    let c = PerformanceMetricsCollector::default();
    c.record_sample(
        "s1",
        PerformanceSample {
            test_id: "imported".into(),
            model: None,
            start: t(0),
            first_token: None,
            end: Some(t(250)),
            input_tokens: 5,
            output_tokens: 5,
            tool_spans: vec![ToolSpan {
                name: "crm".into(),
                start: t(10),
                end: Some(t(60)),
                success: false,
                error: Some("tool crm returned 500".into()),
            }],
            error: Some("tool crm failed".into()),
        },
    );
    let r = c.report();
    assert_eq!(r.completed, 1);
    assert_eq!(r.tools["crm"].failures, 1);
    assert_eq!(r.tools["crm"].success_rate, 0.0);
    assert_eq!(r.errors.get(&ErrorKind::Tool), Some(&1));
}

#[test]
fn separate_collectors_do_not_share_state() {
    let a = PerformanceMetricsCollector::default();
    let b = PerformanceMetricsCollector::default();
    a.start("e", "e", None, t(0));
    a.end("e", t(10), 0, 0, None);
    assert_eq!(a.report().completed, 1);
    assert_eq!(b.report().executions, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_recording_with_reports() {
    let c = Arc::new(PerformanceMetricsCollector::default());
    let mut handles = Vec::new();
    for w in 0..4 {
        let c = c.clone();
        handles.push(tokio::spawn(async move {
            for i in 0..50 {
                let id = format!("w{}-{}", w, i);
                c.start(&id, &id, None, t(i));
                c.end(&id, t(i + 10), 1, 1, None);
                let _ = c.report();
            }
        }));
    }
    for h in handles {
        h.await.unwrap();
    }
    let r = c.report();
    assert_eq!(r.completed, 200);
    assert_eq!(r.in_flight, 0);
    assert_eq!(r.latency_ms.p50, 10.0);
}
