use super::{emit_json, load_optional_config};
use crate::cli::args::PerfArgs;
use crate::exit_codes::SUCCESS;
use tribunal_core::trace::read_jsonl;
use tribunal_metrics::perf::{PerfEvent, PerformanceMetricsCollector, PriceTable};

pub fn run(args: PerfArgs) -> anyhow::Result<i32> {
    let cfg = load_optional_config(args.config.as_deref())?;
    let events: Vec<PerfEvent> = read_jsonl(&args.events)?;
    tracing::info!(count = events.len(), "performance events loaded");

    let collector = PerformanceMetricsCollector::new(PriceTable::from_settings(&cfg.pricing));
    for event in events {
        collector.record(event);
    }

    let report = collector.report();
    eprintln!(
        "Performance: executions={} completed={} p50={:.1}ms p95={:.1}ms p99={:.1}ms cost={:.4}",
        report.executions,
        report.completed,
        report.latency_ms.p50,
        report.latency_ms.p95,
        report.latency_ms.p99,
        report.cost.total
    );
    emit_json(&report, args.out.as_deref())?;
    Ok(SUCCESS)
}
