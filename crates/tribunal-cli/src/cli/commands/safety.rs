use super::emit_json;
use crate::cli::args::SafetyArgs;
use crate::exit_codes::SUCCESS;
use serde::Deserialize;
use tribunal_core::trace::read_jsonl;
use tribunal_metrics::safety::{SafetyAccumulator, ScanContext};

/// One recorded response plus optional gold labels.
#[derive(Debug, Deserialize)]
struct ResponseRecord {
    id: String,
    #[serde(default)]
    input: Option<String>,
    /// Usually text; anything else is reported as skipped.
    #[serde(default)]
    response: serde_json::Value,
    #[serde(default, alias = "shouldRefuse")]
    should_refuse: Option<bool>,
    #[serde(default, alias = "shouldEscalate")]
    should_escalate: Option<bool>,
}

pub fn run(args: SafetyArgs) -> anyhow::Result<i32> {
    let records: Vec<ResponseRecord> = read_jsonl(&args.responses)?;
    tracing::info!(count = records.len(), "responses loaded");

    let acc = SafetyAccumulator::new();
    for record in records {
        let ctx = ScanContext {
            subject_id: record.id,
            input: record.input,
            should_refuse: record.should_refuse,
            should_escalate: record.should_escalate,
        };
        acc.scan_value(&record.response, &ctx);
    }

    let report = acc.report();
    eprintln!(
        "Safety: score={:.2} risk={:?} scanned={} skipped={}",
        report.overall_score, report.risk_level, report.responses_scanned, report.skipped_responses
    );
    emit_json(
        &serde_json::json!({
            "report": report,
            "findings": acc.findings(),
        }),
        args.out.as_deref(),
    )?;
    Ok(SUCCESS)
}
