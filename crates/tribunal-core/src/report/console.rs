use crate::model::SessionAggregation;
use crate::pipeline::PipelineOutput;
use crate::rubric::Category;

/// One line per session. Deterministic, unit-testable.
#[must_use]
pub fn format_session_line(agg: &SessionAggregation) -> String {
    let fallback = if agg.fallback_count > 0 {
        format!("  ({} fallback)", agg.fallback_count)
    } else {
        String::new()
    };
    format!(
        "{:<24} traces={:<3} score={:.2}  duration={:.1}s{}",
        agg.session_id,
        agg.trace_count,
        agg.weighted_session_score,
        agg.session_duration_ms as f64 / 1000.0,
        fallback
    )
}

pub fn print_summary(output: &PipelineOutput, verbose: bool) {
    eprintln!();
    if let Some(oracle) = &output.oracle {
        eprintln!("Oracle: {}", oracle);
    } else {
        eprintln!("Oracle: none (rule-based scoring only)");
    }

    for session in &output.sessions {
        let agg = &session.aggregation;
        eprintln!("{}", format_session_line(agg));
        if verbose {
            for category in Category::ALL {
                eprintln!(
                    "    {:<18} avg={:.2} cv={:.3}",
                    category.key(),
                    agg.average_scores.get(category),
                    agg.dispersion.get(category)
                );
            }
            eprintln!("    fingerprint: {}", agg.input_fingerprint);
        }
    }

    for skipped in &output.skipped {
        eprintln!("⏭️  {:<20} SKIPPED ({})", skipped.trace_id, skipped.reason);
    }
    for (session_id, err) in &output.failed_sessions {
        eprintln!("❌ {:<20} FAILED ({})", session_id, err);
    }

    eprintln!();
    eprintln!(
        "Summary: {} sessions, {} traces, {} fallback, {} skipped, {} failed",
        output.sessions.len(),
        output.trace_count(),
        output.fallback_count(),
        output.skipped.len(),
        output.failed_sessions.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CategoryScores, DispersionMetrics};
    use chrono::{TimeZone, Utc};

    #[test]
    fn session_line_mentions_fallbacks_only_when_present() {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let mut agg = SessionAggregation {
            session_id: "sess-1".into(),
            trace_count: 3,
            average_scores: CategoryScores::uniform(4.0),
            weighted_session_score: 4.0,
            dispersion: DispersionMetrics::default(),
            session_duration_ms: 2500,
            session_start: start,
            input_fingerprint: "f".into(),
            reproducibility_hash: "h".into(),
            evaluated_at: start,
            fallback_count: 0,
        };
        let line = format_session_line(&agg);
        assert!(line.contains("score=4.00"));
        assert!(line.contains("duration=2.5s"));
        assert!(!line.contains("fallback"));

        agg.fallback_count = 2;
        assert!(format_session_line(&agg).ends_with("(2 fallback)"));
    }
}
