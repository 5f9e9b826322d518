use crate::aggregate::SessionAggregator;
use crate::judge::TraceEvaluator;
use crate::model::{InteractionTrace, Metadata, SessionAggregation, TraceEvaluation};
use crate::storage::Store;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReport {
    pub aggregation: SessionAggregation,
    pub evaluations: Vec<TraceEvaluation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedTrace {
    pub trace_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineOutput {
    pub oracle: Option<String>,
    pub sessions: Vec<SessionReport>,
    pub skipped: Vec<SkippedTrace>,
    pub failed_sessions: BTreeMap<String, String>,
}

impl PipelineOutput {
    pub fn trace_count(&self) -> usize {
        self.sessions.iter().map(|s| s.evaluations.len()).sum()
    }

    pub fn fallback_count(&self) -> usize {
        self.sessions
            .iter()
            .map(|s| s.aggregation.fallback_count)
            .sum()
    }
}

/// Evaluates every trace, then aggregates each session once all of its
/// evaluations are in.
pub struct EvaluationPipeline {
    evaluator: TraceEvaluator,
    aggregator: Arc<SessionAggregator>,
    store: Option<Store>,
}

impl EvaluationPipeline {
    pub fn new(evaluator: TraceEvaluator, aggregator: Arc<SessionAggregator>) -> Self {
        Self {
            evaluator,
            aggregator,
            store: None,
        }
    }

    /// Trace evaluations are also written here (best effort).
    pub fn with_store(mut self, store: Store) -> Self {
        self.store = Some(store);
        self
    }

    pub async fn run(&self, traces: Vec<InteractionTrace>) -> PipelineOutput {
        let mut output = PipelineOutput {
            oracle: self.evaluator.oracle_identity(),
            ..Default::default()
        };

        let mut valid = Vec::with_capacity(traces.len());
        for trace in traces {
            match trace.validate() {
                Ok(()) => valid.push(trace),
                Err(e) => {
                    tracing::warn!(trace_id = %trace.id, error = %e, "skipping invalid trace");
                    output.skipped.push(SkippedTrace {
                        trace_id: trace.id.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let evaluations = self.evaluator.evaluate_all(&valid).await;

        if let Some(store) = &self.store {
            if let Err(e) = store.insert_evaluations(&evaluations) {
                tracing::warn!(error = %e, "failed to persist trace evaluations");
            }
        }

        let mut by_session: BTreeMap<String, Vec<TraceEvaluation>> = BTreeMap::new();
        let mut session_traces: BTreeMap<String, Vec<&InteractionTrace>> = BTreeMap::new();
        for (evaluation, trace) in evaluations.into_iter().zip(&valid) {
            by_session
                .entry(evaluation.session_id.clone())
                .or_default()
                .push(evaluation);
            session_traces
                .entry(trace.session_id.clone())
                .or_default()
                .push(trace);
        }

        for (session_id, mut evals) in by_session {
            evals.sort_by(|a, b| a.trace_id.cmp(&b.trace_id));
            let metadata = session_metadata(session_traces.get(&session_id).map(Vec::as_slice));
            match self
                .aggregator
                .aggregate_with_metadata(&session_id, &evals, &metadata)
                .await
            {
                Ok(aggregation) => output.sessions.push(SessionReport {
                    aggregation,
                    evaluations: evals,
                }),
                Err(e) => {
                    tracing::error!(session_id = %session_id, error = %e, "session aggregation failed");
                    output.failed_sessions.insert(session_id, e.to_string());
                }
            }
        }

        output
    }
}

/// Union of the session's trace metadata; earlier traces win on key conflicts.
fn session_metadata(traces: Option<&[&InteractionTrace]>) -> Metadata {
    let mut ordered: Vec<&InteractionTrace> = traces.unwrap_or(&[]).to_vec();
    ordered.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
    let mut merged = Metadata::new();
    for trace in ordered {
        for (k, v) in &trace.metadata {
            merged.entry(k.clone()).or_insert_with(|| v.clone());
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trace(id: &str, ts: &str, meta: serde_json::Value) -> InteractionTrace {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "sessionId": "s1",
            "timestamp": ts,
            "input": "x",
            "output": "y",
            "metadata": meta
        }))
        .unwrap()
    }

    #[test]
    fn earliest_trace_metadata_wins() {
        let late = trace("b", "2024-05-01T10:05:00Z", serde_json::json!({"channel": "sms"}));
        let early = trace(
            "a",
            "2024-05-01T10:00:00Z",
            serde_json::json!({"channel": "web", "locale": "en"}),
        );
        let merged = session_metadata(Some(&[&late, &early]));
        assert_eq!(merged["channel"], "web");
        assert_eq!(merged["locale"], "en");
    }
}
