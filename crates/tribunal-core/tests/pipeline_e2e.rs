use async_trait::async_trait;
use std::io::Write;
use std::sync::Arc;
use tribunal_core::aggregate::SessionAggregator;
use tribunal_core::judge::{LlmJudge, RuleBasedEvaluator, ScriptedOracle, TraceEvaluator, TraceEvaluatorConfig};
use tribunal_core::pipeline::EvaluationPipeline;
use tribunal_core::providers::llm::{LlmClient, LlmResponse};
use tribunal_core::storage::Store;
use tribunal_core::trace::read_traces;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("tribunal_core=debug"))
        .with_test_writer()
        .try_init();
}

const TRACES: &str = r#"{"id":"t1","sessionId":"s1","timestamp":"2024-05-01T10:00:00Z","input":"Where is order 17?","output":"Order 17 ships tomorrow morning.","toolCalls":[{"name":"order_lookup","args":{"id":17},"result":{"eta":"tomorrow"}}]}
{"id":"t2","sessionId":"s1","timestamp":"2024-05-01T10:00:30Z","input":"Can you expedite?","output":"I have requested expedited shipping.","toolCalls":[{"name":"expedite","args":{"id":17},"success":false}]}
{"id":"t3","sessionId":"s1","timestamp":"2024-05-01T10:01:30Z","input":"Thanks","output":"You are welcome, anything else?"}

{"id":"u1","sessionId":"s2","timestamp":"2024-05-01T11:00:00Z","input":"Reset my password","output":"Sorry, I cannot do that here."}
{"id":"bad","sessionId":"","timestamp":"2024-05-01T11:00:00Z","input":"x","output":"y"}
"#;

fn write_traces(dir: &tempfile::TempDir) -> std::path::PathBuf {
    let path = dir.path().join("traces.jsonl");
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(TRACES.as_bytes()).unwrap();
    path
}

fn config() -> TraceEvaluatorConfig {
    TraceEvaluatorConfig {
        timeout: std::time::Duration::from_millis(500),
        concurrency: 2,
    }
}

#[tokio::test]
async fn scripted_pipeline_scores_and_persists_sessions() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let traces = read_traces(&write_traces(&dir)).unwrap();
    assert_eq!(traces.len(), 5);

    let perfect = r#"{"tool_correctness":5,"task_completion":5,"communication":5,"safety":5,"retrieval_fit":5}"#;
    let oracle = ScriptedOracle::new("scripted")
        .with_reply("t1", perfect)
        .with_reply(
            "t2",
            r#"{"tool_correctness":3,"task_completion":4,"communication":5,"safety":5,"retrieval_fit":4}"#,
        )
        .with_reply("t3", perfect)
        .with_reply("u1", "I would rather not say.");

    let store = Store::open(&dir.path().join("eval.db")).unwrap();
    store.init_schema().unwrap();

    let evaluator = TraceEvaluator::new(Some(Arc::new(oracle)), config());
    let aggregator = Arc::new(SessionAggregator::new().with_sink(Arc::new(store.clone())));
    let pipeline = EvaluationPipeline::new(evaluator, aggregator).with_store(store.clone());

    let out = pipeline.run(traces).await;

    assert_eq!(out.oracle.as_deref(), Some("scripted"));
    assert_eq!(out.skipped.len(), 1);
    assert_eq!(out.skipped[0].trace_id, "bad");
    assert!(out.failed_sessions.is_empty());

    let ids: Vec<_> = out
        .sessions
        .iter()
        .map(|s| s.aggregation.session_id.as_str())
        .collect();
    assert_eq!(ids, ["s1", "s2"]);

    let s1 = &out.sessions[0];
    assert_eq!(s1.aggregation.weighted_session_score, 4.62);
    assert_eq!(s1.aggregation.session_duration_ms, 90_000);
    assert_eq!(s1.aggregation.fallback_count, 0);

    // u1's reply carries no scores: rule-based fallback
    let s2 = &out.sessions[1];
    assert_eq!(s2.aggregation.fallback_count, 1);
    assert_eq!(
        s2.evaluations[0].evaluator.fallback_reason.as_deref(),
        Some("unparseable_reply")
    );

    assert_eq!(store.fetch_evaluations("s1").unwrap().len(), 3);
    assert!(store.fetch_aggregation("s2").unwrap().is_some());
}

struct DownClient;

#[async_trait]
impl LlmClient for DownClient {
    async fn complete(
        &self,
        _prompt: &str,
        _system: Option<&[String]>,
    ) -> anyhow::Result<LlmResponse> {
        anyhow::bail!("connection refused")
    }

    fn provider_name(&self) -> &'static str {
        "down"
    }

    fn model_name(&self) -> &str {
        "none"
    }
}

#[tokio::test]
async fn unavailable_llm_falls_back_deterministically() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let traces = read_traces(&write_traces(&dir)).unwrap();
    let valid: Vec<_> = traces.into_iter().filter(|t| t.id != "bad").collect();

    let evaluator = TraceEvaluator::new(Some(Arc::new(LlmJudge::new(Arc::new(DownClient)))), config());
    let first = evaluator.evaluate_all(&valid).await;
    let second = evaluator.evaluate_all(&valid).await;

    assert_eq!(first, second);
    let rules = RuleBasedEvaluator::new();
    for (evaluation, trace) in first.iter().zip(&valid) {
        assert!(evaluation.evaluator.fallback);
        assert_eq!(evaluation.evaluator.oracle, "rule-based");
        assert_eq!(evaluation.evaluator.confidence, 0.3);
        assert_eq!(
            evaluation.evaluator.fallback_reason.as_deref(),
            Some("oracle_unavailable")
        );
        assert_eq!(evaluation.scores, rules.evaluate(trace).scores);
    }

    // t2 had a failed tool call
    assert!(first[1].scores.tool_correctness < first[0].scores.tool_correctness);
}

#[tokio::test]
async fn offline_pipeline_aggregates_every_session() {
    let dir = tempfile::tempdir().unwrap();
    let traces = read_traces(&write_traces(&dir)).unwrap();
    let pipeline = EvaluationPipeline::new(
        TraceEvaluator::offline(),
        Arc::new(SessionAggregator::new()),
    );
    let out = pipeline.run(traces).await;
    assert!(out.oracle.is_none());
    assert_eq!(out.trace_count(), 4);
    assert_eq!(out.fallback_count(), 4);
}

#[tokio::test]
async fn rerun_with_new_trace_refreshes_stored_aggregation() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let traces: Vec<_> = read_traces(&write_traces(&dir))
        .unwrap()
        .into_iter()
        .filter(|t| t.session_id == "s1")
        .collect();
    let store = Store::open(&dir.path().join("eval.db")).unwrap();
    store.init_schema().unwrap();

    let run = |batch: Vec<tribunal_core::model::InteractionTrace>| {
        let store = store.clone();
        async move {
            let aggregator =
                Arc::new(SessionAggregator::new().with_sink(Arc::new(store.clone())));
            EvaluationPipeline::new(TraceEvaluator::offline(), aggregator)
                .with_store(store)
                .run(batch)
                .await
        }
    };

    let first = run(traces[..2].to_vec()).await;
    assert_eq!(first.sessions[0].aggregation.trace_count, 2);

    let second = run(traces.clone()).await;
    let s1 = &second.sessions[0];
    assert_eq!(s1.evaluations.len(), 3);
    assert_eq!(s1.aggregation.trace_count, 3);
    assert_ne!(
        s1.aggregation.input_fingerprint,
        first.sessions[0].aggregation.input_fingerprint
    );
    assert_eq!(
        store.fetch_aggregation("s1").unwrap().map(|a| a.trace_count),
        Some(3)
    );
}
