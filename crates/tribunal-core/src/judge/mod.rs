//! Judging oracle seam and the trace evaluator built on it.
//!
//! - prompt.rs: judging request text only
//! - parse.rs: reply parsing (structured first, free text second)
//! - fallback.rs: deterministic rule-based scoring, no I/O
//! - evaluator.rs: orchestration, timeout, concurrency limit

pub mod evaluator;
pub mod fallback;
pub mod parse;
pub mod prompt;

pub use evaluator::{TraceEvaluator, TraceEvaluatorConfig};
pub use fallback::RuleBasedEvaluator;
pub use parse::{JudgeReply, ParsedScores};

use crate::errors::OracleError;
use crate::model::InteractionTrace;
use crate::providers::llm::LlmClient;
use crate::rubric::Category;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Everything an oracle needs to rate one trace.
#[derive(Debug, Clone)]
pub struct JudgeRequest<'a> {
    pub trace: &'a InteractionTrace,
    pub rubric: String,
    pub weights: [(Category, f64); 5],
    pub prompt: String,
    pub system: String,
}

impl<'a> JudgeRequest<'a> {
    pub fn for_trace(trace: &'a InteractionTrace) -> Self {
        Self {
            trace,
            rubric: crate::rubric::render_rubric(),
            weights: Category::ALL.map(|c| (c, c.weight())),
            prompt: prompt::build_prompt(trace),
            system: prompt::SYSTEM_PROMPT.to_string(),
        }
    }
}

/// External scorer: an LLM, a scripted test oracle, or replayed human ratings.
#[async_trait]
pub trait JudgeOracle: Send + Sync {
    /// Recorded in `EvaluatorMeta::oracle`.
    fn identity(&self) -> String;

    /// Returns the raw reply text; parsing happens in the evaluator.
    async fn judge(&self, request: &JudgeRequest<'_>) -> Result<String, OracleError>;
}

/// Adapts any [`LlmClient`] into a judging oracle.
pub struct LlmJudge {
    client: Arc<dyn LlmClient>,
}

impl LlmJudge {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl JudgeOracle for LlmJudge {
    fn identity(&self) -> String {
        format!(
            "{}:{}",
            self.client.provider_name(),
            self.client.model_name()
        )
    }

    async fn judge(&self, request: &JudgeRequest<'_>) -> Result<String, OracleError> {
        let system = [request.system.clone()];
        let resp = self
            .client
            .complete(&request.prompt, Some(&system))
            .await
            .map_err(|e| OracleError::Unavailable(format!("{:#}", e)))?;
        Ok(resp.text)
    }
}

/// Replays canned replies keyed by trace id.
#[derive(Debug, Clone, Default)]
pub struct ScriptedOracle {
    name: String,
    replies: HashMap<String, String>,
    default_reply: Option<String>,
}

impl ScriptedOracle {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_reply(mut self, trace_id: impl Into<String>, reply: impl Into<String>) -> Self {
        self.replies.insert(trace_id.into(), reply.into());
        self
    }

    pub fn with_default(mut self, reply: impl Into<String>) -> Self {
        self.default_reply = Some(reply.into());
        self
    }

    /// Loads a JSON object mapping trace id to reply. Non-string replies are re-serialized.
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read judge replies {}", path.display()))?;
        let map: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(&raw).context("judge replies must be a JSON object")?;
        let mut oracle = Self::new(format!("scripted:{}", path.display()));
        for (trace_id, reply) in map {
            let text = match reply {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            oracle.replies.insert(trace_id, text);
        }
        Ok(oracle)
    }
}

#[async_trait]
impl JudgeOracle for ScriptedOracle {
    fn identity(&self) -> String {
        if self.name.is_empty() {
            "scripted".to_string()
        } else {
            self.name.clone()
        }
    }

    async fn judge(&self, request: &JudgeRequest<'_>) -> Result<String, OracleError> {
        self.replies
            .get(&request.trace.id)
            .or(self.default_reply.as_ref())
            .cloned()
            .ok_or_else(|| {
                OracleError::Unavailable(format!("no scripted reply for trace '{}'", request.trace.id))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::llm::fake::FakeClient;

    fn trace() -> InteractionTrace {
        serde_json::from_value(serde_json::json!({
            "id": "t1",
            "sessionId": "s1",
            "timestamp": "2024-05-01T10:00:00Z",
            "input": "where is my order?",
            "output": "It ships tomorrow."
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn llm_judge_forwards_reply_text() {
        let client = Arc::new(FakeClient::new("judge-1".into()).with_response("{}".into()));
        let judge = LlmJudge::new(client);
        assert_eq!(judge.identity(), "fake:judge-1");
        let t = trace();
        let reply = judge.judge(&JudgeRequest::for_trace(&t)).await.unwrap();
        assert_eq!(reply, "{}");
    }

    #[tokio::test]
    async fn scripted_oracle_prefers_trace_reply_over_default() {
        let oracle = ScriptedOracle::new("script")
            .with_reply("t1", "specific")
            .with_default("generic");
        let t = trace();
        let reply = oracle.judge(&JudgeRequest::for_trace(&t)).await.unwrap();
        assert_eq!(reply, "specific");

        let empty = ScriptedOracle::new("script");
        let err = empty.judge(&JudgeRequest::for_trace(&t)).await.unwrap_err();
        assert_eq!(err.reason(), "oracle_unavailable");
    }

    #[test]
    fn scripted_oracle_loads_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("replies.json");
        std::fs::write(
            &path,
            r#"{"t1": "safety: 2", "t2": {"tool_correctness": 4}}"#,
        )
        .unwrap();
        let oracle = ScriptedOracle::from_json_file(&path).unwrap();
        assert_eq!(oracle.replies["t1"], "safety: 2");
        assert!(oracle.replies["t2"].contains("tool_correctness"));
    }
}
