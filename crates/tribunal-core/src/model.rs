use crate::errors::TraceError;
use crate::rubric::Category;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// One tool invocation made by the agent while producing a turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallRecord {
    #[serde(alias = "tool_name", alias = "tool")]
    pub name: String,
    #[serde(default)]
    pub args: serde_json::Value,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default = "default_true")]
    pub success: bool,
}

fn default_true() -> bool {
    true
}

/// A completed interaction turn as recorded by the agent layer. Immutable once recorded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InteractionTrace {
    pub id: String,
    #[serde(alias = "session_id")]
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub input: String,
    pub output: String,
    #[serde(default, alias = "tool_calls")]
    pub tool_calls: Vec<ToolCallRecord>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl InteractionTrace {
    pub fn validate(&self) -> Result<(), TraceError> {
        if self.id.trim().is_empty() {
            return Err(TraceError::MissingField {
                trace_id: self.id.clone(),
                field: "id",
            });
        }
        if self.session_id.trim().is_empty() {
            return Err(TraceError::MissingField {
                trace_id: self.id.clone(),
                field: "sessionId",
            });
        }
        if self.input.trim().is_empty() {
            return Err(TraceError::MissingField {
                trace_id: self.id.clone(),
                field: "input",
            });
        }
        if self.output.trim().is_empty() {
            return Err(TraceError::MissingField {
                trace_id: self.id.clone(),
                field: "output",
            });
        }
        Ok(())
    }
}

/// Scores for the five rubric categories, each in `[1, 5]`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CategoryScores {
    pub tool_correctness: f64,
    pub task_completion: f64,
    pub communication: f64,
    pub safety: f64,
    pub retrieval_fit: f64,
}

impl CategoryScores {
    pub const MIN: f64 = 1.0;
    pub const MAX: f64 = 5.0;

    pub fn uniform(score: f64) -> Self {
        Self {
            tool_correctness: score,
            task_completion: score,
            communication: score,
            safety: score,
            retrieval_fit: score,
        }
    }

    pub fn get(&self, category: Category) -> f64 {
        match category {
            Category::ToolCorrectness => self.tool_correctness,
            Category::TaskCompletion => self.task_completion,
            Category::Communication => self.communication,
            Category::Safety => self.safety,
            Category::RetrievalFit => self.retrieval_fit,
        }
    }

    pub fn set(&mut self, category: Category, score: f64) {
        let slot = match category {
            Category::ToolCorrectness => &mut self.tool_correctness,
            Category::TaskCompletion => &mut self.task_completion,
            Category::Communication => &mut self.communication,
            Category::Safety => &mut self.safety,
            Category::RetrievalFit => &mut self.retrieval_fit,
        };
        *slot = score;
    }

    /// Clamps every score into `[1, 5]`. NaN maps to the minimum.
    pub fn clamped(mut self) -> Self {
        for category in Category::ALL {
            self.set(category, clamp_score(self.get(category)));
        }
        self
    }

    /// Fixed-weight blend rounded to two decimals.
    pub fn weighted(&self) -> f64 {
        let raw: f64 = Category::ALL
            .iter()
            .map(|c| c.weight() * self.get(*c))
            .sum();
        round2(raw)
    }
}

pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        return CategoryScores::MIN;
    }
    score.clamp(CategoryScores::MIN, CategoryScores::MAX)
}

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EvaluatorMeta {
    /// Identity of the oracle that produced the scores, e.g. `openai:gpt-4o-mini` or `rule-based`.
    pub oracle: String,
    pub confidence: f64,
    pub fallback: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_categories: Vec<Category>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TraceEvaluation {
    pub trace_id: String,
    pub session_id: String,
    /// Timestamp of the evaluated trace, so an evaluation is a pure function of its inputs.
    pub timestamp: DateTime<Utc>,
    pub scores: CategoryScores,
    pub weighted_score: f64,
    pub rationale: String,
    #[serde(default)]
    pub violations: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    pub evaluator: EvaluatorMeta,
}

/// Coefficient of variation per category across one session's traces.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DispersionMetrics {
    pub tool_correctness: f64,
    pub task_completion: f64,
    pub communication: f64,
    pub safety: f64,
    pub retrieval_fit: f64,
}

impl DispersionMetrics {
    pub fn get(&self, category: Category) -> f64 {
        match category {
            Category::ToolCorrectness => self.tool_correctness,
            Category::TaskCompletion => self.task_completion,
            Category::Communication => self.communication,
            Category::Safety => self.safety,
            Category::RetrievalFit => self.retrieval_fit,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionAggregation {
    pub session_id: String,
    pub trace_count: usize,
    pub average_scores: CategoryScores,
    pub weighted_session_score: f64,
    pub dispersion: DispersionMetrics,
    pub session_duration_ms: i64,
    pub session_start: DateTime<Utc>,
    /// Digest of the inputs only; equal across runs over the same trace set.
    pub input_fingerprint: String,
    /// Digest of the inputs plus `evaluated_at`; identifies one aggregation run.
    pub reproducibility_hash: String,
    pub evaluated_at: DateTime<Utc>,
    #[serde(default)]
    pub fallback_count: usize,
}
