use super::fallback::RuleBasedEvaluator;
use super::parse::{JudgeReply, ParsedScores};
use super::{JudgeOracle, JudgeRequest};
use crate::errors::OracleError;
use crate::model::{round2, CategoryScores, EvaluatorMeta, InteractionTrace, TraceEvaluation};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{timeout, Duration};

/// Score assumed for a category the oracle did not rate.
pub const MISSING_CATEGORY_DEFAULT: f64 = 5.0;
const STRUCTURED_CONFIDENCE: f64 = 0.9;
const FREE_TEXT_CONFIDENCE: f64 = 0.6;
const MISSING_CATEGORY_PENALTY: f64 = 0.1;

#[derive(Debug, Clone)]
pub struct TraceEvaluatorConfig {
    pub timeout: Duration,
    /// Maximum oracle calls in flight across all callers of one evaluator.
    pub concurrency: usize,
}

impl Default for TraceEvaluatorConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            concurrency: 5,
        }
    }
}

/// Scores one trace against the rubric. Never fails: any oracle problem
/// routes the trace through the rule-based evaluator instead.
#[derive(Clone)]
pub struct TraceEvaluator {
    oracle: Option<Arc<dyn JudgeOracle>>,
    config: TraceEvaluatorConfig,
    limiter: Arc<Semaphore>,
    fallback: RuleBasedEvaluator,
}

impl TraceEvaluator {
    pub fn new(oracle: Option<Arc<dyn JudgeOracle>>, config: TraceEvaluatorConfig) -> Self {
        let permits = config.concurrency.max(1);
        Self {
            oracle,
            config,
            limiter: Arc::new(Semaphore::new(permits)),
            fallback: RuleBasedEvaluator::new(),
        }
    }

    /// Evaluator with no oracle; every trace is scored by rules.
    pub fn offline() -> Self {
        Self::new(None, TraceEvaluatorConfig::default())
    }

    pub fn oracle_identity(&self) -> Option<String> {
        self.oracle.as_ref().map(|o| o.identity())
    }

    pub async fn evaluate(&self, trace: &InteractionTrace) -> TraceEvaluation {
        match self.judge(trace).await {
            Ok(evaluation) => evaluation,
            Err(err) => {
                if self.oracle.is_none() && matches!(err, OracleError::Unavailable(_)) {
                    tracing::debug!(
                        trace_id = %trace.id,
                        session_id = %trace.session_id,
                        "no judge oracle configured; scoring by rules"
                    );
                } else {
                    tracing::warn!(
                        trace_id = %trace.id,
                        session_id = %trace.session_id,
                        reason = err.reason(),
                        error = %err,
                        "judge oracle failed; using rule-based fallback"
                    );
                }
                self.fallback.evaluate_with_reason(trace, Some(err.reason()))
            }
        }
    }

    /// Evaluates many traces with at most `concurrency` oracle calls in
    /// flight. Output order matches input order.
    pub async fn evaluate_all(&self, traces: &[InteractionTrace]) -> Vec<TraceEvaluation> {
        let mut join_set = JoinSet::new();
        for (idx, trace) in traces.iter().enumerate() {
            let this = self.clone();
            let trace = trace.clone();
            join_set.spawn(async move { (idx, this.evaluate(&trace).await) });
        }

        let mut slots: Vec<Option<TraceEvaluation>> = vec![None; traces.len()];
        while let Some(res) = join_set.join_next().await {
            match res {
                Ok((idx, evaluation)) => slots[idx] = Some(evaluation),
                Err(e) => tracing::error!(error = %e, "evaluation task aborted"),
            }
        }

        slots
            .into_iter()
            .zip(traces)
            .map(|(slot, trace)| {
                slot.unwrap_or_else(|| {
                    self.fallback
                        .evaluate_with_reason(trace, Some("evaluation_task_aborted"))
                })
            })
            .collect()
    }

    async fn judge(&self, trace: &InteractionTrace) -> Result<TraceEvaluation, OracleError> {
        trace.validate()?;
        let oracle = self
            .oracle
            .as_ref()
            .ok_or_else(|| OracleError::Unavailable("no judge oracle configured".into()))?;

        let request = JudgeRequest::for_trace(trace);
        let raw = {
            let _permit = self
                .limiter
                .acquire()
                .await
                .map_err(|e| OracleError::Unavailable(e.to_string()))?;
            let budget_ms = self.config.timeout.as_millis().min(u128::from(u64::MAX)) as u64;
            timeout(self.config.timeout, oracle.judge(&request))
                .await
                .map_err(|_| OracleError::Timeout(budget_ms))??
        };

        let reply = JudgeReply::parse(&raw);
        let base_confidence = if reply.is_structured() {
            STRUCTURED_CONFIDENCE
        } else {
            FREE_TEXT_CONFIDENCE
        };
        let parsed = reply.into_scores()?;
        Ok(build_evaluation(
            trace,
            parsed,
            oracle.identity(),
            base_confidence,
        ))
    }
}

fn build_evaluation(
    trace: &InteractionTrace,
    parsed: ParsedScores,
    oracle: String,
    base_confidence: f64,
) -> TraceEvaluation {
    let missing = parsed.missing();
    let mut scores = CategoryScores::uniform(MISSING_CATEGORY_DEFAULT);
    for (category, score) in &parsed.scores {
        scores.set(*category, *score);
    }
    let scores = scores.clamped();

    if !missing.is_empty() {
        tracing::debug!(
            trace_id = %trace.id,
            missing = ?missing,
            "judge reply omitted categories; assuming {}",
            MISSING_CATEGORY_DEFAULT
        );
    }
    let confidence =
        round2((base_confidence - MISSING_CATEGORY_PENALTY * missing.len() as f64).max(0.0));

    TraceEvaluation {
        trace_id: trace.id.clone(),
        session_id: trace.session_id.clone(),
        timestamp: trace.timestamp,
        weighted_score: scores.weighted(),
        scores,
        rationale: parsed.rationale,
        violations: parsed.violations,
        recommendations: parsed.recommendations,
        evaluator: EvaluatorMeta {
            oracle,
            confidence,
            fallback: false,
            fallback_reason: None,
            missing_categories: missing,
        },
    }
}

impl std::fmt::Debug for TraceEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceEvaluator")
            .field("oracle", &self.oracle_identity())
            .field("config", &self.config)
            .finish()
    }
}
