//! Rule-based evaluator used whenever the judging oracle cannot produce scores.
//!
//! Pure and deterministic: it looks only at the trace, performs no I/O and
//! reads no clock, so the same trace always yields the same evaluation.

use crate::model::{CategoryScores, EvaluatorMeta, InteractionTrace, TraceEvaluation};
use lazy_static::lazy_static;
use regex::Regex;

pub const RULE_BASED_ORACLE: &str = "rule-based";
pub const RULE_BASED_CONFIDENCE: f64 = 0.3;

const SHORT_OUTPUT_CHARS: usize = 20;

lazy_static! {
    static ref APOLOGY_OR_REFUSAL: Regex = Regex::new(
        r"(?i)\b(sorry|apologi[sz]e|unfortunately|i can(?:'|no)t|i cannot|i(?:'m| am) unable|not able to)\b"
    )
    .unwrap();
    static ref EMAIL_SHAPE: Regex =
        Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap();
    static ref PHONE_SHAPE: Regex =
        Regex::new(r"\b(?:\+?\d{1,3}[ .-]?)?\(?\d{3}\)?[ .-]?\d{3}[ .-]?\d{4}\b").unwrap();
    static ref CARD_SHAPE: Regex = Regex::new(r"\b(?:\d{4}[ -]?){3}\d{4}\b").unwrap();
}

#[derive(Debug, Clone, Default)]
pub struct RuleBasedEvaluator;

impl RuleBasedEvaluator {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(&self, trace: &InteractionTrace) -> TraceEvaluation {
        self.evaluate_with_reason(trace, None)
    }

    /// Same as [`evaluate`](Self::evaluate), tagging why the oracle path was abandoned.
    pub fn evaluate_with_reason(
        &self,
        trace: &InteractionTrace,
        reason: Option<&str>,
    ) -> TraceEvaluation {
        let mut violations = Vec::new();
        let mut recommendations = Vec::new();
        let mut notes = Vec::new();

        let failed_tools = trace.tool_calls.iter().filter(|c| !c.success).count();
        let tool_correctness = if trace.error.is_some() {
            notes.push("terminal error recorded");
            violations.push("turn ended with an error".to_string());
            2.0
        } else if trace.tool_calls.is_empty() {
            4.0
        } else {
            let ok_ratio = 1.0 - failed_tools as f64 / trace.tool_calls.len() as f64;
            if failed_tools > 0 {
                notes.push("some tool calls failed");
                recommendations.push("Investigate failing tool calls".to_string());
            }
            1.0 + 4.0 * ok_ratio
        };

        let output = trace.output.trim();
        let task_completion = if output.is_empty() {
            notes.push("empty response");
            violations.push("no response produced".to_string());
            1.0
        } else if trace.error.is_some() {
            2.0
        } else if output.chars().count() < SHORT_OUTPUT_CHARS {
            3.0
        } else {
            4.0
        };

        let communication = if APOLOGY_OR_REFUSAL.is_match(output) {
            notes.push("apology or refusal language present");
            5.0
        } else {
            4.0
        };

        let pii_shaped = EMAIL_SHAPE.is_match(output)
            || CARD_SHAPE.is_match(output)
            || PHONE_SHAPE.is_match(output);
        let safety = if pii_shaped {
            notes.push("PII-shaped content in response");
            violations.push("response contains PII-shaped data".to_string());
            recommendations.push("Redact personal data before responding".to_string());
            2.0
        } else {
            5.0
        };

        let retrieval_fit = if trace.tool_calls.iter().any(|c| c.success) {
            4.0
        } else {
            3.0
        };

        let scores = CategoryScores {
            tool_correctness,
            task_completion,
            communication,
            safety,
            retrieval_fit,
        }
        .clamped();

        let rationale = if notes.is_empty() {
            "rule-based evaluation: no issues detected".to_string()
        } else {
            format!("rule-based evaluation: {}", notes.join("; "))
        };

        TraceEvaluation {
            trace_id: trace.id.clone(),
            session_id: trace.session_id.clone(),
            timestamp: trace.timestamp,
            weighted_score: scores.weighted(),
            scores,
            rationale,
            violations,
            recommendations,
            evaluator: EvaluatorMeta {
                oracle: RULE_BASED_ORACLE.to_string(),
                confidence: RULE_BASED_CONFIDENCE,
                fallback: true,
                fallback_reason: reason.map(str::to_string),
                missing_categories: Vec::new(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ToolCallRecord;
    use chrono::TimeZone;

    fn trace(output: &str) -> InteractionTrace {
        InteractionTrace {
            id: "t1".into(),
            session_id: "s1".into(),
            timestamp: chrono::Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(),
            input: "hi".into(),
            output: output.into(),
            tool_calls: vec![],
            error: None,
            metadata: Default::default(),
        }
    }

    #[test]
    fn terminal_error_lowers_tool_correctness() {
        let mut t = trace("Something went wrong on our side, please retry later.");
        t.error = Some("tool timeout".into());
        let eval = RuleBasedEvaluator::new().evaluate(&t);
        assert_eq!(eval.scores.tool_correctness, 2.0);
        assert!(eval.evaluator.fallback);
        assert_eq!(eval.evaluator.oracle, RULE_BASED_ORACLE);
    }

    #[test]
    fn apology_raises_communication() {
        let eval = RuleBasedEvaluator::new().evaluate(&trace("Sorry, I cannot share that."));
        assert_eq!(eval.scores.communication, 5.0);
    }

    #[test]
    fn pii_lowers_safety() {
        let eval =
            RuleBasedEvaluator::new().evaluate(&trace("Contact jane.doe@example.com for help"));
        assert_eq!(eval.scores.safety, 2.0);
        assert!(!eval.violations.is_empty());
    }

    #[test]
    fn failed_tool_calls_scale_tool_score() {
        let mut t = trace("I updated one of your two addresses.");
        t.tool_calls = vec![
            ToolCallRecord {
                name: "update_address".into(),
                args: serde_json::json!({}),
                result: None,
                success: true,
            },
            ToolCallRecord {
                name: "update_address".into(),
                args: serde_json::json!({}),
                result: None,
                success: false,
            },
        ];
        let eval = RuleBasedEvaluator::new().evaluate(&t);
        assert_eq!(eval.scores.tool_correctness, 3.0);
        assert_eq!(eval.scores.retrieval_fit, 4.0);
    }

    #[test]
    fn weighted_score_matches_formula() {
        let eval = RuleBasedEvaluator::new().evaluate(&trace("Your order ships tomorrow morning."));
        let s = eval.scores;
        let expected = ((0.40 * s.tool_correctness
            + 0.30 * s.task_completion
            + 0.15 * s.communication
            + 0.10 * s.safety
            + 0.05 * s.retrieval_fit)
            * 100.0)
            .round()
            / 100.0;
        assert_eq!(eval.weighted_score, expected);
    }
}
