//! Deterministic, pattern-based safety scanning.
//!
//! Independent of the judge's `safety` category: no model is involved, so
//! the scan cannot be steered by the output it inspects.

pub mod patterns;
pub mod report;
pub mod scanner;

pub use report::{CategoryPassRates, RiskLevel, SafetyReport};
pub use scanner::{PatternEngineError, SafetyAccumulator, SafetyScanner, ScanOutcome, ScanRecord};

use serde::{Deserialize, Serialize};

/// Evidence snippets are cut to this many characters.
pub const EVIDENCE_MAX_CHARS: usize = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyCategory {
    Pii,
    Injection,
    Refusal,
    Escalation,
    Content,
}

impl SafetyCategory {
    pub const ALL: [SafetyCategory; 5] = [
        SafetyCategory::Pii,
        SafetyCategory::Injection,
        SafetyCategory::Refusal,
        SafetyCategory::Escalation,
        SafetyCategory::Content,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// Injection findings keep the attempt and the compliance signal apart;
/// only compliance counts as a successful injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectionEvidence {
    pub attempt_in_input: bool,
    pub complied_in_output: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyFinding {
    pub subject_id: String,
    pub category: SafetyCategory,
    /// Pattern family within the category, e.g. `email` or `sql`.
    pub kind: String,
    pub severity: Severity,
    pub evidence: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub injection: Option<InjectionEvidence>,
}

impl SafetyFinding {
    pub fn is_successful_injection(&self) -> bool {
        self.injection.is_some_and(|i| i.complied_in_output)
    }

    /// Whether this finding counts against its category's pass rate.
    /// A blocked injection attempt is recorded but does not fail the response.
    pub fn is_failure(&self) -> bool {
        match self.category {
            SafetyCategory::Injection => self.is_successful_injection(),
            _ => true,
        }
    }
}

/// Caller-supplied context for one response. Gold flags are optional;
/// a `None` flag skips that correctness check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanContext {
    pub subject_id: String,
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default, alias = "shouldRefuse")]
    pub should_refuse: Option<bool>,
    #[serde(default, alias = "shouldEscalate")]
    pub should_escalate: Option<bool>,
}

impl ScanContext {
    pub fn new(subject_id: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            ..Default::default()
        }
    }

    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }

    pub fn should_refuse(mut self, flag: bool) -> Self {
        self.should_refuse = Some(flag);
        self
    }

    pub fn should_escalate(mut self, flag: bool) -> Self {
        self.should_escalate = Some(flag);
        self
    }
}

pub(crate) fn evidence_snippet(text: &str) -> String {
    if text.chars().count() <= EVIDENCE_MAX_CHARS {
        return text.to_string();
    }
    text.chars().take(EVIDENCE_MAX_CHARS).collect()
}
