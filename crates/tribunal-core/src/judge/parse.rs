use crate::errors::OracleError;
use crate::rubric::Category;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;

const MAX_FREE_TEXT_RATIONALE: usize = 500;

lazy_static! {
    /// `<category name> ... <1-5>` within one line, e.g. "Tool correctness: 4/5".
    /// Parenthesized spans right after the name ("(1-5)", "(weight 0.30)") are skipped.
    static ref FREE_TEXT_SCORE: Regex = Regex::new(
        r"(?i)\b(tool[\s_-]?correctness|task[\s_-]?completion|communication|safety|retrieval[\s_-]?fit)\b(?:\s*\([^)\n]*\))*[^0-9(\n]{0,30}([1-5](?:\.\d+)?)\b"
    )
    .unwrap();
}

/// Scores and commentary extracted from one judge reply. Categories the
/// reply did not mention are absent from `scores`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedScores {
    pub scores: BTreeMap<Category, f64>,
    pub rationale: String,
    pub violations: Vec<String>,
    pub recommendations: Vec<String>,
}

impl ParsedScores {
    pub fn missing(&self) -> Vec<Category> {
        Category::ALL
            .into_iter()
            .filter(|c| !self.scores.contains_key(c))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JudgeReply {
    Structured(ParsedScores),
    FreeText(String),
}

impl JudgeReply {
    /// Tries the structured JSON form first; anything else is kept as free text.
    pub fn parse(raw: &str) -> JudgeReply {
        match parse_structured(raw) {
            Some(parsed) => JudgeReply::Structured(parsed),
            None => JudgeReply::FreeText(raw.to_string()),
        }
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, JudgeReply::Structured(_))
    }

    /// Resolves the reply into scores. Free text without a single recognizable
    /// category score is a total parse failure.
    pub fn into_scores(self) -> Result<ParsedScores, OracleError> {
        match self {
            JudgeReply::Structured(parsed) => Ok(parsed),
            JudgeReply::FreeText(text) => {
                let parsed = parse_free_text(&text);
                if parsed.scores.is_empty() {
                    let preview: String = text.chars().take(80).collect();
                    return Err(OracleError::Malformed(format!(
                        "no category scores found in reply: {:?}",
                        preview
                    )));
                }
                Ok(parsed)
            }
        }
    }
}

fn parse_structured(raw: &str) -> Option<ParsedScores> {
    let text = raw.trim();
    let start = text.find('{')?;
    let value: serde_json::Value = serde_json::Deserializer::from_str(&text[start..])
        .into_iter::<serde_json::Value>()
        .next()?
        .ok()?;
    let obj = value.as_object()?;

    let mut parsed = ParsedScores::default();
    collect_scores(obj, &mut parsed.scores);
    if let Some(nested) = obj.get("scores").and_then(|v| v.as_object()) {
        collect_scores(nested, &mut parsed.scores);
    }
    if parsed.scores.is_empty() {
        return None;
    }

    parsed.rationale = obj
        .get("rationale")
        .or_else(|| obj.get("reasoning"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();
    parsed.violations = string_list(obj.get("violations"));
    parsed.recommendations = string_list(obj.get("recommendations"));
    Some(parsed)
}

fn collect_scores(
    obj: &serde_json::Map<String, serde_json::Value>,
    out: &mut BTreeMap<Category, f64>,
) {
    for (key, value) in obj {
        let Some(category) = Category::from_loose(key) else {
            continue;
        };
        let score = match value {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        if let Some(score) = score.filter(|s| s.is_finite()) {
            out.insert(category, score);
        }
    }
}

fn string_list(value: Option<&serde_json::Value>) -> Vec<String> {
    match value {
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .filter_map(|v| match v {
                serde_json::Value::String(s) => Some(s.clone()),
                serde_json::Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
        Some(serde_json::Value::String(s)) if !s.is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}

fn parse_free_text(text: &str) -> ParsedScores {
    let mut parsed = ParsedScores::default();
    for caps in FREE_TEXT_SCORE.captures_iter(text) {
        let Some(category) = Category::from_loose(&caps[1]) else {
            continue;
        };
        if let Ok(score) = caps[2].parse::<f64>() {
            // first mention wins
            parsed.scores.entry(category).or_insert(score);
        }
    }
    parsed.rationale = text.trim().chars().take(MAX_FREE_TEXT_RATIONALE).collect();
    parsed
}
