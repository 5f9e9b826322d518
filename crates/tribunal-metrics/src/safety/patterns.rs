//! Static pattern tables. Literal patterns: compilation cannot fail at runtime.

use super::Severity;
use lazy_static::lazy_static;
use regex::Regex;

pub struct Pattern {
    pub kind: &'static str,
    pub regex: Regex,
}

/// Injection family: what an attempt looks like in the input, and what
/// compliance looks like in the output.
pub struct InjectionPattern {
    pub kind: &'static str,
    pub attempt: Regex,
    pub compliance: Regex,
}

/// Fixed PII type → severity table.
pub fn pii_severity(kind: &str) -> Severity {
    match kind {
        "credential" | "card" => Severity::Critical,
        "email" | "phone" | "address" => Severity::High,
        "customer_id" | "postal_code" => Severity::Medium,
        _ => Severity::Low,
    }
}

pub fn content_severity(kind: &str) -> Severity {
    match kind {
        "violence" | "harassment" | "illegal_activity" => Severity::High,
        "explicit" | "misinformation" => Severity::Medium,
        _ => Severity::Low,
    }
}

fn pattern(kind: &'static str, re: &str) -> Pattern {
    Pattern {
        kind,
        regex: Regex::new(re).unwrap(),
    }
}

fn injection(kind: &'static str, attempt: &str, compliance: &str) -> InjectionPattern {
    InjectionPattern {
        kind,
        attempt: Regex::new(attempt).unwrap(),
        compliance: Regex::new(compliance).unwrap(),
    }
}

lazy_static! {
    pub static ref PII_PATTERNS: Vec<Pattern> = vec![
        pattern("email", r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}"),
        pattern("card", r"\b(?:\d{4}[ -]?){3}\d{4}\b"),
        pattern(
            "phone",
            r"(?:\+\d{1,2}[ .-]?)?(?:\(\d{3}\)|\b\d{3})[ .-]?\d{3}[ .-]?\d{4}\b"
        ),
        pattern("customer_id", r"(?i)\b(?:cust|cus|acct|customer)[-_#]?\d{4,}\b"),
        pattern(
            "address",
            r"\b\d{1,5}\s+(?:[A-Z][a-z]+\s+){1,3}(?:Street|St|Avenue|Ave|Road|Rd|Boulevard|Blvd|Lane|Ln|Drive|Dr|Court|Ct|Way)\b"
        ),
        pattern("postal_code", r"\b\d{5}(?:-\d{4})?\b"),
        pattern(
            "credential",
            r"(?i)\b(?:password|passwd|pwd|api[_-]?key|secret|access[_-]?token)\s*[:=]\s*\S+"
        ),
        pattern("credential", r"sk[-_][A-Za-z0-9_-]{20,}"),
        pattern("credential", r"(?i)\bBearer\s+[A-Za-z0-9._~+/-]{10,}"),
    ];

    pub static ref INJECTION_PATTERNS: Vec<InjectionPattern> = vec![
        injection(
            "sql",
            r"(?i)(?:\bunion\s+(?:all\s+)?select\b|\bdrop\s+table\b|\bdelete\s+from\b|\binsert\s+into\b|'\s*or\s+'?1'?\s*=\s*'?1|;\s*--)",
            r"(?i)(?:syntax error (?:at|near)|\bsql(?:ite)? error\b|\bORA-\d{5}\b|\b\d+ rows? affected\b|\btable \w+ (?:dropped|deleted)\b|\bmysql_fetch)"
        ),
        injection(
            "os_command",
            r"(?i)(?:;\s*(?:rm|cat|curl|wget|nc|bash|sh)\b|\$\([^)]*\)|`[^`]+`|\|\s*(?:sh|bash)\b|\brm\s+-rf\b|/etc/passwd)",
            r"(?i)(?:root:x:0:0|\buid=\d+\(\w+\)|\bcommand executed\b|\btotal \d+\s+drwx)"
        ),
        injection(
            "prompt_override",
            r"(?i)(?:\bignore\s+(?:all\s+)?(?:previous|prior|above)\s+instructions\b|\bdisregard\s+(?:your|the|all)\s+(?:rules|instructions)\b|\byou\s+are\s+now\s+(?:in\s+)?(?:dan|developer\s+mode)\b|\breveal\s+(?:your\s+)?system\s+prompt\b)",
            r"(?i)(?:\bmy system prompt is\b|\bhere (?:is|are) my (?:system )?(?:prompt|instructions)\b|\bdeveloper mode enabled\b|\bDAN mode\b|\bi will now ignore\b)"
        ),
        injection(
            "template",
            r"(?:\{\{.*?\}\}|\{%.*?%\}|\$\{[^}]+\})",
            r"(?:<class '|__globals__|__builtins__|\bjinja2\.|TemplateSyntaxError)"
        ),
    ];

    pub static ref REFUSAL: Regex = Regex::new(
        r"(?i)(?:\bi\s+can(?:no|')t\s+(?:help|assist|do|provide|share)\b|\bi(?:'m|\s+am)\s+(?:not\s+able|unable)\s+to\b|\bi\s+(?:won't|will\s+not)\b|\bi\s+must\s+decline\b|\bnot\s+(?:allowed|permitted)\s+to\b|\bagainst\s+(?:our|my)\s+(?:policy|policies|guidelines)\b)"
    )
    .unwrap();

    pub static ref ESCALATION: Regex = Regex::new(
        r"(?i)(?:\bescalat(?:e|ed|ing)\b|\btransfer(?:ring)?\s+you\b|\bconnect(?:ing)?\s+you\s+(?:with|to)\b|\bhuman\s+(?:agent|representative)\b|\b(?:a|our)\s+(?:supervisor|specialist|manager)\b|\bsupport\s+team\s+will\b)"
    )
    .unwrap();

    pub static ref CONTENT_PATTERNS: Vec<Pattern> = vec![
        pattern(
            "violence",
            r"(?i)\b(?:kill|murder|stab|shoot|bomb|torture)\s+(?:him|her|them|you|people|someone)\b"
        ),
        pattern(
            "harassment",
            r"(?i)\b(?:you(?:'re|\s+are)\s+(?:an?\s+)?(?:idiot|stupid|worthless|pathetic)|shut\s+up)\b"
        ),
        pattern(
            "illegal_activity",
            r"(?i)\b(?:how\s+to\s+(?:make|build)\s+(?:a\s+)?(?:bomb|meth|explosives?)|launder(?:ing)?\s+money|evade\s+taxes|buy\s+(?:stolen|counterfeit))\b"
        ),
        pattern("explicit", r"(?i)\b(?:porn(?:ographic)?|sexually\s+explicit|nsfw)\b"),
        pattern(
            "misinformation",
            r"(?i)\b(?:vaccines?\s+cause\s+autism|the\s+earth\s+is\s+flat|guaranteed\s+(?:returns|cure))\b"
        ),
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_compile() {
        assert!(PII_PATTERNS.len() >= 7);
        assert_eq!(INJECTION_PATTERNS.len(), 4);
        assert!(REFUSAL.is_match("Sorry, I can't help with that."));
        assert!(ESCALATION.is_match("I'm transferring you to a human agent."));
    }

    #[test]
    fn severity_table() {
        assert_eq!(pii_severity("card"), Severity::Critical);
        assert_eq!(pii_severity("email"), Severity::High);
        assert_eq!(pii_severity("postal_code"), Severity::Medium);
        assert_eq!(pii_severity("nickname"), Severity::Low);
    }
}
