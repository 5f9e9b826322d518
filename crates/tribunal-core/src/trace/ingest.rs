use crate::model::InteractionTrace;
use anyhow::Context;
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Reads InteractionTrace records from a JSONL file.
pub fn read_traces(path: &Path) -> anyhow::Result<Vec<InteractionTrace>> {
    read_jsonl(path)
}

pub fn parse_traces<R: BufRead>(reader: R) -> anyhow::Result<Vec<InteractionTrace>> {
    parse_jsonl(reader)
}

/// One JSON record per line.
pub fn read_jsonl<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Vec<T>> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    parse_jsonl(BufReader::new(file)).with_context(|| format!("failed to read {}", path.display()))
}

/// Blank lines are skipped; a malformed line fails with its 1-based line number.
pub fn parse_jsonl<T: DeserializeOwned, R: BufRead>(reader: R) -> anyhow::Result<Vec<T>> {
    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("line {}: read error", idx + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line)
            .with_context(|| format!("line {}: invalid record", idx + 1))?;
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_camel_and_snake_case_records() {
        let raw = r#"{"id":"t1","sessionId":"s1","timestamp":"2024-05-01T10:00:00Z","input":"a","output":"b","toolCalls":[{"name":"lookup","args":{"q":1},"result":{"ok":true},"success":true}]}

{"id":"t2","session_id":"s1","timestamp":"2024-05-01T10:01:00Z","input":"c","output":"d","tool_calls":[{"tool_name":"lookup"}],"error":"tool timeout"}
"#;
        let traces = parse_traces(raw.as_bytes()).unwrap();
        assert_eq!(traces.len(), 2);
        assert_eq!(traces[0].tool_calls[0].name, "lookup");
        assert_eq!(traces[1].session_id, "s1");
        assert!(traces[1].tool_calls[0].success, "success defaults to true");
        assert_eq!(traces[1].error.as_deref(), Some("tool timeout"));
    }

    #[test]
    fn malformed_line_reports_line_number() {
        let raw = "{\"id\":\"t1\"}\n";
        let err = parse_traces(raw.as_bytes()).unwrap_err();
        assert!(format!("{:#}", err).contains("line 1"));
    }
}
