use crate::model::Metadata;
use anyhow::Context;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(bytes);
    hex::encode(h.finalize())
}

/// Canonical input of a session digest. Serialized with JCS (RFC 8785) so
/// key order and number formatting cannot change the hash.
#[derive(Debug, Serialize)]
struct SessionDigestInput<'a> {
    session_id: &'a str,
    trace_ids: Vec<&'a str>,
    trace_count: usize,
    session_start: String,
    metadata: &'a Metadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    evaluated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDigests {
    /// Depends only on the inputs; stable across runs.
    pub input_fingerprint: String,
    /// Inputs plus the evaluation timestamp; unique per run.
    pub run_hash: String,
}

/// Digest of the inputs alone; what `session_digests` reports as `input_fingerprint`.
pub fn input_fingerprint(
    session_id: &str,
    trace_ids: &[&str],
    session_start: DateTime<Utc>,
    metadata: &Metadata,
) -> anyhow::Result<String> {
    let mut sorted: Vec<&str> = trace_ids.to_vec();
    sorted.sort_unstable();
    let input = SessionDigestInput {
        session_id,
        trace_count: sorted.len(),
        trace_ids: sorted,
        session_start: session_start.to_rfc3339_opts(SecondsFormat::Millis, true),
        metadata,
        evaluated_at: None,
    };
    let bytes =
        serde_jcs::to_vec(&input).context("JCS canonicalization failed (input fingerprint)")?;
    Ok(sha256_hex(&bytes))
}

pub fn session_digests(
    session_id: &str,
    trace_ids: &[&str],
    session_start: DateTime<Utc>,
    metadata: &Metadata,
    evaluated_at: DateTime<Utc>,
) -> anyhow::Result<SessionDigests> {
    let mut sorted: Vec<&str> = trace_ids.to_vec();
    sorted.sort_unstable();

    let mut input = SessionDigestInput {
        session_id,
        trace_count: sorted.len(),
        trace_ids: sorted,
        session_start: session_start.to_rfc3339_opts(SecondsFormat::Millis, true),
        metadata,
        evaluated_at: None,
    };
    let input_bytes =
        serde_jcs::to_vec(&input).context("JCS canonicalization failed (input fingerprint)")?;

    input.evaluated_at = Some(evaluated_at.to_rfc3339_opts(SecondsFormat::Millis, true));
    let run_bytes = serde_jcs::to_vec(&input).context("JCS canonicalization failed (run hash)")?;

    Ok(SessionDigests {
        input_fingerprint: sha256_hex(&input_bytes),
        run_hash: sha256_hex(&run_bytes),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
    }

    #[test]
    fn trace_order_does_not_matter() {
        let meta = Metadata::new();
        let a = session_digests("s1", &["t2", "t1"], start(), &meta, start()).unwrap();
        let b = session_digests("s1", &["t1", "t2"], start(), &meta, start()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn evaluation_time_only_changes_run_hash() {
        let meta = Metadata::new();
        let later = start() + chrono::Duration::minutes(5);
        let a = session_digests("s1", &["t1"], start(), &meta, start()).unwrap();
        let b = session_digests("s1", &["t1"], start(), &meta, later).unwrap();
        assert_eq!(a.input_fingerprint, b.input_fingerprint);
        assert_ne!(a.run_hash, b.run_hash);
    }

    #[test]
    fn input_fingerprint_matches_session_digests() {
        let meta = Metadata::new();
        let digests = session_digests("s1", &["t1", "t2"], start(), &meta, start()).unwrap();
        let fp = input_fingerprint("s1", &["t2", "t1"], start(), &meta).unwrap();
        assert_eq!(fp, digests.input_fingerprint);
    }

    #[test]
    fn metadata_changes_fingerprint() {
        let mut meta = Metadata::new();
        let a = session_digests("s1", &["t1"], start(), &meta, start()).unwrap();
        meta.insert("channel".into(), serde_json::json!("web"));
        let b = session_digests("s1", &["t1"], start(), &meta, start()).unwrap();
        assert_ne!(a.input_fingerprint, b.input_fingerprint);
        assert_eq!(a.input_fingerprint.len(), 64);
    }
}
