pub const DDL: &str = r#"
CREATE TABLE IF NOT EXISTS session_aggregations (
  session_id TEXT PRIMARY KEY,
  trace_count INTEGER NOT NULL,
  weighted_session_score REAL NOT NULL,
  input_fingerprint TEXT NOT NULL,
  reproducibility_hash TEXT NOT NULL,
  evaluated_at TEXT NOT NULL,
  aggregation_json TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS trace_evaluations (
  trace_id TEXT PRIMARY KEY,
  session_id TEXT NOT NULL,
  weighted_score REAL NOT NULL,
  fallback INTEGER NOT NULL,
  evaluation_json TEXT NOT NULL,
  recorded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_trace_evaluations_session ON trace_evaluations(session_id);
"#;
