use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse YAML: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("unsupported config version {found} (supported: {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TraceError {
    #[error("trace '{trace_id}' has an empty {field}")]
    MissingField {
        trace_id: String,
        field: &'static str,
    },
}

/// Why the judging oracle could not be used. Always recovered by the rule-based evaluator.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("judge oracle unavailable: {0}")]
    Unavailable(String),
    #[error("judge oracle timed out after {0} ms")]
    Timeout(u64),
    #[error("judge reply could not be parsed: {0}")]
    Malformed(String),
    #[error("trace rejected before judging: {0}")]
    InvalidTrace(#[from] TraceError),
}

impl OracleError {
    /// Stable short label recorded in evaluator metadata.
    pub fn reason(&self) -> &'static str {
        match self {
            OracleError::Unavailable(_) => "oracle_unavailable",
            OracleError::Timeout(_) => "oracle_timeout",
            OracleError::Malformed(_) => "unparseable_reply",
            OracleError::InvalidTrace(_) => "invalid_trace",
        }
    }
}

#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("session '{session_id}' has no trace evaluations to aggregate")]
    EmptyTraceSet { session_id: String },
    #[error("evaluation for trace '{trace_id}' belongs to session '{found}', not '{expected}'")]
    SessionMismatch {
        trace_id: String,
        expected: String,
        found: String,
    },
    #[error("failed to compute reproducibility hash: {0}")]
    Digest(#[from] anyhow::Error),
}
