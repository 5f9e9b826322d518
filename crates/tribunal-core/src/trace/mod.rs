pub mod ingest;

pub use ingest::{parse_jsonl, parse_traces, read_jsonl, read_traces};
