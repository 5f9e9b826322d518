pub mod export;
pub mod schema;
pub mod store;

pub use export::JsonExporter;
pub use store::Store;

use crate::model::SessionAggregation;

/// Destination for finished session aggregations. Upserts are keyed by session id.
pub trait AggregationSink: Send + Sync {
    fn name(&self) -> &'static str;

    fn upsert(&self, aggregation: &SessionAggregation) -> anyhow::Result<()>;

    /// Previously stored canonical aggregation, if this sink can read back.
    fn fetch(&self, _session_id: &str) -> anyhow::Result<Option<SessionAggregation>> {
        Ok(None)
    }
}
