use super::AggregationSink;
use crate::model::{SessionAggregation, TraceEvaluation};
use anyhow::Context;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone)]
pub struct Store {
    pub(crate) conn: Arc<Mutex<Connection>>,
}

impl Store {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let conn = Connection::open(path).context("failed to open sqlite db")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory sqlite db")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> anyhow::Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("sqlite connection mutex poisoned"))
    }

    pub fn init_schema(&self) -> anyhow::Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(super::schema::DDL)
            .context("failed to initialize schema")?;
        Ok(())
    }

    pub fn upsert_aggregation(&self, agg: &SessionAggregation) -> anyhow::Result<()> {
        let json = serde_json::to_string(agg)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO session_aggregations(
                session_id, trace_count, weighted_session_score,
                input_fingerprint, reproducibility_hash, evaluated_at, aggregation_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(session_id) DO UPDATE SET
                trace_count = excluded.trace_count,
                weighted_session_score = excluded.weighted_session_score,
                input_fingerprint = excluded.input_fingerprint,
                reproducibility_hash = excluded.reproducibility_hash,
                evaluated_at = excluded.evaluated_at,
                aggregation_json = excluded.aggregation_json",
            params![
                agg.session_id,
                agg.trace_count as i64,
                agg.weighted_session_score,
                agg.input_fingerprint,
                agg.reproducibility_hash,
                agg.evaluated_at.to_rfc3339(),
                json
            ],
        )
        .context("upsert session aggregation")?;
        Ok(())
    }

    pub fn fetch_aggregation(&self, session_id: &str) -> anyhow::Result<Option<SessionAggregation>> {
        let conn = self.lock()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT aggregation_json FROM session_aggregations WHERE session_id = ?1",
                params![session_id],
                |row| row.get(0),
            )
            .optional()?;
        match raw {
            Some(s) => Ok(Some(
                serde_json::from_str(&s).context("corrupt aggregation_json")?,
            )),
            None => Ok(None),
        }
    }

    /// Writes all evaluations in one transaction.
    pub fn insert_evaluations(&self, evaluations: &[TraceEvaluation]) -> anyhow::Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO trace_evaluations(
                    trace_id, session_id, weighted_score, fallback, evaluation_json, recorded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(trace_id) DO UPDATE SET
                    session_id = excluded.session_id,
                    weighted_score = excluded.weighted_score,
                    fallback = excluded.fallback,
                    evaluation_json = excluded.evaluation_json,
                    recorded_at = excluded.recorded_at",
            )?;
            let recorded_at = chrono::Utc::now().to_rfc3339();
            for ev in evaluations {
                stmt.execute(params![
                    ev.trace_id,
                    ev.session_id,
                    ev.weighted_score,
                    ev.evaluator.fallback as i64,
                    serde_json::to_string(ev)?,
                    recorded_at
                ])?;
            }
        }
        tx.commit().context("commit trace evaluations")?;
        Ok(())
    }

    pub fn fetch_evaluations(&self, session_id: &str) -> anyhow::Result<Vec<TraceEvaluation>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT evaluation_json FROM trace_evaluations WHERE session_id = ?1 ORDER BY trace_id",
        )?;
        let rows = stmt.query_map(params![session_id], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for r in rows {
            out.push(serde_json::from_str(&r?).context("corrupt evaluation_json")?);
        }
        Ok(out)
    }
}

impl AggregationSink for Store {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn upsert(&self, aggregation: &SessionAggregation) -> anyhow::Result<()> {
        self.upsert_aggregation(aggregation)
    }

    fn fetch(&self, session_id: &str) -> anyhow::Result<Option<SessionAggregation>> {
        self.fetch_aggregation(session_id)
    }
}
