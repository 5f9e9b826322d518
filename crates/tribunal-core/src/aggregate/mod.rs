//! Session-level aggregation of trace evaluations.
//!
//! A session is aggregated at most once per aggregator: concurrent requests
//! for one session id serialize on a per-session lock and every request after
//! the first returns the cached result, as long as the evaluated trace set
//! (its input fingerprint) is unchanged. An aggregation that fails or is
//! cancelled leaves the session in `NotStarted` with nothing persisted.

pub mod stats;

use crate::errors::AggregateError;
use crate::fingerprint::{input_fingerprint, session_digests};
use crate::model::{
    CategoryScores, DispersionMetrics, Metadata, SessionAggregation, TraceEvaluation,
};
use crate::rubric::Category;
use crate::storage::AggregationSink;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AggregationState {
    NotStarted,
    InProgress,
    Completed { run_hash: String },
}

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

type SessionSlot = Arc<tokio::sync::Mutex<Option<SessionAggregation>>>;

pub struct SessionAggregator {
    sinks: Vec<Arc<dyn AggregationSink>>,
    slots: Mutex<HashMap<String, SessionSlot>>,
    states: Arc<Mutex<HashMap<String, AggregationState>>>,
    clock: Clock,
}

impl Default for SessionAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionAggregator {
    pub fn new() -> Self {
        Self {
            sinks: Vec::new(),
            slots: Mutex::new(HashMap::new()),
            states: Arc::new(Mutex::new(HashMap::new())),
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn AggregationSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn state(&self, session_id: &str) -> AggregationState {
        lock_states(&self.states)
            .get(session_id)
            .cloned()
            .unwrap_or(AggregationState::NotStarted)
    }

    pub async fn aggregate(
        &self,
        session_id: &str,
        evaluations: &[TraceEvaluation],
    ) -> Result<SessionAggregation, AggregateError> {
        self.aggregate_with_metadata(session_id, evaluations, &Metadata::new())
            .await
    }

    pub async fn aggregate_with_metadata(
        &self,
        session_id: &str,
        evaluations: &[TraceEvaluation],
        metadata: &Metadata,
    ) -> Result<SessionAggregation, AggregateError> {
        let unique = unique_evaluations(session_id, evaluations)?;
        let fingerprint = fingerprint_of(session_id, &unique, metadata)?;

        let slot = self.slot(session_id);
        let mut cached = slot.lock().await;

        if let Some(done) = cached.as_ref() {
            if done.input_fingerprint == fingerprint {
                tracing::debug!(session_id, "session already aggregated; returning cached result");
                return Ok(done.clone());
            }
            tracing::warn!(
                session_id,
                cached_traces = done.trace_count,
                traces = unique.len(),
                "trace set changed since last aggregation; recomputing"
            );
            *cached = None;
        } else if let Some(stored) = self.fetch_persisted(session_id) {
            if stored.input_fingerprint == fingerprint {
                tracing::info!(
                    session_id,
                    run_hash = %stored.reproducibility_hash,
                    "using previously persisted aggregation"
                );
                self.set_state(
                    session_id,
                    AggregationState::Completed {
                        run_hash: stored.reproducibility_hash.clone(),
                    },
                );
                *cached = Some(stored.clone());
                return Ok(stored);
            }
            tracing::warn!(
                session_id,
                stored_traces = stored.trace_count,
                traces = unique.len(),
                "persisted aggregation covers a different trace set; recomputing"
            );
        }

        let mut guard = InProgressGuard::enter(self.states.clone(), session_id);
        let aggregation = summarize(session_id, &unique, metadata, (self.clock)())?;
        self.persist(&aggregation);

        guard.complete(aggregation.reproducibility_hash.clone());
        *cached = Some(aggregation.clone());
        tracing::info!(
            session_id,
            traces = aggregation.trace_count,
            score = aggregation.weighted_session_score,
            "session aggregated"
        );
        Ok(aggregation)
    }

    fn slot(&self, session_id: &str) -> SessionSlot {
        let mut slots = match self.slots.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        slots
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(None)))
            .clone()
    }

    fn set_state(&self, session_id: &str, state: AggregationState) {
        lock_states(&self.states).insert(session_id.to_string(), state);
    }

    fn fetch_persisted(&self, session_id: &str) -> Option<SessionAggregation> {
        for sink in &self.sinks {
            match sink.fetch(session_id) {
                Ok(Some(found)) => return Some(found),
                Ok(None) => {}
                Err(e) => tracing::warn!(
                    session_id,
                    sink = sink.name(),
                    error = %e,
                    "failed to read persisted aggregation"
                ),
            }
        }
        None
    }

    /// Best effort: a failing sink is logged and never fails the aggregation.
    fn persist(&self, aggregation: &SessionAggregation) {
        for sink in &self.sinks {
            if let Err(e) = sink.upsert(aggregation) {
                tracing::warn!(
                    session_id = %aggregation.session_id,
                    sink = sink.name(),
                    error = %e,
                    "failed to persist session aggregation"
                );
            }
        }
    }
}

fn lock_states(
    states: &Mutex<HashMap<String, AggregationState>>,
) -> std::sync::MutexGuard<'_, HashMap<String, AggregationState>> {
    match states.lock() {
        Ok(g) => g,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Marks a session `InProgress`; unless completed, dropping it (error or
/// cancellation) returns the session to `NotStarted`.
struct InProgressGuard {
    states: Arc<Mutex<HashMap<String, AggregationState>>>,
    session_id: String,
    completed: bool,
}

impl InProgressGuard {
    fn enter(states: Arc<Mutex<HashMap<String, AggregationState>>>, session_id: &str) -> Self {
        lock_states(&states).insert(session_id.to_string(), AggregationState::InProgress);
        Self {
            states,
            session_id: session_id.to_string(),
            completed: false,
        }
    }

    fn complete(&mut self, run_hash: String) {
        lock_states(&self.states).insert(
            self.session_id.clone(),
            AggregationState::Completed { run_hash },
        );
        self.completed = true;
    }
}

impl Drop for InProgressGuard {
    fn drop(&mut self) {
        if !self.completed {
            lock_states(&self.states).remove(&self.session_id);
        }
    }
}

/// Rejects empty or foreign evaluation sets and drops duplicate trace ids.
///
/// Duplicates are ordered by timestamp, then weighted score, then each
/// category score, and the first is kept, so the survivor does not depend
/// on input order.
fn unique_evaluations<'a>(
    session_id: &str,
    evaluations: &'a [TraceEvaluation],
) -> Result<Vec<&'a TraceEvaluation>, AggregateError> {
    if evaluations.is_empty() {
        return Err(AggregateError::EmptyTraceSet {
            session_id: session_id.to_string(),
        });
    }
    if let Some(stray) = evaluations.iter().find(|e| e.session_id != session_id) {
        return Err(AggregateError::SessionMismatch {
            trace_id: stray.trace_id.clone(),
            expected: session_id.to_string(),
            found: stray.session_id.clone(),
        });
    }

    let mut unique: Vec<&TraceEvaluation> = evaluations.iter().collect();
    unique.sort_by(|a, b| {
        a.trace_id
            .cmp(&b.trace_id)
            .then_with(|| a.timestamp.cmp(&b.timestamp))
            .then_with(|| a.weighted_score.total_cmp(&b.weighted_score))
            .then_with(|| {
                Category::ALL
                    .into_iter()
                    .map(|c| a.scores.get(c).total_cmp(&b.scores.get(c)))
                    .find(|o| o.is_ne())
                    .unwrap_or(Ordering::Equal)
            })
    });
    let before = unique.len();
    unique.dedup_by(|later, kept| later.trace_id == kept.trace_id);
    if unique.len() != before {
        tracing::warn!(
            session_id,
            duplicates = before - unique.len(),
            "duplicate trace evaluations ignored"
        );
    }
    Ok(unique)
}

fn session_bounds(
    unique: &[&TraceEvaluation],
    default: DateTime<Utc>,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = unique.iter().map(|e| e.timestamp).min().unwrap_or(default);
    let end = unique.iter().map(|e| e.timestamp).max().unwrap_or(start);
    (start, end)
}

fn fingerprint_of(
    session_id: &str,
    unique: &[&TraceEvaluation],
    metadata: &Metadata,
) -> Result<String, AggregateError> {
    let (start, _) = session_bounds(unique, DateTime::<Utc>::MIN_UTC);
    let trace_ids: Vec<&str> = unique.iter().map(|e| e.trace_id.as_str()).collect();
    Ok(input_fingerprint(session_id, &trace_ids, start, metadata)?)
}

/// Pure aggregation: no state, no persistence. `evaluated_at` only feeds the run hash.
pub fn compute_aggregation(
    session_id: &str,
    evaluations: &[TraceEvaluation],
    metadata: &Metadata,
    evaluated_at: DateTime<Utc>,
) -> Result<SessionAggregation, AggregateError> {
    let unique = unique_evaluations(session_id, evaluations)?;
    summarize(session_id, &unique, metadata, evaluated_at)
}

fn summarize(
    session_id: &str,
    unique: &[&TraceEvaluation],
    metadata: &Metadata,
    evaluated_at: DateTime<Utc>,
) -> Result<SessionAggregation, AggregateError> {
    let mut average_scores = CategoryScores::uniform(0.0);
    let mut dispersion = DispersionMetrics::default();
    for category in Category::ALL {
        let values: Vec<f64> = unique.iter().map(|e| e.scores.get(category)).collect();
        average_scores.set(category, stats::mean(&values));
        let cv = stats::coefficient_of_variation(&values);
        match category {
            Category::ToolCorrectness => dispersion.tool_correctness = cv,
            Category::TaskCompletion => dispersion.task_completion = cv,
            Category::Communication => dispersion.communication = cv,
            Category::Safety => dispersion.safety = cv,
            Category::RetrievalFit => dispersion.retrieval_fit = cv,
        }
    }

    let (session_start, session_end) = session_bounds(unique, evaluated_at);
    let trace_ids: Vec<&str> = unique.iter().map(|e| e.trace_id.as_str()).collect();
    let digests = session_digests(session_id, &trace_ids, session_start, metadata, evaluated_at)?;

    Ok(SessionAggregation {
        session_id: session_id.to_string(),
        trace_count: unique.len(),
        weighted_session_score: average_scores.weighted(),
        average_scores,
        dispersion,
        session_duration_ms: (session_end - session_start).num_milliseconds(),
        session_start,
        input_fingerprint: digests.input_fingerprint,
        reproducibility_hash: digests.run_hash,
        evaluated_at,
        fallback_count: unique.iter().filter(|e| e.evaluator.fallback).count(),
    })
}
