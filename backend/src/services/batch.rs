use crate::services::pipeline::{AssignmentPipeline, AssignmentResult};
use crate::services::store::AssignmentStore;
use crate::services::tracer::Tracer;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use log::{error, info};
use serde::Serialize;
use std::time::Instant;

#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub ok: bool,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<AssignmentResult>,
    pub elapsed_ms: u64,
    pub error: Option<String>,
}

impl BatchResult {
    pub fn failed_to_start(message: String, started: Instant) -> Self {
        Self {
            ok: false,
            processed: 0,
            succeeded: 0,
            failed: 0,
            results: Vec::new(),
            elapsed_ms: started.elapsed().as_millis() as u64,
            error: Some(message),
        }
    }
}

/// Assign every shift dated within `[today, today + days_ahead]`, at most
/// `limit` of them, one after the other. A failed shift is recorded and the
/// batch moves on.
#[allow(clippy::too_many_arguments)]
pub fn run_batch<S, T>(
    pipeline: &AssignmentPipeline,
    store: &mut S,
    today: NaiveDate,
    days_ahead: i64,
    limit: i64,
    now: NaiveDateTime,
    mut new_tracer: impl FnMut(i32) -> T,
) -> BatchResult
where
    S: AssignmentStore,
    T: Tracer,
{
    let started = Instant::now();
    let until = today + Duration::days(days_ahead.max(0));

    let shift_ids = match store.shifts_in_horizon(today, until, limit.max(0)) {
        Ok(ids) => ids,
        Err(e) => {
            error!("Batch could not list shifts: {}", e);
            return BatchResult::failed_to_start(e.to_string(), started);
        }
    };
    info!(
        "Batch: {} shift(s) between {} and {}",
        shift_ids.len(),
        today,
        until
    );

    let results: Vec<AssignmentResult> = shift_ids
        .into_iter()
        .map(|shift_id| {
            let mut tracer = new_tracer(shift_id);
            pipeline.assign(store, shift_id, &mut tracer, now)
        })
        .collect();

    summarize(results, started)
}

pub fn summarize(results: Vec<AssignmentResult>, started: Instant) -> BatchResult {
    let succeeded = results.iter().filter(|r| r.ok).count();
    BatchResult {
        ok: true,
        processed: results.len(),
        succeeded,
        failed: results.len() - succeeded,
        results,
        elapsed_ms: started.elapsed().as_millis() as u64,
        error: None,
    }
}
