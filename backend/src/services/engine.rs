use crate::{
    config::EngineConfig,
    db::DbPool,
    error::{AssignError, AssignResult},
    services::{
        batch::{self, BatchResult},
        pipeline::{AssignmentPipeline, AssignmentResult},
        schema_probe::{SchemaCapabilities, SchemaProbe},
        store::PgAssignmentStore,
        tracer::RunTracer,
        validation::{self, ShiftIssue},
    },
};
use log::{info, warn};
use std::time::Instant;

/// Entry point used by the HTTP service and the cron runner.
pub struct AssignmentEngine {
    pool: DbPool,
    config: EngineConfig,
    capabilities: SchemaCapabilities,
    pipeline: AssignmentPipeline,
}

impl AssignmentEngine {
    /// Probes the optional schema pieces once; if no connection is available
    /// every optional feature is switched off.
    pub fn new(pool: DbPool, config: EngineConfig) -> Self {
        let probe = SchemaProbe::new();
        let capabilities = match pool.get() {
            Ok(mut conn) => SchemaCapabilities::resolve(&probe, &mut conn),
            Err(e) => {
                warn!("Schema probe skipped, no connection: {}", e);
                SchemaCapabilities::none()
            }
        };
        info!(
            "Schema capabilities: {:?} ({} catalog lookups cached)",
            capabilities,
            probe.cached_entries()
        );
        Self::with_capabilities(pool, config, capabilities)
    }

    pub fn with_capabilities(
        pool: DbPool,
        config: EngineConfig,
        capabilities: SchemaCapabilities,
    ) -> Self {
        let pipeline = AssignmentPipeline::from_config(&config);
        Self {
            pool,
            config,
            capabilities,
            pipeline,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn capabilities(&self) -> SchemaCapabilities {
        self.capabilities
    }

    fn tracer(&self, shift_id: i32) -> RunTracer {
        RunTracer::new(&self.config.trace_dir, self.config.timezone).for_shift(shift_id)
    }

    /// Fill the open seats of one shift in its own transaction.
    pub fn assign_shift(&self, shift_id: i32) -> AssignmentResult {
        let mut tracer = self.tracer(shift_id);
        let mut conn = match self.pool.get() {
            Ok(c) => c,
            Err(e) => return AssignmentResult::aborted(shift_id, &AssignError::from(e), &mut tracer),
        };
        let mut store = PgAssignmentStore::new(&mut conn, self.capabilities);
        self.pipeline
            .assign(&mut store, shift_id, &mut tracer, self.config.local_now())
    }

    /// Run the batch over `[today, today + days_ahead]`; missing arguments fall
    /// back to `batch_days_ahead` and `max_assign_per_run`.
    pub fn run_batch(&self, days_ahead: Option<i64>, limit: Option<i64>) -> BatchResult {
        let started = Instant::now();
        let days_ahead = days_ahead.unwrap_or(self.config.batch_days_ahead);
        let limit = limit.unwrap_or(self.config.max_assign_per_run);

        let mut conn = match self.pool.get() {
            Ok(c) => c,
            Err(e) => {
                warn!("Batch aborted, no connection: {}", e);
                return BatchResult::failed_to_start(AssignError::from(e).to_string(), started);
            }
        };
        let mut store = PgAssignmentStore::new(&mut conn, self.capabilities);
        let now = self.config.local_now();

        let result = batch::run_batch(
            &self.pipeline,
            &mut store,
            self.config.today(),
            days_ahead,
            limit,
            now,
            |shift_id| self.tracer(shift_id),
        );
        info!(
            "Batch finished: {} processed, {} succeeded, {} failed in {} ms",
            result.processed, result.succeeded, result.failed, result.elapsed_ms
        );
        result
    }

    pub fn validate_shift(&self, shift_id: i32) -> AssignResult<Vec<ShiftIssue>> {
        let mut conn = self.pool.get()?;
        let mut store = PgAssignmentStore::new(&mut conn, self.capabilities);
        validation::validate_shift(&mut store, shift_id)
    }
}
