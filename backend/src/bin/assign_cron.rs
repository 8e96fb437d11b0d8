//! Assign Cron - scheduled batch assignment for Shift Assigner
//!
//! This binary runs as a daemon:
//! - run-batch: runs at startup and then on the ASSIGNER_CRON schedule
//!   (default every 30 minutes), filling open seats within the configured horizon
//!
//! Environment variables:
//!   DATABASE_URL  - PostgreSQL connection string (required)
//!   ASSIGNER_CRON - cron expression with seconds (optional)
//!   ASSIGNER_*    - engine overrides, see EngineConfig::from_env

use std::env;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_cron_scheduler::{Job, JobScheduler};

// Import from the library crate
use shift_assigner::config::EngineConfig;
use shift_assigner::db;
use shift_assigner::services::engine::AssignmentEngine;

const DEFAULT_SCHEDULE: &str = "0 */30 * * * *";

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = EngineConfig::from_env();

    // Initialize database pool
    let database_url = match env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            log::error!("DATABASE_URL environment variable is not set");
            std::process::exit(1);
        }
    };

    let pool = match db::init_pool(&database_url) {
        Ok(pool) => pool,
        Err(e) => {
            log::error!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };

    let schedule = env::var("ASSIGNER_CRON").unwrap_or_else(|_| DEFAULT_SCHEDULE.to_string());
    let engine = Arc::new(AssignmentEngine::new(pool, config));
    let in_flight = Arc::new(AtomicBool::new(false));

    log::info!("Starting Shift Assigner cron scheduler...");

    // Run initial batch at startup
    run_batch(engine.clone(), in_flight.clone()).await;

    // Create scheduler
    let sched = JobScheduler::new().await.expect("Failed to create scheduler");

    let engine_job = engine.clone();
    let in_flight_job = in_flight.clone();
    let batch_job = Job::new_async(schedule.as_str(), move |_uuid, _l| {
        let engine = engine_job.clone();
        let in_flight = in_flight_job.clone();
        Box::pin(async move {
            log::info!("Scheduled run-batch triggered");
            run_batch(engine, in_flight).await;
        })
    })
    .expect("Failed to create run-batch job");
    sched.add(batch_job).await.expect("Failed to add batch job");

    // Start the scheduler
    sched.start().await.expect("Failed to start scheduler");

    log::info!("Cron scheduler running. Jobs scheduled:");
    log::info!("  - run-batch: {}", schedule);

    // Keep the process running
    loop {
        tokio::time::sleep(tokio::time::Duration::from_secs(3600)).await;
    }
}

/// Run one batch on a blocking thread; a tick that fires while the previous
/// batch is still running is skipped.
async fn run_batch(engine: Arc<AssignmentEngine>, in_flight: Arc<AtomicBool>) {
    if in_flight.swap(true, Ordering::SeqCst) {
        log::warn!("Previous batch still running, skipping this tick");
        return;
    }

    let outcome = tokio::task::spawn_blocking(move || engine.run_batch(None, None)).await;
    in_flight.store(false, Ordering::SeqCst);

    let result = match outcome {
        Ok(result) => result,
        Err(e) => {
            log::error!("Batch task panicked: {}", e);
            return;
        }
    };

    if let Some(ref error) = result.error {
        log::error!("Batch failed to start: {}", error);
        return;
    }

    if result.processed == 0 {
        log::info!("Batch: no shifts in horizon");
    } else {
        log::info!(
            "Batch completed: {} shifts processed, {} successful, {} failed ({} ms)",
            result.processed,
            result.succeeded,
            result.failed,
            result.elapsed_ms
        );

        // Log details of failed shifts
        for shift in result.results.iter().filter(|r| !r.ok) {
            if let Some(ref error) = shift.error {
                log::error!("Shift {} failed: {}", shift.shift_id, error);
            }
        }
    }
}
