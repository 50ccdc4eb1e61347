//! Worker commands.

use anyhow::{Context, Result};
use beacon_scheduler::{Worker, WorkerOptions};
use std::sync::Arc;
use tracing::{info, warn};

use super::Settings;

fn build_worker(settings: &Settings, pool: &sqlx::PgPool) -> Worker {
    let options = WorkerOptions::from_config(&settings.config.worker);
    let queue = settings.queue(pool);
    let registry = settings.registry(pool);
    info!(
        worker_id = %options.worker_id,
        job_types = ?registry.registered_types(),
        backoff_secs = queue.policy().backoff_base().as_secs(),
        "Worker configured"
    );
    Worker::with_options(Arc::new(queue), Arc::new(registry), options)
}

/// Process every eligible job once, then print how many were processed.
pub async fn process_jobs(settings: &Settings) -> Result<()> {
    let pool = settings.connect().await?;
    let worker = build_worker(settings, &pool);

    let report = worker.run_batch().await.context("Failed to process jobs")?;
    info!(
        worker_id = %worker.id(),
        succeeded = report.succeeded,
        retried = report.retried,
        failed = report.failed,
        "Batch complete"
    );
    println!("{}", report);
    Ok(())
}

/// Poll for jobs until Ctrl-C.
pub async fn work(settings: &Settings) -> Result<()> {
    let pool = settings.connect().await?;
    let worker = build_worker(settings, &pool);

    worker
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            info!("Shutdown requested");
        })
        .await;

    pool.close().await;
    Ok(())
}
