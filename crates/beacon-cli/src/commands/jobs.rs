//! Job commands.

use anyhow::{Context, Result};
use beacon_core::NewJob;
use chrono::{TimeDelta, Utc};
use tracing::warn;

use super::Settings;

/// Enqueue a job and print it.
pub async fn enqueue(
    settings: &Settings,
    job_type: &str,
    payload: &str,
    key: &str,
    max_attempts: Option<i32>,
    delay_secs: Option<u32>,
) -> Result<()> {
    let payload: serde_json::Value =
        serde_json::from_str(payload).context("Payload is not valid JSON")?;

    let pool = settings.connect().await?;
    let queue = settings.queue(&pool);
    if !settings.registry(&pool).is_registered(job_type) {
        warn!(
            job_type,
            "No handler registered; the job will fail when claimed"
        );
    }

    let now = Utc::now();
    let mut new_job = NewJob::new(job_type, payload)
        .with_idempotency_key(key)
        .with_max_attempts(max_attempts.unwrap_or(settings.config.retry.max_attempts));
    if let Some(secs) = delay_secs {
        new_job = new_job.with_scheduled_at(now + TimeDelta::seconds(i64::from(secs)));
    }

    let enqueued = queue
        .enqueue_job_at(new_job, now)
        .await
        .context("Failed to enqueue job")?;
    let job = enqueued.job();

    if enqueued.is_created() {
        println!("Enqueued job {}", job.id);
    } else {
        println!(
            "Job {} already enqueued with key {}",
            job.id, job.idempotency_key
        );
    }
    println!("  type: {}", job.job_type);
    println!("  status: {}", job.status);
    println!("  scheduled: {}", job.scheduled_at);
    Ok(())
}

/// Print the jobs referencing `check_codes` as a JSON document.
pub async fn list(settings: &Settings, check_codes: &[String]) -> Result<()> {
    let pool = settings.connect().await?;
    let queue = settings.queue(&pool);

    let listing = queue
        .list_for_checks(check_codes)
        .await
        .context("Failed to list jobs")?;
    println!("{}", serde_json::to_string_pretty(&listing)?);
    Ok(())
}
