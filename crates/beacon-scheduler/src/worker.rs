//! Worker that processes jobs from the queue.
//!
//! A worker repeatedly claims the next eligible job, runs its handler
//! outside of any lock, and records the outcome in a second unit of work.
//! Handler failures are written to the job and never stop the loop; storage
//! errors abort the current batch.

use beacon_core::{Job, JobStatus, Outcome};
use chrono::{DateTime, Utc};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::SchedulerResult;
use crate::queue::JobQueue;
use crate::registry::HandlerRegistry;

/// Worker settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerOptions {
    /// Name used in logs.
    pub worker_id: String,
    /// Longest sleep between batches in continuous mode.
    pub poll_interval: Duration,
    /// Stop a batch after this many jobs.
    pub batch_limit: Option<usize>,
    /// Sleep after a failed batch.
    pub error_backoff: Duration,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            worker_id: format!("worker-{}", Uuid::new_v4()),
            poll_interval: Duration::from_secs(30),
            batch_limit: None,
            error_backoff: Duration::from_secs(5),
        }
    }
}

impl WorkerOptions {
    pub fn with_worker_id(worker_id: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            ..Default::default()
        }
    }

    pub fn from_config(settings: &beacon_config::WorkerSettings) -> Self {
        let defaults = Self::default();
        Self {
            worker_id: settings.id.clone().unwrap_or(defaults.worker_id),
            poll_interval: settings.poll_interval,
            batch_limit: settings.batch_limit,
            error_backoff: defaults.error_backoff,
        }
    }
}

/// Summary of one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub processed: usize,
    pub succeeded: usize,
    pub retried: usize,
    pub failed: usize,
}

impl BatchReport {
    fn record(&mut self, job: &Job) {
        self.processed += 1;
        match job.status {
            JobStatus::Done => self.succeeded += 1,
            JobStatus::Pending => self.retried += 1,
            JobStatus::Failed => self.failed += 1,
            JobStatus::Processing => {}
        }
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Processed {} job(s).", self.processed)
    }
}

/// A worker that claims and executes jobs.
pub struct Worker {
    options: WorkerOptions,
    queue: Arc<JobQueue>,
    registry: Arc<HandlerRegistry>,
}

impl Worker {
    pub fn new(queue: Arc<JobQueue>, registry: Arc<HandlerRegistry>) -> Self {
        Self::with_options(queue, registry, WorkerOptions::default())
    }

    pub fn with_options(
        queue: Arc<JobQueue>,
        registry: Arc<HandlerRegistry>,
        options: WorkerOptions,
    ) -> Self {
        Self {
            options,
            queue,
            registry,
        }
    }

    pub fn id(&self) -> &str {
        &self.options.worker_id
    }

    /// Claim, execute and complete a single job. Returns the job as left by
    /// the completion step, or `None` when nothing is eligible.
    pub async fn process_next(&self) -> SchedulerResult<Option<Job>> {
        self.process_next_with(&Utc::now).await
    }

    /// Process jobs until none is eligible (or the batch limit is hit).
    pub async fn run_batch(&self) -> SchedulerResult<BatchReport> {
        self.run_batch_with(&Utc::now).await
    }

    /// Like [`Worker::run_batch`], with every claim and completion stamped `now`.
    pub async fn run_batch_at(&self, now: DateTime<Utc>) -> SchedulerResult<BatchReport> {
        self.run_batch_with(&move || now).await
    }

    async fn run_batch_with(
        &self,
        clock: &(dyn Fn() -> DateTime<Utc> + Sync),
    ) -> SchedulerResult<BatchReport> {
        let mut report = BatchReport::default();

        while self
            .options
            .batch_limit
            .is_none_or(|limit| report.processed < limit)
        {
            match self.process_next_with(clock).await? {
                Some(job) => report.record(&job),
                None => break,
            }
        }

        Ok(report)
    }

    async fn process_next_with(
        &self,
        clock: &(dyn Fn() -> DateTime<Utc> + Sync),
    ) -> SchedulerResult<Option<Job>> {
        let Some(job) = self.queue.claim_at(clock()).await? else {
            return Ok(None);
        };
        info!(
            worker_id = %self.options.worker_id,
            job_id = %job.id,
            job_type = %job.job_type,
            attempt = job.attempts,
            "Claimed job"
        );

        let outcome = match self.registry.execute(&job).await {
            Ok(()) => Outcome::Success,
            Err(e) => {
                warn!(
                    job_id = %job.id,
                    job_type = %job.job_type,
                    error = %e,
                    "Job handler failed"
                );
                Outcome::Failure(e.to_string())
            }
        };

        let completed = self.queue.complete_at(job.id, &outcome, clock()).await?;
        match completed.status {
            JobStatus::Done => info!(job_id = %completed.id, "Job done"),
            JobStatus::Pending => warn!(
                job_id = %completed.id,
                attempts = completed.attempts,
                retry_at = %completed.scheduled_at,
                "Job scheduled for retry"
            ),
            JobStatus::Failed => error!(
                job_id = %completed.id,
                attempts = completed.attempts,
                error = %completed.error,
                "Job failed permanently"
            ),
            JobStatus::Processing => {
                warn!(job_id = %completed.id, "Job still processing after completion")
            }
        }

        Ok(Some(completed))
    }

    /// Run batches until `shutdown` resolves, sleeping between them.
    ///
    /// A batch in progress is finished before shutdown is observed.
    pub async fn run(&self, shutdown: impl Future<Output = ()>) {
        info!(worker_id = %self.options.worker_id, "Starting worker");
        tokio::pin!(shutdown);

        loop {
            let delay = match self.run_batch().await {
                Ok(report) => {
                    if report.processed > 0 {
                        info!(
                            worker_id = %self.options.worker_id,
                            processed = report.processed,
                            succeeded = report.succeeded,
                            retried = report.retried,
                            failed = report.failed,
                            "Batch finished"
                        );
                    }
                    self.idle_delay().await
                }
                Err(e) => {
                    error!(worker_id = %self.options.worker_id, error = %e, "Batch failed");
                    self.options.error_backoff
                }
            };

            tokio::select! {
                _ = &mut shutdown => break,
                _ = sleep(delay) => {}
            }
        }

        info!(worker_id = %self.options.worker_id, "Worker stopped");
    }

    /// Sleep until the next scheduled job, capped at the poll interval.
    async fn idle_delay(&self) -> Duration {
        match self.queue.next_scheduled_at().await {
            Ok(Some(next)) => (next - Utc::now())
                .to_std()
                .unwrap_or(Duration::ZERO)
                .min(self.options.poll_interval),
            Ok(None) => self.options.poll_interval,
            Err(e) => {
                warn!(error = %e, "Failed to read next scheduled job");
                self.options.poll_interval
            }
        }
    }
}
