//! Job queue over a job store.

use beacon_core::{
    DEFAULT_MAX_ATTEMPTS, Job, JobId, JobListing, NewJob, Outcome, RetryPolicy, StatusChange,
};
use beacon_db::{Enqueued, JobStore};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};

use crate::SchedulerResult;

/// Enqueue, claim and completion operations for one job store.
#[derive(Clone)]
pub struct JobQueue {
    store: Arc<dyn JobStore>,
    policy: RetryPolicy,
    default_max_attempts: i32,
}

impl JobQueue {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self {
            store,
            policy: RetryPolicy::default(),
            default_max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Attempt ceiling used by [`JobQueue::enqueue`].
    pub fn with_default_max_attempts(mut self, max_attempts: i32) -> Self {
        self.default_max_attempts = max_attempts.max(1);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Enqueue a job. An empty `idempotency_key` always creates a new job;
    /// a non-empty key returns the existing job unchanged if there is one.
    pub async fn enqueue(
        &self,
        job_type: &str,
        payload: serde_json::Value,
        idempotency_key: &str,
    ) -> SchedulerResult<Job> {
        let new_job = NewJob::new(job_type, payload)
            .with_idempotency_key(idempotency_key)
            .with_max_attempts(self.default_max_attempts);
        self.enqueue_job(new_job).await
    }

    pub async fn enqueue_job(&self, new_job: NewJob) -> SchedulerResult<Job> {
        Ok(self.enqueue_job_at(new_job, Utc::now()).await?.into_job())
    }

    pub async fn enqueue_job_at(
        &self,
        new_job: NewJob,
        now: DateTime<Utc>,
    ) -> SchedulerResult<Enqueued> {
        let enqueued = self.store.enqueue(new_job, now).await?;
        let job = enqueued.job();
        if enqueued.is_created() {
            info!(job_id = %job.id, job_type = %job.job_type, "Enqueued job");
        } else {
            debug!(
                job_id = %job.id,
                idempotency_key = %job.idempotency_key,
                "Job already enqueued"
            );
        }
        Ok(enqueued)
    }

    /// Enqueue the alert for a check status change. Repeating the same
    /// change returns the job created the first time.
    pub async fn enqueue_status_change(&self, change: &StatusChange) -> SchedulerResult<Job> {
        let new_job = change
            .to_new_job()
            .with_max_attempts(self.default_max_attempts);
        self.enqueue_job(new_job).await
    }

    /// Claim the next eligible job, if any.
    pub async fn claim(&self) -> SchedulerResult<Option<Job>> {
        self.claim_at(Utc::now()).await
    }

    pub async fn claim_at(&self, now: DateTime<Utc>) -> SchedulerResult<Option<Job>> {
        Ok(self.store.claim(now).await?)
    }

    /// Record a handler outcome for a claimed job.
    pub async fn complete(&self, id: JobId, outcome: &Outcome) -> SchedulerResult<Job> {
        self.complete_at(id, outcome, Utc::now()).await
    }

    pub async fn complete_at(
        &self,
        id: JobId,
        outcome: &Outcome,
        now: DateTime<Utc>,
    ) -> SchedulerResult<Job> {
        Ok(self.store.complete(id, outcome, &self.policy, now).await?)
    }

    pub async fn get(&self, id: JobId) -> SchedulerResult<Job> {
        Ok(self.store.get(id).await?)
    }

    /// Read-only listing of the jobs referencing any of `check_codes`.
    pub async fn list_for_checks(&self, check_codes: &[String]) -> SchedulerResult<JobListing> {
        let jobs = self.store.list_for_checks(check_codes).await?;
        Ok(JobListing::new(&jobs))
    }

    pub async fn next_scheduled_at(&self) -> SchedulerResult<Option<DateTime<Utc>>> {
        Ok(self.store.next_scheduled_at().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::JobStatus;
    use beacon_db::MemoryJobStore;
    use serde_json::json;
    use uuid::Uuid;

    fn queue() -> (Arc<MemoryJobStore>, JobQueue) {
        let store = Arc::new(MemoryJobStore::new());
        (store.clone(), JobQueue::new(store))
    }

    #[tokio::test]
    async fn test_enqueue_same_key_twice_yields_one_pending_row() {
        let (store, queue) = queue();

        let first = queue
            .enqueue("send_alert", json!({"x": 1}), "k1")
            .await
            .unwrap();
        let second = queue
            .enqueue("send_alert", json!({"x": 2}), "k1")
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.payload, json!({"x": 1}));
        assert_eq!(second.status, JobStatus::Pending);
        assert_eq!(second.attempts, 0);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_distinct_or_empty_keys_create_distinct_rows() {
        let (store, queue) = queue();

        let a = queue
            .enqueue("send_alert", json!({}), "key-a")
            .await
            .unwrap();
        let b = queue
            .enqueue("send_alert", json!({}), "key-b")
            .await
            .unwrap();
        let c = queue.enqueue("send_alert", json!({}), "").await.unwrap();
        let d = queue.enqueue("send_alert", json!({}), "").await.unwrap();

        assert_ne!(a.id, b.id);
        assert_ne!(c.id, d.id);
        assert_eq!(store.len().await, 4);
    }

    #[tokio::test]
    async fn test_default_max_attempts_applies_to_enqueue() {
        let (_store, queue) = queue();
        let queue = queue.with_default_max_attempts(5);
        let job = queue.enqueue("send_alert", json!({}), "").await.unwrap();
        assert_eq!(job.max_attempts, 5);
    }

    #[tokio::test]
    async fn test_enqueue_status_change_is_idempotent() {
        let (store, queue) = queue();
        let change = StatusChange::new(Uuid::new_v4(), "down", Utc::now());

        let first = queue.enqueue_status_change(&change).await.unwrap();
        let again = queue.enqueue_status_change(&change).await.unwrap();
        assert_eq!(first.id, again.id);

        let up = StatusChange::new(change.check_code, "up", change.at);
        let other = queue.enqueue_status_change(&up).await.unwrap();
        assert_ne!(first.id, other.id);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_claim_transitions_to_processing() {
        let (_store, queue) = queue();
        let job = queue.enqueue("send_alert", json!({}), "").await.unwrap();

        let claimed = queue.claim().await.unwrap().unwrap();
        assert_eq!(claimed.id, job.id);
        assert_eq!(claimed.status, JobStatus::Processing);
        let stored = queue.get(job.id).await.unwrap();
        assert_eq!(stored.status, JobStatus::Processing);

        assert!(queue.claim().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_listing_is_scoped_to_checks() {
        let (_store, queue) = queue();
        let mine = Uuid::new_v4().to_string();
        let theirs = Uuid::new_v4().to_string();
        for code in [&mine, &theirs] {
            let payload = json!({"check_code": code, "new_status": "down"});
            queue.enqueue("send_alert", payload, "").await.unwrap();
        }

        let listing = queue.list_for_checks(&[mine.clone()]).await.unwrap();
        assert_eq!(listing.jobs.len(), 1);
        assert_eq!(listing.jobs[0].payload["new_status"], json!("down"));

        let empty = queue.list_for_checks(&[]).await.unwrap();
        assert!(empty.jobs.is_empty());
    }
}
