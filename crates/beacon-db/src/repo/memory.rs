//! In-memory job store for tests and local development.
//!
//! All state sits behind a single async mutex, which serializes claims the
//! same way row locks do in PostgreSQL: the holder of the lock is the only
//! writer, so a job can be handed to at most one caller.

use async_trait::async_trait;
use beacon_core::{Job, JobId, JobStatus, NewJob, Outcome, RetryPolicy};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::job::{Enqueued, JobStore};
use crate::{DbError, DbResult};

#[derive(Debug, Default)]
struct State {
    jobs: HashMap<JobId, Job>,
    by_key: HashMap<String, JobId>,
}

impl State {
    fn insert(&mut self, job: Job) {
        if !job.idempotency_key.is_empty() {
            self.by_key.insert(job.idempotency_key.clone(), job.id);
        }
        self.jobs.insert(job.id, job);
    }
}

/// Job store held entirely in memory. Data is lost on drop.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    state: Mutex<State>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record as-is, bypassing enqueue defaults.
    pub async fn seed(&self, job: Job) {
        self.state.lock().await.insert(job);
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.jobs.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Snapshot of every stored job in claim order.
    pub async fn all(&self) -> Vec<Job> {
        let state = self.state.lock().await;
        let mut jobs: Vec<Job> = state.jobs.values().cloned().collect();
        sort_for_claim(&mut jobs);
        jobs
    }
}

fn sort_for_claim(jobs: &mut [Job]) {
    jobs.sort_by_key(|job| (job.scheduled_at, job.created, job.id));
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn enqueue(&self, new_job: NewJob, now: DateTime<Utc>) -> DbResult<Enqueued> {
        let mut state = self.state.lock().await;

        if !new_job.idempotency_key.is_empty() {
            if let Some(id) = state.by_key.get(&new_job.idempotency_key) {
                let existing = state.jobs.get(id).cloned().ok_or_else(|| {
                    DbError::Corrupt(format!(
                        "dangling idempotency key {}",
                        new_job.idempotency_key
                    ))
                })?;
                return Ok(Enqueued::Existing(existing));
            }
        }

        let job = new_job.into_job(now);
        state.insert(job.clone());
        Ok(Enqueued::Created(job))
    }

    async fn claim(&self, now: DateTime<Utc>) -> DbResult<Option<Job>> {
        let mut state = self.state.lock().await;

        let next = state
            .jobs
            .values()
            .filter(|job| job.is_eligible(now))
            .min_by_key(|job| (job.scheduled_at, job.created, job.id))
            .map(|job| job.id);

        let Some(id) = next else {
            return Ok(None);
        };

        let job = state
            .jobs
            .get_mut(&id)
            .ok_or_else(|| DbError::NotFound(format!("job {}", id)))?;
        job.claim(now);
        Ok(Some(job.clone()))
    }

    async fn complete(
        &self,
        id: JobId,
        outcome: &Outcome,
        policy: &RetryPolicy,
        now: DateTime<Utc>,
    ) -> DbResult<Job> {
        let mut state = self.state.lock().await;
        let job = state
            .jobs
            .get_mut(&id)
            .ok_or_else(|| DbError::NotFound(format!("job {}", id)))?;

        if let Some(transition) = policy.transition(job, outcome, now) {
            job.apply(transition);
        }
        Ok(job.clone())
    }

    async fn get(&self, id: JobId) -> DbResult<Job> {
        self.state
            .lock()
            .await
            .jobs
            .get(&id)
            .cloned()
            .ok_or_else(|| DbError::NotFound(format!("job {}", id)))
    }

    async fn list_for_checks(&self, check_codes: &[String]) -> DbResult<Vec<Job>> {
        let state = self.state.lock().await;
        let mut jobs: Vec<Job> = state
            .jobs
            .values()
            .filter(|job| {
                job.payload
                    .get("check_code")
                    .and_then(|code| code.as_str())
                    .is_some_and(|code| check_codes.iter().any(|c| c == code))
            })
            .cloned()
            .collect();
        sort_for_claim(&mut jobs);
        Ok(jobs)
    }

    async fn next_scheduled_at(&self) -> DbResult<Option<DateTime<Utc>>> {
        let state = self.state.lock().await;
        Ok(state
            .jobs
            .values()
            .filter(|job| job.status == JobStatus::Pending)
            .map(|job| job.scheduled_at)
            .min())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_enqueue_same_key_returns_existing_row() {
        let store = MemoryJobStore::new();
        let now = Utc::now();

        let first = store
            .enqueue(
                NewJob::new("send_alert", json!({"original": true})).with_idempotency_key("k1"),
                now,
            )
            .await
            .unwrap();
        let second = store
            .enqueue(
                NewJob::new("send_alert", json!({"original": false})).with_idempotency_key("k1"),
                now + Duration::seconds(5),
            )
            .await
            .unwrap();

        assert!(first.is_created());
        assert!(!second.is_created());
        assert_eq!(first.job(), second.job());
        assert_eq!(second.job().payload, json!({"original": true}));
        assert_eq!(second.job().scheduled_at, now);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_enqueue_without_key_always_inserts() {
        let store = MemoryJobStore::new();
        let now = Utc::now();
        let new_job = NewJob::new("send_alert", json!({"x": 1}));
        let a = store.enqueue(new_job.clone(), now).await.unwrap();
        let b = store.enqueue(new_job, now).await.unwrap();

        assert!(a.is_created() && b.is_created());
        assert_ne!(a.job().id, b.job().id);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_concurrent_enqueue_same_key_stores_one_row() {
        let store = Arc::new(MemoryJobStore::new());
        let now = Utc::now();

        let calls = (0..16).map(|i| {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .enqueue(
                        NewJob::new("send_alert", json!({ "n": i })).with_idempotency_key("race"),
                        now,
                    )
                    .await
                    .unwrap()
            })
        });
        let results = futures::future::try_join_all(calls).await.unwrap();

        assert_eq!(results.iter().filter(|r| r.is_created()).count(), 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_claim_is_fifo_by_schedule_then_creation() {
        let store = MemoryJobStore::new();
        let t0 = Utc::now();

        let later = store
            .enqueue(
                NewJob::new("a", json!({})).with_scheduled_at(t0 + Duration::minutes(2)),
                t0,
            )
            .await
            .unwrap()
            .into_job();
        let first = store
            .enqueue(NewJob::new("b", json!({})), t0)
            .await
            .unwrap()
            .into_job();
        let second = store
            .enqueue(NewJob::new("c", json!({})), t0 + Duration::seconds(1))
            .await
            .unwrap()
            .into_job();

        let now = t0 + Duration::minutes(5);
        let order: Vec<JobId> = [
            store.claim(now).await.unwrap().unwrap().id,
            store.claim(now).await.unwrap().unwrap().id,
            store.claim(now).await.unwrap().unwrap().id,
        ]
        .into();

        assert_eq!(order, vec![first.id, second.id, later.id]);
        assert!(store.claim(now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_claim_skips_future_and_non_pending_jobs() {
        let store = MemoryJobStore::new();
        let now = Utc::now();

        let future = store
            .enqueue(
                NewJob::new("send_alert", json!({})).with_scheduled_at(now + Duration::hours(1)),
                now,
            )
            .await
            .unwrap()
            .into_job();

        for status in [JobStatus::Processing, JobStatus::Done, JobStatus::Failed] {
            let mut job = NewJob::new("send_alert", json!({})).into_job(now);
            job.status = status;
            job.attempts = 1;
            store.seed(job).await;
        }

        assert!(store.claim(now).await.unwrap().is_none());
        let untouched = store.get(future.id).await.unwrap();
        assert_eq!(untouched.status, JobStatus::Pending);
        assert_eq!(untouched.attempts, 0);
    }

    #[tokio::test]
    async fn test_concurrent_claims_never_share_a_job() {
        let store = Arc::new(MemoryJobStore::new());
        let now = Utc::now();
        for _ in 0..10 {
            store
                .enqueue(NewJob::new("send_alert", json!({})), now)
                .await
                .unwrap();
        }

        let claims = (0..25).map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.claim(now).await.unwrap() })
        });
        let claimed: Vec<Job> = futures::future::try_join_all(claims)
            .await
            .unwrap()
            .into_iter()
            .flatten()
            .collect();

        assert_eq!(claimed.len(), 10);
        let mut ids: Vec<JobId> = claimed.iter().map(|j| j.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 10);
        let jobs = store.all().await;
        assert!(jobs.iter().all(|j| j.status == JobStatus::Processing));
    }

    #[tokio::test]
    async fn test_complete_leaves_terminal_jobs_untouched() {
        let store = MemoryJobStore::new();
        let now = Utc::now();
        let mut job = NewJob::new("send_alert", json!({})).into_job(now);
        job.status = JobStatus::Done;
        job.attempts = 1;
        job.completed_at = Some(now);
        store.seed(job.clone()).await;

        let policy = RetryPolicy::default();
        let later = now + Duration::hours(1);
        let after = store
            .complete(job.id, &Outcome::failure("late"), &policy, later)
            .await
            .unwrap();
        assert_eq!(after, job);
    }

    #[tokio::test]
    async fn test_complete_unknown_job_is_not_found() {
        let store = MemoryJobStore::new();
        let policy = RetryPolicy::default();
        let result = store
            .complete(JobId::new(), &Outcome::Success, &policy, Utc::now())
            .await;
        assert!(matches!(result, Err(DbError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_for_checks_filters_and_orders() {
        let store = MemoryJobStore::new();
        let now = Utc::now();

        let late = store
            .enqueue(
                NewJob::new("send_alert", json!({"check_code": "a"}))
                    .with_scheduled_at(now + Duration::hours(2)),
                now,
            )
            .await
            .unwrap()
            .into_job();
        let early = store
            .enqueue(NewJob::new("send_alert", json!({"check_code": "b"})), now)
            .await
            .unwrap()
            .into_job();
        store
            .enqueue(
                NewJob::new("send_alert", json!({"check_code": "other"})),
                now,
            )
            .await
            .unwrap();
        store
            .enqueue(NewJob::new("send_alert", json!({})), now)
            .await
            .unwrap();

        let listed = store
            .list_for_checks(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        let ids: Vec<JobId> = listed.iter().map(|j| j.id).collect();
        assert_eq!(ids, vec![early.id, late.id]);

        assert!(store.list_for_checks(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_for_checks_ignores_non_string_codes() {
        let store = MemoryJobStore::new();
        let now = Utc::now();
        let text = store
            .enqueue(NewJob::new("send_alert", json!({"check_code": "42"})), now)
            .await
            .unwrap()
            .into_job();
        store
            .enqueue(NewJob::new("send_alert", json!({"check_code": 42})), now)
            .await
            .unwrap();

        let listed = store.list_for_checks(&["42".to_string()]).await.unwrap();
        let ids: Vec<JobId> = listed.iter().map(|j| j.id).collect();
        assert_eq!(ids, vec![text.id]);
    }

    #[tokio::test]
    async fn test_next_scheduled_at() {
        let store = MemoryJobStore::new();
        let now = Utc::now();
        assert!(store.next_scheduled_at().await.unwrap().is_none());

        store
            .enqueue(
                NewJob::new("x", json!({})).with_scheduled_at(now + Duration::minutes(3)),
                now,
            )
            .await
            .unwrap();
        store
            .enqueue(
                NewJob::new("x", json!({})).with_scheduled_at(now + Duration::minutes(1)),
                now,
            )
            .await
            .unwrap();

        assert_eq!(
            store.next_scheduled_at().await.unwrap(),
            Some(now + Duration::minutes(1))
        );
    }
}
