//! Job store.
//!
//! The job table is the only coordination point between workers. Claims
//! use a locking read that skips rows held by other transactions, so two
//! workers never receive the same job and never wait on each other.

use async_trait::async_trait;
use beacon_core::{Job, JobId, JobStatus, NewJob, Outcome, RetryPolicy};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::debug;

use crate::{DbError, DbResult};

/// Result of an enqueue: either a fresh row or the row already holding
/// the idempotency key.
#[derive(Debug, Clone, PartialEq)]
pub enum Enqueued {
    Created(Job),
    Existing(Job),
}

impl Enqueued {
    pub fn job(&self) -> &Job {
        match self {
            Enqueued::Created(job) | Enqueued::Existing(job) => job,
        }
    }

    pub fn into_job(self) -> Job {
        match self {
            Enqueued::Created(job) | Enqueued::Existing(job) => job,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Enqueued::Created(_))
    }
}

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a pending job, or return the existing row when the job's
    /// idempotency key is already taken. Never races: concurrent calls with
    /// the same key yield one row.
    async fn enqueue(&self, new_job: NewJob, now: DateTime<Utc>) -> DbResult<Enqueued>;

    /// Atomically take the oldest eligible job and mark it processing.
    async fn claim(&self, now: DateTime<Utc>) -> DbResult<Option<Job>>;

    /// Record the outcome of a claimed job. Re-reads the row; a job that is
    /// not processing is returned unchanged.
    async fn complete(
        &self,
        id: JobId,
        outcome: &Outcome,
        policy: &RetryPolicy,
        now: DateTime<Utc>,
    ) -> DbResult<Job>;

    async fn get(&self, id: JobId) -> DbResult<Job>;

    /// Jobs whose payload references one of `check_codes`, ordered by
    /// `(scheduled_at, created)`.
    async fn list_for_checks(&self, check_codes: &[String]) -> DbResult<Vec<Job>>;

    /// Earliest `scheduled_at` among pending jobs.
    async fn next_scheduled_at(&self) -> DbResult<Option<DateTime<Utc>>>;
}

/// A job row in the database.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct JobRecord {
    pub id: uuid::Uuid,
    pub job_type: String,
    pub payload: serde_json::Value,
    pub status: String,
    pub attempts: i32,
    pub max_attempts: i32,
    pub idempotency_key: String,
    pub created: DateTime<Utc>,
    pub scheduled_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: String,
}

impl TryFrom<JobRecord> for Job {
    type Error = DbError;

    fn try_from(record: JobRecord) -> DbResult<Self> {
        let status: JobStatus = record
            .status
            .parse()
            .map_err(|e| DbError::Corrupt(format!("job {}: {}", record.id, e)))?;

        Ok(Job {
            id: JobId::from_uuid(record.id),
            job_type: record.job_type,
            payload: record.payload,
            status,
            attempts: record.attempts,
            max_attempts: record.max_attempts,
            idempotency_key: record.idempotency_key,
            created: record.created,
            scheduled_at: record.scheduled_at,
            started_at: record.started_at,
            completed_at: record.completed_at,
            error: record.error,
        })
    }
}

const JOB_COLUMNS: &str = "id, job_type, payload, status, attempts, max_attempts, idempotency_key, \
                           created, scheduled_at, started_at, completed_at, error";

/// PostgreSQL implementation of JobStore.
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_by_idempotency_key(&self, key: &str) -> DbResult<Option<Job>> {
        let record = sqlx::query_as::<_, JobRecord>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE idempotency_key = $1"
        ))
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        record.map(Job::try_from).transpose()
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn enqueue(&self, new_job: NewJob, now: DateTime<Utc>) -> DbResult<Enqueued> {
        let job = new_job.into_job(now);

        // The partial unique index only covers non-empty keys, so keyless
        // jobs always insert.
        let inserted = sqlx::query_as::<_, JobRecord>(&format!(
            r#"
            INSERT INTO jobs (id, job_type, payload, status, attempts, max_attempts,
                              idempotency_key, created, scheduled_at, error)
            VALUES ($1, $2, $3, 'pending', 0, $4, $5, $6, $7, '')
            ON CONFLICT (idempotency_key) WHERE idempotency_key <> '' DO NOTHING
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(job.id.as_uuid())
        .bind(&job.job_type)
        .bind(&job.payload)
        .bind(job.max_attempts)
        .bind(&job.idempotency_key)
        .bind(job.created)
        .bind(job.scheduled_at)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(record) = inserted {
            return Ok(Enqueued::Created(record.try_into()?));
        }

        debug!(idempotency_key = %job.idempotency_key, "Idempotency key already enqueued");
        let existing = self
            .find_by_idempotency_key(&job.idempotency_key)
            .await?
            .ok_or_else(|| {
                DbError::NotFound(format!("job with idempotency key {}", job.idempotency_key))
            })?;
        Ok(Enqueued::Existing(existing))
    }

    async fn claim(&self, now: DateTime<Utc>) -> DbResult<Option<Job>> {
        let mut tx = self.pool.begin().await?;

        let candidate = sqlx::query_scalar::<_, uuid::Uuid>(
            r#"
            SELECT id FROM jobs
            WHERE status = 'pending' AND scheduled_at <= $1
            ORDER BY scheduled_at ASC, created ASC
            LIMIT 1
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(id) = candidate else {
            tx.commit().await?;
            return Ok(None);
        };

        let record = sqlx::query_as::<_, JobRecord>(&format!(
            r#"
            UPDATE jobs
            SET status = 'processing', started_at = $2, attempts = attempts + 1
            WHERE id = $1
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(record.try_into()?))
    }

    async fn complete(
        &self,
        id: JobId,
        outcome: &Outcome,
        policy: &RetryPolicy,
        now: DateTime<Utc>,
    ) -> DbResult<Job> {
        let mut tx = self.pool.begin().await?;

        let record = sqlx::query_as::<_, JobRecord>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::NotFound(format!("job {}", id)))?;
        let mut job = Job::try_from(record)?;

        let Some(transition) = policy.transition(&job, outcome, now) else {
            tx.commit().await?;
            return Ok(job);
        };
        job.apply(transition);

        let record = sqlx::query_as::<_, JobRecord>(&format!(
            r#"
            UPDATE jobs
            SET status = $2, scheduled_at = $3, completed_at = $4, error = $5
            WHERE id = $1
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .bind(job.status.as_str())
        .bind(job.scheduled_at)
        .bind(job.completed_at)
        .bind(&job.error)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        record.try_into()
    }

    async fn get(&self, id: JobId) -> DbResult<Job> {
        let record = sqlx::query_as::<_, JobRecord>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::NotFound(format!("job {}", id)))?;
        record.try_into()
    }

    async fn list_for_checks(&self, check_codes: &[String]) -> DbResult<Vec<Job>> {
        if check_codes.is_empty() {
            return Ok(Vec::new());
        }

        let records = sqlx::query_as::<_, JobRecord>(&format!(
            r#"
            SELECT {JOB_COLUMNS} FROM jobs
            WHERE jsonb_typeof(payload -> 'check_code') = 'string'
              AND payload ->> 'check_code' = ANY($1)
            ORDER BY scheduled_at ASC, created ASC
            "#
        ))
        .bind(check_codes)
        .fetch_all(&self.pool)
        .await?;
        records.into_iter().map(Job::try_from).collect()
    }

    async fn next_scheduled_at(&self) -> DbResult<Option<DateTime<Utc>>> {
        let next = sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
            "SELECT MIN(scheduled_at) FROM jobs WHERE status = 'pending'",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(next)
    }
}
