//! Job records and their lifecycle.
//!
//! A job moves through a small state machine:
//!
//! ```text
//! pending --claim--> processing --success--> done
//! processing --failure, attempts < max--> pending (scheduled_at pushed back)
//! processing --failure, attempts >= max--> failed
//! ```
//!
//! `done` and `failed` are terminal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::retry::Transition;
use crate::{Error, JobId};

/// Attempt ceiling used when the caller does not pick one.
pub const DEFAULT_MAX_ATTEMPTS: i32 = 3;

/// Status of a job in the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Waiting to be claimed once `scheduled_at` has passed.
    #[default]
    Pending,
    /// Held by exactly one worker.
    Processing,
    /// Executed successfully.
    Done,
    /// Attempts exhausted.
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "done" => Ok(JobStatus::Done),
            "failed" => Ok(JobStatus::Failed),
            other => Err(Error::InvalidStatus(other.to_string())),
        }
    }
}

/// A job record as stored in the job table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    /// Selects the handler; opaque to the queue.
    pub job_type: String,
    /// Passed verbatim to the handler.
    pub payload: serde_json::Value,
    pub status: JobStatus,
    /// Number of claims so far.
    pub attempts: i32,
    pub max_attempts: i32,
    /// Empty when the job was enqueued without deduplication.
    pub idempotency_key: String,
    pub created: DateTime<Utc>,
    /// Earliest time the job may be claimed.
    pub scheduled_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Last failure description.
    pub error: String,
}

impl Job {
    /// Whether a claim at `now` may pick this job.
    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        self.status == JobStatus::Pending && self.scheduled_at <= now
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Mark the job as claimed at `now`.
    ///
    /// Only pending jobs can be claimed; anything else is left untouched
    /// and `false` is returned.
    pub fn claim(&mut self, now: DateTime<Utc>) -> bool {
        if self.status != JobStatus::Pending {
            return false;
        }
        self.status = JobStatus::Processing;
        self.started_at = Some(now);
        self.attempts += 1;
        true
    }

    /// Apply a completion transition computed by the retry policy.
    pub fn apply(&mut self, transition: Transition) {
        self.status = transition.status();
        match transition {
            Transition::Done { completed_at } => {
                self.completed_at = Some(completed_at);
            }
            Transition::Retry {
                scheduled_at,
                error,
            } => {
                self.scheduled_at = scheduled_at;
                self.error = error;
            }
            Transition::Failed {
                completed_at,
                error,
            } => {
                self.completed_at = Some(completed_at);
                self.error = error;
            }
        }
    }
}

/// Parameters for creating a job.
#[derive(Debug, Clone, PartialEq)]
pub struct NewJob {
    pub job_type: String,
    pub payload: serde_json::Value,
    pub idempotency_key: String,
    pub max_attempts: i32,
    /// Requested first eligibility; `None` means immediately.
    pub scheduled_at: Option<DateTime<Utc>>,
}

impl NewJob {
    pub fn new(job_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            job_type: job_type.into(),
            payload,
            idempotency_key: String::new(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            scheduled_at: None,
        }
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = key.into();
        self
    }

    /// Set the attempt ceiling. Values below 1 are raised to 1.
    pub fn with_max_attempts(mut self, max_attempts: i32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_scheduled_at(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_at = Some(at);
        self
    }

    /// Build the pending record created at `now`.
    ///
    /// A requested schedule earlier than `now` is clamped to `now` so that
    /// `scheduled_at >= created` holds from the start.
    pub fn into_job(self, now: DateTime<Utc>) -> Job {
        let scheduled_at = self.scheduled_at.map_or(now, |at| at.max(now));
        Job {
            id: JobId::new(),
            job_type: self.job_type,
            payload: self.payload,
            status: JobStatus::Pending,
            attempts: 0,
            max_attempts: self.max_attempts.max(1),
            idempotency_key: self.idempotency_key,
            created: now,
            scheduled_at,
            started_at: None,
            completed_at: None,
            error: String::new(),
        }
    }
}
