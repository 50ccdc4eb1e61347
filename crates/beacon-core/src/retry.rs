//! Retry and completion policy.
//!
//! Decides what happens to a processing job once its handler has returned.
//! Back-off grows linearly with the attempt count: 60s, 120s, 180s, ...

use chrono::{DateTime, TimeDelta, Utc};
use std::time::Duration;

use crate::job::{Job, JobStatus};

/// Default back-off unit.
pub const DEFAULT_BACKOFF_SECS: u64 = 60;

/// Result of executing a job's handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure(String),
}

impl Outcome {
    pub fn failure(message: impl Into<String>) -> Self {
        Outcome::Failure(message.into())
    }
}

/// State change to apply to a processing job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Done {
        completed_at: DateTime<Utc>,
    },
    Retry {
        scheduled_at: DateTime<Utc>,
        error: String,
    },
    Failed {
        completed_at: DateTime<Utc>,
        error: String,
    },
}

impl Transition {
    pub fn status(&self) -> JobStatus {
        match self {
            Transition::Done { .. } => JobStatus::Done,
            Transition::Retry { .. } => JobStatus::Pending,
            Transition::Failed { .. } => JobStatus::Failed,
        }
    }
}

/// Linear back-off policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_BACKOFF_SECS))
    }
}

impl RetryPolicy {
    pub fn new(backoff_base: Duration) -> Self {
        Self { backoff_base }
    }

    pub fn backoff_base(&self) -> Duration {
        self.backoff_base
    }

    /// Delay before a job that has failed `attempts` times becomes eligible again.
    pub fn backoff(&self, attempts: i32) -> TimeDelta {
        let base = TimeDelta::from_std(self.backoff_base).unwrap_or(TimeDelta::MAX);
        base.checked_mul(attempts.max(0)).unwrap_or(TimeDelta::MAX)
    }

    /// Compute the transition for `job` given the handler `outcome`.
    ///
    /// Returns `None` when the job is not processing: terminal jobs are never
    /// touched again and pending jobs have nothing to complete.
    pub fn transition(
        &self,
        job: &Job,
        outcome: &Outcome,
        now: DateTime<Utc>,
    ) -> Option<Transition> {
        if job.status != JobStatus::Processing {
            return None;
        }

        let transition = match outcome {
            Outcome::Success => Transition::Done { completed_at: now },
            Outcome::Failure(error) if job.attempts >= job.max_attempts => Transition::Failed {
                completed_at: now,
                error: error.clone(),
            },
            Outcome::Failure(error) => {
                let retry_at = now
                    .checked_add_signed(self.backoff(job.attempts))
                    .unwrap_or(DateTime::<Utc>::MAX_UTC);
                Transition::Retry {
                    // scheduled_at never moves backwards
                    scheduled_at: retry_at.max(job.scheduled_at),
                    error: error.clone(),
                }
            }
        };
        Some(transition)
    }
}
