//! Scheduler error types.

use beacon_db::DbError;
use thiserror::Error;

/// Errors that abort a unit of work. Handler failures are not errors at
/// this level; they are recorded on the job.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("storage error: {0}")]
    Storage(#[from] DbError),
}

pub type SchedulerResult<T> = std::result::Result<T, SchedulerError>;
