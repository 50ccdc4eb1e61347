//! Job handler trait.
//!
//! Handlers run the side effect for one job type. They only see the job's
//! payload and report failure through [`HandlerError`]; queue bookkeeping is
//! done by the worker.

use async_trait::async_trait;
use thiserror::Error;

/// Why a handler could not complete a job.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("unknown job type: {0}")]
    UnknownJobType(String),

    #[error("missing {0} in payload")]
    MissingField(&'static str),

    #[error("invalid {field} in payload: {message}")]
    InvalidField {
        field: &'static str,
        message: String,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Failed(String),
}

/// Trait for job handlers.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Job type this handler executes.
    fn job_type(&self) -> &'static str;

    /// Execute one job. Returning `Ok` marks the job done.
    async fn handle(&self, payload: &serde_json::Value) -> Result<(), HandlerError>;
}
