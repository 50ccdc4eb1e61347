//! Error types for Beacon.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid job status: {0}")]
    InvalidStatus(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
