//! KDL configuration parsing for the Beacon job queue.
//!
//! Handles the worker configuration file (`beacon.kdl`): database
//! connection, worker polling and retry settings.

pub mod error;
pub mod worker;

pub use error::{ConfigError, ConfigResult};
pub use worker::{
    DatabaseConfig, RetrySettings, WorkerConfig, WorkerSettings, load_worker_config,
    parse_worker_config,
};
