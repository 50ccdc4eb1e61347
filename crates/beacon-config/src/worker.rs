//! Worker configuration parsing.
//!
//! ```kdl
//! database {
//!     url "postgres://beacon@localhost/beacon"
//!     max-connections 10
//! }
//! worker {
//!     id "worker-a"
//!     poll-interval-secs 30
//!     batch-limit 500
//! }
//! retry {
//!     max-attempts 3
//!     backoff-secs 60
//! }
//! ```
//!
//! Every node is optional; omitted values fall back to defaults.

use crate::{ConfigError, ConfigResult};
use beacon_core::retry::DEFAULT_BACKOFF_SECS;
use beacon_core::{DEFAULT_MAX_ATTEMPTS, RetryPolicy};
use kdl::{KdlDocument, KdlNode};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;

/// Complete worker configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub database: DatabaseConfig,
    pub worker: WorkerSettings,
    pub retry: RetrySettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Connection string; usually supplied through `DATABASE_URL` instead.
    pub url: Option<String>,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerSettings {
    /// Name used in logs. Generated when absent.
    pub id: Option<String>,
    /// Sleep between batches when running continuously.
    pub poll_interval: Duration,
    /// Upper bound on jobs processed in one batch.
    pub batch_limit: Option<usize>,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            id: None,
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            batch_limit: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Attempt ceiling for newly enqueued jobs.
    pub max_attempts: i32,
    /// Back-off unit; the n-th retry waits n times this.
    pub backoff: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: Duration::from_secs(DEFAULT_BACKOFF_SECS),
        }
    }
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.backoff)
    }
}

/// Parse worker configuration from KDL text.
pub fn parse_worker_config(kdl: &str) -> ConfigResult<WorkerConfig> {
    let doc: KdlDocument = kdl.parse()?;
    let mut config = WorkerConfig::default();

    for node in doc.nodes() {
        match node.name().value() {
            "database" => parse_database(node, &mut config.database)?,
            "worker" => parse_worker(node, &mut config.worker)?,
            "retry" => parse_retry(node, &mut config.retry)?,
            _ => {} // Ignore unknown nodes
        }
    }

    Ok(config)
}

/// Read and parse a worker configuration file.
pub fn load_worker_config(path: impl AsRef<Path>) -> ConfigResult<WorkerConfig> {
    let content = std::fs::read_to_string(path)?;
    parse_worker_config(&content)
}

fn parse_database(node: &KdlNode, database: &mut DatabaseConfig) -> ConfigResult<()> {
    for child in children(node) {
        match child.name().value() {
            "url" => {
                let url = get_first_string_arg(child)
                    .ok_or_else(|| ConfigError::MissingField("database url".to_string()))?;
                database.url = Some(url);
            }
            "max-connections" | "max_connections" => {
                database.max_connections = positive_arg(child, "database max-connections")?;
            }
            _ => {}
        }
    }
    Ok(())
}

fn parse_worker(node: &KdlNode, worker: &mut WorkerSettings) -> ConfigResult<()> {
    for child in children(node) {
        match child.name().value() {
            "id" => {
                worker.id = get_first_string_arg(child).filter(|id| !id.is_empty());
            }
            "poll-interval-secs" | "poll_interval_secs" => {
                let secs: u64 = positive_arg(child, "worker poll-interval-secs")?;
                worker.poll_interval = Duration::from_secs(secs);
            }
            "batch-limit" | "batch_limit" => {
                worker.batch_limit = Some(positive_arg(child, "worker batch-limit")?);
            }
            _ => {}
        }
    }
    Ok(())
}

fn parse_retry(node: &KdlNode, retry: &mut RetrySettings) -> ConfigResult<()> {
    for child in children(node) {
        match child.name().value() {
            "max-attempts" | "max_attempts" => {
                retry.max_attempts = positive_arg(child, "retry max-attempts")?;
            }
            "backoff-secs" | "backoff_secs" => {
                let secs: u64 = positive_arg(child, "retry backoff-secs")?;
                retry.backoff = Duration::from_secs(secs);
            }
            _ => {}
        }
    }
    Ok(())
}

// Helper functions for extracting values from KDL nodes

fn children(node: &KdlNode) -> impl Iterator<Item = &KdlNode> {
    node.children().into_iter().flat_map(|doc| doc.nodes())
}

fn get_first_string_arg(node: &KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

fn get_first_int_arg(node: &KdlNode) -> Option<i128> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_integer())
}

/// First argument as an integer of type `T`, required to be at least 1.
fn positive_arg<T: TryFrom<i128>>(node: &KdlNode, field: &str) -> ConfigResult<T> {
    let value = get_first_int_arg(node).ok_or_else(|| ConfigError::InvalidValue {
        field: field.to_string(),
        message: "expected an integer".to_string(),
    })?;

    if value < 1 {
        return Err(ConfigError::InvalidValue {
            field: field.to_string(),
            message: format!("must be at least 1, got {}", value),
        });
    }

    T::try_from(value).map_err(|_| ConfigError::InvalidValue {
        field: field.to_string(),
        message: format!("{} is out of range", value),
    })
}
