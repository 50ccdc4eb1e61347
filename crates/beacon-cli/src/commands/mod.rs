//! CLI command implementations.

pub mod jobs;
pub mod worker;

use anyhow::{Context, Result};
use beacon_config::{WorkerConfig, load_worker_config};
use beacon_db::{PgCheckLookup, PgJobStore, create_pool, run_migrations};
use beacon_scheduler::{HandlerRegistry, JobQueue, SendAlertHandler};
use sqlx::PgPool;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Configuration resolved from the config file and command-line overrides.
pub struct Settings {
    pub config: WorkerConfig,
}

impl Settings {
    pub fn load(config_path: Option<&Path>, database_url: Option<String>) -> Result<Self> {
        let mut config = match config_path {
            Some(path) => load_worker_config(path)
                .with_context(|| format!("Failed to load config file: {}", path.display()))?,
            None => WorkerConfig::default(),
        };
        if database_url.is_some() {
            config.database.url = database_url;
        }
        Ok(Self { config })
    }

    pub async fn connect(&self) -> Result<PgPool> {
        let url = self
            .config
            .database
            .url
            .as_deref()
            .context("No database configured; set DATABASE_URL or database.url")?;
        create_pool(url, self.config.database.max_connections)
            .await
            .context("Failed to connect to database")
    }

    pub fn queue(&self, pool: &PgPool) -> JobQueue {
        JobQueue::new(Arc::new(PgJobStore::new(pool.clone())))
            .with_policy(self.config.retry.policy())
            .with_default_max_attempts(self.config.retry.max_attempts)
    }

    pub fn registry(&self, pool: &PgPool) -> HandlerRegistry {
        let checks = Arc::new(PgCheckLookup::new(pool.clone()));
        HandlerRegistry::new().with_handler(Arc::new(SendAlertHandler::new(checks)))
    }
}

pub async fn migrate(settings: &Settings) -> Result<()> {
    let pool = settings.connect().await?;
    run_migrations(&pool)
        .await
        .context("Failed to run migrations")?;
    info!("Migrations applied");
    println!("Migrations applied");
    Ok(())
}

pub fn validate(path: &Path) -> Result<()> {
    match load_worker_config(path) {
        Ok(config) => {
            println!("Configuration is valid");
            println!(
                "  poll interval: {}s",
                config.worker.poll_interval.as_secs()
            );
            println!("  max attempts: {}", config.retry.max_attempts);
            println!("  backoff: {}s", config.retry.backoff.as_secs());
            Ok(())
        }
        Err(e) => {
            println!("Configuration error: {}", e);
            std::process::exit(1);
        }
    }
}
