//! Beacon CLI tool.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "beacon")]
#[command(about = "Beacon job queue worker and admin tool", long_about = None)]
struct Cli {
    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL", global = true)]
    database_url: Option<String>,

    /// Worker configuration file
    #[arg(long, env = "BEACON_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process every eligible job once and exit
    ProcessJobs,
    /// Keep processing jobs until interrupted
    Work,
    /// Enqueue a job
    Enqueue {
        /// Job type, e.g. send_alert
        job_type: String,
        /// JSON payload
        #[arg(long, default_value = "{}")]
        payload: String,
        /// Idempotency key; empty means none
        #[arg(long, default_value = "")]
        key: String,
        /// Attempt ceiling (defaults to the configured value)
        #[arg(long)]
        max_attempts: Option<i32>,
        /// Delay before the job becomes eligible
        #[arg(long)]
        delay_secs: Option<u32>,
    },
    /// List the jobs referencing the given checks as JSON
    List {
        /// Check codes
        #[arg(required = true)]
        check_codes: Vec<String>,
    },
    /// Apply database migrations
    Migrate,
    /// Validate a worker configuration file
    Validate {
        /// Path to the configuration file
        #[arg(default_value = "beacon.kdl")]
        path: PathBuf,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    if let Commands::Validate { path } = &cli.command {
        return commands::validate(path);
    }

    let settings = commands::Settings::load(cli.config.as_deref(), cli.database_url)?;

    match cli.command {
        Commands::ProcessJobs => {
            commands::worker::process_jobs(&settings).await?;
        }
        Commands::Work => {
            commands::worker::work(&settings).await?;
        }
        Commands::Enqueue {
            job_type,
            payload,
            key,
            max_attempts,
            delay_secs,
        } => {
            commands::jobs::enqueue(
                &settings,
                &job_type,
                &payload,
                &key,
                max_attempts,
                delay_secs,
            )
            .await?;
        }
        Commands::List { check_codes } => {
            commands::jobs::list(&settings, &check_codes).await?;
        }
        Commands::Migrate => {
            commands::migrate(&settings).await?;
        }
        Commands::Validate { .. } => {}
    }

    Ok(())
}
