//! msp-ingest - Media store ingest job runner
//!
//! Stands in for the host scheduler: runs exactly one ingest attempt per
//! invocation and reports the result through the exit code (0 success,
//! 1 failure). Retry and timeout policy stay with whoever invokes it.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use msp_common::config::{load_module_settings, TomlConfig};
use msp_ingest::context::LogContext;
use msp_ingest::index::{open_content_index, Category, ContentScope};
use msp_ingest::models::JobInput;
use msp_ingest::services::IdentityResolver;
use msp_ingest::{IngestWorker, JobOutcome};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const MODULE_NAME: &str = "msp-ingest";

/// Command-line arguments for msp-ingest
#[derive(Parser, Debug)]
#[command(name = "msp-ingest")]
#[command(about = "Commit staged media files into the managed media store")]
#[command(version)]
struct Args {
    /// Root folder holding the content index and stored media
    #[arg(short, long, env = "MSP_ROOT_FOLDER", global = true)]
    root_folder: Option<PathBuf>,

    /// TOML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one ingest job
    Run {
        /// Job input JSON file, or `-` for stdin
        #[arg(short, long, default_value = "-")]
        input: String,
    },
    /// List visible entries in one category
    List {
        /// image, audio, video or download
        #[arg(long)]
        category: String,

        /// Volume name (defaults to the primary volume)
        #[arg(long)]
        volume: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // Config warnings are emitted before the configured subscriber exists
    let (initializer, config) =
        tracing::subscriber::with_default(bootstrap_subscriber(), || {
            load_module_settings(MODULE_NAME, args.root_folder.clone(), args.config.clone())
        })
        .context("Failed to load settings")?;

    init_tracing(&config)?;
    info!(root = %initializer.root_folder().display(), backend = ?config.store.backend, "Media store");

    let index = open_content_index(
        &config.store,
        &initializer.database_path(),
        initializer.store_path(),
    )
    .await
    .context("Failed to open content index")?;

    match args.command {
        Command::Run { input } => {
            let job = match read_job_input(&input) {
                Ok(job) => job,
                Err(e) => {
                    error!(error = %e, "Unreadable job input");
                    return Ok(ExitCode::FAILURE);
                }
            };

            let cancel_token = CancellationToken::new();
            let signal_token = cancel_token.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Cancellation requested");
                    signal_token.cancel();
                }
            });

            let worker = IngestWorker::new(index);
            match worker.run(job, &cancel_token).await {
                JobOutcome::Success => Ok(ExitCode::SUCCESS),
                JobOutcome::Failure => Ok(ExitCode::FAILURE),
            }
        }
        Command::List { category, volume } => {
            let category: Category = category.parse()?;
            let volume = IdentityResolver::new(index.clone())
                .resolve_volume(volume.as_deref(), &LogContext::for_new_job());
            let scope = ContentScope::new(volume, category);

            for record in index.list_visible(&scope).await? {
                println!(
                    "{}\t{}\t{}",
                    record.handle, record.relative_path, record.display_name
                );
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// stderr-only subscriber used while the config is being read
fn bootstrap_subscriber() -> impl tracing::Subscriber + Send + Sync {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .finish()
}

fn init_tracing(config: &TomlConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    let registry = tracing_subscriber::registry().with(filter);

    match &config.logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .init();
        }
        None => {
            registry
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
    Ok(())
}

fn read_job_input(source: &str) -> Result<JobInput> {
    let raw = if source == "-" {
        std::io::read_to_string(std::io::stdin()).context("Failed to read stdin")?
    } else {
        std::fs::read_to_string(source).with_context(|| format!("Failed to read {}", source))?
    };
    serde_json::from_str(&raw).context("Job input is not valid JSON")
}
