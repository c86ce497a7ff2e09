//! arxiv-monitor - Daily arXiv tracker
//!
//! Fetches new papers for a topic, looks up their code repositories, archives
//! their PDFs and keeps a JSON catalog plus a Markdown summary up to date.
//!
//! ## Usage
//!
//! ```bash
//! # Daily update since the last run
//! arxiv-monitor
//!
//! # Initial population (last five years)
//! arxiv-monitor --seed
//! ```

use anyhow::{Context, Result};
use arxiv_monitor::config::{MonitorConfig, Topic, DEFAULT_QUERY, DEFAULT_TOPIC};
use arxiv_monitor::monitor::Monitor;
use chrono::Local;
use clap::Parser;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log file name inside the logs directory
const LOG_FILE: &str = "arxiv_tracker.log";

/// The log file is rotated at startup once it grows past this size
const LOG_MAX_BYTES: u64 = 1024 * 1024;

// ============================================================================
// CLI Definition
// ============================================================================

/// Daily arXiv tracker - incremental fetch, merge and Markdown summary
#[derive(Parser)]
#[command(name = "arxiv-monitor")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Populate the catalog with papers from the last five years
    #[arg(long)]
    seed: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Topic label (catalog key and README section)
    #[arg(long, default_value = DEFAULT_TOPIC)]
    topic: String,

    /// arXiv query predicate for the topic
    #[arg(long, default_value = DEFAULT_QUERY)]
    query: String,

    /// Directory for downloaded PDFs
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Catalog JSON file
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Last-run watermark file
    #[arg(long)]
    watermark: Option<PathBuf>,

    /// Generated Markdown summary
    #[arg(long)]
    readme: Option<PathBuf>,

    /// Directory of the log file
    #[arg(long)]
    logs_dir: Option<PathBuf>,

    /// GitHub repository (owner/name) used in the README links
    #[arg(long)]
    repo: Option<String>,
}

impl Cli {
    fn config(&self) -> MonitorConfig {
        let mut config = MonitorConfig::default();
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(path) = &self.catalog {
            config.catalog_path = path.clone();
        }
        if let Some(path) = &self.watermark {
            config.watermark_path = path.clone();
        }
        if let Some(path) = &self.readme {
            config.readme_path = path.clone();
        }
        if let Some(dir) = &self.logs_dir {
            config.logs_dir = dir.clone();
        }
        if let Some(repo) = &self.repo {
            config.repo = repo.clone();
        }
        config
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.config();

    init_logging(cli.debug, &config.logs_dir)?;

    std::fs::create_dir_all(&config.data_dir).context("Failed to create data directory")?;

    let topic = Topic::new(cli.topic, cli.query);
    let today = Local::now().date_naive();

    let monitor = Monitor::from_config(config).context("Failed to build HTTP clients")?;
    let summary = monitor
        .run(&topic, cli.seed, today)
        .await
        .context("Run failed")?;

    info!(
        topic = %topic.name,
        since = %summary.start_date,
        fetched = summary.fetched,
        catalog_size = summary.catalog_size,
        "Process completed"
    );
    Ok(())
}

// ============================================================================
// Logging
// ============================================================================

/// Console plus log-file output, filtered by `RUST_LOG` or the `--debug` flag
fn init_logging(debug: bool, logs_dir: &Path) -> Result<()> {
    let log_level = if debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    let file = open_log_file(logs_dir)?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(Mutex::new(file)),
        )
        .init();

    Ok(())
}

fn open_log_file(logs_dir: &Path) -> Result<File> {
    std::fs::create_dir_all(logs_dir).context("Failed to create logs directory")?;
    let path = logs_dir.join(LOG_FILE);

    if std::fs::metadata(&path).is_ok_and(|m| m.len() > LOG_MAX_BYTES) {
        let rotated = logs_dir.join(format!("{}.1", LOG_FILE));
        std::fs::rename(&path, &rotated).context("Failed to rotate log file")?;
    }

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}
