//! # arxiv-monitor
//!
//! Daily arXiv tracker: incremental fetch, catalog merge and Markdown summary.
//!
//! ## Modules
//!
//! - [`arxiv`] - arXiv search API client and Atom parsing
//! - [`stream`] - Lazy paginated result stream
//! - [`semantic_scholar`] - Code repository lookup with rate-limit handling
//! - [`download`] - PDF archiving
//! - [`monitor`] - Fetch-and-merge orchestrator
//! - [`catalog`] - Persistent JSON catalog
//! - [`watermark`] - Last-run date
//! - [`render`] - README generation
//! - [`retry`] - Backoff policy
//! - [`config`] - Run configuration
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use arxiv_monitor::{config::{MonitorConfig, Topic}, monitor::Monitor};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let monitor = Monitor::from_config(MonitorConfig::default())?;
//!     let today = chrono::Local::now().date_naive();
//!     let summary = monitor.run(&Topic::default(), false, today).await?;
//!     println!("Fetched {} papers", summary.fetched);
//!     Ok(())
//! }
//! ```

pub mod arxiv;
pub mod catalog;
pub mod config;
pub mod download;
pub mod error;
pub mod monitor;
pub mod render;
pub mod retry;
pub mod semantic_scholar;
pub mod stream;
pub mod watermark;

pub use error::{MonitorError, Result};
