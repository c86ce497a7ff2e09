//! Run configuration.
//!
//! All paths, remote endpoints, pacing delays and retry policies live in one
//! [`MonitorConfig`] value that is handed to the clients and the orchestrator
//! at construction. `Default` carries the production values.

use crate::retry::RetryPolicy;
use std::path::PathBuf;
use std::time::Duration;

/// arXiv search API
pub const ARXIV_API_URL: &str = "https://export.arxiv.org/api/query";

/// Semantic Scholar v1 paper endpoint (official code repository lookup)
pub const SEMANTIC_SCHOLAR_API_URL: &str = "https://api.semanticscholar.org/v1/paper";

/// Subject categories every query is restricted to
pub const DEFAULT_CATEGORIES: &[&str] = &[
    "cs.CL", "cs.LG", "cs.AI", "cs.HC", "cs.IR", "cs.SD", "cs.MA", "cs.DC", "cs.SI",
];

/// Topic label used when none is given on the command line
pub const DEFAULT_TOPIC: &str = "Task Oriented Dialogue Systems";

/// Query used when none is given on the command line
pub const DEFAULT_QUERY: &str = r#"all:"task oriented dialogue" OR all:"task oriented dialog" OR all:"TOD system" OR all:"task-oriented dialog""#;

/// Remote API base URLs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub arxiv_api: String,
    pub semantic_scholar_api: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            arxiv_api: ARXIV_API_URL.to_string(),
            semantic_scholar_api: SEMANTIC_SCHOLAR_API_URL.to_string(),
        }
    }
}

/// A tracked research topic: catalog key plus the arXiv query predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    pub name: String,
    pub query: String,
}

impl Topic {
    pub fn new(name: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            query: query.into(),
        }
    }
}

impl Default for Topic {
    fn default() -> Self {
        Self::new(DEFAULT_TOPIC, DEFAULT_QUERY)
    }
}

/// Configuration threaded through every component of a run.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Where downloaded PDFs are written
    pub data_dir: PathBuf,
    /// Persisted catalog (JSON)
    pub catalog_path: PathBuf,
    /// Last-run watermark (plain text date)
    pub watermark_path: PathBuf,
    /// Rendered Markdown summary
    pub readme_path: PathBuf,
    /// Directory of the log file
    pub logs_dir: PathBuf,
    /// GitHub `owner/name` used by the README shield links
    pub repo: String,
    /// Subject category allow-list
    pub categories: Vec<String>,
    /// Pause after each processed record
    pub api_delay: Duration,
    /// Entries requested per search page
    pub page_size: usize,
    /// Minimum gap between two search requests
    pub page_delay: Duration,
    /// Extra attempts for a failed or empty search page
    pub page_retries: u32,
    /// Result cap of an incremental run (seed runs are unbounded)
    pub incremental_cap: usize,
    /// Seed runs persist the catalog every this many records
    pub checkpoint_every: usize,
    /// How far back a seed run reaches
    pub seed_lookback_days: i64,
    /// Start of the window when no watermark exists yet
    pub default_lookback_days: i64,
    /// Timeout of code lookups and PDF downloads
    pub http_timeout: Duration,
    /// Timeout of one search page request
    pub search_timeout: Duration,
    pub endpoints: Endpoints,
    /// Code-URL lookup: retried on HTTP 429 only
    pub lookup_retry: RetryPolicy,
    /// PDF download: retried on any HTTP-layer error
    pub download_retry: RetryPolicy,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            catalog_path: PathBuf::from("docs/arxiv-daily.json"),
            watermark_path: PathBuf::from("docs/last_run.txt"),
            readme_path: PathBuf::from("README.md"),
            logs_dir: PathBuf::from("logs"),
            repo: "dowwie/daily_tods".to_string(),
            categories: DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect(),
            api_delay: Duration::from_secs(4),
            page_size: 100,
            page_delay: Duration::from_secs(3),
            page_retries: 5,
            incremental_cap: 50,
            checkpoint_every: 100,
            seed_lookback_days: 1825,
            default_lookback_days: 7,
            http_timeout: Duration::from_secs(10),
            search_timeout: Duration::from_secs(30),
            endpoints: Endpoints::default(),
            lookup_retry: RetryPolicy::exponential(5, Duration::from_secs(4), Duration::from_secs(60)),
            download_retry: RetryPolicy::exponential(3, Duration::from_secs(4), Duration::from_secs(10)),
        }
    }
}

impl MonitorConfig {
    /// Retry policy of a single search page request.
    pub fn page_retry(&self) -> RetryPolicy {
        RetryPolicy::fixed(self.page_retries + 1, self.page_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MonitorConfig::default();
        assert_eq!(config.categories.len(), 9);
        assert_eq!(config.incremental_cap, 50);
        assert_eq!(config.lookup_retry.max_attempts, 5);
        assert_eq!(config.download_retry.max_wait, Duration::from_secs(10));
        assert_eq!(config.page_retry().max_attempts, 6);
        assert_eq!(config.search_timeout, Duration::from_secs(30));
        assert_eq!(Topic::default().name, DEFAULT_TOPIC);
    }
}
