//! arXiv search API client
//!
//! Fetches single pages of the arXiv Atom query API and turns feed entries
//! into [`PaperRecord`]s. Iterating over many pages is the job of
//! [`crate::stream::paginate`].
//!
//! API Best Practices (per arXiv API docs):
//! - No more than one request every 3 seconds
//! - Page through large result sets with `start` / `max_results`
//! - The server occasionally returns an empty page mid-way; retrying helps

use crate::config::MonitorConfig;
use crate::error::{MonitorError, OptionExt, Result};
use crate::retry::RetryPolicy;
use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use std::sync::{LazyLock, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// One page of the remote search
#[derive(Debug, Default)]
pub struct FeedPage {
    pub entries: Vec<AtomEntry>,
    /// `opensearch:totalResults` of the whole query
    pub total_results: usize,
}

/// Search parameters shared by every page of one query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    /// Full boolean query string
    pub query: String,
    /// Stop after this many records (`None` = everything)
    pub max_results: Option<usize>,
    /// Records last updated before this date are dropped
    pub start_date: NaiveDate,
    /// Entries per page
    pub page_size: usize,
}

/// Something that serves pages of search results.
#[allow(async_fn_in_trait)]
pub trait PageSource {
    /// Fetch the page starting at `offset`. An empty page is only acceptable
    /// when `first_page` is set; otherwise it is [`MonitorError::EmptyPage`].
    async fn fetch_page(&self, request: &SearchRequest, offset: usize, first_page: bool) -> Result<FeedPage>;
}

// === Atom feed structures ===

/// Atom feed as returned by the arXiv API
#[derive(Debug, Default, Deserialize)]
pub struct AtomFeed {
    #[serde(rename = "entry", default)]
    pub entries: Vec<AtomEntry>,
    #[serde(rename = "totalResults", default)]
    pub total_results: Option<AtomText>,
}

impl AtomFeed {
    /// Reported result count; missing or garbled counts read as 0
    pub fn total_results(&self) -> usize {
        self.total_results
            .as_ref()
            .and_then(|t| t.value.as_deref())
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AtomText {
    #[serde(rename = "$text", default)]
    pub value: Option<String>,
}

/// Raw feed entry. Every field is optional so that one partial entry does
/// not spoil the page; [`PaperRecord::from_entry`] enforces what is required.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AtomEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub published: Option<String>,
    #[serde(default)]
    pub updated: Option<String>,
    #[serde(rename = "category", default)]
    pub categories: Vec<AtomCategory>,
    #[serde(rename = "link", default)]
    pub links: Vec<AtomLink>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AtomCategory {
    #[serde(rename = "@term", default)]
    pub term: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AtomLink {
    #[serde(rename = "@href", default)]
    pub href: Option<String>,
    #[serde(rename = "@title", default)]
    pub title: Option<String>,
}

/// Parse an arXiv Atom response body
pub fn parse_feed(xml: &str) -> Result<AtomFeed> {
    quick_xml::de::from_str(xml).map_err(|e| MonitorError::Parse(format!("Failed to parse arXiv feed: {}", e)))
}

// === Paper records ===

/// A paper as seen by the pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct PaperRecord {
    /// Canonical abstract URL, e.g. `http://arxiv.org/abs/2101.00001v2`
    pub entry_id: String,
    /// Identifier with version, e.g. `2101.00001v2`
    pub short_id: String,
    pub title: String,
    pub summary: String,
    pub published: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub categories: Vec<String>,
    pub pdf_url: String,
    /// Official code repository, filled in by the orchestrator
    pub code_url: Option<String>,
}

impl PaperRecord {
    /// Build a record from a feed entry, failing on missing required fields
    pub fn from_entry(entry: AtomEntry) -> Result<Self> {
        let entry_id = entry.id.filter(|s| !s.trim().is_empty()).ok_or_missing("id")?;
        let entry_id = entry_id.trim().to_string();
        let title = entry.title.ok_or_missing("title")?;
        let updated = parse_timestamp(entry.updated.as_deref().ok_or_missing("updated")?)?;
        let published = match entry.published.as_deref() {
            Some(raw) => parse_timestamp(raw)?,
            None => updated,
        };

        let short_id = entry_id
            .rsplit("arxiv.org/abs/")
            .next()
            .unwrap_or(&entry_id)
            .to_string();

        let pdf_url = entry
            .links
            .iter()
            .find(|l| l.title.as_deref() == Some("pdf"))
            .and_then(|l| l.href.clone())
            .unwrap_or_else(|| format!("{}.pdf", entry_id.replace("/abs/", "/pdf/")));

        Ok(Self {
            short_id,
            title: collapse_whitespace(&title),
            summary: entry.summary.unwrap_or_default().trim().to_string(),
            published,
            updated,
            categories: entry.categories.into_iter().filter_map(|c| c.term).collect(),
            pdf_url,
            entry_id,
            code_url: None,
        })
    }

    /// Identifier without version suffix, the catalog key
    pub fn paper_id(&self) -> &str {
        strip_version(&self.short_id)
    }

    /// Date of the last update (UTC)
    pub fn updated_date(&self) -> NaiveDate {
        self.updated.date_naive()
    }
}

static VERSION_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"v\d+$").expect("Version suffix regex"));

/// `2101.00001v2` -> `2101.00001`. Identifiers without a version are returned unchanged.
pub fn strip_version(id: &str) -> &str {
    match VERSION_SUFFIX.find(id) {
        Some(m) if m.start() > 0 => &id[..m.start()],
        _ => id,
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| MonitorError::Parse(format!("Bad timestamp {:?}: {}", raw, e)))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Combine the topic predicate with the category allow-list and a submitted-date range
pub fn build_search_query(topic_query: &str, categories: &[String], from: NaiveDate, to: NaiveDate) -> String {
    let category_query = categories
        .iter()
        .map(|c| format!("cat:{}", c))
        .collect::<Vec<_>>()
        .join(" OR ");

    format!(
        "({}) AND ({}) AND submittedDate:[{} TO {}]",
        topic_query,
        category_query,
        from.format("%Y%m%d"),
        to.format("%Y%m%d")
    )
}

// === HTTP client ===

/// arXiv API client with request pacing and per-page retries
pub struct ArxivClient {
    client: Client,
    base_url: String,
    page_retry: RetryPolicy,
    page_delay: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl ArxivClient {
    /// Create a client from the run configuration
    pub fn new(config: &MonitorConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.search_timeout)
            .user_agent("arxiv-monitor/0.1")
            .build()
            .map_err(|e| MonitorError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.endpoints.arxiv_api.clone(),
            page_retry: config.page_retry(),
            page_delay: config.page_delay,
            last_request: Mutex::new(None),
        })
    }

    /// Query URL of one page, newest submissions first
    fn page_url(&self, request: &SearchRequest, offset: usize) -> String {
        format!(
            "{}?search_query={}&start={}&max_results={}&sortBy=submittedDate&sortOrder=descending",
            self.base_url,
            urlencoding::encode(&request.query),
            offset,
            request.page_size
        )
    }

    /// Keep at least `page_delay` between two requests
    async fn wait_for_rate_limit(&self) {
        let remaining = {
            let last = self.last_request.lock().ok().and_then(|l| *l);
            last.map(|t| self.page_delay.saturating_sub(t.elapsed()))
        };

        if let Some(wait) = remaining.filter(|w| !w.is_zero()) {
            tokio::time::sleep(wait).await;
        }

        if let Ok(mut last) = self.last_request.lock() {
            *last = Some(Instant::now());
        }
    }

    async fn try_fetch_page(&self, url: &str, offset: usize, first_page: bool) -> Result<FeedPage> {
        self.wait_for_rate_limit().await;
        debug!(url, offset, "Requesting arXiv page");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(MonitorError::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let feed = parse_feed(&response.text().await?)?;
        if feed.entries.is_empty() && !first_page {
            warn!(offset, "Empty page");
            return Err(MonitorError::EmptyPage { offset });
        }

        Ok(FeedPage {
            total_results: feed.total_results(),
            entries: feed.entries,
        })
    }
}

impl PageSource for ArxivClient {
    async fn fetch_page(&self, request: &SearchRequest, offset: usize, first_page: bool) -> Result<FeedPage> {
        let url = self.page_url(request, offset);
        self.page_retry
            .run(&url, || self.try_fetch_page(&url, offset, first_page), MonitorError::is_transient)
            .await
    }
}
