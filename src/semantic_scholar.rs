//! Semantic Scholar code-repository lookup
//!
//! Resolves an arXiv identifier to the paper's official code repository URL.
//!
//! API Details:
//! - Endpoint: GET /v1/paper/arXiv:{id}
//! - The repository lives at `official.url` in the response body
//! - HTTP 429 responses may carry a `Retry-After` header (seconds)
//!
//! Failures never propagate: any outcome other than a URL becomes `None`,
//! which the catalog renders as the literal `null`.

use crate::config::MonitorConfig;
use crate::error::{MonitorError, Result};
use crate::retry::RetryPolicy;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

/// Something that can resolve a paper identifier to a code repository URL.
#[allow(async_fn_in_trait)]
pub trait CodeUrlLookup {
    /// Repository URL for `paper_id`, or `None` when unknown or unreachable.
    async fn code_url(&self, paper_id: &str) -> Option<String>;
}

/// Semantic Scholar API client
pub struct SemanticScholarClient {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl SemanticScholarClient {
    /// Create a client from the run configuration
    pub fn new(config: &MonitorConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| MonitorError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.endpoints.semantic_scholar_api.trim_end_matches('/').to_string(),
            retry: config.lookup_retry,
        })
    }

    fn paper_url(&self, paper_id: &str) -> String {
        format!("{}/arXiv:{}", self.base_url, paper_id)
    }

    /// One request. Only HTTP 429 comes back as an error; everything else
    /// has already been degraded to `Ok(None)`.
    async fn attempt(&self, paper_id: &str) -> Result<Option<String>> {
        let url = self.paper_url(paper_id);
        debug!(url = %url, "Looking up code URL");

        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(paper_id, error = %e, "Network error during code lookup");
                return Ok(None);
            }
        };

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = parse_retry_after(response.headers());
            if let Some(wait) = retry_after {
                warn!(paper_id, wait_secs = wait.as_secs(), "Rate limited, honoring Retry-After");
                tokio::time::sleep(wait).await;
            }
            return Err(MonitorError::RateLimited { retry_after });
        }

        if !status.is_success() {
            warn!(paper_id, status = status.as_u16(), "HTTP error during code lookup");
            return Ok(None);
        }

        match response.json::<serde_json::Value>().await {
            Ok(body) => Ok(official_code_url(&body)),
            Err(e) => {
                warn!(paper_id, error = %e, "Unreadable code lookup response");
                Ok(None)
            }
        }
    }
}

impl CodeUrlLookup for SemanticScholarClient {
    async fn code_url(&self, paper_id: &str) -> Option<String> {
        match self
            .retry
            .run(paper_id, || self.attempt(paper_id), MonitorError::is_rate_limited)
            .await
        {
            Ok(url) => url,
            Err(e) => {
                warn!(paper_id, error = %e, "Code lookup gave up");
                None
            }
        }
    }
}

/// `Retry-After` in whole seconds. HTTP-date values are ignored.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Extract `official.url` from a paper response
fn official_code_url(body: &serde_json::Value) -> Option<String> {
    body.get("official")?
        .get("url")?
        .as_str()
        .map(str::trim)
        .filter(|url| !url.is_empty() && *url != "null")
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::serve;
    use axum::extract::{Path, State};
    use axum::http::{header, StatusCode as AxumStatus};
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::{Json, Router};
    use reqwest::header::HeaderValue;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Instant;

    fn fast_config(base_url: String, max_attempts: u32) -> MonitorConfig {
        let mut config = MonitorConfig::default();
        config.endpoints.semantic_scholar_api = base_url;
        config.lookup_retry = RetryPolicy::fixed(max_attempts, Duration::from_millis(1));
        config
    }

    #[test]
    fn test_parse_retry_after() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("10"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(10)));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[test]
    fn test_official_code_url() {
        let body = serde_json::json!({"official": {"url": "https://github.com/org/repo"}});
        assert_eq!(official_code_url(&body).as_deref(), Some("https://github.com/org/repo"));

        assert_eq!(official_code_url(&serde_json::json!({"title": "x"})), None);
        assert_eq!(official_code_url(&serde_json::json!({"official": null})), None);
        assert_eq!(official_code_url(&serde_json::json!({"official": {"url": "null"}})), None);
    }

    #[tokio::test]
    async fn test_lookup_found() -> Result<()> {
        async fn paper(Path(id): Path<String>) -> Json<serde_json::Value> {
            assert_eq!(id, "arXiv:2101.00001");
            Json(serde_json::json!({"official": {"url": "https://github.com/org/tod"}}))
        }
        let base = serve(Router::new().route("/{id}", get(paper))).await;

        let client = SemanticScholarClient::new(&fast_config(base, 5))?;
        assert_eq!(
            client.code_url("2101.00001").await.as_deref(),
            Some("https://github.com/org/tod")
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_http_error_is_not_retried() -> Result<()> {
        async fn missing(State(hits): State<Arc<AtomicUsize>>) -> AxumStatus {
            hits.fetch_add(1, Ordering::SeqCst);
            AxumStatus::NOT_FOUND
        }
        let hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new().route("/{id}", get(missing)).with_state(hits.clone());
        let base = serve(app).await;

        let client = SemanticScholarClient::new(&fast_config(base, 5))?;
        assert_eq!(client.code_url("2101.00001").await, None);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_rate_limit_exhaustion_returns_none() -> Result<()> {
        async fn limited(State(hits): State<Arc<AtomicUsize>>) -> AxumStatus {
            hits.fetch_add(1, Ordering::SeqCst);
            AxumStatus::TOO_MANY_REQUESTS
        }
        let hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new().route("/{id}", get(limited)).with_state(hits.clone());
        let base = serve(app).await;

        let client = SemanticScholarClient::new(&fast_config(base, 5))?;
        assert_eq!(client.code_url("2101.00001").await, None);
        assert_eq!(hits.load(Ordering::SeqCst), 5);
        Ok(())
    }

    #[tokio::test]
    async fn test_retry_after_is_honored() -> Result<()> {
        async fn limited(State(seen): State<Arc<Mutex<Vec<Instant>>>>) -> impl IntoResponse {
            if let Ok(mut seen) = seen.lock() {
                seen.push(Instant::now());
            }
            (AxumStatus::TOO_MANY_REQUESTS, [(header::RETRY_AFTER, "1")], "slow down")
        }
        let seen = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new().route("/{id}", get(limited)).with_state(seen.clone());
        let base = serve(app).await;

        let client = SemanticScholarClient::new(&fast_config(base, 2))?;
        assert_eq!(client.code_url("2101.00001").await, None);

        let seen = seen.lock().expect("lock").clone();
        assert_eq!(seen.len(), 2);
        assert!(seen[1].duration_since(seen[0]) >= Duration::from_secs(1));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_policy_waits_out_retry_after() -> Result<()> {
        async fn limited(State(seen): State<Arc<Mutex<Vec<tokio::time::Instant>>>>) -> impl IntoResponse {
            if let Ok(mut seen) = seen.lock() {
                seen.push(tokio::time::Instant::now());
            }
            (AxumStatus::TOO_MANY_REQUESTS, [(header::RETRY_AFTER, "10")], "slow down")
        }
        let seen = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new().route("/{id}", get(limited)).with_state(seen.clone());
        let base = serve(app).await;

        let mut config = MonitorConfig::default();
        config.endpoints.semantic_scholar_api = base;
        // request timeout must stay out of reach of the paused clock
        config.http_timeout = Duration::from_secs(24 * 60 * 60);
        let client = SemanticScholarClient::new(&config)?;

        let start = tokio::time::Instant::now();
        assert_eq!(client.code_url("2101.00001").await, None);

        let seen = seen.lock().expect("lock").clone();
        assert_eq!(seen.len(), 5);
        for pair in seen.windows(2) {
            assert!(pair[1].duration_since(pair[0]) >= Duration::from_secs(10));
        }
        // five Retry-After pauses plus 4 + 4 + 4 + 8 seconds of backoff
        assert!(start.elapsed() >= Duration::from_secs(70));
        Ok(())
    }
}
