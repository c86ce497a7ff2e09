//! PDF archiving.
//!
//! Streams a paper's PDF into the data directory under a filename derived
//! from its title. Responses that are not `application/pdf` are skipped
//! without error; HTTP failures are retried and, once the retry budget is
//! spent, returned to the caller. The body is written to a `.part` file that
//! is renamed into place only after the last chunk arrived.

use crate::config::MonitorConfig;
use crate::error::{MonitorError, Result};
use crate::retry::RetryPolicy;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, Response};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, error, info};

/// The only content type that gets written to disk
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// User agent sent with document requests
const DOWNLOAD_USER_AGENT: &str = "arxiv.py/2.1.3";

/// Write buffer size
const CHUNK_SIZE: usize = 8192;

/// What a download attempt did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// File written at this path
    Saved(PathBuf),
    /// Response was not a PDF; nothing written
    Skipped { content_type: Option<String> },
}

/// Something that can archive a paper's document.
#[allow(async_fn_in_trait)]
pub trait DocumentFetcher {
    async fn download(&self, url: &str, title: &str) -> Result<DownloadOutcome>;
}

/// Downloads PDFs into a directory
pub struct PdfDownloader {
    client: Client,
    output_dir: PathBuf,
    retry: RetryPolicy,
}

impl PdfDownloader {
    /// Create a downloader writing into `config.data_dir`
    pub fn new(config: &MonitorConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| MonitorError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            output_dir: config.data_dir.clone(),
            retry: config.download_retry,
        })
    }

    /// Target path for a title
    pub fn file_path(&self, title: &str) -> PathBuf {
        pdf_path(&self.output_dir, title)
    }

    async fn attempt(&self, url: &str, title: &str) -> Result<DownloadOutcome> {
        debug!(url, "Attempting to download PDF");

        let mut response = self
            .client
            .get(url)
            .header(USER_AGENT, DOWNLOAD_USER_AGENT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MonitorError::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if content_type.as_deref() != Some(PDF_CONTENT_TYPE) {
            error!(url, content_type = ?content_type, "Unexpected content-type, skipping");
            return Ok(DownloadOutcome::Skipped { content_type });
        }

        let path = self.file_path(title);
        let part = partial_path(&path);
        if let Err(e) = write_body(&mut response, &part).await {
            if let Err(cleanup) = tokio::fs::remove_file(&part).await {
                debug!(path = %part.display(), error = %cleanup, "No partial file to remove");
            }
            return Err(e);
        }
        tokio::fs::rename(&part, &path).await?;

        info!(path = %path.display(), "PDF saved");
        Ok(DownloadOutcome::Saved(path))
    }
}

/// Stream the response body into `path`
async fn write_body(response: &mut Response, path: &Path) -> Result<()> {
    let file = tokio::fs::File::create(path).await?;
    let mut writer = BufWriter::with_capacity(CHUNK_SIZE, file);

    while let Some(chunk) = response.chunk().await? {
        writer.write_all(&chunk).await?;
    }
    writer.flush().await?;
    Ok(())
}

/// `<name>.pdf` -> `<name>.pdf.part`; the file only gets its final name once complete
fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

impl DocumentFetcher for PdfDownloader {
    async fn download(&self, url: &str, title: &str) -> Result<DownloadOutcome> {
        self.retry
            .run(url, || self.attempt(url, title), MonitorError::is_transient)
            .await
    }
}

/// Keep alphanumerics, spaces, `.`, `_` and `-`; everything else becomes `_`.
pub fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, ' ' | '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn pdf_path(dir: &Path, title: &str) -> PathBuf {
    dir.join(format!("{}.pdf", sanitize_title(title)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::serve;
    use axum::body::{Body, Bytes};
    use axum::extract::State;
    use axum::http::{header, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::Router;
    use futures::StreamExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn downloader(dir: &TempDir) -> Result<PdfDownloader> {
        let mut config = MonitorConfig::default();
        config.data_dir = dir.path().to_path_buf();
        config.download_retry = RetryPolicy::fixed(3, Duration::from_millis(1));
        PdfDownloader::new(&config)
    }

    #[test]
    fn test_sanitize_title() {
        assert_eq!(sanitize_title("A/B: Testing?"), "A_B_ Testing_");
        assert_eq!(sanitize_title("v1.2_final-draft"), "v1.2_final-draft");
        assert_eq!(sanitize_title("Ünïcödé Dialog"), "Ünïcödé Dialog");
    }

    #[tokio::test]
    async fn test_pdf_is_written() -> Result<()> {
        async fn pdf() -> impl IntoResponse {
            ([(header::CONTENT_TYPE, PDF_CONTENT_TYPE)], b"%PDF-1.4 fake".to_vec())
        }
        let base = serve(Router::new().route("/pdf/2101.00001v1", get(pdf))).await;
        let dir = TempDir::new()?;
        let downloader = downloader(&dir)?;

        let outcome = downloader
            .download(&format!("{}/pdf/2101.00001v1", base), "Dialog: A Survey")
            .await?;

        let expected = dir.path().join("Dialog_ A Survey.pdf");
        assert_eq!(outcome, DownloadOutcome::Saved(expected.clone()));
        assert_eq!(std::fs::read(&expected)?, b"%PDF-1.4 fake");
        assert!(!partial_path(&expected).exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_non_pdf_is_skipped() -> Result<()> {
        async fn html() -> impl IntoResponse {
            ([(header::CONTENT_TYPE, "text/html")], "<html>captcha</html>")
        }
        let base = serve(Router::new().route("/pdf/x", get(html))).await;
        let dir = TempDir::new()?;
        let downloader = downloader(&dir)?;

        let outcome = downloader.download(&format!("{}/pdf/x", base), "Some Title").await?;

        assert_eq!(
            outcome,
            DownloadOutcome::Skipped {
                content_type: Some("text/html".to_string())
            }
        );
        assert!(!downloader.file_path("Some Title").exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_server_error_exhausts_retries() -> Result<()> {
        async fn broken(State(hits): State<Arc<AtomicUsize>>) -> StatusCode {
            hits.fetch_add(1, Ordering::SeqCst);
            StatusCode::SERVICE_UNAVAILABLE
        }
        let hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new().route("/pdf/x", get(broken)).with_state(hits.clone());
        let base = serve(app).await;
        let dir = TempDir::new()?;

        let result = downloader(&dir)?.download(&format!("{}/pdf/x", base), "t").await;

        assert!(matches!(result, Err(MonitorError::Http { status: 503, .. })));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_truncated_body_leaves_no_file() -> Result<()> {
        async fn truncated() -> impl IntoResponse {
            let chunks = futures::stream::iter(vec![
                Ok(Bytes::from_static(b"%PDF-1.4 partial")),
                Err(std::io::Error::other("connection dropped")),
            ])
            .then(|chunk| async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                chunk
            });
            (
                [
                    (header::CONTENT_TYPE, PDF_CONTENT_TYPE),
                    (header::CONTENT_LENGTH, "100000"),
                ],
                Body::from_stream(chunks),
            )
        }
        let base = serve(Router::new().route("/pdf/x", get(truncated))).await;
        let dir = TempDir::new()?;
        let downloader = downloader(&dir)?;

        let result = downloader.download(&format!("{}/pdf/x", base), "Cut Short").await;

        assert!(result.is_err());
        assert!(!downloader.file_path("Cut Short").exists());
        assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);
        Ok(())
    }

    #[test]
    fn test_partial_path_keeps_extension() {
        assert_eq!(
            partial_path(Path::new("data/v1.2 Survey.pdf")),
            PathBuf::from("data/v1.2 Survey.pdf.part")
        );
    }
}
