//! Remote PDF download and page text extraction.
//!
//! The body is streamed into a named temporary file which is removed when the
//! [`tempfile::NamedTempFile`] guard drops, so every exit path (success, HTTP failure, parse
//! failure, panic in the parser) leaves no file behind.

use super::types::{ExtractionError, FetchError, IngestError, RawDocument};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url, header::CONTENT_TYPE};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;

const USER_AGENT: &str = "Mozilla/5.0 (compatible; docqa/0.1; +https://example.invalid/docqa)";

/// Source of raw page texts for a document locator.
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    /// Fetch and extract the document behind `locator`.
    async fn load(&self, locator: &str) -> Result<RawDocument, IngestError>;
}

/// Downloads PDFs over HTTP(S) and extracts their text page by page.
pub struct HttpPdfLoader {
    client: Client,
    timeout: Duration,
    temp_dir: Option<PathBuf>,
}

impl HttpPdfLoader {
    /// Build a loader whose downloads are bounded by `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|error| FetchError::Connection {
                url: String::new(),
                message: error.to_string(),
            })?;
        Ok(Self {
            client,
            timeout,
            temp_dir: None,
        })
    }

    /// Place temporary downloads under `dir` instead of the system temp directory.
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    fn temp_file(&self) -> Result<NamedTempFile, FetchError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("docqa-").suffix(".pdf");
        let file = match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        Ok(file)
    }

    async fn download(&self, url: &Url, target: &NamedTempFile) -> Result<u64, FetchError> {
        let locator = url.to_string();
        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|error| classify_transport_error(&locator, error))?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(url = %locator, %status, "Document download rejected");
            return Err(FetchError::Status { status });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();
        if !content_type.contains("pdf") && !url.path().to_ascii_lowercase().ends_with(".pdf") {
            tracing::warn!(
                url = %locator,
                content_type = %content_type,
                "Content type is not PDF; proceeding anyway"
            );
        }

        let mut file = tokio::fs::File::from_std(target.reopen()?);
        let mut total = 0u64;
        while let Some(bytes) = response
            .chunk()
            .await
            .map_err(|error| classify_transport_error(&locator, error))?
        {
            file.write_all(&bytes).await?;
            total += bytes.len() as u64;
        }
        file.flush().await?;
        Ok(total)
    }
}

#[async_trait]
impl DocumentLoader for HttpPdfLoader {
    async fn load(&self, locator: &str) -> Result<RawDocument, IngestError> {
        let url = parse_locator(locator)?;
        let temp = self.temp_file()?;

        tracing::info!(url = %url, timeout_secs = self.timeout.as_secs(), "Downloading document");
        let bytes = self.download(&url, &temp).await?;
        tracing::debug!(url = %url, bytes, "Document downloaded");

        let pages = extract_pages(temp.path().to_path_buf()).await?;
        tracing::info!(url = %url, pages = pages.len(), "Extracted document pages");

        let document = RawDocument {
            source: locator.trim().to_string(),
            pages,
        };
        if !document.has_text() {
            return Err(ExtractionError::NoText.into());
        }
        Ok(document)
    }
}

fn parse_locator(locator: &str) -> Result<Url, FetchError> {
    let trimmed = locator.trim();
    match Url::parse(trimmed) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(url),
        _ => Err(FetchError::InvalidUrl(trimmed.to_string())),
    }
}

fn classify_transport_error(url: &str, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Connection {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}

/// Run the PDF parser on a blocking worker; parser panics surface as extraction errors.
async fn extract_pages(path: PathBuf) -> Result<Vec<String>, ExtractionError> {
    let result = tokio::task::spawn_blocking(move || read_pdf_pages(&path)).await;
    match result {
        Ok(pages) => pages,
        Err(join_error) => Err(ExtractionError::Parse(format!(
            "parser aborted: {join_error}"
        ))),
    }
}

fn read_pdf_pages(path: &Path) -> Result<Vec<String>, ExtractionError> {
    let pages = pdf_extract::extract_text_by_pages(path)
        .map_err(|error| ExtractionError::Parse(error.to_string()))?;
    if pages.is_empty() {
        return Err(ExtractionError::NoText);
    }
    Ok(pages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::GET, MockServer};

    fn loader_in(dir: &Path) -> HttpPdfLoader {
        HttpPdfLoader::new(Duration::from_secs(5))
            .expect("loader")
            .with_temp_dir(dir)
    }

    fn dir_is_empty(dir: &Path) -> bool {
        std::fs::read_dir(dir).expect("read temp dir").next().is_none()
    }

    #[tokio::test]
    async fn rejects_non_http_locators() {
        let dir = tempfile::tempdir().expect("tempdir");
        let error = loader_in(dir.path())
            .load("ftp://example.org/policy.pdf")
            .await
            .expect_err("invalid scheme");
        assert!(matches!(
            error,
            IngestError::Fetch(FetchError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn http_error_status_is_reported_and_temp_file_removed() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/missing.pdf");
                then.status(404).body("not here");
            })
            .await;

        let dir = tempfile::tempdir().expect("tempdir");
        let error = loader_in(dir.path())
            .load(&server.url("/missing.pdf"))
            .await
            .expect_err("404 must fail");

        mock.assert();
        match error {
            IngestError::Fetch(FetchError::Status { status }) => {
                assert_eq!(status, StatusCode::NOT_FOUND)
            }
            other => panic!("expected status error, got {other:?}"),
        }
        assert!(dir_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn non_pdf_content_is_an_extraction_failure() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/page.html");
                then.status(200)
                    .header("content-type", "text/html")
                    .body("<html><body>not a pdf</body></html>");
            })
            .await;

        let dir = tempfile::tempdir().expect("tempdir");
        let error = loader_in(dir.path())
            .load(&server.url("/page.html"))
            .await
            .expect_err("html is not a pdf");

        assert!(matches!(error, IngestError::Extraction(_)));
        assert!(dir_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn slow_server_times_out() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/slow.pdf");
                then.status(200).delay(Duration::from_secs(3)).body("%PDF-1.4");
            })
            .await;

        let dir = tempfile::tempdir().expect("tempdir");
        let loader = HttpPdfLoader::new(Duration::from_millis(200))
            .expect("loader")
            .with_temp_dir(dir.path());
        let error = loader
            .load(&server.url("/slow.pdf"))
            .await
            .expect_err("timeout");

        assert!(matches!(
            error,
            IngestError::Fetch(FetchError::Timeout { .. })
        ));
        assert!(dir_is_empty(dir.path()));
    }
}
