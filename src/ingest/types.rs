//! Core data types and error definitions for document ingestion.

use super::categories::Category;
use reqwest::StatusCode;
use thiserror::Error;

/// Page texts extracted from a fetched document.
#[derive(Debug, Clone)]
pub struct RawDocument {
    /// Locator the document was fetched from.
    pub source: String,
    /// Extracted text per page, in document order.
    pub pages: Vec<String>,
}

impl RawDocument {
    /// Whether any page carries non-whitespace text.
    pub fn has_text(&self) -> bool {
        self.pages.iter().any(|page| !page.trim().is_empty())
    }
}

/// A cleaned, categorized passage ready for embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Cleaned passage text.
    pub text: String,
    /// 1-based page the passage was taken from.
    pub page: u32,
    /// Monotonic position of the passage across the whole document.
    pub index: u32,
    /// Topical categories; never empty.
    pub categories: Vec<Category>,
    /// Locator of the originating document.
    pub source: String,
}

impl Chunk {
    /// Length of the passage in characters.
    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    /// Whether the passage text is empty.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Failures while downloading a document.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Locator is not an absolute http(s) URL.
    #[error("invalid document URL '{0}'")]
    InvalidUrl(String),
    /// Download did not finish within the configured timeout.
    #[error("timed out downloading document from {url}")]
    Timeout {
        /// Locator being fetched.
        url: String,
    },
    /// Server could not be reached or the connection dropped.
    #[error("connection error while downloading document from {url}: {message}")]
    Connection {
        /// Locator being fetched.
        url: String,
        /// Transport error description.
        message: String,
    },
    /// Server answered with a non-success status.
    #[error("HTTP error {status} while downloading document")]
    Status {
        /// Status returned by the server.
        status: StatusCode,
    },
    /// Temporary storage could not be created or written.
    #[error("failed to buffer document locally: {0}")]
    Storage(#[from] std::io::Error),
}

impl FetchError {
    /// Whether the caller can fix this failure by changing the request.
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::InvalidUrl(_) => true,
            Self::Status { status } => status.is_client_error(),
            Self::Timeout { .. } | Self::Connection { .. } | Self::Storage(_) => false,
        }
    }
}

/// Failures while turning fetched bytes into usable passages.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Parser rejected the content.
    #[error("could not parse document: {0}")]
    Parse(String),
    /// Document parsed but carried no extractable text.
    #[error("no content could be extracted from the document")]
    NoText,
    /// Every passage fell below the minimum length.
    #[error("document produced no passages of at least {min_length} characters")]
    NoUsableChunks {
        /// Configured minimum passage length.
        min_length: usize,
    },
}

/// Errors emitted by the ingestion stage.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Download failed.
    #[error("{0}")]
    Fetch(#[from] FetchError),
    /// Text extraction failed.
    #[error("{0}")]
    Extraction(#[from] ExtractionError),
}

impl IngestError {
    /// Whether the caller can fix this failure by changing the request.
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::Fetch(error) => error.is_client_error(),
            Self::Extraction(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_length_counts_characters() {
        let chunk = Chunk {
            text: "₹500 premium".into(),
            page: 1,
            index: 0,
            categories: vec![Category::Premium],
            source: "https://example.org/policy.pdf".into(),
        };
        assert_eq!(chunk.len(), 12);
    }

    #[test]
    fn fetch_errors_classify_fixability() {
        assert!(FetchError::InvalidUrl("nope".into()).is_client_error());
        assert!(
            FetchError::Status {
                status: StatusCode::NOT_FOUND
            }
            .is_client_error()
        );
        assert!(
            !FetchError::Status {
                status: StatusCode::BAD_GATEWAY
            }
            .is_client_error()
        );
        assert!(
            !FetchError::Timeout {
                url: "https://example.org".into()
            }
            .is_client_error()
        );
        assert!(IngestError::from(ExtractionError::NoText).is_client_error());
    }

    #[test]
    fn blank_pages_have_no_text() {
        let document = RawDocument {
            source: "https://example.org/scan.pdf".into(),
            pages: vec!["   ".into(), "\n\n".into()],
        };
        assert!(!document.has_text());
    }
}
