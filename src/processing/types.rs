//! Request, report, and error types for the query pipeline.

use crate::answer::AnswerRecord;
use crate::index::{IndexError, PartitionId};
use crate::ingest::IngestError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Inbound query: one document and the questions to answer about it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueryRequest {
    /// Locator (URL) of the document.
    pub documents: String,
    /// Questions, answered in order.
    pub questions: Vec<String>,
}

/// Wire response: one answer per question, same order.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct QueryResponse {
    /// Answers aligned with the request's questions.
    pub answers: Vec<String>,
}

/// Full result of a query, including audit data not sent over the wire.
#[derive(Debug, Clone)]
pub struct QueryReport {
    /// Answer text per question.
    pub answers: Vec<String>,
    /// Audit record per question.
    pub records: Vec<AnswerRecord>,
    /// Partition serving the document.
    pub partition: PartitionId,
    /// Whether the partition was already populated.
    pub cache_hit: bool,
    /// Chunks produced by ingestion.
    pub chunk_count: usize,
    /// End-to-end processing time in milliseconds.
    pub elapsed_ms: u64,
}

impl From<QueryReport> for QueryResponse {
    fn from(report: QueryReport) -> Self {
        Self {
            answers: report.answers,
        }
    }
}

/// Errors emitted by the query pipeline.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Request failed validation; nothing was fetched.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// Document could not be fetched or yielded no usable text.
    #[error("document ingestion failed: {0}")]
    Ingest(#[from] IngestError),
    /// Vector index could not be prepared or populated.
    #[error("vector index failed: {0}")]
    Index(#[from] IndexError),
}

impl QueryError {
    /// Whether the caller can fix the failure by changing the request.
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::InvalidRequest(_) => true,
            Self::Ingest(error) => error.is_client_error(),
            Self::Index(_) => false,
        }
    }
}
