use crate::embedding::EmbeddingClientError;
use crate::ingest::Chunk;
use crate::qdrant::QdrantError;
use thiserror::Error;

/// Embedding vector paired with the chunk it was computed from.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    /// Embedding of `chunk.text`.
    pub vector: Vec<f32>,
    /// Source passage and metadata.
    pub chunk: Chunk,
}

/// Similarity hit returned by a partition store, carrying its vector for diversity selection.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Stored passage.
    pub chunk: Chunk,
    /// Similarity to the query vector.
    pub score: f32,
    /// Stored embedding.
    pub vector: Vec<f32>,
}

/// Passage selected for a question.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    /// Stored passage.
    pub chunk: Chunk,
    /// Similarity to the query vector.
    pub score: f32,
}

impl From<Candidate> for RetrievedChunk {
    fn from(candidate: Candidate) -> Self {
        Self {
            chunk: candidate.chunk,
            score: candidate.score,
        }
    }
}

/// Failures raised while resolving or querying a partition.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Vector collection could not be reached or rejected a request.
    #[error("vector collection unavailable: {0}")]
    Connection(String),
    /// Embedding service failed.
    #[error(transparent)]
    Embedding(#[from] EmbeddingClientError),
    /// Shared collection could not be created or never reported ready.
    #[error("vector collection could not be prepared: {0}")]
    Creation(String),
}

impl From<QdrantError> for IndexError {
    fn from(error: QdrantError) -> Self {
        Self::Connection(error.to_string())
    }
}
