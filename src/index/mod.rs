//! Vector index management: document identity, partition lookup, and one-time population.
//!
//! Every document lives in its own partition of one shared collection. A partition that already
//! holds vectors is a cache hit and is reused without touching the embedding service; an empty
//! partition is populated once from the document's chunks.

mod identity;
mod memory;
pub mod mmr;
mod qdrant_store;
mod types;

pub use identity::{DocumentIdentity, PartitionId};
pub use memory::InMemoryPartitionStore;
pub use qdrant_store::QdrantPartitionStore;
pub use types::{Candidate, IndexError, RetrievedChunk, VectorRecord};

use crate::config::RetrievalSettings;
use crate::embedding::EmbeddingClient;
use crate::ingest::Chunk;
use async_trait::async_trait;
use std::sync::Arc;

/// Backing storage for partitioned vectors.
#[async_trait]
pub trait PartitionStore: Send + Sync {
    /// Make sure the shared collection exists with `dimension`-wide vectors and is ready.
    async fn ensure_ready(&self, dimension: usize) -> Result<(), IndexError>;

    /// Number of vectors stored in `partition`.
    async fn count(&self, partition: &PartitionId) -> Result<u64, IndexError>;

    /// Whether `partition` holds any vectors.
    async fn exists(&self, partition: &PartitionId) -> Result<bool, IndexError> {
        Ok(self.count(partition).await? > 0)
    }

    /// Store `records` in `partition`. Re-inserting a chunk index overwrites the earlier record.
    async fn insert(
        &self,
        partition: &PartitionId,
        document: &DocumentIdentity,
        records: Vec<VectorRecord>,
    ) -> Result<usize, IndexError>;

    /// Up to `limit` most similar records of `partition`, most similar first, with vectors.
    async fn query(
        &self,
        partition: &PartitionId,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<Candidate>, IndexError>;
}

/// Result of resolving a document to its partition.
pub struct ResolvedPartition {
    /// Query handle scoped to the partition.
    pub handle: PartitionHandle,
    /// Partition the document maps to.
    pub partition: PartitionId,
    /// Whether the partition was already populated.
    pub cache_hit: bool,
    /// Vectors written by this call; zero on a cache hit.
    pub inserted: usize,
}

/// Maps documents to partitions and populates them on first sight.
#[derive(Clone)]
pub struct IndexManager {
    store: Arc<dyn PartitionStore>,
    embedder: Arc<dyn EmbeddingClient>,
}

impl IndexManager {
    /// Build a manager over the given store and embedding client.
    pub fn new(store: Arc<dyn PartitionStore>, embedder: Arc<dyn EmbeddingClient>) -> Self {
        Self { store, embedder }
    }

    /// Resolve the partition for `locator`, embedding and inserting `chunks` on a cache miss.
    pub async fn resolve(
        &self,
        chunks: &[Chunk],
        locator: &str,
    ) -> Result<ResolvedPartition, IndexError> {
        let identity = DocumentIdentity::from_locator(locator);
        let partition = identity.partition();

        self.store.ensure_ready(self.embedder.dimension()).await?;

        let existing = self.store.count(&partition).await?;
        if existing > 0 {
            tracing::info!(partition = %partition, vectors = existing, "Partition cache hit");
            return Ok(ResolvedPartition {
                handle: self.handle(partition.clone()),
                partition,
                cache_hit: true,
                inserted: 0,
            });
        }

        tracing::info!(partition = %partition, chunks = chunks.len(), "Partition cache miss; embedding document");
        let texts = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let vectors = self.embedder.generate_embeddings(texts).await?;
        let records = vectors
            .into_iter()
            .zip(chunks.iter().cloned())
            .map(|(vector, chunk)| VectorRecord { vector, chunk })
            .collect();
        let inserted = self.store.insert(&partition, &identity, records).await?;
        tracing::info!(partition = %partition, inserted, "Partition populated");

        Ok(ResolvedPartition {
            handle: self.handle(partition.clone()),
            partition,
            cache_hit: false,
            inserted,
        })
    }

    /// Handle for an existing partition.
    pub fn handle(&self, partition: PartitionId) -> PartitionHandle {
        PartitionHandle {
            partition,
            store: Arc::clone(&self.store),
            embedder: Arc::clone(&self.embedder),
        }
    }
}

/// Query access to exactly one partition.
#[derive(Clone)]
pub struct PartitionHandle {
    partition: PartitionId,
    store: Arc<dyn PartitionStore>,
    embedder: Arc<dyn EmbeddingClient>,
}

impl PartitionHandle {
    /// Partition this handle is scoped to.
    pub fn partition(&self) -> &PartitionId {
        &self.partition
    }

    /// Embed `query` and select `k` diverse passages from the `fetch_k` nearest ones.
    pub async fn retrieve(
        &self,
        query: &str,
        settings: &RetrievalSettings,
    ) -> Result<Vec<RetrievedChunk>, IndexError> {
        let mut vectors = self
            .embedder
            .generate_embeddings(vec![query.to_string()])
            .await?;
        let Some(vector) = vectors.pop() else {
            return Ok(Vec::new());
        };

        let pool = settings.fetch_k.max(settings.k);
        let candidates = self.store.query(&self.partition, &vector, pool).await?;
        let pool_size = candidates.len();
        let selected = mmr::mmr_select(&vector, candidates, settings.k, settings.lambda);
        tracing::debug!(
            partition = %self.partition,
            pool = pool_size,
            selected = selected.len(),
            "Retrieved passages"
        );
        Ok(selected.into_iter().map(RetrievedChunk::from).collect())
    }
}
