use super::identity::{DocumentIdentity, PartitionId};
use super::mmr::cosine_similarity;
use super::types::{Candidate, IndexError, VectorRecord};
use super::PartitionStore;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// Process-local partition store for tests and offline runs.
///
/// Records are keyed by chunk index inside each partition, so repeated inserts of the same
/// document overwrite instead of growing the partition.
#[derive(Default)]
pub struct InMemoryPartitionStore {
    partitions: RwLock<HashMap<PartitionId, BTreeMap<u32, VectorRecord>>>,
    inserts: AtomicUsize,
}

impl InMemoryPartitionStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `insert` calls served so far.
    pub fn insert_calls(&self) -> usize {
        self.inserts.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl PartitionStore for InMemoryPartitionStore {
    async fn ensure_ready(&self, _dimension: usize) -> Result<(), IndexError> {
        Ok(())
    }

    async fn count(&self, partition: &PartitionId) -> Result<u64, IndexError> {
        let partitions = self.partitions.read().await;
        Ok(partitions
            .get(partition)
            .map_or(0, |records| records.len() as u64))
    }

    async fn insert(
        &self,
        partition: &PartitionId,
        _document: &DocumentIdentity,
        records: Vec<VectorRecord>,
    ) -> Result<usize, IndexError> {
        self.inserts.fetch_add(1, Ordering::Relaxed);
        let written = records.len();
        let mut partitions = self.partitions.write().await;
        let entry = partitions.entry(partition.clone()).or_default();
        for record in records {
            entry.insert(record.chunk.index, record);
        }
        Ok(written)
    }

    async fn query(
        &self,
        partition: &PartitionId,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<Candidate>, IndexError> {
        let partitions = self.partitions.read().await;
        let Some(records) = partitions.get(partition) else {
            return Ok(Vec::new());
        };

        let mut hits: Vec<Candidate> = records
            .values()
            .map(|record| Candidate {
                chunk: record.chunk.clone(),
                score: cosine_similarity(vector, &record.vector),
                vector: record.vector.clone(),
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);
        Ok(hits)
    }
}
