//! Partition store backed by a single shared Qdrant collection.

use super::identity::{DocumentIdentity, PartitionId};
use super::types::{Candidate, IndexError, VectorRecord};
use super::PartitionStore;
use crate::config::IndexSettings;
use crate::ingest::{Category, Chunk};
use crate::qdrant::{
    PAYLOAD_INDEXES, PointInsert, QdrantError, QdrantService, ScoredPoint, build_payload,
    current_timestamp_rfc3339, partition_filter, point_id,
};
use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::OnceCell;
use tokio::time::Instant;

/// Stores every partition in one collection, separated by the `partition` payload field.
pub struct QdrantPartitionStore {
    service: QdrantService,
    collection: String,
    settings: IndexSettings,
    ready: OnceCell<()>,
}

impl QdrantPartitionStore {
    /// Wrap a Qdrant client; the collection is created lazily on first use.
    pub fn new(service: QdrantService, collection: impl Into<String>, settings: IndexSettings) -> Self {
        Self {
            service,
            collection: collection.into(),
            settings,
            ready: OnceCell::new(),
        }
    }

    async fn prepare(&self, dimension: usize) -> Result<(), IndexError> {
        self.service
            .create_collection_if_not_exists(&self.collection, dimension as u64)
            .await
            .map_err(creation_error)?;
        self.wait_until_ready().await?;
        self.service
            .ensure_payload_indexes(&self.collection, &PAYLOAD_INDEXES)
            .await
            .map_err(creation_error)?;
        tracing::info!(collection = %self.collection, dimension, "Shared collection ready");
        Ok(())
    }

    async fn wait_until_ready(&self) -> Result<(), IndexError> {
        let deadline = Instant::now() + self.settings.ready_timeout;
        loop {
            match self
                .service
                .collection_status(&self.collection)
                .await
                .map_err(creation_error)?
            {
                Some(status) if status.is_ready() => return Ok(()),
                status => {
                    tracing::debug!(collection = %self.collection, ?status, "Waiting for collection");
                }
            }
            if Instant::now() >= deadline {
                return Err(IndexError::Creation(format!(
                    "collection {} not ready after {}s",
                    self.collection,
                    self.settings.ready_timeout.as_secs()
                )));
            }
            tokio::time::sleep(self.settings.ready_poll_interval).await;
        }
    }
}

fn creation_error(error: QdrantError) -> IndexError {
    if error.is_transport() {
        IndexError::Connection(error.to_string())
    } else {
        IndexError::Creation(error.to_string())
    }
}

#[async_trait]
impl PartitionStore for QdrantPartitionStore {
    async fn ensure_ready(&self, dimension: usize) -> Result<(), IndexError> {
        self.ready
            .get_or_try_init(|| self.prepare(dimension))
            .await
            .map(|_| ())
    }

    async fn count(&self, partition: &PartitionId) -> Result<u64, IndexError> {
        Ok(self
            .service
            .count_points(&self.collection, partition_filter(partition.as_str()))
            .await?)
    }

    async fn insert(
        &self,
        partition: &PartitionId,
        document: &DocumentIdentity,
        records: Vec<VectorRecord>,
    ) -> Result<usize, IndexError> {
        let now = current_timestamp_rfc3339();
        let points = records
            .into_iter()
            .map(|record| PointInsert {
                id: point_id(partition.as_str(), record.chunk.index),
                payload: build_payload(partition.as_str(), document.as_str(), &record.chunk, &now),
                vector: record.vector,
            })
            .collect();
        Ok(self.service.upsert_points(&self.collection, points).await?)
    }

    async fn query(
        &self,
        partition: &PartitionId,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<Candidate>, IndexError> {
        let points = self
            .service
            .query_points(
                &self.collection,
                vector,
                partition_filter(partition.as_str()),
                limit,
                true,
            )
            .await?;

        Ok(points
            .into_iter()
            .filter_map(|point| {
                let id = point.id.clone();
                let candidate = candidate_from_point(point);
                if candidate.is_none() {
                    tracing::warn!(point = %id, "Skipping point without text or vector");
                }
                candidate
            })
            .collect())
    }
}

fn candidate_from_point(point: ScoredPoint) -> Option<Candidate> {
    let payload = point.payload?;
    let vector = point.vector?;
    Some(Candidate {
        chunk: chunk_from_payload(&payload)?,
        score: point.score,
        vector,
    })
}

fn chunk_from_payload(payload: &Map<String, Value>) -> Option<Chunk> {
    let text = payload.get("text")?.as_str()?.to_string();
    let number = |key: &str| {
        payload
            .get(key)
            .and_then(Value::as_u64)
            .and_then(|value| u32::try_from(value).ok())
    };
    let mut categories: Vec<Category> = payload
        .get("categories")
        .and_then(Value::as_array)
        .map(|labels| {
            labels
                .iter()
                .filter_map(Value::as_str)
                .filter_map(Category::from_label)
                .collect()
        })
        .unwrap_or_default();
    if categories.is_empty() {
        categories.push(Category::General);
    }

    Some(Chunk {
        text,
        page: number("page").unwrap_or(0),
        index: number("chunk_index").unwrap_or(0),
        categories,
        source: payload
            .get("source")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    })
}
