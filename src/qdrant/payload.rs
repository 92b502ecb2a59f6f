//! Helpers for constructing and hashing Qdrant payloads.

use crate::ingest::Chunk;
use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use uuid::Uuid;

/// Payload field carrying the partition a point belongs to.
pub const PARTITION_FIELD: &str = "partition";

/// Build the payload object stored alongside each indexed chunk.
pub fn build_payload(
    partition: &str,
    document_id: &str,
    chunk: &Chunk,
    timestamp_rfc3339: &str,
) -> Value {
    let mut payload = Map::new();
    payload.insert(PARTITION_FIELD.into(), Value::String(partition.to_string()));
    payload.insert("document_id".into(), Value::String(document_id.to_string()));
    payload.insert("source".into(), Value::String(chunk.source.clone()));
    payload.insert("text".into(), Value::String(chunk.text.clone()));
    payload.insert("page".into(), json!(chunk.page));
    payload.insert("chunk_index".into(), json!(chunk.index));
    payload.insert(
        "categories".into(),
        Value::Array(
            chunk
                .categories
                .iter()
                .map(|category| Value::String(category.as_str().to_string()))
                .collect(),
        ),
    );
    payload.insert(
        "chunk_hash".into(),
        Value::String(compute_chunk_hash(&chunk.text)),
    );
    payload.insert(
        "ingested_at".into(),
        Value::String(timestamp_rfc3339.to_string()),
    );
    Value::Object(payload)
}

/// Compute a deterministic SHA-256 hash for the chunk text.
pub fn compute_chunk_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Current timestamp formatted for payload storage.
pub fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

/// Point identifier derived from the partition and chunk position.
///
/// Re-inserting the same chunk into the same partition always yields the same id, so a
/// duplicate upsert overwrites instead of adding a second copy.
pub fn point_id(partition: &str, chunk_index: u32) -> String {
    let name = format!("{partition}/{chunk_index}");
    Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes()).to_string()
}
