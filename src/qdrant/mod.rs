//! Qdrant vector store integration.

pub mod client;
pub mod filters;
pub mod payload;
pub mod types;

pub use client::QdrantService;
pub use filters::{PAYLOAD_INDEXES, partition_filter};
pub use payload::{build_payload, compute_chunk_hash, current_timestamp_rfc3339, point_id};
pub use types::{CollectionStatus, PointInsert, QdrantError, ScoredPoint};
