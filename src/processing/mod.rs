//! Query pipeline: request validation and orchestration of ingestion, indexing, and answering.

mod service;
pub mod types;

pub use service::{QueryApi, QueryService};
pub use types::{QueryError, QueryReport, QueryRequest, QueryResponse};
