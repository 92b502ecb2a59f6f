#![deny(missing_docs)]

//! Document-grounded question answering over remote PDF documents.
//!
//! A request names one document and a list of questions. The document is fetched, split into
//! categorized passages, and embedded into its own partition of a shared vector collection;
//! later requests for the same document reuse that partition. Each question is answered from
//! retrieved passages by a hosted chat model, validated, retried, and cleaned.

/// Answer pipeline: context assembly, prompting, validation, and cleaning.
pub mod answer;
/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Chat-completion clients with model fallback.
pub mod generation;
/// Per-document vector partitions and MMR retrieval.
pub mod index;
/// Document fetching, text extraction, and chunking.
pub mod ingest;
/// Structured logging and tracing setup.
pub mod logging;
/// Query activity counters.
pub mod metrics;
/// Request validation and pipeline orchestration.
pub mod processing;
/// Qdrant vector store integration.
pub mod qdrant;
