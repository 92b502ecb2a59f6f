//! Query service coordinating ingestion, partition resolution, and answering.

use crate::{
    answer::AnswerPipeline,
    config::{Config, QuerySettings},
    embedding::get_embedding_client,
    generation::get_generation_client,
    index::{IndexManager, PartitionStore, QdrantPartitionStore},
    ingest::{Chunker, HttpPdfLoader},
    metrics::{MetricsSnapshot, QueryMetrics},
    processing::types::{QueryError, QueryReport, QueryRequest},
    qdrant::QdrantService,
};
use anyhow::Context;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Drives one request through Chunker, Vector Index Manager, and Answer Pipeline.
///
/// Construct the service once near process start and share it through an `Arc`; every
/// collaborator it owns is `Send + Sync`.
pub struct QueryService {
    chunker: Chunker,
    index: IndexManager,
    answers: AnswerPipeline,
    limits: QuerySettings,
    metrics: Arc<QueryMetrics>,
}

/// Abstraction over the query pipeline used by external surfaces (HTTP, CLI).
#[async_trait]
pub trait QueryApi: Send + Sync {
    /// Answer every question in `request` about its document.
    async fn query(&self, request: QueryRequest) -> Result<QueryReport, QueryError>;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

impl QueryService {
    /// Assemble a service from already built components.
    pub fn new(
        chunker: Chunker,
        index: IndexManager,
        answers: AnswerPipeline,
        limits: QuerySettings,
    ) -> Self {
        Self {
            chunker,
            index,
            answers,
            limits,
            metrics: Arc::new(QueryMetrics::new()),
        }
    }

    /// Build the production wiring: HTTP PDF loader, Qdrant-backed partitions, hosted models.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        tracing::info!(provider = ?config.embedding.provider, "Initializing embedding client");
        let embedder = get_embedding_client(&config.embedding)
            .context("failed to initialize embedding client")?;
        let generator = get_generation_client(&config.generation)
            .context("failed to initialize generation client")?;

        let qdrant = QdrantService::new(&config.qdrant_url, config.qdrant_api_key.clone())
            .context("failed to initialize Qdrant client")?;
        let store: Arc<dyn PartitionStore> = Arc::new(QdrantPartitionStore::new(
            qdrant,
            config.qdrant_collection_name.clone(),
            config.index.clone(),
        ));

        let loader = HttpPdfLoader::new(config.chunker.fetch_timeout)
            .context("failed to initialize document loader")?;

        Ok(Self::new(
            Chunker::new(Box::new(loader), &config.chunker),
            IndexManager::new(store, embedder),
            AnswerPipeline::new(
                generator,
                config.answer.clone(),
                config.retrieval,
                config.generation.max_tokens,
            ),
            config.query.clone(),
        ))
    }

    /// Run the full pipeline for one request.
    pub async fn run(&self, request: QueryRequest) -> Result<QueryReport, QueryError> {
        let started = Instant::now();
        self.validate(&request)?;
        self.metrics.record_request();

        let locator = request.documents.trim();
        tracing::info!(document = %locator, questions = request.questions.len(), "Processing query");

        let chunks = self.chunker.ingest(locator).await?;
        let resolved = self.index.resolve(&chunks, locator).await?;
        self.metrics
            .record_resolution(resolved.cache_hit, resolved.inserted as u64);

        let mut records = Vec::with_capacity(request.questions.len());
        for (position, question) in request.questions.iter().enumerate() {
            if position > 0 && self.limits.question_pause > Duration::ZERO {
                tokio::time::sleep(self.limits.question_pause).await;
            }
            tracing::debug!(
                question = position + 1,
                total = request.questions.len(),
                "Answering question"
            );
            let outcome = self.answers.answer(&resolved.handle, question).await;
            self.metrics.record_answer(outcome.record.status);
            records.push(outcome.record);
        }

        let report = QueryReport {
            answers: records.iter().map(|record| record.answer.clone()).collect(),
            records,
            partition: resolved.partition,
            cache_hit: resolved.cache_hit,
            chunk_count: chunks.len(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        tracing::info!(
            partition = %report.partition,
            cache_hit = report.cache_hit,
            chunks = report.chunk_count,
            answers = report.answers.len(),
            elapsed_ms = report.elapsed_ms,
            "Query completed"
        );
        Ok(report)
    }

    fn validate(&self, request: &QueryRequest) -> Result<(), QueryError> {
        if request.documents.trim().is_empty() {
            return Err(QueryError::InvalidRequest(
                "a document URL is required".into(),
            ));
        }
        if request.questions.is_empty() {
            return Err(QueryError::InvalidRequest(
                "at least one question is required".into(),
            ));
        }
        if request.questions.len() > self.limits.max_questions {
            return Err(QueryError::InvalidRequest(format!(
                "at most {} questions are allowed per request, got {}",
                self.limits.max_questions,
                request.questions.len()
            )));
        }
        if let Some(position) = request
            .questions
            .iter()
            .position(|question| question.trim().is_empty())
        {
            return Err(QueryError::InvalidRequest(format!(
                "question {} is empty",
                position + 1
            )));
        }
        Ok(())
    }

    /// Counters shared with the HTTP surface.
    pub fn metrics(&self) -> Arc<QueryMetrics> {
        Arc::clone(&self.metrics)
    }
}

#[async_trait]
impl QueryApi for QueryService {
    async fn query(&self, request: QueryRequest) -> Result<QueryReport, QueryError> {
        self.run(request).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}
