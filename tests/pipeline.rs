use std::collections::HashMap;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};
use std::time::Duration;

use async_trait::async_trait;
use docqa::{
    answer::{AnswerPipeline, SENTINEL_ANSWER, is_rejected},
    config::{AnswerSettings, ChunkerSettings, QuerySettings, RetrievalSettings},
    embedding::{EmbeddingClient, EmbeddingClientError, HashingEmbeddingClient},
    generation::{GenerationClient, GenerationError, GenerationRequest},
    index::{IndexManager, InMemoryPartitionStore, PartitionStore},
    ingest::{Chunker, DocumentLoader, FetchError, IngestError, RawDocument},
    processing::{QueryError, QueryRequest, QueryService},
};

const POLICY_URL: &str = "https://example.org/policies/term-life.pdf";
const HEALTH_URL: &str = "https://example.org/policies/health.pdf";

const POLICY_PAGES: [&str; 3] = [
    "Eligibility. The minimum entry age is 18 years and the maximum entry age is 65 years \
     on the date the policy is issued. Proof of age must be submitted with the proposal form.",
    "Premium payment. A grace period of 30 days is allowed for payment of each premium after \
     the due date. The policy remains in force during the grace period.",
    "Maturity benefit. On survival of the life assured to the date of maturity the sum assured \
     on maturity is payable and the policy terminates.",
];

const HEALTH_PAGES: [&str; 1] = [
    "Waiting period. Pre-existing diseases are covered after a continuous waiting period of \
     48 months from the first policy inception date.",
];

struct StaticLoader {
    documents: HashMap<&'static str, Vec<String>>,
    loads: Arc<AtomicUsize>,
}

impl StaticLoader {
    fn new(loads: Arc<AtomicUsize>) -> Self {
        let mut documents = HashMap::new();
        documents.insert(POLICY_URL, POLICY_PAGES.iter().map(|p| p.to_string()).collect());
        documents.insert(HEALTH_URL, HEALTH_PAGES.iter().map(|p| p.to_string()).collect());
        Self { documents, loads }
    }
}

#[async_trait]
impl DocumentLoader for StaticLoader {
    async fn load(&self, locator: &str) -> Result<RawDocument, IngestError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let pages = self.documents.get(locator).cloned().ok_or_else(|| {
            IngestError::Fetch(FetchError::Status {
                status: reqwest::StatusCode::NOT_FOUND,
            })
        })?;
        Ok(RawDocument {
            source: locator.to_string(),
            pages,
        })
    }
}

/// Hashing embedder that counts every text it embeds.
struct CountingEmbedder {
    inner: HashingEmbeddingClient,
    texts: AtomicUsize,
}

#[async_trait]
impl EmbeddingClient for CountingEmbedder {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        self.texts.fetch_add(texts.len(), Ordering::SeqCst);
        self.inner.generate_embeddings(texts).await
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }
}

/// Answers from the prompt's passages, or with the sentinel when they do not cover the question.
#[derive(Default)]
struct GroundedGenerator {
    prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl GenerationClient for GroundedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        self.prompts
            .lock()
            .expect("prompts lock")
            .push(request.prompt.clone());
        let (passages, question) = request
            .prompt
            .split_once("Question:")
            .ok_or_else(|| GenerationError::InvalidResponse("prompt without question".into()))?;
        let question = question.to_lowercase();

        if question.contains("entry age") && passages.contains("entry age is 18") {
            return Ok(
                "the minimum entry age is 18 years and the maximum entry age is 65 years".into(),
            );
        }
        if question.contains("grace period") && passages.contains("grace period of 30 days") {
            return Ok("A grace period of 30 days is allowed for payment of each premium.".into());
        }
        Ok(SENTINEL_ANSWER.to_string())
    }

    fn model(&self) -> &str {
        "grounded-test"
    }
}

struct Harness {
    service: QueryService,
    loads: Arc<AtomicUsize>,
    store: Arc<InMemoryPartitionStore>,
    embedder: Arc<CountingEmbedder>,
    generator: Arc<GroundedGenerator>,
}

fn harness() -> Harness {
    let loads = Arc::new(AtomicUsize::new(0));
    let store = Arc::new(InMemoryPartitionStore::new());
    let embedder = Arc::new(CountingEmbedder {
        inner: HashingEmbeddingClient::new(256),
        texts: AtomicUsize::new(0),
    });
    let generator = Arc::new(GroundedGenerator::default());

    let chunker = Chunker::new(
        Box::new(StaticLoader::new(Arc::clone(&loads))),
        &ChunkerSettings {
            min_length: 40,
            ..ChunkerSettings::default()
        },
    );
    let index = IndexManager::new(store.clone(), embedder.clone());
    let answers = AnswerPipeline::new(
        generator.clone(),
        AnswerSettings {
            retry_delay: Duration::ZERO,
            ..AnswerSettings::default()
        },
        RetrievalSettings::default(),
        150,
    );
    let service = QueryService::new(
        chunker,
        index,
        answers,
        QuerySettings {
            question_pause: Duration::ZERO,
            ..QuerySettings::default()
        },
    );

    Harness {
        service,
        loads,
        store,
        embedder,
        generator,
    }
}

fn request(document: &str, questions: &[&str]) -> QueryRequest {
    QueryRequest {
        documents: document.to_string(),
        questions: questions.iter().map(|q| q.to_string()).collect(),
    }
}

#[tokio::test]
async fn answers_are_grounded_and_aligned_with_questions() {
    let h = harness();
    let report = h
        .service
        .run(request(
            POLICY_URL,
            &[
                "What is the entry age for this policy?",
                "Are any riders available with this policy?",
            ],
        ))
        .await
        .expect("query");

    assert_eq!(report.answers.len(), 2);
    assert!(report.answers[0].contains("18"), "{}", report.answers[0]);
    assert!(report.answers[0].contains("65"), "{}", report.answers[0]);
    assert_eq!(report.answers[1], SENTINEL_ANSWER);
    assert!(!report.cache_hit);
    assert!(report.chunk_count > 0);
}

#[tokio::test]
async fn accepted_answers_are_clean_sentences() {
    let h = harness();
    let report = h
        .service
        .run(request(
            POLICY_URL,
            &["What is the entry age?", "How long is the grace period?"],
        ))
        .await
        .expect("query");

    for answer in &report.answers {
        assert!(!is_rejected(answer), "rejected answer returned: {answer}");
        assert!(answer.chars().count() <= 300);
        assert!(answer.ends_with('.'));
        assert!(answer.chars().next().is_some_and(char::is_uppercase));
        assert!(!answer.to_lowercase().contains("passage"));
    }
}

#[tokio::test]
async fn second_request_reuses_partition_without_embedding_document() {
    let h = harness();
    let first = h
        .service
        .run(request(POLICY_URL, &["What is the entry age?"]))
        .await
        .expect("first query");
    let embedded_after_first = h.embedder.texts.load(Ordering::SeqCst);
    assert!(embedded_after_first > first.chunk_count);
    let vectors_after_first = h.store.count(&first.partition).await.expect("count");
    assert_eq!(vectors_after_first, first.chunk_count as u64);

    let second = h
        .service
        .run(request(POLICY_URL, &["What is the entry age?"]))
        .await
        .expect("second query");

    assert!(second.cache_hit);
    assert_eq!(first.partition, second.partition);
    assert_eq!(h.store.insert_calls(), 1);
    assert_eq!(
        h.store.count(&second.partition).await.expect("count"),
        vectors_after_first
    );
    // Only the single retrieval query is embedded on a hit.
    assert_eq!(
        h.embedder.texts.load(Ordering::SeqCst) - embedded_after_first,
        1
    );
    assert_eq!(first.answers, second.answers);

    let metrics = h.service.metrics().snapshot();
    assert_eq!(metrics.requests, 2);
    assert_eq!(metrics.documents_indexed, 1);
    assert_eq!(metrics.cache_hits, 1);
}

#[tokio::test]
async fn documents_do_not_see_each_others_passages() {
    let h = harness();
    h.service
        .run(request(POLICY_URL, &["What is the entry age?"]))
        .await
        .expect("policy query");
    let report = h
        .service
        .run(request(HEALTH_URL, &["What is the entry age?"]))
        .await
        .expect("health query");

    assert_eq!(report.answers[0], SENTINEL_ANSWER);
    assert_eq!(h.store.insert_calls(), 2);
    let prompts = h.generator.prompts.lock().expect("prompts");
    let health_prompts = &prompts[1..];
    assert!(!health_prompts.is_empty());
    for prompt in health_prompts {
        assert!(prompt.contains("48 months"));
        assert!(!prompt.contains("entry age is 18"));
    }
}

#[tokio::test]
async fn invalid_requests_are_rejected_before_fetching() {
    let h = harness();

    let empty = h.service.run(request(POLICY_URL, &[])).await;
    assert!(matches!(empty, Err(QueryError::InvalidRequest(_))));

    let too_many: Vec<&str> = std::iter::repeat_n("What is the entry age?", 26).collect();
    let oversized = h.service.run(request(POLICY_URL, &too_many)).await;
    assert!(matches!(oversized, Err(QueryError::InvalidRequest(_))));

    let blank = h.service.run(request(POLICY_URL, &["What?", "   "])).await;
    assert!(matches!(blank, Err(QueryError::InvalidRequest(_))));

    let no_document = h.service.run(request("  ", &["What is the entry age?"])).await;
    assert!(matches!(no_document, Err(QueryError::InvalidRequest(_))));

    assert_eq!(h.loads.load(Ordering::SeqCst), 0);
    assert_eq!(h.service.metrics().snapshot().requests, 0);
}

#[tokio::test]
async fn maximum_question_count_is_accepted() {
    let h = harness();
    let questions: Vec<&str> = std::iter::repeat_n("How long is the grace period?", 25).collect();
    let report = h
        .service
        .run(request(POLICY_URL, &questions))
        .await
        .expect("query");
    assert_eq!(report.answers.len(), 25);
    assert!(report.answers.iter().all(|answer| answer.contains("30 days")));
}

#[tokio::test]
async fn unreachable_document_surfaces_client_error() {
    let h = harness();
    let error = h
        .service
        .run(request("https://example.org/missing.pdf", &["What is covered?"]))
        .await
        .expect_err("missing document");
    assert!(matches!(error, QueryError::Ingest(_)));
    assert!(error.is_client_error());
    assert_eq!(h.store.insert_calls(), 0);
}
