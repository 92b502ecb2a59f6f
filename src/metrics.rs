use crate::answer::AnswerStatus;
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing query activity.
#[derive(Default)]
pub struct QueryMetrics {
    requests: AtomicU64,
    documents_indexed: AtomicU64,
    cache_hits: AtomicU64,
    chunks_indexed: AtomicU64,
    questions_answered: AtomicU64,
    sentinel_answers: AtomicU64,
}

impl QueryMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an accepted (validated) query request.
    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Record how a document's partition was resolved.
    pub fn record_resolution(&self, cache_hit: bool, inserted: u64) {
        if cache_hit {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.documents_indexed.fetch_add(1, Ordering::Relaxed);
            self.chunks_indexed.fetch_add(inserted, Ordering::Relaxed);
        }
    }

    /// Record the disposition of one answered question.
    pub fn record_answer(&self, status: AnswerStatus) {
        self.questions_answered.fetch_add(1, Ordering::Relaxed);
        if status == AnswerStatus::Exhausted {
            self.sentinel_answers.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            documents_indexed: self.documents_indexed.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            chunks_indexed: self.chunks_indexed.load(Ordering::Relaxed),
            questions_answered: self.questions_answered.load(Ordering::Relaxed),
            sentinel_answers: self.sentinel_answers.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of query counters used for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Query requests accepted since startup.
    pub requests: u64,
    /// Documents embedded and inserted (cache misses).
    pub documents_indexed: u64,
    /// Requests served from an existing partition.
    pub cache_hits: u64,
    /// Vectors written across all indexed documents.
    pub chunks_indexed: u64,
    /// Questions answered, including sentinel answers.
    pub questions_answered: u64,
    /// Questions that exhausted their attempts.
    pub sentinel_answers: u64,
}
