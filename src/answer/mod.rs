//! Per-question answering: retrieve, assemble context, generate, validate, clean.
//!
//! Each question runs a bounded attempt loop (see [`validate::AttemptState`]). Any failure inside
//! an attempt (retrieval, generation, or a rejected answer) only consumes that attempt; once
//! attempts are exhausted the question resolves to [`SENTINEL_ANSWER`]. [`AnswerPipeline::answer`]
//! therefore never fails.

pub mod clean;
pub mod context;
pub mod prompt;
pub mod query;
pub mod validate;

pub use clean::{CleanStep, clean_answer, default_pipeline};
pub use validate::{AttemptPolicy, AttemptState, SENTINEL_ANSWER, is_rejected};

use crate::config::{AnswerSettings, RetrievalSettings};
use crate::generation::{GenerationClient, GenerationRequest};
use crate::index::PartitionHandle;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Final disposition of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerStatus {
    /// A validated answer was produced.
    Accepted,
    /// Every attempt was rejected; the sentinel was returned.
    Exhausted,
}

/// One pass through the retry loop.
#[derive(Debug, Clone)]
pub struct AnswerAttempt {
    /// 1-based attempt number.
    pub attempt: u32,
    /// Query used for retrieval.
    pub retrieval_query: String,
    /// Text returned by the model, if generation succeeded.
    pub generated: Option<String>,
    /// Cleaned text, if the raw answer passed validation.
    pub cleaned: Option<String>,
    /// Why the attempt failed, if it did.
    pub failure: Option<String>,
}

/// Audit record for one answered question.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerRecord {
    /// Question as asked.
    pub question: String,
    /// Final answer text.
    pub answer: String,
    /// Attempts consumed.
    pub attempts: u32,
    /// Wall-clock time spent on the question, in milliseconds.
    pub latency_ms: u64,
    /// Whether the answer was accepted or the sentinel was returned.
    pub status: AnswerStatus,
}

/// Record plus the per-attempt trail that produced it.
#[derive(Debug, Clone)]
pub struct AnswerOutcome {
    /// Audit record.
    pub record: AnswerRecord,
    /// Attempts in order.
    pub history: Vec<AnswerAttempt>,
}

/// Answers questions against one partition at a time.
pub struct AnswerPipeline {
    generator: Arc<dyn GenerationClient>,
    settings: AnswerSettings,
    retrieval: RetrievalSettings,
    max_tokens: usize,
    steps: Vec<CleanStep>,
}

impl AnswerPipeline {
    /// Build a pipeline over `generator`.
    pub fn new(
        generator: Arc<dyn GenerationClient>,
        settings: AnswerSettings,
        retrieval: RetrievalSettings,
        max_tokens: usize,
    ) -> Self {
        let steps = default_pipeline(settings.max_answer_chars);
        Self {
            generator,
            settings,
            retrieval,
            max_tokens,
            steps,
        }
    }

    /// Answer `question` from the passages behind `handle`.
    pub async fn answer(&self, handle: &PartitionHandle, question: &str) -> AnswerOutcome {
        let started = Instant::now();
        let policy = AttemptPolicy::new(self.settings.max_attempts);
        let mut state = AttemptState::Pending;
        let mut history = Vec::new();
        let mut accepted: Option<String> = None;

        while !state.is_terminal() {
            let attempt = state.next_attempt();
            if attempt > 1 && self.settings.retry_delay > Duration::ZERO {
                tokio::time::sleep(self.settings.retry_delay).await;
            }

            let outcome = self.run_attempt(handle, question, attempt).await;
            tracing::debug!(
                partition = %handle.partition(),
                attempt,
                failure = outcome.failure.as_deref().unwrap_or(""),
                "Answer attempt finished"
            );
            state = policy.advance(state, outcome.cleaned.as_deref());
            if state == AttemptState::Accepted {
                accepted = outcome.cleaned.clone();
            }
            history.push(outcome);
        }

        let (answer, status) = match accepted {
            Some(answer) => (answer, AnswerStatus::Accepted),
            None => (SENTINEL_ANSWER.to_string(), AnswerStatus::Exhausted),
        };
        let record = AnswerRecord {
            question: question.to_string(),
            answer,
            attempts: history.len() as u32,
            latency_ms: started.elapsed().as_millis() as u64,
            status,
        };

        tracing::info!(
            target: crate::logging::AUDIT_TARGET,
            partition = %handle.partition(),
            question = %record.question,
            status = ?record.status,
            attempts = record.attempts,
            latency_ms = record.latency_ms,
            answer_chars = record.answer.chars().count(),
            "Question answered"
        );

        AnswerOutcome { record, history }
    }

    async fn run_attempt(
        &self,
        handle: &PartitionHandle,
        question: &str,
        attempt: u32,
    ) -> AnswerAttempt {
        let retrieval_query = if attempt == 1 {
            query::expand_question(question)
        } else {
            question.trim().to_string()
        };
        let mut record = AnswerAttempt {
            attempt,
            retrieval_query,
            generated: None,
            cleaned: None,
            failure: None,
        };

        let retrieved = match handle.retrieve(&record.retrieval_query, &self.retrieval).await {
            Ok(retrieved) => retrieved,
            Err(error) => {
                tracing::warn!(error = %error, attempt, "Retrieval failed");
                record.failure = Some(format!("retrieval failed: {error}"));
                return record;
            }
        };

        let assembled = context::assemble(
            &retrieved,
            self.settings.max_passages,
            self.settings.max_context_tokens,
        );
        if assembled.is_empty() {
            record.failure = Some("no passages retrieved".into());
            return record;
        }

        let request = GenerationRequest {
            system: prompt::system_prompt(),
            prompt: prompt::user_prompt(&assembled.text, question),
            temperature: 0.0,
            max_tokens: self.max_tokens,
        };
        let generated = match self.generator.generate(&request).await {
            Ok(text) => text,
            Err(error) => {
                tracing::warn!(error = %error, attempt, model = %self.generator.model(), "Generation failed");
                record.failure = Some(format!("generation failed: {error}"));
                return record;
            }
        };
        record.generated = Some(generated.clone());

        if is_rejected(&generated) {
            record.failure = Some("generic or too short".into());
            return record;
        }
        let cleaned = clean_answer(&generated, &self.steps);
        if is_rejected(&cleaned) {
            record.failure = Some("too short after cleaning".into());
        }
        record.cleaned = Some(cleaned);
        record
    }
}
