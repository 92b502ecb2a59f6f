//! Bounded prompt context assembly.
//!
//! Retrieved passages are de-duplicated, capped by count and by a token budget, then labeled
//! with their page and categories.

use crate::index::RetrievedChunk;
use std::collections::HashSet;
use std::sync::{Arc, LazyLock};
use tiktoken_rs::cl100k_base;

/// Token-set overlap above which two passages are considered the same.
pub const NEAR_DUPLICATE_JACCARD: f64 = 0.85;

type TokenCounter = Arc<dyn Fn(&str) -> usize + Send + Sync>;

static TOKEN_COUNTER: LazyLock<TokenCounter> = LazyLock::new(build_token_counter);

fn build_token_counter() -> TokenCounter {
    match cl100k_base() {
        Ok(encoding) => Arc::new(move |segment: &str| encoding.encode_ordinary(segment).len()),
        Err(error) => {
            tracing::warn!(error = %error, "cl100k_base unavailable; counting whitespace tokens");
            Arc::new(whitespace_tokens)
        }
    }
}

fn whitespace_tokens(segment: &str) -> usize {
    let tokens = segment.split_whitespace().count();
    if tokens == 0 && !segment.is_empty() {
        1
    } else {
        tokens
    }
}

/// Count tokens with the shared encoder.
pub fn count_tokens(text: &str) -> usize {
    let counter: &(dyn Fn(&str) -> usize + Send + Sync) = &**TOKEN_COUNTER;
    counter(text)
}

/// Context handed to the prompt builder.
#[derive(Debug, Clone, Default)]
pub struct AssembledContext {
    /// Labeled passages joined by blank lines.
    pub text: String,
    /// Number of passages kept.
    pub passages: usize,
    /// Tokens used by the kept passages.
    pub tokens: usize,
}

impl AssembledContext {
    /// Whether no passage survived assembly.
    pub fn is_empty(&self) -> bool {
        self.passages == 0
    }
}

/// Build a context of at most `max_passages` passages and `max_tokens` tokens.
///
/// Passages keep retrieval order. A passage that would overflow the budget is skipped, and later
/// shorter passages may still fit.
pub fn assemble(
    retrieved: &[RetrievedChunk],
    max_passages: usize,
    max_tokens: usize,
) -> AssembledContext {
    assemble_with(retrieved, max_passages, max_tokens, &count_tokens)
}

fn assemble_with(
    retrieved: &[RetrievedChunk],
    max_passages: usize,
    max_tokens: usize,
    counter: &dyn Fn(&str) -> usize,
) -> AssembledContext {
    let mut kept: Vec<&RetrievedChunk> = Vec::new();
    let mut kept_norms: Vec<(String, HashSet<String>)> = Vec::new();
    let mut tokens = 0usize;

    for hit in retrieved {
        if kept.len() >= max_passages {
            break;
        }
        let normalized = normalize(&hit.chunk.text);
        if normalized.is_empty() {
            continue;
        }
        let words = token_set(&normalized);
        let duplicate = kept_norms
            .iter()
            .any(|(other, other_words)| is_near_duplicate(&normalized, &words, other, other_words));
        if duplicate {
            continue;
        }

        let cost = counter(&hit.chunk.text);
        if tokens + cost > max_tokens {
            tracing::debug!(
                page = hit.chunk.page,
                cost,
                used = tokens,
                budget = max_tokens,
                "Passage exceeds context budget"
            );
            continue;
        }

        tokens += cost;
        kept_norms.push((normalized, words));
        kept.push(hit);
    }

    let text = kept
        .iter()
        .enumerate()
        .map(|(position, hit)| format!("{}\n{}", label(position + 1, hit), hit.chunk.text.trim()))
        .collect::<Vec<_>>()
        .join("\n\n");

    AssembledContext {
        text,
        passages: kept.len(),
        tokens,
    }
}

fn label(position: usize, hit: &RetrievedChunk) -> String {
    let categories = hit
        .chunk
        .categories
        .iter()
        .map(|category| category.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "[Passage {position} | page {} | categories: {categories}]",
        hit.chunk.page
    )
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            word.chars()
                .filter(|c| c.is_alphanumeric())
                .flat_map(char::to_lowercase)
                .collect::<String>()
        })
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn token_set(normalized: &str) -> HashSet<String> {
    normalized.split(' ').map(str::to_string).collect()
}

fn is_near_duplicate(
    a: &str,
    a_words: &HashSet<String>,
    b: &str,
    b_words: &HashSet<String>,
) -> bool {
    if a == b || a.contains(b) || b.contains(a) {
        return true;
    }
    let union = a_words.union(b_words).count();
    if union == 0 {
        return false;
    }
    let intersection = a_words.intersection(b_words).count();
    intersection as f64 / union as f64 >= NEAR_DUPLICATE_JACCARD
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{Category, Chunk};

    fn hit(page: u32, text: &str) -> RetrievedChunk {
        RetrievedChunk {
            chunk: Chunk {
                text: text.to_string(),
                page,
                index: page,
                categories: vec![Category::Premium, Category::Claims],
                source: "https://example.org/p.pdf".into(),
            },
            score: 0.5,
        }
    }

    #[test]
    fn labels_carry_page_and_categories() {
        let context = assemble(&[hit(4, "Grace period is 30 days.")], 5, 2000);
        assert_eq!(context.passages, 1);
        assert!(context
            .text
            .starts_with("[Passage 1 | page 4 | categories: premium, claims]\nGrace period"));
    }

    #[test]
    fn near_duplicates_are_dropped() {
        let hits = [
            hit(1, "The grace period for premium payment is 30 days."),
            hit(2, "the grace period for premium payment is 30 days"),
            hit(3, "Grace period for premium payment is 30 days."),
            hit(4, "Maternity cover requires 24 months of continuous coverage."),
        ];
        let context = assemble(&hits, 5, 2000);
        assert_eq!(context.passages, 2);
        assert!(context.text.contains("Maternity"));
    }

    #[test]
    fn passage_cap_is_enforced() {
        let hits: Vec<_> = (0..10)
            .map(|n| hit(n, &format!("Distinct clause number {n} about topic {}", n * 7)))
            .collect();
        assert_eq!(assemble(&hits, 5, 2000).passages, 5);
    }

    #[test]
    fn token_budget_skips_oversized_passages() {
        let long = "word ".repeat(50);
        let hits = [hit(1, &long), hit(2, "short passage here")];
        let context = assemble_with(&hits, 5, 10, &whitespace_tokens);
        assert_eq!(context.passages, 1);
        assert_eq!(context.tokens, 3);
        assert!(context.text.contains("short passage here"));
    }

    #[test]
    fn empty_input_yields_empty_context() {
        let context = assemble(&[], 5, 2000);
        assert!(context.is_empty());
        assert!(context.text.is_empty());
    }

    #[test]
    fn whitespace_counter_counts_words() {
        assert_eq!(whitespace_tokens("a b  c"), 3);
        assert_eq!(whitespace_tokens(" "), 1);
        assert_eq!(whitespace_tokens(""), 0);
    }
}
