//! Semantic splitting with character-based overlap.
//!
//! `semchunk-rs` does the boundary work: it splits at the coarsest boundary present (newline
//! runs, then sentence terminators, clause separators, whitespace) and only falls back to
//! individual characters when nothing else fits. It is driven with a character counter, so
//! sizes are measured in characters.
//!
//! Base chunks are cut to `chunk_size - overlap` characters and each chunk after the first is
//! prefixed with the tail of its predecessor, so no emitted passage exceeds `chunk_size`.

use semchunk_rs::Chunker as SemanticChunker;

/// Splits page text into overlapping, length-bounded passages.
#[derive(Debug, Clone, Copy)]
pub struct TextSplitter {
    chunk_size: usize,
    overlap: usize,
}

impl TextSplitter {
    /// Build a splitter; the overlap is clamped below the chunk size.
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            overlap: overlap.min(chunk_size.saturating_sub(1)),
        }
    }

    /// Split `text` into trimmed passages no longer than the chunk size.
    ///
    /// Returns an empty vector when the input is all whitespace.
    pub fn split(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        let base = SemanticChunker::new(
            self.chunk_size - self.overlap,
            Box::new(|segment: &str| char_len(segment)),
        )
        .chunk(text)
        .into_iter()
        .map(|chunk| chunk.trim().to_string())
        .filter(|chunk| !chunk.is_empty())
        .collect();
        self.with_overlap(base)
    }

    fn with_overlap(&self, chunks: Vec<String>) -> Vec<String> {
        if self.overlap == 0 {
            return chunks;
        }
        let mut result = Vec::with_capacity(chunks.len());
        let mut previous: Option<String> = None;
        for current in chunks {
            let joined = match previous.as_deref() {
                Some(prior) => {
                    let room = self.chunk_size.saturating_sub(char_len(&current) + 1);
                    let tail = word_aligned_tail(prior, self.overlap.min(room));
                    if tail.is_empty() {
                        current.clone()
                    } else {
                        format!("{tail} {current}")
                    }
                }
                None => current.clone(),
            };
            result.push(joined);
            previous = Some(current);
        }
        result
    }
}

/// Last `limit` characters of `text`, advanced to a word start when the cut lands mid-word.
fn word_aligned_tail(text: &str, limit: usize) -> &str {
    if limit == 0 {
        return "";
    }
    let total = char_len(text);
    if total <= limit {
        return text.trim();
    }
    let start = text
        .char_indices()
        .nth(total - limit)
        .map_or(text.len(), |(offset, _)| offset);
    let tail = &text[start..];
    let mid_word = !text[..start].ends_with(char::is_whitespace);
    if mid_word && let Some(space) = tail.find(char::is_whitespace) {
        return tail[space..].trim();
    }
    tail.trim()
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}
