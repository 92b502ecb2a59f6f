//! Document ingestion: fetch, extract, split, clean, and categorize.

pub mod categories;
pub mod clean;
mod fetch;
pub mod splitter;
pub mod types;

pub use categories::{Category, categorize};
pub use fetch::{DocumentLoader, HttpPdfLoader};
pub use splitter::TextSplitter;
pub use types::{Chunk, ExtractionError, FetchError, IngestError, RawDocument};

use crate::config::ChunkerSettings;

/// Turns a document locator into cleaned, categorized passages.
///
/// The loader is injected so that the splitting and cleaning stages can run against in-memory
/// documents in tests and offline tools.
pub struct Chunker {
    loader: Box<dyn DocumentLoader>,
    splitter: TextSplitter,
    min_length: usize,
}

impl Chunker {
    /// Build a chunker over the given loader.
    pub fn new(loader: Box<dyn DocumentLoader>, settings: &ChunkerSettings) -> Self {
        Self {
            loader,
            splitter: TextSplitter::new(settings.chunk_size, settings.chunk_overlap),
            min_length: settings.min_length,
        }
    }

    /// Fetch the document behind `locator` and split it into passages.
    pub async fn ingest(&self, locator: &str) -> Result<Vec<Chunk>, IngestError> {
        let document = self.loader.load(locator).await?;
        let chunks = self.chunk_document(&document)?;
        tracing::info!(
            source = %document.source,
            pages = document.pages.len(),
            chunks = chunks.len(),
            "Document chunked"
        );
        Ok(chunks)
    }

    /// Split, clean, filter, and categorize an already extracted document.
    pub fn chunk_document(&self, document: &RawDocument) -> Result<Vec<Chunk>, ExtractionError> {
        if !document.has_text() {
            return Err(ExtractionError::NoText);
        }

        let mut chunks = Vec::new();
        let mut dropped = 0usize;
        for (page_idx, page) in document.pages.iter().enumerate() {
            for passage in self.splitter.split(page) {
                let text = clean::clean_passage(&passage);
                if text.chars().count() < self.min_length {
                    dropped += 1;
                    continue;
                }
                let categories = categorize(&text);
                chunks.push(Chunk {
                    text,
                    page: page_idx as u32 + 1,
                    index: chunks.len() as u32,
                    categories,
                    source: document.source.clone(),
                });
            }
        }

        tracing::debug!(
            kept = chunks.len(),
            dropped,
            min_length = self.min_length,
            "Filtered short passages"
        );

        if chunks.is_empty() {
            return Err(ExtractionError::NoUsableChunks {
                min_length: self.min_length,
            });
        }
        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct StaticLoader(Vec<String>);

    #[async_trait]
    impl DocumentLoader for StaticLoader {
        async fn load(&self, locator: &str) -> Result<RawDocument, IngestError> {
            Ok(RawDocument {
                source: locator.to_string(),
                pages: self.0.clone(),
            })
        }
    }

    fn chunker(pages: Vec<String>, settings: ChunkerSettings) -> Chunker {
        Chunker::new(Box::new(StaticLoader(pages)), &settings)
    }

    fn policy_page(topic: &str, sentences: usize) -> String {
        (0..sentences)
            .map(|n| format!("Clause {n} of the {topic} section sets out a separate condition. "))
            .collect()
    }

    #[tokio::test]
    async fn chunks_carry_page_index_and_source() {
        let pages = vec![
            policy_page("premium", 30),
            policy_page("maternity", 30),
        ];
        let chunks = chunker(pages, ChunkerSettings::default())
            .ingest("https://example.org/policy.pdf")
            .await
            .expect("chunks");

        assert!(chunks.iter().any(|chunk| chunk.page == 1));
        assert!(chunks.iter().any(|chunk| chunk.page == 2));
        for (position, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index as usize, position);
            assert_eq!(chunk.source, "https://example.org/policy.pdf");
        }
        assert!(chunks
            .iter()
            .filter(|chunk| chunk.page == 2)
            .all(|chunk| chunk.categories.contains(&Category::Maternity)));
    }

    #[tokio::test]
    async fn chunk_lengths_stay_within_bounds() {
        let settings = ChunkerSettings {
            chunk_size: 300,
            chunk_overlap: 60,
            min_length: 40,
            ..ChunkerSettings::default()
        };
        let chunks = chunker(vec![policy_page("claims", 80)], settings.clone())
            .ingest("https://example.org/claims.pdf")
            .await
            .expect("chunks");

        let tolerance = settings.chunk_overlap;
        for chunk in &chunks {
            assert!(chunk.len() >= settings.min_length);
            assert!(chunk.len() <= settings.chunk_size + tolerance);
        }
    }

    #[test]
    fn short_fragments_are_discarded() {
        let chunker = chunker(Vec::new(), ChunkerSettings::default());
        let document = RawDocument {
            source: "https://example.org/p.pdf".into(),
            pages: vec![
                "Page 3".into(),
                "Minimum entry age is 18 years and maximum is 65 years for the base plan.".into(),
            ],
        };
        let chunks = chunker.chunk_document(&document).expect("chunks");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].page, 2);
        assert!(chunks[0].categories.contains(&Category::Eligibility));
    }

    #[test]
    fn image_only_document_is_an_extraction_error() {
        let chunker = chunker(Vec::new(), ChunkerSettings::default());
        let document = RawDocument {
            source: "https://example.org/scan.pdf".into(),
            pages: vec![String::new(), "  ".into()],
        };
        assert!(matches!(
            chunker.chunk_document(&document),
            Err(ExtractionError::NoText)
        ));
    }

    #[test]
    fn only_noise_is_an_extraction_error() {
        let chunker = chunker(Vec::new(), ChunkerSettings::default());
        let document = RawDocument {
            source: "https://example.org/p.pdf".into(),
            pages: vec!["1".into(), "Page 2 of 2".into()],
        };
        assert!(matches!(
            chunker.chunk_document(&document),
            Err(ExtractionError::NoUsableChunks { .. })
        ));
    }
}
