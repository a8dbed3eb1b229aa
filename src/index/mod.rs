//! Content indexing and relevance scoring
//!
//! The crawler consumes this module through a narrow facade: documents go
//! in via [`ContentIndexer::index`], ranked results come out via
//! [`ContentIndexer::search`]. Internally the score blends TF-IDF keyword
//! relevance with title quality, content depth, and link popularity.

mod preprocess;
mod tfidf;

pub use preprocess::{is_stop_word, preprocess, stem, term_frequency, tokenize};
pub use tfidf::TfIdfCalculator;

use crate::storage::{Storage, StorageResult};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::RwLock;

// Feature weights for the blended relevance score
const WEIGHT_TFIDF: f64 = 0.4;
const WEIGHT_TITLE: f64 = 0.25;
const WEIGHT_LENGTH: f64 = 0.15;
const WEIGHT_LINKS: f64 = 0.2;

/// Content length at which the depth signal saturates
const FULL_LENGTH_CHARS: usize = 2000;

/// Incoming link count at which the popularity signal saturates
const FULL_LINK_COUNT: u64 = 10;

/// The outcome of indexing one document
#[derive(Debug, Clone)]
pub struct IndexedDocument {
    /// TF-IDF weight per index term, for persistence and search
    pub term_weights: HashMap<String, f64>,

    /// Blended relevance score in [0, 1]
    pub relevance_score: f64,
}

/// Indexes crawled content for search and relevance scoring
pub struct ContentIndexer {
    tfidf: TfIdfCalculator,
    target_keywords: RwLock<Vec<String>>,
    incoming_links: DashMap<String, u64>,
}

impl ContentIndexer {
    pub fn new() -> Self {
        Self {
            tfidf: TfIdfCalculator::new(),
            target_keywords: RwLock::new(Vec::new()),
            incoming_links: DashMap::new(),
        }
    }

    /// Sets the keywords that mark content as relevant to this crawl
    ///
    /// Keywords are stemmed with the same stemmer applied to document
    /// terms so they can match the stored index.
    pub fn set_target_keywords(&self, keywords: &[String]) {
        let stemmed: Vec<String> = keywords.iter().map(|k| stem(&k.to_lowercase())).collect();
        tracing::info!("Set {} target keywords for scoring", stemmed.len());
        *self.target_keywords.write().unwrap() = stemmed;
    }

    /// Records an incoming link for the popularity signal
    pub fn record_link(&self, target_url: &str) {
        *self.incoming_links.entry(target_url.to_string()).or_insert(0) += 1;
    }

    /// Indexes a document and returns its term weights and relevance score
    ///
    /// The score uses the corpus as it exists at call time; a crawl-final
    /// [`rescore_all`](Self::rescore_all) pass recomputes every score once
    /// the full corpus is known.
    pub fn index(&self, url: &str, title: Option<&str>, text: &str) -> IndexedDocument {
        let cleaned = preprocess(text);
        let terms = tokenize(&cleaned);

        if terms.is_empty() {
            tracing::debug!("No terms to index for URL: {}", url);
        } else {
            self.tfidf.add_document(url, &terms);
        }

        let term_weights = self.tfidf.vector(url);
        let relevance_score = self.score(url, title, cleaned.len());

        tracing::trace!(
            "Indexed URL: {} with {} terms (score={:.2})",
            url,
            term_weights.len(),
            relevance_score
        );

        IndexedDocument {
            term_weights,
            relevance_score,
        }
    }

    /// Searches stored index terms, ranked by summed term weight descending
    pub fn search(
        &self,
        storage: &dyn Storage,
        query: &str,
        limit: u32,
    ) -> StorageResult<Vec<(String, f64)>> {
        let terms = tokenize(&preprocess(query));
        if terms.is_empty() {
            tracing::debug!("No valid terms in query: {}", query);
            return Ok(Vec::new());
        }

        tracing::debug!("Searching for query '{}' with {} terms", query, terms.len());
        storage.search_terms(&terms, limit)
    }

    /// Recomputes every stored relevance score against the full corpus
    ///
    /// Scores computed while the crawl was running used a partial corpus;
    /// this pass runs after completion and batch-updates storage.
    pub fn rescore_all(&self, storage: &mut dyn Storage) -> StorageResult<usize> {
        let pages = storage.all_pages()?;
        tracing::info!(
            "Rescoring {} pages against full corpus ({} docs)",
            pages.len(),
            self.tfidf.document_count()
        );

        let mut updated = 0;
        for page in pages {
            let score = self.score(&page.url, page.title.as_deref(), page.content_length);
            storage.update_relevance_score(&page.url, score)?;
            updated += 1;
        }

        Ok(updated)
    }

    /// Blended relevance score in [0, 1]
    fn score(&self, url: &str, title: Option<&str>, content_length: usize) -> f64 {
        let tfidf_score = self.tfidf_score(url);
        let title_score = self.title_score(title);
        let length_score = self.length_score(content_length);
        let link_score = self.link_score(url);

        let total = WEIGHT_TFIDF * tfidf_score
            + WEIGHT_TITLE * title_score
            + WEIGHT_LENGTH * length_score
            + WEIGHT_LINKS * link_score;

        total.clamp(0.0, 1.0)
    }

    fn tfidf_score(&self, url: &str) -> f64 {
        let keywords = self.target_keywords.read().unwrap();

        if keywords.is_empty() {
            // No target keywords: average TF-IDF stands in for content richness
            let vector = self.tfidf.vector(url);
            if vector.is_empty() {
                return 0.0;
            }
            let avg: f64 = vector.values().sum::<f64>() / vector.len() as f64;
            return (avg * 2.0).min(1.0);
        }

        let mut score = 0.0;
        let mut matched = 0;
        for keyword in keywords.iter() {
            let tfidf = self.tfidf.tfidf(url, keyword);
            if tfidf > 0.0 {
                score += tfidf;
                matched += 1;
            }
        }

        if matched == 0 {
            return 0.0;
        }

        (score / keywords.len() as f64).min(1.0)
    }

    fn title_score(&self, title: Option<&str>) -> f64 {
        let Some(title) = title.filter(|t| !t.trim().is_empty()) else {
            return 0.0;
        };

        let keywords = self.target_keywords.read().unwrap();
        if keywords.is_empty() {
            // Without keywords, score title quality by length
            return match title.len() {
                30..=70 => 1.0,
                10..=100 => 0.7,
                _ => 0.3,
            };
        }

        let lower = title.to_lowercase();
        let matched = keywords.iter().filter(|k| lower.contains(k.as_str())).count();
        matched as f64 / keywords.len() as f64
    }

    fn length_score(&self, content_length: usize) -> f64 {
        if content_length == 0 {
            return 0.0;
        }
        (content_length as f64 / FULL_LENGTH_CHARS as f64).min(1.0)
    }

    fn link_score(&self, url: &str) -> f64 {
        let count = self.incoming_links.get(url).map(|c| *c).unwrap_or(0);
        (count as f64 / FULL_LINK_COUNT as f64).min(1.0)
    }

    /// Number of documents in the in-memory corpus
    pub fn document_count(&self) -> u64 {
        self.tfidf.document_count()
    }

    /// One-line indexer statistics
    pub fn stats(&self) -> String {
        format!(
            "ContentIndexer[{}, links={}]",
            self.tfidf.stats(),
            self.incoming_links.len()
        )
    }
}

impl Default for ContentIndexer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_returns_score_in_range() {
        let indexer = ContentIndexer::new();
        let doc = indexer.index(
            "https://example.com/",
            Some("A Nicely Sized Page Title Here"),
            "Rust web crawler with politeness and indexing features",
        );

        assert!((0.0..=1.0).contains(&doc.relevance_score));
        assert!(!doc.term_weights.is_empty());
    }

    #[test]
    fn test_empty_text_scores_zero_terms() {
        let indexer = ContentIndexer::new();
        let doc = indexer.index("https://example.com/", None, "");
        assert!(doc.term_weights.is_empty());
        assert_eq!(doc.relevance_score, 0.0);
    }

    #[test]
    fn test_keyword_match_raises_score() {
        let with_keywords = ContentIndexer::new();
        with_keywords.set_target_keywords(&["ferris".to_string()]);

        // Build a corpus where "ferris" is distinctive
        with_keywords.index("https://other.com/", None, "generic filler content page");
        let matching = with_keywords.index(
            "https://example.com/a",
            Some("All About Ferris"),
            "ferris crab mascot ferris community",
        );
        let unrelated = with_keywords.index(
            "https://example.com/b",
            Some("Unrelated Title Words"),
            "completely different subject matter",
        );

        assert!(matching.relevance_score > unrelated.relevance_score);
    }

    #[test]
    fn test_incoming_links_raise_score() {
        let indexer = ContentIndexer::new();
        let before = indexer.index("https://example.com/popular", None, "some page text here");

        for _ in 0..10 {
            indexer.record_link("https://example.com/popular");
        }

        let indexer2 = ContentIndexer::new();
        for _ in 0..10 {
            indexer2.record_link("https://example.com/popular");
        }
        let after = indexer2.index("https://example.com/popular", None, "some page text here");

        assert!(after.relevance_score > before.relevance_score);
    }

    #[test]
    fn test_title_quality_without_keywords() {
        let indexer = ContentIndexer::new();
        assert_eq!(indexer.title_score(None), 0.0);
        assert_eq!(indexer.title_score(Some("")), 0.0);
        assert_eq!(
            indexer.title_score(Some("A Title Of Comfortable Middle Length")),
            1.0
        );
        assert_eq!(indexer.title_score(Some("Tiny")), 0.3);
    }

    #[test]
    fn test_length_score_saturates() {
        let indexer = ContentIndexer::new();
        assert_eq!(indexer.length_score(0), 0.0);
        assert!(indexer.length_score(500) < 1.0);
        assert_eq!(indexer.length_score(5000), 1.0);
    }

    #[test]
    fn test_document_count_tracks_indexed_docs() {
        let indexer = ContentIndexer::new();
        indexer.index("https://a.com/", None, "first document text");
        indexer.index("https://b.com/", None, "second document text");
        assert_eq!(indexer.document_count(), 2);
    }
}
