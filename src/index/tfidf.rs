//! TF-IDF calculation over the in-memory crawl corpus
//!
//! TF(t,d) = occurrences of t in d / total terms in d
//! IDF(t) = ln(total documents / documents containing t)

use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Incremental TF-IDF calculator shared by all pool workers
pub struct TfIdfCalculator {
    /// term -> number of documents containing it
    document_frequency: DashMap<String, u64>,

    /// Total documents added to the corpus
    document_count: AtomicU64,

    /// document id -> cached TF vector
    tf_cache: DashMap<String, HashMap<String, f64>>,
}

impl TfIdfCalculator {
    pub fn new() -> Self {
        Self {
            document_frequency: DashMap::new(),
            document_count: AtomicU64::new(0),
            tf_cache: DashMap::new(),
        }
    }

    /// Adds a document's terms to the corpus and caches its TF vector
    pub fn add_document(&self, document_id: &str, terms: &[String]) {
        self.document_count.fetch_add(1, Ordering::Relaxed);

        let tf = Self::calculate_tf(terms);

        for term in tf.keys() {
            *self.document_frequency.entry(term.clone()).or_insert(0) += 1;
        }

        tracing::trace!(
            "Added document {} with {} unique terms",
            document_id,
            tf.len()
        );
        self.tf_cache.insert(document_id.to_string(), tf);
    }

    /// Computes the term-frequency vector for a term list
    pub fn calculate_tf(terms: &[String]) -> HashMap<String, f64> {
        let mut tf = HashMap::new();
        if terms.is_empty() {
            return tf;
        }

        let total = terms.len() as f64;
        let mut counts: HashMap<&str, u32> = HashMap::new();
        for term in terms {
            *counts.entry(term).or_insert(0) += 1;
        }

        for (term, count) in counts {
            tf.insert(term.to_string(), count as f64 / total);
        }

        tf
    }

    /// Inverse document frequency of a term over the current corpus
    pub fn idf(&self, term: &str) -> f64 {
        let total = self.document_count.load(Ordering::Relaxed);
        if total == 0 {
            return 0.0;
        }

        match self.document_frequency.get(term) {
            Some(df) if *df > 0 => (total as f64 / *df as f64).ln(),
            _ => 0.0,
        }
    }

    /// TF-IDF score of a term within a document
    pub fn tfidf(&self, document_id: &str, term: &str) -> f64 {
        let Some(tf) = self.tf_cache.get(document_id) else {
            return 0.0;
        };
        match tf.get(term) {
            Some(value) => value * self.idf(term),
            None => 0.0,
        }
    }

    /// Full TF-IDF vector for a document, zero-score terms omitted
    pub fn vector(&self, document_id: &str) -> HashMap<String, f64> {
        let Some(tf) = self.tf_cache.get(document_id) else {
            return HashMap::new();
        };

        let mut vector = HashMap::new();
        for (term, tf_value) in tf.iter() {
            let score = tf_value * self.idf(term);
            if score > 0.0 {
                vector.insert(term.clone(), score);
            }
        }

        vector
    }

    /// Number of documents in the corpus
    pub fn document_count(&self) -> u64 {
        self.document_count.load(Ordering::Relaxed)
    }

    /// One-line calculator statistics
    pub fn stats(&self) -> String {
        format!(
            "TfIdf[docs={}, terms={}]",
            self.document_count(),
            self.document_frequency.len()
        )
    }
}

impl Default for TfIdfCalculator {
    fn default() -> Self {
        Self::new()
    }
}
