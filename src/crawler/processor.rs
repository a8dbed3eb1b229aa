//! Content processing for fetched pages
//!
//! Strips non-content markup, fingerprints the cleaned text for
//! duplicate-content detection, and forwards it to the indexing boundary
//! for relevance scoring.

use crate::index::ContentIndexer;
use scraper::node::Node;
use scraper::{Html, Selector};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;

/// Tags whose subtrees carry chrome rather than content
const EXCLUDED_TAGS: &[&str] = &[
    "script", "style", "nav", "footer", "header", "aside", "noscript",
];

/// The processed form of one fetched page
#[derive(Debug, Clone)]
pub struct ProcessedContent {
    /// Page title, if present
    pub title: Option<String>,

    /// Cleaned, whitespace-collapsed text content
    pub text: String,

    /// SHA-256 of the cleaned text, hex encoded
    pub content_hash: String,

    /// Relevance score from the indexing boundary, in [0, 1]
    pub relevance_score: f64,

    /// TF-IDF term weights for persistence
    pub term_weights: HashMap<String, f64>,
}

/// Cleans documents and feeds them to the indexer
pub struct ContentProcessor {
    indexer: Arc<ContentIndexer>,
}

impl ContentProcessor {
    pub fn new(indexer: Arc<ContentIndexer>) -> Self {
        Self { indexer }
    }

    /// Processes a fetched document
    ///
    /// The content hash is computed over the cleaned text, so two URLs
    /// serving the same content produce the same fingerprint regardless of
    /// markup differences outside the content tags.
    pub fn process(&self, html: &str, url: &str) -> ProcessedContent {
        let document = Html::parse_document(html);

        let title = extract_title(&document);
        let text = extract_text(&document);
        let content_hash = hash_content(&text);

        let indexed = self.indexer.index(url, title.as_deref(), &text);

        tracing::trace!(
            "Processed {}: {} chars, hash={}",
            url,
            text.len(),
            &content_hash[..8]
        );

        ProcessedContent {
            title,
            text,
            content_hash,
            relevance_score: indexed.relevance_score,
            term_weights: indexed.term_weights,
        }
    }
}

/// Extracts the trimmed page title
fn extract_title(document: &Html) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Collects text content, skipping excluded subtrees, whitespace collapsed
fn extract_text(document: &Html) -> String {
    let mut raw = String::new();

    // Prefer the body; fall back to the whole tree for fragments
    let body_selector = Selector::parse("body").ok();
    let start = body_selector
        .as_ref()
        .and_then(|sel| document.select(sel).next());

    match start {
        Some(body) => collect_text(*body, &mut raw),
        None => collect_text(document.tree.root(), &mut raw),
    }

    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn collect_text(node: ego_tree::NodeRef<'_, Node>, out: &mut String) {
    for child in node.children() {
        match child.value() {
            Node::Text(text) => {
                out.push_str(text);
                out.push(' ');
            }
            Node::Element(element) => {
                if !EXCLUDED_TAGS.contains(&element.name()) {
                    collect_text(child, out);
                }
            }
            _ => {}
        }
    }
}

/// SHA-256 fingerprint of cleaned text
fn hash_content(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}
