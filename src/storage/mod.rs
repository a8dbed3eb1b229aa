//! Persistence layer
//!
//! Defines the storage trait the crawler consumes plus the SQLite
//! implementation. The engine only ever talks to `dyn Storage`, so tests
//! can substitute an in-memory database.

mod schema;
mod sqlite;

pub use sqlite::SqliteStorage;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Page not found: {0}")]
    PageNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// A persisted page record
#[derive(Debug, Clone)]
pub struct PageRecord {
    pub id: i64,
    pub url: String,
    pub domain: String,
    pub title: Option<String>,
    pub content_hash: Option<String>,
    pub content_length: usize,
    pub status_code: Option<u16>,
    pub relevance_score: f64,
    pub crawled_at: DateTime<Utc>,
}

/// Lifecycle tag of a saved crawl state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlStateStatus {
    Active,
    Completed,
}

impl CrawlStateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "completed" => Self::Completed,
            _ => Self::Active,
        }
    }
}

/// A persisted crawl-state snapshot row
#[derive(Debug, Clone)]
pub struct CrawlStateRecord {
    pub id: i64,
    pub status: CrawlStateStatus,
    pub config_hash: String,
    pub snapshot: CrawlSnapshot,
    pub saved_at: DateTime<Utc>,
}

/// Serialized frontier and seen-set contents
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlSnapshot {
    /// Pending (url, depth) work items
    pub frontier: Vec<(String, u32)>,

    /// Every URL admitted to the frontier during the run
    pub seen: Vec<String>,
}

/// Trait for storage backend implementations
///
/// Implementations are used behind a mutex by concurrent workers, so
/// individual calls must leave the database consistent on error.
pub trait Storage: Send {
    // ===== Pages =====

    /// Inserts or updates a crawled page, returning its ID
    #[allow(clippy::too_many_arguments)]
    fn save_page(
        &mut self,
        url: &str,
        domain: &str,
        title: Option<&str>,
        content_hash: Option<&str>,
        status_code: u16,
        content_length: usize,
    ) -> StorageResult<i64>;

    /// Updates the relevance score of a stored page
    fn update_relevance_score(&mut self, url: &str, score: f64) -> StorageResult<()>;

    /// Finds a page by its normalized URL
    fn find_by_url(&self, url: &str) -> StorageResult<Option<PageRecord>>;

    /// Finds all pages of a domain
    fn find_by_domain(&self, domain: &str) -> StorageResult<Vec<PageRecord>>;

    /// Checks whether a page exists
    fn exists(&self, url: &str) -> StorageResult<bool>;

    /// Returns all stored pages
    fn all_pages(&self) -> StorageResult<Vec<PageRecord>>;

    /// Returns the highest-scored pages, descending
    fn top_by_relevance(&self, limit: u32) -> StorageResult<Vec<PageRecord>>;

    /// Total number of stored pages
    fn count_pages(&self) -> StorageResult<u64>;

    /// Number of distinct domains stored
    fn count_unique_domains(&self) -> StorageResult<u64>;

    // ===== Index =====

    /// Replaces the stored term weights for a page
    fn save_index_terms(&mut self, url: &str, terms: &HashMap<String, f64>) -> StorageResult<()>;

    /// Finds pages containing any query term, ranked by summed weight
    fn search_terms(&self, terms: &[String], limit: u32) -> StorageResult<Vec<(String, f64)>>;

    // ===== Crawl state =====

    /// Saves an active crawl-state snapshot, returning its ID
    fn save_crawl_state(
        &mut self,
        config_hash: &str,
        snapshot: &CrawlSnapshot,
    ) -> StorageResult<i64>;

    /// Marks a crawl state as completed
    fn complete_crawl_state(&mut self, state_id: i64) -> StorageResult<()>;

    /// Returns the most recent snapshot still tagged active
    fn latest_active_state(&self) -> StorageResult<Option<CrawlStateRecord>>;
}
