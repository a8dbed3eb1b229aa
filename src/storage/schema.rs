//! SQLite schema definitions
//!
//! Applied idempotently at startup; every statement is
//! `CREATE ... IF NOT EXISTS`.

/// All DDL statements, in dependency order
pub const SCHEMA: &[&str] = &[
    // Crawled pages, one row per normalized URL
    "CREATE TABLE IF NOT EXISTS pages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        url TEXT NOT NULL UNIQUE,
        domain TEXT NOT NULL,
        title TEXT,
        content_hash TEXT,
        content_length INTEGER NOT NULL DEFAULT 0,
        status_code INTEGER,
        relevance_score REAL NOT NULL DEFAULT 0.0,
        crawled_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_pages_domain ON pages(domain)",
    "CREATE INDEX IF NOT EXISTS idx_pages_relevance ON pages(relevance_score)",
    // Index vocabulary
    "CREATE TABLE IF NOT EXISTS index_terms (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        term TEXT NOT NULL UNIQUE
    )",
    // TF-IDF weight of a term within a page
    "CREATE TABLE IF NOT EXISTS page_terms (
        page_id INTEGER NOT NULL REFERENCES pages(id) ON DELETE CASCADE,
        term_id INTEGER NOT NULL REFERENCES index_terms(id) ON DELETE CASCADE,
        tf_idf_score REAL NOT NULL,
        PRIMARY KEY (page_id, term_id)
    )",
    "CREATE INDEX IF NOT EXISTS idx_page_terms_term ON page_terms(term_id)",
    // Serialized crawl state for resumption
    "CREATE TABLE IF NOT EXISTS crawl_state (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        status TEXT NOT NULL,
        config_hash TEXT NOT NULL,
        frontier_snapshot TEXT NOT NULL,
        seen_snapshot TEXT NOT NULL,
        saved_at TEXT NOT NULL
    )",
];
