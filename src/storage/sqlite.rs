//! SQLite storage backend

use crate::storage::schema::SCHEMA;
use crate::storage::{
    CrawlSnapshot, CrawlStateRecord, CrawlStateStatus, PageRecord, Storage, StorageResult,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;

/// SQLite-backed storage
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens (or creates) the database at `path` and applies the schema
    pub fn new(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        let storage = Self { conn };
        storage.apply_schema()?;
        Ok(storage)
    }

    /// Opens an in-memory database, used by tests
    pub fn in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        let storage = Self { conn };
        storage.apply_schema()?;
        Ok(storage)
    }

    fn apply_schema(&self) -> StorageResult<()> {
        for statement in SCHEMA {
            self.conn.execute(statement, [])?;
        }
        Ok(())
    }

    fn map_page(row: &Row<'_>) -> rusqlite::Result<PageRecord> {
        let crawled_at: String = row.get("crawled_at")?;
        Ok(PageRecord {
            id: row.get("id")?,
            url: row.get("url")?,
            domain: row.get("domain")?,
            title: row.get("title")?,
            content_hash: row.get("content_hash")?,
            content_length: row.get::<_, i64>("content_length")? as usize,
            status_code: row.get::<_, Option<i64>>("status_code")?.map(|c| c as u16),
            relevance_score: row.get("relevance_score")?,
            crawled_at: DateTime::parse_from_rfc3339(&crawled_at)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }
}

impl Storage for SqliteStorage {
    fn save_page(
        &mut self,
        url: &str,
        domain: &str,
        title: Option<&str>,
        content_hash: Option<&str>,
        status_code: u16,
        content_length: usize,
    ) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO pages (url, domain, title, content_hash, content_length, status_code, crawled_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(url) DO UPDATE SET
                 title = excluded.title,
                 content_hash = excluded.content_hash,
                 content_length = excluded.content_length,
                 status_code = excluded.status_code,
                 crawled_at = excluded.crawled_at",
            params![
                url,
                domain,
                title,
                content_hash,
                content_length as i64,
                status_code as i64,
                Utc::now().to_rfc3339(),
            ],
        )?;

        let id = self.conn.query_row(
            "SELECT id FROM pages WHERE url = ?1",
            params![url],
            |row| row.get(0),
        )?;
        tracing::trace!("Saved page: id={}, url={}", id, url);
        Ok(id)
    }

    fn update_relevance_score(&mut self, url: &str, score: f64) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE pages SET relevance_score = ?1 WHERE url = ?2",
            params![score, url],
        )?;
        if updated == 0 {
            tracing::warn!("No rows updated for URL (not found?): {}", url);
        }
        Ok(())
    }

    fn find_by_url(&self, url: &str) -> StorageResult<Option<PageRecord>> {
        let page = self
            .conn
            .query_row(
                "SELECT * FROM pages WHERE url = ?1",
                params![url],
                Self::map_page,
            )
            .optional()?;
        Ok(page)
    }

    fn find_by_domain(&self, domain: &str) -> StorageResult<Vec<PageRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM pages WHERE domain = ?1 ORDER BY url")?;
        let pages = stmt
            .query_map(params![domain], Self::map_page)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(pages)
    }

    fn exists(&self, url: &str) -> StorageResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM pages WHERE url = ?1",
            params![url],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn all_pages(&self) -> StorageResult<Vec<PageRecord>> {
        let mut stmt = self.conn.prepare("SELECT * FROM pages ORDER BY id")?;
        let pages = stmt
            .query_map([], Self::map_page)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(pages)
    }

    fn top_by_relevance(&self, limit: u32) -> StorageResult<Vec<PageRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM pages ORDER BY relevance_score DESC, url LIMIT ?1")?;
        let pages = stmt
            .query_map(params![limit], Self::map_page)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(pages)
    }

    fn count_pages(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM pages", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_unique_domains(&self) -> StorageResult<u64> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(DISTINCT domain) FROM pages", [], |row| {
                    row.get(0)
                })?;
        Ok(count as u64)
    }

    fn save_index_terms(&mut self, url: &str, terms: &HashMap<String, f64>) -> StorageResult<()> {
        let tx = self.conn.transaction()?;

        let page_id: Option<i64> = tx
            .query_row("SELECT id FROM pages WHERE url = ?1", params![url], |row| {
                row.get(0)
            })
            .optional()?;
        let Some(page_id) = page_id else {
            return Err(crate::storage::StorageError::PageNotFound(url.to_string()));
        };

        tx.execute(
            "DELETE FROM page_terms WHERE page_id = ?1",
            params![page_id],
        )?;

        for (term, score) in terms {
            tx.execute(
                "INSERT OR IGNORE INTO index_terms (term) VALUES (?1)",
                params![term],
            )?;
            let term_id: i64 = tx.query_row(
                "SELECT id FROM index_terms WHERE term = ?1",
                params![term],
                |row| row.get(0),
            )?;
            tx.execute(
                "INSERT OR REPLACE INTO page_terms (page_id, term_id, tf_idf_score)
                 VALUES (?1, ?2, ?3)",
                params![page_id, term_id, score],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn search_terms(&self, terms: &[String], limit: u32) -> StorageResult<Vec<(String, f64)>> {
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; terms.len()].join(", ");
        let sql = format!(
            "SELECT p.url, SUM(pt.tf_idf_score) AS total_score
             FROM pages p
             JOIN page_terms pt ON p.id = pt.page_id
             JOIN index_terms it ON pt.term_id = it.id
             WHERE it.term IN ({})
             GROUP BY p.url
             ORDER BY total_score DESC
             LIMIT {}",
            placeholders, limit
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let results = stmt
            .query_map(params_from_iter(terms.iter()), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(results)
    }

    fn save_crawl_state(
        &mut self,
        config_hash: &str,
        snapshot: &CrawlSnapshot,
    ) -> StorageResult<i64> {
        let frontier_json = serde_json::to_string(&snapshot.frontier)?;
        let seen_json = serde_json::to_string(&snapshot.seen)?;

        self.conn.execute(
            "INSERT INTO crawl_state (status, config_hash, frontier_snapshot, seen_snapshot, saved_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                CrawlStateStatus::Active.as_str(),
                config_hash,
                frontier_json,
                seen_json,
                Utc::now().to_rfc3339(),
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    fn complete_crawl_state(&mut self, state_id: i64) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE crawl_state SET status = ?1 WHERE id = ?2",
            params![CrawlStateStatus::Completed.as_str(), state_id],
        )?;
        Ok(())
    }

    fn latest_active_state(&self) -> StorageResult<Option<CrawlStateRecord>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, status, config_hash, frontier_snapshot, seen_snapshot, saved_at
                 FROM crawl_state
                 WHERE status = 'active'
                 ORDER BY id DESC
                 LIMIT 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()?;

        let Some((id, status, config_hash, frontier_json, seen_json, saved_at)) = row else {
            return Ok(None);
        };

        let snapshot = CrawlSnapshot {
            frontier: serde_json::from_str(&frontier_json)?,
            seen: serde_json::from_str(&seen_json)?,
        };

        Ok(Some(CrawlStateRecord {
            id,
            status: CrawlStateStatus::parse(&status),
            config_hash,
            snapshot,
            saved_at: DateTime::parse_from_rfc3339(&saved_at)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        }))
    }
}
