//! Crawl metrics
//!
//! All counters are independently atomic; readers get monotone but not
//! mutually consistent values.

use dashmap::DashMap;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Thread-safe metrics collection for crawl statistics
pub struct CrawlMetrics {
    pages_processed: AtomicU64,
    bytes_downloaded: AtomicU64,
    errors: AtomicU64,
    robots_blocked: AtomicU64,
    duplicates_skipped: AtomicU64,

    /// HTTP status code -> count
    status_codes: DashMap<u16, u64>,

    /// domain -> pages fetched
    domain_counts: DashMap<String, u64>,

    started_at: Instant,
}

/// Point-in-time copy of all counters
#[derive(Debug, Clone)]
pub struct CrawlMetricsSnapshot {
    pub pages_processed: u64,
    pub bytes_downloaded: u64,
    pub errors: u64,
    pub robots_blocked: u64,
    pub duplicates_skipped: u64,
    pub unique_domains: usize,
    pub elapsed_ms: u64,
    pub pages_per_minute: f64,
    pub error_rate: f64,
    pub status_codes: HashMap<u16, u64>,
    pub domain_counts: HashMap<String, u64>,
}

impl CrawlMetrics {
    pub fn new() -> Self {
        Self {
            pages_processed: AtomicU64::new(0),
            bytes_downloaded: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            robots_blocked: AtomicU64::new(0),
            duplicates_skipped: AtomicU64::new(0),
            status_codes: DashMap::new(),
            domain_counts: DashMap::new(),
            started_at: Instant::now(),
        }
    }

    /// Records a fetch that produced a response (success or 4xx)
    pub fn record_page(&self, domain: &str, status_code: u16, bytes: u64) {
        self.pages_processed.fetch_add(1, Ordering::Relaxed);
        self.bytes_downloaded.fetch_add(bytes, Ordering::Relaxed);
        *self.status_codes.entry(status_code).or_insert(0) += 1;
        *self.domain_counts.entry(domain.to_string()).or_insert(0) += 1;
    }

    /// Records a pipeline error
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a URL blocked by robots.txt
    pub fn record_robots_blocked(&self) {
        self.robots_blocked.fetch_add(1, Ordering::Relaxed);
    }

    /// Records duplicate URL offers that were skipped
    pub fn record_duplicates(&self, count: u64) {
        self.duplicates_skipped.store(count, Ordering::Relaxed);
    }

    pub fn pages_processed(&self) -> u64 {
        self.pages_processed.load(Ordering::Relaxed)
    }

    pub fn bytes_downloaded(&self) -> u64 {
        self.bytes_downloaded.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn robots_blocked(&self) -> u64 {
        self.robots_blocked.load(Ordering::Relaxed)
    }

    pub fn duplicates_skipped(&self) -> u64 {
        self.duplicates_skipped.load(Ordering::Relaxed)
    }

    pub fn unique_domains(&self) -> usize {
        self.domain_counts.len()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }

    /// Crawl rate in pages per minute
    pub fn pages_per_minute(&self) -> f64 {
        let elapsed = self.elapsed_ms();
        if elapsed == 0 {
            return 0.0;
        }
        self.pages_processed() as f64 * 60_000.0 / elapsed as f64
    }

    /// Download rate in bytes per second
    pub fn bytes_per_second(&self) -> f64 {
        let elapsed = self.elapsed_ms();
        if elapsed == 0 {
            return 0.0;
        }
        self.bytes_downloaded() as f64 * 1000.0 / elapsed as f64
    }

    /// Errors as a percentage of all pipeline outcomes
    pub fn error_rate(&self) -> f64 {
        let total = self.pages_processed() + self.errors();
        if total == 0 {
            return 0.0;
        }
        self.errors() as f64 * 100.0 / total as f64
    }

    /// Takes a point-in-time snapshot of all counters
    pub fn snapshot(&self) -> CrawlMetricsSnapshot {
        CrawlMetricsSnapshot {
            pages_processed: self.pages_processed(),
            bytes_downloaded: self.bytes_downloaded(),
            errors: self.errors(),
            robots_blocked: self.robots_blocked(),
            duplicates_skipped: self.duplicates_skipped(),
            unique_domains: self.unique_domains(),
            elapsed_ms: self.elapsed_ms(),
            pages_per_minute: self.pages_per_minute(),
            error_rate: self.error_rate(),
            status_codes: self
                .status_codes
                .iter()
                .map(|e| (*e.key(), *e.value()))
                .collect(),
            domain_counts: self
                .domain_counts
                .iter()
                .map(|e| (e.key().clone(), *e.value()))
                .collect(),
        }
    }

    fn formatted_bytes(&self) -> String {
        format_bytes(self.bytes_downloaded())
    }

    fn formatted_elapsed(&self) -> String {
        let seconds = self.elapsed_ms() / 1000;
        let minutes = seconds / 60;
        let hours = minutes / 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes % 60, seconds % 60)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds % 60)
        } else {
            format!("{}s", seconds)
        }
    }
}

impl Default for CrawlMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CrawlMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CrawlMetrics[pages={}, bytes={}, errors={} ({:.1}%), robotsBlocked={}, domains={}, time={}, rate={:.1} pages/min]",
            self.pages_processed(),
            self.formatted_bytes(),
            self.errors(),
            self.error_rate(),
            self.robots_blocked(),
            self.unique_domains(),
            self.formatted_elapsed(),
            self.pages_per_minute(),
        )
    }
}

/// Formats a byte count with a binary unit suffix
pub fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = 1024.0 * 1024.0;
    const GB: f64 = 1024.0 * 1024.0 * 1024.0;

    let bytes_f = bytes as f64;
    if bytes_f < KB {
        format!("{} B", bytes)
    } else if bytes_f < MB {
        format!("{:.2} KB", bytes_f / KB)
    } else if bytes_f < GB {
        format!("{:.2} MB", bytes_f / MB)
    } else {
        format!("{:.2} GB", bytes_f / GB)
    }
}
