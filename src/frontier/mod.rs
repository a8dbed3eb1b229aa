//! URL frontier: the work queue of URLs discovered but not yet fetched
//!
//! The frontier is shared by the control loop and every pool worker, so all
//! synchronization is internal: a mutex-guarded queue for ordering, a
//! concurrent seen-set for deduplication, and a notifier for poll wakeups.

use crate::url::normalize_url;
use dashmap::DashSet;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::sync::Notify;

/// How long `poll` waits for an entry before giving up
const POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// File extensions that denote non-crawlable resources
const SKIPPED_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".pdf", ".zip", ".exe", ".mp3", ".mp4", ".css", ".js",
];

/// A URL admitted to the frontier, waiting to be crawled
#[derive(Debug, Clone)]
pub struct FrontierEntry {
    /// The normalized URL
    pub url: String,

    /// Link depth from the seed that discovered it
    pub depth: u32,

    /// When the entry was enqueued
    pub enqueued_at: Instant,
}

/// Thread-safe bounded deduplicating queue of pending crawl work
///
/// Deduplication is the core correctness property: when several workers
/// offer the same normalized URL concurrently, exactly one wins admission
/// and the URL is enqueued exactly once per run.
pub struct UrlFrontier {
    queue: Mutex<VecDeque<FrontierEntry>>,
    seen: DashSet<String>,
    capacity: usize,
    notify: Notify,
    total_added: AtomicU64,
    duplicates_skipped: AtomicU64,
}

impl UrlFrontier {
    /// Creates a frontier holding at most `capacity` queued entries
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            seen: DashSet::new(),
            capacity,
            notify: Notify::new(),
            total_added: AtomicU64::new(0),
            duplicates_skipped: AtomicU64::new(0),
        }
    }

    /// Adds a URL to the frontier if it is crawlable and not already seen
    ///
    /// The URL is normalized first; normalization failures, non-http(s)
    /// schemes, and non-crawlable extensions are rejected silently. The
    /// seen-set insert is atomic, so exactly one of any number of concurrent
    /// callers adding the same URL succeeds. If the queue is at capacity the
    /// seen-set entry is rolled back so the URL could be offered again later.
    ///
    /// # Returns
    ///
    /// `true` if the URL was enqueued, `false` otherwise
    pub fn add(&self, url: &str, depth: u32) -> bool {
        let normalized = match normalize_url(url) {
            Ok(u) => u.to_string(),
            Err(_) => return false,
        };

        if !is_crawlable(&normalized) {
            return false;
        }

        // Atomic check-and-insert: false means the URL was already admitted.
        if !self.seen.insert(normalized.clone()) {
            self.duplicates_skipped.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        let entry = FrontierEntry {
            url: normalized.clone(),
            depth,
            enqueued_at: Instant::now(),
        };

        {
            let mut queue = self.queue.lock().unwrap();
            if queue.len() >= self.capacity {
                drop(queue);
                self.seen.remove(&normalized);
                tracing::debug!(
                    "Frontier full (capacity={}), skipped: {}",
                    self.capacity,
                    normalized
                );
                return false;
            }
            queue.push_back(entry);
        }

        self.total_added.fetch_add(1, Ordering::Relaxed);
        self.notify.notify_one();
        tracing::trace!("Added URL to frontier: {} (depth={})", normalized, depth);
        true
    }

    /// Takes the next entry, waiting briefly if the queue is momentarily empty
    ///
    /// # Returns
    ///
    /// * `Some(FrontierEntry)` - The next URL to crawl
    /// * `None` - The queue stayed empty for the poll timeout
    pub async fn poll(&self) -> Option<FrontierEntry> {
        tokio::time::timeout(POLL_TIMEOUT, async {
            loop {
                if let Some(entry) = self.queue.lock().unwrap().pop_front() {
                    return entry;
                }
                self.notify.notified().await;
            }
        })
        .await
        .ok()
    }

    /// Returns whether the queue is currently empty (best-effort)
    pub fn is_empty(&self) -> bool {
        self.queue.lock().unwrap().is_empty()
    }

    /// Returns the current queue length (best-effort)
    pub fn len(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    /// Returns the number of unique URLs ever admitted
    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    /// Returns the number of duplicate offers rejected
    pub fn duplicates_skipped(&self) -> u64 {
        self.duplicates_skipped.load(Ordering::Relaxed)
    }

    /// Checks whether a URL has already been admitted
    pub fn has_seen(&self, url: &str) -> bool {
        match normalize_url(url) {
            Ok(normalized) => self.seen.contains(normalized.as_str()),
            Err(_) => false,
        }
    }

    /// Wakes every task blocked in `poll`, used during shutdown
    pub fn wake_all(&self) {
        self.notify.notify_waiters();
    }

    /// Drains the current queue contents, leaving the seen-set intact
    ///
    /// Used when persisting crawl state for later resumption.
    pub fn drain(&self) -> Vec<FrontierEntry> {
        let mut queue = self.queue.lock().unwrap();
        queue.drain(..).collect()
    }

    /// Returns the seen-set contents for state persistence
    pub fn seen_snapshot(&self) -> Vec<String> {
        self.seen.iter().map(|entry| entry.clone()).collect()
    }

    /// Restores a seen-set entry without enqueueing, used on resume
    pub fn mark_seen(&self, url: &str) {
        if let Ok(normalized) = normalize_url(url) {
            self.seen.insert(normalized.to_string());
        }
    }

    /// Copies the queue contents as (url, depth) pairs without consuming them
    pub fn snapshot_entries(&self) -> Vec<(String, u32)> {
        self.queue
            .lock()
            .unwrap()
            .iter()
            .map(|entry| (entry.url.clone(), entry.depth))
            .collect()
    }

    /// Re-enqueues saved work items, bypassing the duplicate check
    ///
    /// Used when resuming a crawl: the entries were admitted by a previous
    /// run, so their seen-set entries are restored alongside them.
    pub fn restore(&self, entries: &[(String, u32)]) {
        for (url, depth) in entries {
            let Ok(normalized) = normalize_url(url) else {
                continue;
            };
            let normalized = normalized.to_string();
            self.seen.insert(normalized.clone());

            let mut queue = self.queue.lock().unwrap();
            if queue.len() >= self.capacity {
                break;
            }
            queue.push_back(FrontierEntry {
                url: normalized,
                depth: *depth,
                enqueued_at: Instant::now(),
            });
            drop(queue);

            self.total_added.fetch_add(1, Ordering::Relaxed);
            self.notify.notify_one();
        }
    }

    /// Clears all queue and seen-set state (mainly for tests)
    pub fn clear(&self) {
        self.queue.lock().unwrap().clear();
        self.seen.clear();
        self.total_added.store(0, Ordering::Relaxed);
        self.duplicates_skipped.store(0, Ordering::Relaxed);
    }

    /// One-line frontier statistics
    pub fn stats(&self) -> String {
        format!(
            "Frontier[queued={}, seen={}, added={}, duplicates={}]",
            self.len(),
            self.seen.len(),
            self.total_added.load(Ordering::Relaxed),
            self.duplicates_skipped.load(Ordering::Relaxed)
        )
    }
}

/// Checks that a normalized URL points at a crawlable resource
fn is_crawlable(url: &str) -> bool {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return false;
    }

    let lower = url.to_lowercase();
    let path_end = lower.find('?').unwrap_or(lower.len());
    let path = &lower[..path_end];

    !SKIPPED_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_add_and_len() {
        let frontier = UrlFrontier::new(100);
        assert!(frontier.add("https://example.com/page", 0));
        assert_eq!(frontier.len(), 1);
        assert_eq!(frontier.seen_count(), 1);
        assert!(!frontier.is_empty());
    }

    #[test]
    fn test_duplicate_rejected() {
        let frontier = UrlFrontier::new(100);
        assert!(frontier.add("https://example.com/page", 0));
        assert!(!frontier.add("https://example.com/page", 1));
        assert_eq!(frontier.len(), 1);
        assert_eq!(frontier.duplicates_skipped(), 1);
    }

    #[test]
    fn test_duplicate_after_normalization() {
        let frontier = UrlFrontier::new(100);
        assert!(frontier.add("https://example.com/page", 0));
        // Same URL after trailing-slash and fragment normalization
        assert!(!frontier.add("https://EXAMPLE.com/page/#top", 0));
        assert_eq!(frontier.len(), 1);
    }

    #[test]
    fn test_rejects_invalid_urls() {
        let frontier = UrlFrontier::new(100);
        assert!(!frontier.add("not a url", 0));
        assert!(!frontier.add("mailto:a@b.com", 0));
        assert!(!frontier.add("ftp://example.com/file", 0));
        assert!(frontier.is_empty());
    }

    #[test]
    fn test_rejects_non_crawlable_extensions() {
        let frontier = UrlFrontier::new(100);
        assert!(!frontier.add("https://x.com/a.jpg", 0));
        assert!(!frontier.add("https://x.com/a.PDF", 0));
        assert!(!frontier.add("https://x.com/style.css", 0));
        assert!(!frontier.add("https://x.com/app.js", 0));
        assert!(frontier.add("https://x.com/page", 0));
        assert_eq!(frontier.len(), 1);
    }

    #[test]
    fn test_extension_check_ignores_query() {
        let frontier = UrlFrontier::new(100);
        // The path is what matters, not the query string
        assert!(frontier.add("https://x.com/page?file=report.pdf", 0));
        assert!(!frontier.add("https://x.com/report.pdf?v=2", 0));
    }

    #[test]
    fn test_capacity_rollback() {
        let frontier = UrlFrontier::new(1);
        assert!(frontier.add("https://example.com/a", 0));
        assert!(!frontier.add("https://example.com/b", 0));
        // The rejected URL was rolled back from the seen-set
        assert!(!frontier.has_seen("https://example.com/b"));
        assert_eq!(frontier.seen_count(), 1);
    }

    #[test]
    fn test_has_seen() {
        let frontier = UrlFrontier::new(100);
        frontier.add("https://example.com/page", 0);
        assert!(frontier.has_seen("https://example.com/page"));
        assert!(frontier.has_seen("https://example.com/page/"));
        assert!(!frontier.has_seen("https://example.com/other"));
    }

    #[tokio::test]
    async fn test_poll_returns_entry() {
        let frontier = UrlFrontier::new(100);
        frontier.add("https://example.com/page", 2);

        let entry = frontier.poll().await.unwrap();
        assert_eq!(entry.url, "https://example.com/page");
        assert_eq!(entry.depth, 2);
        assert!(frontier.is_empty());
    }

    #[tokio::test]
    async fn test_poll_empty_times_out() {
        let frontier = UrlFrontier::new(100);
        let start = Instant::now();
        assert!(frontier.poll().await.is_none());
        assert!(start.elapsed() >= Duration::from_millis(90));
    }

    #[tokio::test]
    async fn test_poll_wakes_on_add() {
        let frontier = Arc::new(UrlFrontier::new(100));
        let poller = {
            let frontier = Arc::clone(&frontier);
            tokio::spawn(async move { frontier.poll().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        frontier.add("https://example.com/page", 0);

        let entry = poller.await.unwrap();
        assert!(entry.is_some());
    }

    #[tokio::test]
    async fn test_concurrent_add_dedup() {
        let frontier = Arc::new(UrlFrontier::new(1000));
        let mut handles = Vec::new();

        for _ in 0..16 {
            let frontier = Arc::clone(&frontier);
            handles.push(tokio::spawn(async move {
                frontier.add("https://example.com/contested", 0)
            }));
        }

        let mut wins = 0;
        for handle in handles {
            if handle.await.unwrap() {
                wins += 1;
            }
        }

        // Exactly one caller wins the race, and exactly one entry is queued
        assert_eq!(wins, 1);
        assert_eq!(frontier.len(), 1);
        assert!(frontier.poll().await.is_some());
        assert!(frontier.poll().await.is_none());
    }

    #[test]
    fn test_drain_and_seen_snapshot() {
        let frontier = UrlFrontier::new(100);
        frontier.add("https://example.com/a", 0);
        frontier.add("https://example.com/b", 1);

        let drained = frontier.drain();
        assert_eq!(drained.len(), 2);
        assert!(frontier.is_empty());
        // Draining keeps the seen-set so duplicates stay blocked
        assert_eq!(frontier.seen_snapshot().len(), 2);
    }

    #[tokio::test]
    async fn test_restore_bypasses_dedup_and_blocks_readds() {
        let frontier = UrlFrontier::new(100);
        frontier.restore(&[
            ("https://example.com/a".to_string(), 1),
            ("https://example.com/b".to_string(), 2),
        ]);

        assert_eq!(frontier.len(), 2);
        assert_eq!(frontier.snapshot_entries().len(), 2);
        // Restored URLs count as seen, so offering them again fails
        assert!(!frontier.add("https://example.com/a", 0));

        let entry = frontier.poll().await.unwrap();
        assert_eq!(entry.depth, 1);
    }

    #[test]
    fn test_snapshot_entries_does_not_consume() {
        let frontier = UrlFrontier::new(100);
        frontier.add("https://example.com/a", 0);
        assert_eq!(frontier.snapshot_entries().len(), 1);
        assert_eq!(frontier.len(), 1);
    }

    #[test]
    fn test_clear() {
        let frontier = UrlFrontier::new(100);
        frontier.add("https://example.com/a", 0);
        frontier.clear();
        assert!(frontier.is_empty());
        assert_eq!(frontier.seen_count(), 0);
        assert!(frontier.add("https://example.com/a", 0));
    }

    #[test]
    fn test_stats_format() {
        let frontier = UrlFrontier::new(100);
        frontier.add("https://example.com/a", 0);
        frontier.add("https://example.com/a", 0);
        let stats = frontier.stats();
        assert!(stats.contains("queued=1"));
        assert!(stats.contains("duplicates=1"));
    }
}
