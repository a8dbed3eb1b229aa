//! Crawler engine: worker pool, connection limiting, and phase coordination
//!
//! The engine owns the whole per-URL pipeline. A single control task drains
//! the frontier into a bounded job queue consumed by a fixed pool of worker
//! tasks; a semaphore caps concurrent connections independently of pool
//! size, and a phase barrier keeps each wave of discoveries separate from
//! the next.

use crate::config::CrawlerConfig;
use crate::crawler::barrier::PhaseBarrier;
use crate::crawler::extractor::extract_links;
use crate::crawler::fetcher::{build_http_client, PageFetcher};
use crate::crawler::metrics::CrawlMetrics;
use crate::crawler::processor::ContentProcessor;
use crate::frontier::UrlFrontier;
use crate::index::ContentIndexer;
use crate::limiter::RateLimiter;
use crate::robots::RobotsTxtCache;
use crate::storage::{CrawlSnapshot, Storage, StorageResult};
use crate::url::{extract_site, normalize_url};
use crate::Result;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::JoinHandle;
use url::Url;

/// How long `stop` waits for in-flight work before force-cancelling
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

const STATE_IDLE: u8 = 0;
const STATE_RUNNING: u8 = 1;
const STATE_STOPPED: u8 = 2;

/// Lifecycle state of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Running,
    Stopped,
}

impl EngineState {
    fn from_u8(value: u8) -> Self {
        match value {
            STATE_RUNNING => Self::Running,
            STATE_STOPPED => Self::Stopped,
            _ => Self::Idle,
        }
    }
}

/// One unit of work for the pool
struct CrawlJob {
    url: String,
    depth: u32,
}

/// Shared state between the control loop and the workers
struct EngineInner {
    config: CrawlerConfig,
    frontier: UrlFrontier,
    fetcher: PageFetcher,
    robots: RobotsTxtCache,
    limiter: RateLimiter,
    processor: ContentProcessor,
    indexer: Arc<ContentIndexer>,
    storage: Mutex<Box<dyn Storage>>,
    metrics: CrawlMetrics,
    connections: Semaphore,
    barrier: PhaseBarrier,
    state: AtomicU8,
    stop_requested: AtomicBool,
    completion_tx: watch::Sender<u64>,
}

impl EngineInner {
    fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    /// The per-URL pipeline
    ///
    /// Order: robots gate, connection permit, rate-limit wait, fetch,
    /// extract + index + persist. The permit is RAII so it is released on
    /// every path; the caller records errors and arrives at the barrier.
    async fn process_url(&self, url: &str, depth: u32) -> Result<()> {
        let site = extract_site(url).unwrap_or_else(|| "unknown".to_string());

        if self.config.robots.respect_robots_txt {
            if !self.robots.is_allowed(url).await {
                tracing::debug!("URL blocked by robots.txt: {}", url);
                self.metrics.record_robots_blocked();
                return Ok(());
            }

            // Fold the site's crawl-delay into its rate limit
            let delay = self.robots.crawl_delay(&site).await;
            self.limiter.set_delay(&site, delay);
        }

        let _permit = match self.connections.acquire().await {
            Ok(permit) => permit,
            // Semaphore is closed during forced shutdown
            Err(_) => return Ok(()),
        };

        self.limiter.wait_for_permit(&site).await;

        if self.stop_requested() {
            return Ok(());
        }

        let result = self.fetcher.fetch(url).await?;

        self.metrics
            .record_page(&site, result.status_code, result.content_length as u64);

        let Some(body) = result.body.as_deref().filter(|_| result.success) else {
            return Ok(());
        };

        // Discoveries re-enter the frontier one level deeper
        let base = Url::parse(url)?;
        let links = extract_links(body, &base);
        for link in &links {
            if let Ok(normalized) = normalize_url(link) {
                self.indexer.record_link(normalized.as_str());
            }
            self.frontier.add(link, depth + 1);
        }

        let processed = self.processor.process(body, url);

        {
            let mut storage = self.storage.lock().unwrap();
            storage.save_page(
                url,
                &site,
                processed.title.as_deref(),
                Some(&processed.content_hash),
                result.status_code,
                result.content_length,
            )?;
            if !processed.term_weights.is_empty() {
                storage.save_index_terms(url, &processed.term_weights)?;
            }
            storage.update_relevance_score(url, processed.relevance_score)?;
        }

        Ok(())
    }
}

/// Runs one job and always arrives at the barrier
///
/// A failing URL is logged and counted, never propagated: one bad page
/// must not crash the engine or stall the other workers.
async fn run_job(inner: &Arc<EngineInner>, job: CrawlJob) {
    if let Err(e) = inner.process_url(&job.url, job.depth).await {
        tracing::error!("Error processing URL {}: {}", job.url, e);
        inner.metrics.record_error();
    }
    inner.barrier.arrive();
}

/// Worker task: consume jobs until the channel closes
async fn worker_loop(
    inner: Arc<EngineInner>,
    jobs: Arc<tokio::sync::Mutex<mpsc::Receiver<CrawlJob>>>,
) {
    loop {
        let job = { jobs.lock().await.recv().await };
        match job {
            Some(job) => run_job(&inner, job).await,
            None => break,
        }
    }
}

/// Control task: drain the frontier phase by phase
async fn control_loop(inner: Arc<EngineInner>, jobs_tx: mpsc::Sender<CrawlJob>) {
    let max_pages = inner.config.engine.max_pages;
    let max_depth = inner.config.engine.max_depth;
    let mut phase: u64 = 0;

    while !inner.stop_requested() && inner.metrics.pages_processed() < max_pages {
        tracing::info!("Starting phase {}", phase);

        while !inner.stop_requested()
            && !inner.frontier.is_empty()
            && inner.metrics.pages_processed() < max_pages
        {
            let Some(entry) = inner.frontier.poll().await else {
                break;
            };

            if entry.depth > max_depth {
                continue;
            }

            inner.barrier.register();
            let job = CrawlJob {
                url: entry.url,
                depth: entry.depth,
            };

            match jobs_tx.try_send(job) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(job)) => {
                    // Caller-runs backpressure: the control task absorbs
                    // the job instead of dropping it or growing the queue
                    tracing::debug!("Job queue full, running {} inline", job.url);
                    run_job(&inner, job).await;
                }
                Err(mpsc::error::TrySendError::Closed(job)) => {
                    // Channel only closes on forced shutdown; absorb the job
                    run_job(&inner, job).await;
                }
            }
        }

        // No worker starts phase N+1 work while phase-N stragglers remain
        inner.barrier.wait_idle().await;
        phase += 1;

        if inner.frontier.is_empty() {
            tracing::info!("Frontier empty, crawl complete");
            break;
        }
    }

    inner
        .metrics
        .record_duplicates(inner.frontier.duplicates_skipped());

    let final_state = if inner.stop_requested() {
        STATE_STOPPED
    } else {
        STATE_IDLE
    };
    inner.state.store(final_state, Ordering::SeqCst);

    tracing::info!("Crawl finished. {}", inner.metrics);
    tracing::info!("{}", inner.frontier.stats());

    inner.completion_tx.send_modify(|generation| *generation += 1);
}

/// Orchestrates the crawl: seeds in, pages fetched, links rediscovered
pub struct CrawlerEngine {
    inner: Arc<EngineInner>,
    completion_rx: watch::Receiver<u64>,
    worker_handles: Mutex<Vec<JoinHandle<()>>>,
    control_handle: Mutex<Option<JoinHandle<()>>>,
}

impl CrawlerEngine {
    /// Creates an engine over the given storage backend
    pub fn new(config: CrawlerConfig, storage: Box<dyn Storage>) -> Result<Self> {
        let client = build_http_client(
            &config.fetch.user_agent,
            Duration::from_millis(config.fetch.request_timeout_ms),
        )?;

        let indexer = Arc::new(ContentIndexer::new());
        if !config.index.keywords.is_empty() {
            indexer.set_target_keywords(&config.index.keywords);
        }

        let (completion_tx, completion_rx) = watch::channel(0u64);

        let inner = Arc::new(EngineInner {
            frontier: UrlFrontier::new(config.engine.max_pages as usize),
            fetcher: PageFetcher::new(client.clone(), &config.fetch),
            robots: RobotsTxtCache::new(
                client,
                config.fetch.user_agent.clone(),
                Duration::from_secs(config.robots.cache_ttl_secs),
                Duration::from_millis(config.engine.default_delay_ms),
            ),
            limiter: RateLimiter::new(config.engine.default_delay_ms),
            processor: ContentProcessor::new(Arc::clone(&indexer)),
            indexer,
            storage: Mutex::new(storage),
            metrics: CrawlMetrics::new(),
            connections: Semaphore::new(config.engine.max_connections as usize),
            barrier: PhaseBarrier::new(),
            state: AtomicU8::new(STATE_IDLE),
            stop_requested: AtomicBool::new(false),
            completion_tx,
            config,
        });

        Ok(Self {
            inner,
            completion_rx,
            worker_handles: Mutex::new(Vec::new()),
            control_handle: Mutex::new(None),
        })
    }

    /// Starts the crawl with the given seed URLs
    ///
    /// A no-op (logged) when the engine is not idle.
    pub fn start(&self, seed_urls: &[String]) {
        if self
            .inner
            .state
            .compare_exchange(
                STATE_IDLE,
                STATE_RUNNING,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_err()
        {
            tracing::warn!("Crawler is already running");
            return;
        }

        self.inner.stop_requested.store(false, Ordering::SeqCst);

        tracing::info!("Starting crawl with {} seed URLs", seed_urls.len());
        for url in seed_urls {
            self.inner.frontier.add(url, 0);
        }

        let (jobs_tx, jobs_rx) = mpsc::channel(self.inner.config.engine.max_pages as usize);
        let jobs_rx = Arc::new(tokio::sync::Mutex::new(jobs_rx));

        let mut workers = self.worker_handles.lock().unwrap();
        workers.clear();
        for _ in 0..self.inner.config.engine.thread_count {
            let inner = Arc::clone(&self.inner);
            let rx = Arc::clone(&jobs_rx);
            workers.push(tokio::spawn(worker_loop(inner, rx)));
        }

        let inner = Arc::clone(&self.inner);
        *self.control_handle.lock().unwrap() = Some(tokio::spawn(control_loop(inner, jobs_tx)));
    }

    /// Stops the crawler, waiting a bounded grace period before aborting
    pub async fn stop(&self) {
        tracing::info!("Stopping crawler...");
        self.inner.stop_requested.store(true, Ordering::SeqCst);
        self.inner.frontier.wake_all();

        if tokio::time::timeout(SHUTDOWN_GRACE, self.await_completion())
            .await
            .is_err()
        {
            tracing::warn!(
                "Workers did not drain within {:?}, force-cancelling",
                SHUTDOWN_GRACE
            );
            self.inner.connections.close();
            if let Some(handle) = self.control_handle.lock().unwrap().take() {
                handle.abort();
            }
            for handle in self.worker_handles.lock().unwrap().drain(..) {
                handle.abort();
            }
            self.inner.state.store(STATE_STOPPED, Ordering::SeqCst);
            self.inner
                .completion_tx
                .send_modify(|generation| *generation += 1);
        }
    }

    /// Waits for the current crawl to finish
    pub async fn await_completion(&self) {
        let mut rx = self.completion_rx.clone();
        while self.state() == EngineState::Running {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> EngineState {
        EngineState::from_u8(self.inner.state.load(Ordering::SeqCst))
    }

    pub fn is_running(&self) -> bool {
        self.state() == EngineState::Running
    }

    pub fn is_stopped(&self) -> bool {
        self.state() == EngineState::Stopped
    }

    /// Crawl metrics, readable at any time
    pub fn metrics(&self) -> &CrawlMetrics {
        &self.inner.metrics
    }

    /// The frontier, for status reporting
    pub fn frontier(&self) -> &UrlFrontier {
        &self.inner.frontier
    }

    /// Restores frontier and seen-set contents from a saved snapshot
    pub fn resume_from(&self, snapshot: &CrawlSnapshot) {
        for url in &snapshot.seen {
            self.inner.frontier.mark_seen(url);
        }
        self.inner.frontier.restore(&snapshot.frontier);
        tracing::info!(
            "Resumed state: {} queued, {} seen",
            snapshot.frontier.len(),
            snapshot.seen.len()
        );
    }

    /// Saves the current frontier and seen-set as an active crawl state
    pub fn save_state(&self, config_hash: &str) -> StorageResult<i64> {
        let snapshot = CrawlSnapshot {
            frontier: self.inner.frontier.snapshot_entries(),
            seen: self.inner.frontier.seen_snapshot(),
        };
        let mut storage = self.inner.storage.lock().unwrap();
        storage.save_crawl_state(config_hash, &snapshot)
    }

    /// Marks a saved crawl state as completed
    pub fn complete_state(&self, state_id: i64) -> StorageResult<()> {
        let mut storage = self.inner.storage.lock().unwrap();
        storage.complete_crawl_state(state_id)
    }

    /// Recomputes stored relevance scores against the full corpus
    pub fn rescore_all(&self) -> StorageResult<usize> {
        let mut storage = self.inner.storage.lock().unwrap();
        self.inner.indexer.rescore_all(storage.as_mut())
    }

    /// Searches indexed pages, ranked by summed term weight
    pub fn search(&self, query: &str, limit: u32) -> StorageResult<Vec<(String, f64)>> {
        let storage = self.inner.storage.lock().unwrap();
        self.inner.indexer.search(storage.as_ref(), query, limit)
    }

    /// Runs a closure against the storage backend
    pub fn with_storage<R>(&self, f: impl FnOnce(&mut dyn Storage) -> R) -> R {
        let mut storage = self.inner.storage.lock().unwrap();
        f(storage.as_mut())
    }

    /// One-line component statistics for status reporting
    pub fn stats(&self) -> String {
        format!(
            "{} | {} | {} | {}",
            self.inner.frontier.stats(),
            self.inner.limiter.stats(),
            self.inner.robots.stats(),
            self.inner.indexer.stats()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStorage;

    fn test_engine() -> CrawlerEngine {
        let storage = Box::new(SqliteStorage::in_memory().unwrap());
        CrawlerEngine::new(CrawlerConfig::default(), storage).unwrap()
    }

    #[tokio::test]
    async fn test_new_engine_is_idle() {
        let engine = test_engine();
        assert_eq!(engine.state(), EngineState::Idle);
        assert!(!engine.is_running());
        assert!(!engine.is_stopped());
    }

    #[tokio::test]
    async fn test_await_completion_when_idle_returns() {
        let engine = test_engine();
        // Must not hang when no crawl was started
        engine.await_completion().await;
    }

    #[tokio::test]
    async fn test_start_twice_is_noop() {
        let engine = test_engine();
        engine.start(&[]);
        assert!(engine.is_running());
        // Second start is logged and ignored
        engine.start(&[]);
        engine.await_completion().await;
    }

    #[tokio::test]
    async fn test_empty_seed_crawl_completes() {
        let engine = test_engine();
        engine.start(&[]);
        engine.await_completion().await;
        assert_eq!(engine.state(), EngineState::Idle);
        assert_eq!(engine.metrics().pages_processed(), 0);
    }

    #[tokio::test]
    async fn test_stop_without_start() {
        let engine = test_engine();
        engine.stop().await;
        assert!(!engine.is_running());
    }

    #[tokio::test]
    async fn test_resume_restores_frontier() {
        let engine = test_engine();
        let snapshot = CrawlSnapshot {
            frontier: vec![("https://example.com/next".to_string(), 1)],
            seen: vec![
                "https://example.com/".to_string(),
                "https://example.com/next".to_string(),
            ],
        };

        engine.resume_from(&snapshot);
        assert_eq!(engine.frontier().len(), 1);
        assert!(engine.frontier().has_seen("https://example.com/"));
    }

    #[tokio::test]
    async fn test_save_and_complete_state() {
        let engine = test_engine();
        engine.frontier().add("https://example.com/", 0);

        let id = engine.save_state("hash").unwrap();
        let loaded = engine.with_storage(|s| s.latest_active_state()).unwrap();
        assert!(loaded.is_some());

        engine.complete_state(id).unwrap();
        let loaded = engine.with_storage(|s| s.latest_active_state()).unwrap();
        assert!(loaded.is_none());
    }
}
