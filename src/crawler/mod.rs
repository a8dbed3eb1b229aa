//! Crawler module: fetching, processing, and orchestration
//!
//! Contains the engine and the per-URL pipeline stages: HTTP fetching with
//! retry, link extraction, content processing, plus the concurrency
//! primitives (phase barrier) and crawl metrics.

mod barrier;
mod engine;
mod extractor;
mod fetcher;
mod metrics;
mod processor;

pub use barrier::PhaseBarrier;
pub use engine::{CrawlerEngine, EngineState};
pub use extractor::{extract_links, extract_title};
pub use fetcher::{build_http_client, FetchResult, PageFetcher};
pub use metrics::{format_bytes, CrawlMetrics, CrawlMetricsSnapshot};
pub use processor::{ContentProcessor, ProcessedContent};
