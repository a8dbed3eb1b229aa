use serde::Deserialize;

/// Main configuration structure for the crawler
///
/// Every field has a default so a partial (or absent) configuration file
/// still produces a usable config.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct CrawlerConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub robots: RobotsConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub index: IndexConfig,
}

/// Engine behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Number of worker tasks executing crawl pipelines
    #[serde(rename = "thread-count", default = "default_thread_count")]
    pub thread_count: u32,

    /// Maximum number of concurrent outbound connections
    #[serde(rename = "max-connections", default = "default_max_connections")]
    pub max_connections: u32,

    /// Stop after this many pages have been processed
    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: u64,

    /// Maximum link depth from seed URLs
    #[serde(rename = "max-depth", default = "default_max_depth")]
    pub max_depth: u32,

    /// Minimum time between requests to the same domain (milliseconds)
    #[serde(rename = "default-delay-ms", default = "default_delay_ms")]
    pub default_delay_ms: u64,
}

/// HTTP fetching configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// Per-request timeout (milliseconds)
    #[serde(rename = "request-timeout-ms", default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Maximum fetch attempts per URL
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay for exponential retry backoff (milliseconds)
    #[serde(rename = "retry-base-delay-ms", default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Maximum response body size in bytes
    #[serde(rename = "max-body-size-bytes", default = "default_max_body_size")]
    pub max_body_size_bytes: usize,

    /// User-Agent header sent with every request
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,
}

/// Robots.txt handling configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RobotsConfig {
    /// Whether to check robots.txt before fetching
    #[serde(rename = "respect-robots-txt", default = "default_true")]
    pub respect_robots_txt: bool,

    /// How long fetched robots.txt rules stay valid (seconds)
    #[serde(rename = "cache-ttl-secs", default = "default_robots_ttl_secs")]
    pub cache_ttl_secs: u64,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path", default = "default_database_path")]
    pub database_path: String,
}

/// Relevance indexing configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct IndexConfig {
    /// Keywords that mark content as relevant to this crawl
    #[serde(default)]
    pub keywords: Vec<String>,
}

fn default_thread_count() -> u32 {
    10
}

fn default_max_connections() -> u32 {
    20
}

fn default_max_pages() -> u64 {
    10_000
}

fn default_max_depth() -> u32 {
    10
}

fn default_delay_ms() -> u64 {
    1000
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

fn default_max_body_size() -> usize {
    10 * 1024 * 1024
}

fn default_user_agent() -> String {
    "Driftnet/1.0 (+https://github.com/example/driftnet)".to_string()
}

fn default_true() -> bool {
    true
}

fn default_robots_ttl_secs() -> u64 {
    24 * 60 * 60
}

fn default_database_path() -> String {
    "./data/crawler.db".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            thread_count: default_thread_count(),
            max_connections: default_max_connections(),
            max_pages: default_max_pages(),
            max_depth: default_max_depth(),
            default_delay_ms: default_delay_ms(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            max_body_size_bytes: default_max_body_size(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for RobotsConfig {
    fn default() -> Self {
        Self {
            respect_robots_txt: default_true(),
            cache_ttl_secs: default_robots_ttl_secs(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}
