//! Robots.txt caching with automatic fetching and expiration
//!
//! Rules are fetched once per site and kept until the configured TTL
//! elapses. Fetch failures fall back to allow-all: an unreachable
//! robots.txt must never stall the crawl.

use crate::robots::RobotsRules;
use crate::url::extract_site;
use dashmap::DashMap;
use reqwest::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// Timeout applied to robots.txt fetches, independent of the page timeout
const ROBOTS_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Cached rules for one site
#[derive(Clone)]
struct CacheEntry {
    rules: Arc<RobotsRules>,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        Instant::now() > self.expires_at
    }
}

/// Fetch-once-per-site, TTL-cached robots.txt rules
pub struct RobotsTxtCache {
    cache: DashMap<String, CacheEntry>,
    client: Client,
    user_agent: String,
    ttl: Duration,
    default_delay: Duration,
}

impl RobotsTxtCache {
    /// Creates a cache using the shared HTTP client
    pub fn new(client: Client, user_agent: String, ttl: Duration, default_delay: Duration) -> Self {
        Self {
            cache: DashMap::new(),
            client,
            user_agent,
            ttl,
            default_delay,
        }
    }

    /// Checks if a URL is allowed by its site's robots.txt
    ///
    /// Any error while resolving or fetching robots.txt defaults to allow.
    pub async fn is_allowed(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            tracing::warn!("Could not parse URL for robots check: {}", url);
            return true;
        };

        let Some(site) = extract_site(url) else {
            return true;
        };

        let path = match parsed.path() {
            "" => "/",
            p => p,
        };

        let rules = self.rules_for(&site).await;
        rules.is_allowed(path)
    }

    /// Returns the effective crawl delay for a site
    ///
    /// The larger of the robots.txt crawl-delay and the configured default.
    pub async fn crawl_delay(&self, site: &str) -> Duration {
        let rules = self.rules_for(site).await;
        let robots_delay = rules
            .crawl_delay()
            .map(Duration::from_secs_f64)
            .unwrap_or(Duration::ZERO);

        robots_delay.max(self.default_delay)
    }

    /// Gets rules for a site, fetching on miss or expiry
    async fn rules_for(&self, site: &str) -> Arc<RobotsRules> {
        if let Some(entry) = self.cache.get(site) {
            if !entry.is_expired() {
                return Arc::clone(&entry.rules);
            }
        }

        let rules = Arc::new(self.fetch_rules(site).await);

        self.cache.insert(
            site.to_string(),
            CacheEntry {
                rules: Arc::clone(&rules),
                expires_at: Instant::now() + self.ttl,
            },
        );

        rules
    }

    /// Fetches and parses robots.txt for a site
    ///
    /// Tries HTTPS first, then HTTP, then gives up and allows everything.
    async fn fetch_rules(&self, site: &str) -> RobotsRules {
        for scheme in ["https", "http"] {
            let robots_url = format!("{}://{}/robots.txt", scheme, site);
            tracing::debug!("Fetching robots.txt from: {}", robots_url);

            match self
                .client
                .get(&robots_url)
                .timeout(ROBOTS_FETCH_TIMEOUT)
                .send()
                .await
            {
                Ok(response) if response.status().is_success() => match response.text().await {
                    Ok(content) => return RobotsRules::parse(&content, &self.user_agent),
                    Err(e) => {
                        tracing::debug!("Failed to read robots.txt body from {}: {}", site, e);
                    }
                },
                Ok(response) => {
                    // A site that answers without robots.txt allows everything
                    tracing::debug!(
                        "No robots.txt at {} (status {})",
                        robots_url,
                        response.status()
                    );
                    return RobotsRules::allow_all();
                }
                Err(e) => {
                    tracing::debug!("Could not fetch {}: {}", robots_url, e);
                }
            }
        }

        RobotsRules::allow_all()
    }

    /// Drops the cached entry for a site
    pub fn invalidate(&self, site: &str) {
        self.cache.remove(site);
        tracing::debug!("Invalidated robots.txt cache for: {}", site);
    }

    /// Clears all cached entries
    pub fn clear(&self) {
        self.cache.clear();
    }

    /// One-line cache statistics
    pub fn stats(&self) -> String {
        let valid = self
            .cache
            .iter()
            .filter(|entry| !entry.is_expired())
            .count();
        format!("RobotsTxtCache[total={}, valid={}]", self.cache.len(), valid)
    }
}
