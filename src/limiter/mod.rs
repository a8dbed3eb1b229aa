//! Per-domain rate limiting
//!
//! Each domain gets its own limiter so that politeness waits for one site
//! never delay requests to another. Two workers hitting the same domain are
//! serialized through that domain's mutex: the second caller waits out the
//! remaining interval before its request is stamped.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Gate enforcing a minimum interval between requests to the same domain
pub struct RateLimiter {
    limiters: DashMap<String, Arc<DomainLimiter>>,
    default_delay_ms: u64,
}

/// Rate state for a single domain
struct DomainLimiter {
    /// Minimum interval between requests, in milliseconds
    delay_ms: AtomicU64,

    /// Timestamp of the last granted permit, guarded so that concurrent
    /// callers for this domain proceed one at a time
    last_request: Mutex<Option<Instant>>,
}

impl DomainLimiter {
    fn new(delay_ms: u64) -> Self {
        Self {
            delay_ms: AtomicU64::new(delay_ms),
            last_request: Mutex::new(None),
        }
    }

    /// Blocks until the domain's interval has elapsed, then stamps the permit
    async fn acquire(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(previous) = *last {
            let delay = Duration::from_millis(self.delay_ms.load(Ordering::Relaxed));
            let elapsed = previous.elapsed();
            if elapsed < delay {
                let wait = delay - elapsed;
                tracing::trace!("Rate limiting: waiting {:?}", wait);
                tokio::time::sleep(wait).await;
            }
        }

        *last = Some(Instant::now());
    }

    /// Grants a permit only if no wait would be needed
    fn try_acquire(&self) -> bool {
        let Ok(mut last) = self.last_request.try_lock() else {
            return false;
        };

        let delay = Duration::from_millis(self.delay_ms.load(Ordering::Relaxed));
        match *last {
            Some(previous) if previous.elapsed() < delay => false,
            _ => {
                *last = Some(Instant::now());
                true
            }
        }
    }
}

impl RateLimiter {
    /// Creates a limiter applying `default_delay_ms` to every new domain
    pub fn new(default_delay_ms: u64) -> Self {
        Self {
            limiters: DashMap::new(),
            default_delay_ms,
        }
    }

    /// Waits until a request to `domain` is allowed, then records it
    ///
    /// Two concurrent callers for the same domain are serialized; callers
    /// for unrelated domains never block each other.
    pub async fn wait_for_permit(&self, domain: &str) {
        let limiter = self.limiter_for(domain);
        limiter.acquire().await;
    }

    /// Non-blocking variant: returns whether a permit was granted now
    pub fn try_acquire(&self, domain: &str) -> bool {
        let limiter = self.limiter_for(domain);
        limiter.try_acquire()
    }

    /// Sets a custom delay for a domain (robots.txt crawl-delay overrides)
    pub fn set_delay(&self, domain: &str, delay: Duration) {
        let limiter = self.limiter_for(domain);
        limiter
            .delay_ms
            .store(delay.as_millis() as u64, Ordering::Relaxed);
        tracing::debug!("Set delay for {}: {:?}", domain, delay);
    }

    /// Returns the current delay for a domain
    pub fn get_delay(&self, domain: &str) -> Duration {
        let ms = self
            .limiters
            .get(domain)
            .map(|l| l.delay_ms.load(Ordering::Relaxed))
            .unwrap_or(self.default_delay_ms);
        Duration::from_millis(ms)
    }

    /// Removes rate state for a domain
    pub fn remove(&self, domain: &str) {
        self.limiters.remove(domain);
    }

    /// Clears all rate state
    pub fn clear(&self) {
        self.limiters.clear();
    }

    /// One-line limiter statistics
    pub fn stats(&self) -> String {
        format!(
            "RateLimiter[domains={}, defaultDelay={}ms]",
            self.limiters.len(),
            self.default_delay_ms
        )
    }

    /// Gets or lazily creates the limiter for a domain
    ///
    /// The Arc is cloned out so no map guard is held across an await.
    fn limiter_for(&self, domain: &str) -> Arc<DomainLimiter> {
        self.limiters
            .entry(domain.to_string())
            .or_insert_with(|| Arc::new(DomainLimiter::new(self.default_delay_ms)))
            .clone()
    }
}
