//! Shared request spacing for upstream market data calls
//!
//! The public DexScreener and Jupiter endpoints throttle aggressively, and a
//! tick fans out one request per monitored signal. A limiter shared by every
//! source keeps those requests a minimum interval apart.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// DexScreener allows roughly 300 requests per minute
pub const DEXSCREENER_MIN_REQUEST_INTERVAL_MS: u64 = 200;

/// Enforces a minimum delay between requests
///
/// Each caller reserves its time slot while holding the lock and only then
/// sleeps, so concurrent callers get distinct slots instead of all waking at
/// the same instant.
#[derive(Debug)]
pub struct RateLimiter {
    /// Next free slot, in milliseconds since `epoch`
    next_available_ms: Mutex<u64>,
    epoch: Instant,
    min_interval: Duration,
    name: String,
    total_requests: AtomicU64,
    waited_requests: AtomicU64,
}

impl RateLimiter {
    pub fn new(min_interval_ms: u64, name: &str) -> Self {
        Self {
            next_available_ms: Mutex::new(0),
            epoch: Instant::now(),
            min_interval: Duration::from_millis(min_interval_ms),
            name: name.to_string(),
            total_requests: AtomicU64::new(0),
            waited_requests: AtomicU64::new(0),
        }
    }

    pub fn for_dexscreener() -> Self {
        Self::new(DEXSCREENER_MIN_REQUEST_INTERVAL_MS, "DexScreener")
    }

    fn now_ms(&self) -> u64 {
        Instant::now().duration_since(self.epoch).as_millis() as u64
    }

    /// Wait until this caller's slot comes up
    pub async fn acquire(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        let now_ms = self.now_ms();
        let interval_ms = self.min_interval.as_millis() as u64;

        let wait_ms = {
            let mut next_available = self.next_available_ms.lock().await;
            let slot = (*next_available).max(now_ms);
            *next_available = slot + interval_ms;
            slot - now_ms
        };

        if wait_ms > 0 {
            self.waited_requests.fetch_add(1, Ordering::Relaxed);
            debug!("[RATE_LIMITER:{}] waiting {}ms", self.name, wait_ms);
            tokio::time::sleep(Duration::from_millis(wait_ms)).await;
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub fn stats(&self) -> RateLimiterStats {
        RateLimiterStats {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            waited_requests: self.waited_requests.load(Ordering::Relaxed),
            min_interval_ms: self.min_interval.as_millis() as u64,
            name: self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RateLimiterStats {
    pub total_requests: u64,
    pub waited_requests: u64,
    pub min_interval_ms: u64,
    pub name: String,
}
