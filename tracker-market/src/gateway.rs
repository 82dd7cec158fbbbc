//! Snapshot gateway with source fallback
//!
//! Sources are tried in a fixed preference order. The first one to return a
//! snapshot wins; partial results are never merged across sources. Errors and
//! timeouts fall through to the next source and, if every source fails, the
//! caller simply sees "unavailable".

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use tracker_core::MarketSnapshot;

use crate::dexscreener::DexScreenerSource;
use crate::error::MarketDataError;
use crate::jupiter::JupiterSource;
use crate::rate_limiter::RateLimiter;

/// One upstream price/liquidity source
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Short name for logging
    fn name(&self) -> &'static str;

    /// `Ok(None)` means the source answered but does not know the token
    async fn fetch(&self, address: &str) -> Result<Option<MarketSnapshot>, MarketDataError>;
}

/// "Best available snapshot" contract the scheduler depends on
#[async_trait]
pub trait MarketDataGateway: Send + Sync {
    /// `None` when no source could produce a snapshot
    async fn fetch_snapshot(&self, address: &str) -> Option<MarketSnapshot>;

    /// Longest a single `fetch_snapshot` may legitimately take, if known.
    /// Callers that bound the call must allow at least this long.
    fn deadline(&self) -> Option<Duration> {
        None
    }
}

/// Rate limiter slots a request may queue behind before its own fetch starts
const LIMITER_QUEUE_DEPTH: u32 = 8;

/// Gateway over an ordered list of sources
pub struct FallbackGateway {
    sources: Vec<Arc<dyn MarketDataSource>>,
    timeout: Duration,
    limiter: Option<Arc<RateLimiter>>,
}

impl FallbackGateway {
    pub fn new(sources: Vec<Arc<dyn MarketDataSource>>, timeout: Duration) -> Self {
        Self {
            sources,
            timeout,
            limiter: None,
        }
    }

    /// DexScreener first, Jupiter as fallback
    pub fn standard(timeout: Duration) -> Self {
        let sources: Vec<Arc<dyn MarketDataSource>> = vec![
            Arc::new(DexScreenerSource::new(timeout)),
            Arc::new(JupiterSource::new(timeout)),
        ];
        Self::new(sources, timeout)
    }

    /// Space out upstream requests through a shared limiter
    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Time to try every source in turn, each up to its own timeout, plus
    /// the rate limiter queue in front of each attempt
    pub fn worst_case_fetch(&self) -> Duration {
        let attempts = self.sources.len() as u32;
        let queue = self
            .limiter
            .as_ref()
            .map(|limiter| limiter.min_interval() * LIMITER_QUEUE_DEPTH)
            .unwrap_or_default();
        (self.timeout + queue) * attempts
    }

    async fn fetch_from(
        &self,
        source: &dyn MarketDataSource,
        address: &str,
    ) -> Result<Option<MarketSnapshot>, MarketDataError> {
        if let Some(limiter) = &self.limiter {
            limiter.acquire().await;
        }

        match tokio::time::timeout(self.timeout, source.fetch(address)).await {
            Ok(result) => result,
            Err(_) => Err(MarketDataError::Timeout(self.timeout.as_millis() as u64)),
        }
    }
}

#[async_trait]
impl MarketDataGateway for FallbackGateway {
    async fn fetch_snapshot(&self, address: &str) -> Option<MarketSnapshot> {
        for source in &self.sources {
            match self.fetch_from(source.as_ref(), address).await {
                Ok(Some(snapshot)) => {
                    debug!("[{}] Snapshot for {}: mc={}", source.name(), address, snapshot.market_cap);
                    return Some(snapshot);
                }
                Ok(None) => {
                    debug!("[{}] No data for {}", source.name(), address);
                }
                Err(e) => {
                    warn!("[{}] Failed to fetch {}: {}", source.name(), address, e);
                }
            }
        }

        None
    }

    fn deadline(&self) -> Option<Duration> {
        Some(self.worst_case_fetch())
    }
}
