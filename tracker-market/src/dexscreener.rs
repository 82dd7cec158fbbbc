//! DexScreener API client for token pair snapshots
//!
//! Looks up every pair trading a token and keeps the most liquid one.
//! Free API, no authentication required.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use tracker_core::{MarketSnapshot, PriceChange, SnapshotSource};

use crate::error::MarketDataError;
use crate::gateway::MarketDataSource;

const DEXSCREENER_API_BASE: &str = "https://api.dexscreener.com/latest";

/// DexScreener API client
pub struct DexScreenerSource {
    http: Client,
}

/// Response of the `/dex/tokens/{address}` endpoint
#[derive(Debug, Deserialize)]
struct TokenPairsResponse {
    #[serde(default)]
    pairs: Option<Vec<Pair>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Pair {
    #[serde(default)]
    dex_id: Option<String>,
    #[serde(default)]
    pair_address: Option<String>,
    #[serde(default)]
    price_usd: Option<String>,
    #[serde(default)]
    price_change: Option<PairPriceChange>,
    #[serde(default)]
    volume: Option<PairVolume>,
    #[serde(default)]
    liquidity: Option<PairLiquidity>,
    #[serde(default)]
    market_cap: Option<f64>,
    #[serde(default)]
    fdv: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct PairPriceChange {
    m5: Option<f64>,
    h1: Option<f64>,
    h6: Option<f64>,
    h24: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct PairVolume {
    h24: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct PairLiquidity {
    usd: Option<f64>,
}

impl Pair {
    fn liquidity_usd(&self) -> f64 {
        self.liquidity.as_ref().and_then(|l| l.usd).unwrap_or(0.0)
    }

    fn into_snapshot(self) -> MarketSnapshot {
        let liquidity = self.liquidity_usd();
        let change = self.price_change.unwrap_or_default();

        MarketSnapshot {
            price: self
                .price_usd
                .as_deref()
                .and_then(|p| p.parse::<f64>().ok())
                .unwrap_or(0.0),
            price_change: PriceChange {
                m5: change.m5.unwrap_or(0.0),
                h1: change.h1.unwrap_or(0.0),
                h6: change.h6.unwrap_or(0.0),
                h24: change.h24.unwrap_or(0.0),
            },
            volume_24h: self.volume.and_then(|v| v.h24).unwrap_or(0.0),
            liquidity,
            market_cap: self.market_cap.unwrap_or(0.0),
            fdv: self.fdv.unwrap_or(0.0),
            pair_address: self.pair_address,
            dex_id: self.dex_id,
            source: SnapshotSource::DexScreener,
        }
    }
}

impl DexScreenerSource {
    /// Create a new DexScreener client
    pub fn new(timeout: Duration) -> Self {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent("SignalTracker/1.0")
            .build()
            .expect("Failed to create HTTP client");

        Self { http }
    }

    /// Fetch the most liquid pair for a token, `None` if it has no pairs
    pub async fn fetch_best_pair(
        &self,
        address: &str,
    ) -> Result<Option<MarketSnapshot>, MarketDataError> {
        let url = format!("{}/dex/tokens/{}", DEXSCREENER_API_BASE, address);
        debug!("[DexScreener] Fetching pairs from: {}", url);

        let response = self.http.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(MarketDataError::Http(response.status().as_u16()));
        }

        let body: TokenPairsResponse = response
            .json()
            .await
            .map_err(|e| MarketDataError::Parse(e.to_string()))?;

        Ok(select_best_pair(body.pairs.unwrap_or_default()).map(Pair::into_snapshot))
    }
}

impl Default for DexScreenerSource {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

#[async_trait]
impl MarketDataSource for DexScreenerSource {
    fn name(&self) -> &'static str {
        "dexscreener"
    }

    async fn fetch(&self, address: &str) -> Result<Option<MarketSnapshot>, MarketDataError> {
        self.fetch_best_pair(address).await
    }
}

/// Highest `liquidity.usd` wins; the first pair wins ties
fn select_best_pair(pairs: Vec<Pair>) -> Option<Pair> {
    pairs.into_iter().fold(None, |best, pair| match best {
        Some(current) if current.liquidity_usd() >= pair.liquidity_usd() => Some(current),
        _ => Some(pair),
    })
}
