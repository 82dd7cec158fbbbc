//! Jupiter price API client
//!
//! Fallback source for Solana tokens. Reports a USD price only.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use tracker_core::{MarketSnapshot, SnapshotSource};

use crate::error::MarketDataError;
use crate::gateway::MarketDataSource;

const JUPITER_API_BASE: &str = "https://price.jup.ag/v6";

/// Jupiter price client
pub struct JupiterSource {
    http: Client,
}

#[derive(Debug, Deserialize)]
struct PriceResponse {
    #[serde(default)]
    data: HashMap<String, PriceEntry>,
}

#[derive(Debug, Deserialize)]
struct PriceEntry {
    /// Number in v6, string in later versions
    price: Value,
}

impl PriceEntry {
    fn price(&self) -> Option<f64> {
        match &self.price {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

impl JupiterSource {
    pub fn new(timeout: Duration) -> Self {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent("SignalTracker/1.0")
            .build()
            .expect("Failed to create HTTP client");

        Self { http }
    }

    /// Fetch the USD price of a token, `None` if Jupiter does not list it
    pub async fn fetch_price(&self, address: &str) -> Result<Option<f64>, MarketDataError> {
        let url = format!("{}/price", JUPITER_API_BASE);
        debug!("[Jupiter] Fetching price for {}", address);

        let response = self
            .http
            .get(&url)
            .query(&[("ids", address)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(MarketDataError::Http(response.status().as_u16()));
        }

        let body: PriceResponse = response
            .json()
            .await
            .map_err(|e| MarketDataError::Parse(e.to_string()))?;

        Ok(price_for(&body, address))
    }
}

impl Default for JupiterSource {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

#[async_trait]
impl MarketDataSource for JupiterSource {
    fn name(&self) -> &'static str {
        "jupiter"
    }

    async fn fetch(&self, address: &str) -> Result<Option<MarketSnapshot>, MarketDataError> {
        Ok(self
            .fetch_price(address)
            .await?
            .map(|price| MarketSnapshot::price_only(price, SnapshotSource::Jupiter)))
    }
}

fn price_for(body: &PriceResponse, address: &str) -> Option<f64> {
    body.data
        .get(address)
        .and_then(PriceEntry::price)
        .filter(|p| p.is_finite() && *p > 0.0)
}
