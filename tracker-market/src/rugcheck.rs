//! RugCheck API client for token security reports
//!
//! Reports are informational only: they decorate the admission reply and
//! never gate admission.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::error::MarketDataError;

const RUGCHECK_API_BASE: &str = "https://api.rugcheck.xyz/v1";

/// RugCheck API client
pub struct RugCheckClient {
    http: Client,
}

/// Raw `/tokens/{address}/report` response, only the fields we read
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReport {
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    risks: Option<Vec<RawRisk>>,
    #[serde(default)]
    token_meta: Option<RawTokenMeta>,
    #[serde(default)]
    top_holders: Option<Vec<RawHolder>>,
    #[serde(default)]
    total_holders: Option<u64>,
    #[serde(default)]
    lp_burned: Option<bool>,
    #[serde(default)]
    lp_locked: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RawRisk {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTokenMeta {
    #[serde(default)]
    mint_authority: Option<String>,
    #[serde(default)]
    freeze_authority: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawHolder {
    #[serde(default)]
    pct: Option<f64>,
}

/// Security summary of a token
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecurityReport {
    /// 0-100, higher is safer
    pub score: f64,
    pub risks: Vec<String>,
    pub mint_authority: Option<String>,
    pub freeze_authority: Option<String>,
    pub lp_burned: bool,
    pub lp_locked: bool,
    /// Combined percentage held by the ten largest holders
    pub top10_holder_pct: f64,
    pub total_holders: u64,
}

impl From<RawReport> for SecurityReport {
    fn from(raw: RawReport) -> Self {
        let meta = raw.token_meta;
        Self {
            score: raw.score.unwrap_or(0.0),
            risks: raw
                .risks
                .unwrap_or_default()
                .into_iter()
                .filter_map(|r| r.name)
                .collect(),
            mint_authority: meta.as_ref().and_then(|m| m.mint_authority.clone()),
            freeze_authority: meta.and_then(|m| m.freeze_authority),
            lp_burned: raw.lp_burned.unwrap_or(false),
            lp_locked: raw.lp_locked.unwrap_or(false),
            top10_holder_pct: raw
                .top_holders
                .unwrap_or_default()
                .iter()
                .take(10)
                .filter_map(|h| h.pct)
                .sum(),
            total_holders: raw.total_holders.unwrap_or(0),
        }
    }
}

impl RugCheckClient {
    pub fn new() -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent("SignalTracker/1.0")
            .build()
            .expect("Failed to create HTTP client");

        Self { http }
    }

    /// Fetch the security report for a token
    pub async fn fetch_report(&self, address: &str) -> Result<SecurityReport, MarketDataError> {
        let url = format!("{}/tokens/{}/report", RUGCHECK_API_BASE, address);
        debug!("[RugCheck] Fetching report from: {}", url);

        let response = self.http.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(MarketDataError::Http(response.status().as_u16()));
        }

        let raw: RawReport = response
            .json()
            .await
            .map_err(|e| MarketDataError::Parse(e.to_string()))?;

        Ok(raw.into())
    }
}

impl Default for RugCheckClient {
    fn default() -> Self {
        Self::new()
    }
}
