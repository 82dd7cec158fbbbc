//! Market snapshots returned by upstream price sources

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which upstream produced a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotSource {
    DexScreener,
    Jupiter,
}

impl fmt::Display for SnapshotSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotSource::DexScreener => write!(f, "dexscreener"),
            SnapshotSource::Jupiter => write!(f, "jupiter"),
        }
    }
}

/// Percent price change over the source's rolling windows
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceChange {
    pub m5: f64,
    pub h1: f64,
    pub h6: f64,
    pub h24: f64,
}

/// Best available market view of a token at one point in time
///
/// Numeric fields a source does not report are zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    /// USD price
    pub price: f64,
    pub price_change: PriceChange,
    pub volume_24h: f64,
    /// USD liquidity of the selected pair
    pub liquidity: f64,
    pub market_cap: f64,
    pub fdv: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pair_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dex_id: Option<String>,
    pub source: SnapshotSource,
}

impl MarketSnapshot {
    /// Snapshot carrying only a price
    pub fn price_only(price: f64, source: SnapshotSource) -> Self {
        Self {
            price,
            price_change: PriceChange::default(),
            volume_24h: 0.0,
            liquidity: 0.0,
            market_cap: 0.0,
            fdv: 0.0,
            pair_address: None,
            dex_id: None,
            source,
        }
    }

    /// Snapshot carrying a price and market cap
    pub fn with_market_cap(price: f64, market_cap: f64, source: SnapshotSource) -> Self {
        Self {
            market_cap,
            ..Self::price_only(price, source)
        }
    }

    /// Whether the snapshot can be compared against a call-time market cap
    pub fn has_market_cap(&self) -> bool {
        self.market_cap.is_finite() && self.market_cap > 0.0
    }
}
