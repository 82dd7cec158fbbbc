//! Signal records and their milestone history

use crate::chain::Chain;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Lifecycle status of a signal
///
/// Only ever moves `Monitoring -> Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalStatus {
    /// Within the observation window, polled every tick
    #[default]
    Monitoring,
    /// Observation window elapsed, kept for statistics only
    Completed,
}

impl SignalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalStatus::Monitoring => "monitoring",
            SignalStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for SignalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SignalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "monitoring" => Ok(SignalStatus::Monitoring),
            "completed" => Ok(SignalStatus::Completed),
            _ => Err(format!("Unknown signal status: {}", s)),
        }
    }
}

/// Value snapshotted once when a checkpoint boundary is first crossed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MilestoneRecord {
    /// Multiplier relative to the market cap at call time
    pub return_multiplier: f64,
    /// Market cap the multiplier was computed from
    pub value: f64,
    /// USD price of the same snapshot, when the source reported one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    /// Unix seconds of the tick that recorded this checkpoint
    pub recorded_at: i64,
}

/// Fields extracted from an inbound call message
///
/// Everything except the contract address is optional; admission fills the
/// gaps with zero values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedSignal {
    pub contract_address: String,
    #[serde(default)]
    pub chain: Option<Chain>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub market_cap: Option<f64>,
    /// Grouping key, usually the originating chat id
    #[serde(default)]
    pub scope: Option<String>,
}

impl ParsedSignal {
    pub fn new(contract_address: impl Into<String>) -> Self {
        Self {
            contract_address: contract_address.into(),
            ..Self::default()
        }
    }

    pub fn with_market_cap(mut self, market_cap: f64) -> Self {
        self.market_cap = Some(market_cap);
        self
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }
}

/// Smallest call-time market cap used as a return denominator. Anything
/// below is treated as unknown.
const MIN_CALL_MARKET_CAP: f64 = 1.0;

/// One observed token call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Chain-specific token identifier, unique across the store
    pub contract_address: String,
    pub chain: Chain,
    pub symbol: String,
    pub name: String,
    /// Denominator of every return computed for this signal
    pub market_cap_at_call: f64,
    /// Unix seconds, origin of the observation window
    pub admitted_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    pub status: SignalStatus,
    /// Checkpoint label -> record, write-once per label
    #[serde(default)]
    pub milestones: BTreeMap<String, MilestoneRecord>,
    /// Alert thresholds already notified, ascending
    #[serde(default)]
    pub alerts_fired: Vec<f64>,
}

impl Signal {
    /// Build a fresh `monitoring` signal from parsed fields
    pub fn from_parsed(fields: ParsedSignal, admitted_at: i64) -> Self {
        let market_cap_at_call = fields
            .market_cap
            .filter(|mc| mc.is_normal() && *mc >= MIN_CALL_MARKET_CAP)
            .unwrap_or(0.0);

        Self {
            contract_address: fields.contract_address.trim().to_string(),
            chain: fields.chain.unwrap_or_default(),
            symbol: fields.symbol.unwrap_or_default(),
            name: fields.name.unwrap_or_default(),
            market_cap_at_call,
            admitted_at,
            scope: fields.scope,
            status: SignalStatus::Monitoring,
            milestones: BTreeMap::new(),
            alerts_fired: Vec::new(),
        }
    }

    /// Seconds since admission, never negative
    pub fn elapsed(&self, now: i64) -> i64 {
        (now - self.admitted_at).max(0)
    }

    pub fn is_monitoring(&self) -> bool {
        self.status == SignalStatus::Monitoring
    }

    pub fn milestone(&self, label: &str) -> Option<&MilestoneRecord> {
        self.milestones.get(label)
    }

    /// Record a checkpoint unless it already exists. Returns whether it was written.
    pub fn record_milestone(&mut self, label: &str, record: MilestoneRecord) -> bool {
        if self.milestones.contains_key(label) {
            return false;
        }
        self.milestones.insert(label.to_string(), record);
        true
    }

    pub fn has_fired(&self, threshold: f64) -> bool {
        self.alerts_fired.iter().any(|t| *t == threshold)
    }

    /// Mark a threshold as notified. Returns false if it already was.
    pub fn mark_alert(&mut self, threshold: f64) -> bool {
        if self.has_fired(threshold) {
            return false;
        }
        self.alerts_fired.push(threshold);
        self.alerts_fired.sort_by(|a, b| a.total_cmp(b));
        true
    }

    /// Retire the signal. Idempotent; there is no way back to monitoring.
    pub fn complete(&mut self) -> bool {
        if self.status == SignalStatus::Completed {
            return false;
        }
        self.status = SignalStatus::Completed;
        true
    }

    /// Shortened contract address for display
    pub fn short_address(&self) -> String {
        truncate_address(&self.contract_address)
    }
}

/// One polled sample, kept as price history
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub price: f64,
    pub market_cap: f64,
    pub return_multiplier: f64,
    pub recorded_at: i64,
}

/// Truncate a token address for display
pub fn truncate_address(addr: &str) -> String {
    if addr.chars().count() > 12 {
        let head: String = addr.chars().take(6).collect();
        let tail: String = addr
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("{}...{}", head, tail)
    } else {
        addr.to_string()
    }
}
