//! Chain definitions for tracked tokens

use serde::{Deserialize, Serialize};
use std::fmt;

/// Chains a signal can be called on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Chain {
    /// Solana
    #[default]
    Sol,
    /// BNB Smart Chain
    Bsc,
}

impl Chain {
    /// Short code used in storage and messages
    pub fn code(&self) -> &'static str {
        match self {
            Chain::Sol => "SOL",
            Chain::Bsc => "BSC",
        }
    }

    /// Chain id as used in DexScreener URLs
    pub fn dexscreener_id(&self) -> &'static str {
        match self {
            Chain::Sol => "solana",
            Chain::Bsc => "bsc",
        }
    }

    /// Get the full display name
    pub fn display_name(&self) -> &'static str {
        match self {
            Chain::Sol => "Solana",
            Chain::Bsc => "BSC",
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl std::str::FromStr for Chain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sol" | "solana" => Ok(Chain::Sol),
            "bsc" | "bnb" => Ok(Chain::Bsc),
            _ => Err(format!("Unknown chain: {}", s)),
        }
    }
}
