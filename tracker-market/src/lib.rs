//! Market data clients for the Signal Call Tracker
//!
//! This crate provides clients for:
//! - DexScreener: pair data with price, liquidity and market cap (primary)
//! - Jupiter: Solana price feed (fallback, price only)
//! - RugCheck: token security reports used in admission replies
//!
//! [`FallbackGateway`] puts the price sources behind one "best available
//! snapshot" call.

pub mod dexscreener;
pub mod error;
pub mod gateway;
pub mod jupiter;
pub mod rate_limiter;
pub mod rugcheck;

pub use dexscreener::DexScreenerSource;
pub use error::MarketDataError;
pub use gateway::{FallbackGateway, MarketDataGateway, MarketDataSource};
pub use jupiter::JupiterSource;
pub use rate_limiter::{RateLimiter, RateLimiterStats};
pub use rugcheck::{RugCheckClient, SecurityReport};
