//! Error types for the market data clients

use thiserror::Error;

/// Errors that can occur while talking to an upstream market data source
#[derive(Debug, Error)]
pub enum MarketDataError {
    /// Request could not be sent or the connection failed
    #[error("Network error: {0}")]
    Network(String),

    /// Upstream answered with a non-success status
    #[error("HTTP error: {0}")]
    Http(u16),

    /// Response body did not match the expected shape
    #[error("Parse error: {0}")]
    Parse(String),

    /// Upstream did not answer within the configured timeout
    #[error("Timed out after {0}ms")]
    Timeout(u64),
}

impl From<reqwest::Error> for MarketDataError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            MarketDataError::Parse(err.to_string())
        } else {
            MarketDataError::Network(err.to_string())
        }
    }
}
