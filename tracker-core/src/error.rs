//! Error types for the tracker

use thiserror::Error;

/// Tracker-wide error type
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TrackerError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        TrackerError::InvalidInput(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        TrackerError::Parse(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        TrackerError::NotFound(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        TrackerError::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        TrackerError::Internal(msg.into())
    }
}

/// Result type alias for tracker operations
pub type TrackerResult<T> = Result<T, TrackerError>;
