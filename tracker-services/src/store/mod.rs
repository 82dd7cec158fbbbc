//! Durable signal storage
//!
//! [`SignalStore`] is the only way the admission path, the scheduler and the
//! statistics layer touch persisted signals. Listing methods return signals
//! oldest admission first.

mod memory;
mod sqlite;

pub use memory::MemorySignalStore;
pub use sqlite::SqliteSignalStore;

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tracker_core::{PricePoint, Signal, SignalStatus};

/// Paging and filtering for [`SignalStore::list_recent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalQuery {
    pub limit: usize,
    pub offset: usize,
    pub status: Option<SignalStatus>,
}

impl SignalQuery {
    pub fn new(limit: usize, offset: usize) -> Self {
        Self {
            limit,
            offset,
            status: None,
        }
    }

    pub fn with_status(mut self, status: SignalStatus) -> Self {
        self.status = Some(status);
        self
    }
}

impl Default for SignalQuery {
    fn default() -> Self {
        Self::new(50, 0)
    }
}

#[async_trait]
pub trait SignalStore: Send + Sync {
    async fn get(&self, address: &str) -> Result<Option<Signal>, StoreError>;

    /// Insert unless a signal with the same address exists.
    /// Returns whether the row was created.
    ///
    /// Writes bound their own waiting: an `Err` means nothing was written.
    /// Callers must not wrap writes in [`bounded`], since dropping a write
    /// mid-flight leaves its outcome unknown.
    async fn insert_if_absent(&self, signal: &Signal) -> Result<bool, StoreError>;

    /// Write the mutable state of a signal (status, milestones, alerts).
    /// Identity fields of an existing row are left untouched.
    async fn upsert(&self, signal: &Signal) -> Result<(), StoreError>;

    async fn list_by_status(&self, status: SignalStatus) -> Result<Vec<Signal>, StoreError>;

    async fn list_by_scope(&self, scope: &str) -> Result<Vec<Signal>, StoreError>;

    async fn list_all(&self) -> Result<Vec<Signal>, StoreError>;

    /// Newest admission first, paged
    async fn list_recent(&self, query: SignalQuery) -> Result<Vec<Signal>, StoreError>;

    async fn count(&self) -> Result<usize, StoreError>;

    async fn append_price(&self, address: &str, point: &PricePoint) -> Result<(), StoreError>;

    /// Price points of one signal, oldest first
    async fn price_history(&self, address: &str) -> Result<Vec<PricePoint>, StoreError>;
}

/// Run a store read with an upper bound on its duration
pub async fn bounded<T, F>(timeout: Duration, operation: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(timeout, operation).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(timeout.as_millis() as u64)),
    }
}

/// Errors from signal storage
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Store operation timed out after {0}ms")]
    Timeout(u64),

    #[error("Store task failed: {0}")]
    Task(String),
}
