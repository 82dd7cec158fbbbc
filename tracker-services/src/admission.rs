//! Signal admission
//!
//! Turns parsed call fields into a `monitoring` signal. Admission is
//! idempotent per contract address: the first call wins and later calls for
//! the same address get the existing record back unchanged.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use tracker_core::{ParsedSignal, Signal};

use crate::keyed_lock::KeyedLocks;
use crate::store::{bounded, SignalStore, StoreError};

/// Outcome of an admission attempt
#[derive(Debug, Clone)]
pub struct Admission {
    /// False when the address was already tracked
    pub created: bool,
    pub signal: Signal,
}

#[derive(Debug, thiserror::Error)]
pub enum AdmissionError {
    #[error("Invalid signal: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct SignalAdmission {
    store: Arc<dyn SignalStore>,
    locks: Arc<KeyedLocks>,
    store_timeout: Duration,
}

impl SignalAdmission {
    pub fn new(store: Arc<dyn SignalStore>, locks: Arc<KeyedLocks>, store_timeout: Duration) -> Self {
        Self {
            store,
            locks,
            store_timeout,
        }
    }

    /// Admit a signal at the current wall-clock time
    pub async fn admit(&self, fields: ParsedSignal) -> Result<Admission, AdmissionError> {
        self.admit_at(fields, Utc::now().timestamp()).await
    }

    /// Admit a signal as of `now` (unix seconds)
    pub async fn admit_at(
        &self,
        fields: ParsedSignal,
        now: i64,
    ) -> Result<Admission, AdmissionError> {
        let address = fields.contract_address.trim().to_string();
        if address.is_empty() {
            return Err(AdmissionError::InvalidInput(
                "contract address is required".to_string(),
            ));
        }

        let _guard = self.locks.lock(&address).await;

        if let Some(existing) = bounded(self.store_timeout, self.store.get(&address)).await? {
            debug!("[Admission] {} already tracked, ignoring", existing.short_address());
            return Ok(Admission {
                created: false,
                signal: existing,
            });
        }

        let signal = Signal::from_parsed(fields, now);
        let created = self.store.insert_if_absent(&signal).await?;

        if !created {
            // Another writer sharing the database got there first
            let existing = bounded(self.store_timeout, self.store.get(&address)).await?;
            return Ok(Admission {
                created: false,
                signal: existing.unwrap_or(signal),
            });
        }

        info!(
            "[Admission] Tracking {} ({}) on {} at mc={}",
            signal.short_address(),
            signal.symbol,
            signal.chain,
            signal.market_cap_at_call
        );

        Ok(Admission {
            created: true,
            signal,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemorySignalStore;
    use tracker_core::{Chain, SignalStatus};

    fn admission() -> (SignalAdmission, Arc<MemorySignalStore>) {
        let store = Arc::new(MemorySignalStore::new());
        let admission = SignalAdmission::new(
            store.clone(),
            Arc::new(KeyedLocks::new()),
            Duration::from_secs(1),
        );
        (admission, store)
    }

    #[tokio::test]
    async fn test_admit_creates_monitoring_signal() {
        let (admission, store) = admission();

        let result = admission
            .admit_at(
                ParsedSignal::new("  AAA  ")
                    .with_symbol("$HAL")
                    .with_market_cap(26_580.0),
                1_000,
            )
            .await
            .unwrap();

        assert!(result.created);
        assert_eq!(result.signal.contract_address, "AAA");
        assert_eq!(result.signal.status, SignalStatus::Monitoring);
        assert_eq!(result.signal.chain, Chain::Sol);
        assert_eq!(result.signal.admitted_at, 1_000);
        assert!(result.signal.milestones.is_empty());
        assert!(result.signal.alerts_fired.is_empty());
        assert!(store.get("AAA").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_duplicate_admission_returns_original() {
        let (admission, store) = admission();
        admission
            .admit_at(ParsedSignal::new("AAA").with_market_cap(100.0), 1_000)
            .await
            .unwrap();

        let again = admission
            .admit_at(ParsedSignal::new("AAA").with_market_cap(999.0), 2_000)
            .await
            .unwrap();

        assert!(!again.created);
        assert_eq!(again.signal.admitted_at, 1_000);
        assert_eq!(again.signal.market_cap_at_call, 100.0);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_missing_or_bad_market_cap_is_zero() {
        let (admission, _) = admission();

        let none = admission.admit_at(ParsedSignal::new("A1"), 1).await.unwrap();
        assert_eq!(none.signal.market_cap_at_call, 0.0);

        let negative = admission
            .admit_at(ParsedSignal::new("A2").with_market_cap(-5.0), 1)
            .await
            .unwrap();
        assert_eq!(negative.signal.market_cap_at_call, 0.0);

        let nan = admission
            .admit_at(ParsedSignal::new("A3").with_market_cap(f64::NAN), 1)
            .await
            .unwrap();
        assert_eq!(nan.signal.market_cap_at_call, 0.0);
    }

    #[tokio::test]
    async fn test_empty_address_rejected() {
        let (admission, store) = admission();
        let result = admission.admit_at(ParsedSignal::new("   "), 1).await;
        assert!(matches!(result, Err(AdmissionError::InvalidInput(_))));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_admissions_create_once() {
        let (admission, store) = admission();
        let admission = Arc::new(admission);

        let handles: Vec<_> = (0..10)
            .map(|i| {
                let admission = Arc::clone(&admission);
                tokio::spawn(async move {
                    admission
                        .admit_at(ParsedSignal::new("AAA").with_market_cap(100.0 + i as f64), i)
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap().created {
                created += 1;
            }
        }

        assert_eq!(created, 1);
        assert_eq!(store.count().await.unwrap(), 1);
    }
}
