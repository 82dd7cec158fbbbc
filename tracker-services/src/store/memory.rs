//! In-memory signal store for tests and ephemeral runs

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracker_core::{PricePoint, Signal, SignalStatus};

use super::{SignalQuery, SignalStore, StoreError};

#[derive(Default)]
struct Inner {
    /// address -> (insertion sequence, signal)
    signals: HashMap<String, (u64, Signal)>,
    history: HashMap<String, Vec<PricePoint>>,
    next_seq: u64,
}

impl Inner {
    /// Signals matching `filter`, oldest admission first
    fn sorted<F>(&self, filter: F) -> Vec<Signal>
    where
        F: Fn(&Signal) -> bool,
    {
        let mut rows: Vec<&(u64, Signal)> =
            self.signals.values().filter(|(_, s)| filter(s)).collect();
        rows.sort_by_key(|(seq, s)| (s.admitted_at, *seq));
        rows.into_iter().map(|(_, s)| s.clone()).collect()
    }
}

/// Signal store kept entirely in process memory
#[derive(Default)]
pub struct MemorySignalStore {
    inner: RwLock<Inner>,
}

impl MemorySignalStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SignalStore for MemorySignalStore {
    async fn get(&self, address: &str) -> Result<Option<Signal>, StoreError> {
        Ok(self.inner.read().signals.get(address).map(|(_, s)| s.clone()))
    }

    async fn insert_if_absent(&self, signal: &Signal) -> Result<bool, StoreError> {
        let mut inner = self.inner.write();
        if inner.signals.contains_key(&signal.contract_address) {
            return Ok(false);
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner
            .signals
            .insert(signal.contract_address.clone(), (seq, signal.clone()));
        Ok(true)
    }

    async fn upsert(&self, signal: &Signal) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        if let Some((_, existing)) = inner.signals.get_mut(&signal.contract_address) {
            existing.status = signal.status;
            existing.milestones = signal.milestones.clone();
            existing.alerts_fired = signal.alerts_fired.clone();
            return Ok(());
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner
            .signals
            .insert(signal.contract_address.clone(), (seq, signal.clone()));
        Ok(())
    }

    async fn list_by_status(&self, status: SignalStatus) -> Result<Vec<Signal>, StoreError> {
        Ok(self.inner.read().sorted(|s| s.status == status))
    }

    async fn list_by_scope(&self, scope: &str) -> Result<Vec<Signal>, StoreError> {
        Ok(self
            .inner
            .read()
            .sorted(|s| s.scope.as_deref() == Some(scope)))
    }

    async fn list_all(&self) -> Result<Vec<Signal>, StoreError> {
        Ok(self.inner.read().sorted(|_| true))
    }

    async fn list_recent(&self, query: SignalQuery) -> Result<Vec<Signal>, StoreError> {
        let mut signals = self
            .inner
            .read()
            .sorted(|s| query.status.map_or(true, |status| s.status == status));
        signals.reverse();
        Ok(signals
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .collect())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.inner.read().signals.len())
    }

    async fn append_price(&self, address: &str, point: &PricePoint) -> Result<(), StoreError> {
        self.inner
            .write()
            .history
            .entry(address.to_string())
            .or_default()
            .push(*point);
        Ok(())
    }

    async fn price_history(&self, address: &str) -> Result<Vec<PricePoint>, StoreError> {
        let mut points = self
            .inner
            .read()
            .history
            .get(address)
            .cloned()
            .unwrap_or_default();
        points.sort_by_key(|p| p.recorded_at);
        Ok(points)
    }
}
