//! Milestone scheduler
//!
//! One tick walks every `monitoring` signal once:
//!
//! 1. fetch the best available snapshot (bounded by a timeout)
//! 2. compute the return against the market cap at call time
//! 3. record every checkpoint whose boundary has passed and is still missing
//! 4. mark every alert threshold reached and not yet fired
//! 5. retire the signal once its observation window is over
//! 6. persist, then deliver the new alerts
//!
//! Alerts are only delivered once the write that records them has succeeded;
//! a failed write leaves the stored record untouched for the next tick.
//!
//! Fetches for different signals run concurrently up to `max_concurrency`.
//! The read-modify-write of a single signal happens under its address lock,
//! against a fresh read of the record.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use tracker_core::{
    returns, AlertThresholds, CheckpointSchedule, MarketSnapshot, MilestoneRecord, PricePoint,
    Returns, Signal, SignalStatus,
};
use tracker_market::MarketDataGateway;

use crate::keyed_lock::KeyedLocks;
use crate::notifier::{AlertEvent, AlertSink};
use crate::store::{bounded, SignalStore};

/// Scheduler tuning
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Floor for one snapshot fetch; a gateway may ask for a longer deadline
    pub fetch_timeout: Duration,
    /// Bound on store reads. Writes bound their own wait.
    pub store_timeout: Duration,
    pub max_concurrency: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(5),
            store_timeout: Duration::from_secs(5),
            max_concurrency: 4,
        }
    }
}

/// What one tick did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    /// Monitoring signals considered
    pub processed: usize,
    /// No usable snapshot, or no longer monitoring
    pub skipped: usize,
    /// Records written
    pub updated: usize,
    /// Signals retired this tick
    pub completed: usize,
    /// Alerts delivered
    pub alerts: usize,
    /// Store reads or writes that failed
    pub failures: usize,
}

impl TickReport {
    fn add(&mut self, outcome: &SignalOutcome) {
        self.processed += 1;
        match outcome {
            SignalOutcome::Skipped => self.skipped += 1,
            SignalOutcome::Failed => self.failures += 1,
            SignalOutcome::Updated { completed, alerts } => {
                self.updated += 1;
                self.alerts += alerts;
                if *completed {
                    self.completed += 1;
                }
            }
        }
    }
}

enum SignalOutcome {
    Skipped,
    Failed,
    Updated { completed: bool, alerts: usize },
}

/// State changes applied to a signal by one observation
#[derive(Debug, Default, PartialEq)]
struct Advance {
    milestones: Vec<String>,
    thresholds: Vec<f64>,
    completed: bool,
}

/// Apply one observation to a signal. Pure; the caller persists.
fn advance(
    signal: &mut Signal,
    snapshot: &MarketSnapshot,
    returns: Returns,
    now: i64,
    schedule: &CheckpointSchedule,
    thresholds: &AlertThresholds,
) -> Advance {
    let mut changes = Advance::default();
    let elapsed = signal.elapsed(now);

    for checkpoint in schedule.iter() {
        if elapsed < checkpoint.after_secs {
            break;
        }
        let record = MilestoneRecord {
            return_multiplier: returns.multiplier,
            value: snapshot.market_cap,
            price: Some(snapshot.price).filter(|p| p.is_finite() && *p > 0.0),
            recorded_at: now,
        };
        if signal.record_milestone(&checkpoint.label, record) {
            changes.milestones.push(checkpoint.label.clone());
        }
    }

    for threshold in thresholds.iter() {
        if returns.multiplier >= threshold && signal.mark_alert(threshold) {
            changes.thresholds.push(threshold);
        }
    }

    if schedule.is_window_over(elapsed) {
        changes.completed = signal.complete();
    }

    changes
}

pub struct MilestoneScheduler {
    store: Arc<dyn SignalStore>,
    gateway: Arc<dyn MarketDataGateway>,
    sink: Arc<dyn AlertSink>,
    locks: Arc<KeyedLocks>,
    schedule: CheckpointSchedule,
    thresholds: AlertThresholds,
    config: SchedulerConfig,
    /// Held for the duration of a tick
    tick_lock: Mutex<()>,
}

impl MilestoneScheduler {
    pub fn new(
        store: Arc<dyn SignalStore>,
        gateway: Arc<dyn MarketDataGateway>,
        sink: Arc<dyn AlertSink>,
        locks: Arc<KeyedLocks>,
    ) -> Self {
        Self {
            store,
            gateway,
            sink,
            locks,
            schedule: CheckpointSchedule::default(),
            thresholds: AlertThresholds::default(),
            config: SchedulerConfig::default(),
            tick_lock: Mutex::new(()),
        }
    }

    pub fn with_schedule(mut self, schedule: CheckpointSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn with_thresholds(mut self, thresholds: AlertThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn schedule(&self) -> &CheckpointSchedule {
        &self.schedule
    }

    /// Bound on one snapshot fetch, long enough for the gateway's own fallback
    fn fetch_deadline(&self) -> Duration {
        self.gateway
            .deadline()
            .map_or(self.config.fetch_timeout, |d| d.max(self.config.fetch_timeout))
    }

    /// Run one pass at the current wall-clock time
    pub async fn tick(&self) -> TickReport {
        self.tick_at(Utc::now().timestamp()).await
    }

    /// Run one pass as of `now` (unix seconds)
    ///
    /// Waits for any tick already in progress rather than overlapping it.
    pub async fn tick_at(&self, now: i64) -> TickReport {
        let _tick = self.tick_lock.lock().await;
        let mut report = TickReport::default();

        let signals = match bounded(
            self.config.store_timeout,
            self.store.list_by_status(SignalStatus::Monitoring),
        )
        .await
        {
            Ok(signals) => signals,
            Err(e) => {
                error!("[Scheduler] Failed to list monitoring signals: {}", e);
                report.failures += 1;
                return report;
            }
        };

        if signals.is_empty() {
            debug!("[Scheduler] No signals to monitor");
            return report;
        }

        let outcomes: Vec<SignalOutcome> = stream::iter(signals)
            .map(|signal| self.process(signal, now))
            .buffer_unordered(self.config.max_concurrency.max(1))
            .collect()
            .await;

        for outcome in &outcomes {
            report.add(outcome);
        }
        self.locks.prune();

        info!(
            "[Scheduler] Tick: {} processed, {} updated, {} skipped, {} completed, {} alerts, {} failures",
            report.processed,
            report.updated,
            report.skipped,
            report.completed,
            report.alerts,
            report.failures
        );

        report
    }

    async fn process(&self, signal: Signal, now: i64) -> SignalOutcome {
        let address = signal.contract_address.as_str();

        let snapshot = match tokio::time::timeout(
            self.fetch_deadline(),
            self.gateway.fetch_snapshot(address),
        )
        .await
        {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                debug!("[Scheduler] No snapshot for {}, skipping", signal.short_address());
                return SignalOutcome::Skipped;
            }
            Err(_) => {
                warn!("[Scheduler] Snapshot fetch timed out for {}", signal.short_address());
                return SignalOutcome::Skipped;
            }
        };

        let Some(returns) = returns::for_snapshot(signal.market_cap_at_call, &snapshot) else {
            debug!(
                "[Scheduler] {} snapshot for {} has no market cap, skipping",
                snapshot.source,
                signal.short_address()
            );
            return SignalOutcome::Skipped;
        };

        let (updated, changes) = {
            let _guard = self.locks.lock(address).await;

            let mut current = match bounded(self.config.store_timeout, self.store.get(address)).await {
                Ok(Some(current)) if current.is_monitoring() => current,
                Ok(_) => return SignalOutcome::Skipped,
                Err(e) => {
                    error!("[Scheduler] Failed to read {}: {}", address, e);
                    return SignalOutcome::Failed;
                }
            };

            let changes = advance(
                &mut current,
                &snapshot,
                returns,
                now,
                &self.schedule,
                &self.thresholds,
            );

            if let Err(e) = self.store.upsert(&current).await {
                error!(
                    "[Scheduler] Failed to persist {}, will retry next tick: {}",
                    address, e
                );
                return SignalOutcome::Failed;
            }

            (current, changes)
        };

        self.record_price(&updated, &snapshot, returns, now).await;

        for label in &changes.milestones {
            debug!(
                "[Scheduler] {} reached {} at {:.2}x",
                updated.short_address(),
                label,
                returns.multiplier
            );
        }
        if changes.completed {
            info!("[Scheduler] {} completed its observation window", updated.short_address());
        }

        for threshold in &changes.thresholds {
            let event = AlertEvent::new(
                &updated,
                *threshold,
                returns.multiplier,
                snapshot.market_cap,
                snapshot.price,
                now,
            );
            self.sink.deliver(&event).await;
        }

        SignalOutcome::Updated {
            completed: changes.completed,
            alerts: changes.thresholds.len(),
        }
    }

    async fn record_price(&self, signal: &Signal, snapshot: &MarketSnapshot, returns: Returns, now: i64) {
        let point = PricePoint {
            price: snapshot.price,
            market_cap: snapshot.market_cap,
            return_multiplier: returns.multiplier,
            recorded_at: now,
        };

        if let Err(e) = self.store.append_price(&signal.contract_address, &point).await {
            warn!("[Scheduler] Failed to record price for {}: {}", signal.short_address(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::ChannelAlertSink;
    use crate::store::{MemorySignalStore, SignalQuery, SqliteSignalStore, StoreError};
    use async_trait::async_trait;
    use parking_lot::Mutex as SyncMutex;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tracker_core::{ParsedSignal, SnapshotSource};
    use tracker_market::{FallbackGateway, MarketDataError, MarketDataSource};

    const T0: i64 = 1_700_000_000;

    /// Gateway answering from a per-address table of market caps
    #[derive(Default)]
    struct TableGateway {
        market_caps: SyncMutex<HashMap<String, f64>>,
        calls: AtomicUsize,
    }

    impl TableGateway {
        fn set(&self, address: &str, market_cap: f64) {
            self.market_caps.lock().insert(address.to_string(), market_cap);
        }
    }

    #[async_trait]
    impl MarketDataGateway for TableGateway {
        async fn fetch_snapshot(&self, address: &str) -> Option<MarketSnapshot> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.market_caps.lock().get(address).map(|mc| {
                MarketSnapshot::with_market_cap(mc / 1e9, *mc, SnapshotSource::DexScreener)
            })
        }
    }

    /// Store whose writes always fail
    struct FailingWrites(MemorySignalStore);

    #[async_trait]
    impl SignalStore for FailingWrites {
        async fn get(&self, address: &str) -> Result<Option<Signal>, StoreError> {
            self.0.get(address).await
        }
        async fn insert_if_absent(&self, signal: &Signal) -> Result<bool, StoreError> {
            self.0.insert_if_absent(signal).await
        }
        async fn upsert(&self, _signal: &Signal) -> Result<(), StoreError> {
            Err(StoreError::Io("disk full".to_string()))
        }
        async fn list_by_status(&self, status: SignalStatus) -> Result<Vec<Signal>, StoreError> {
            self.0.list_by_status(status).await
        }
        async fn list_by_scope(&self, scope: &str) -> Result<Vec<Signal>, StoreError> {
            self.0.list_by_scope(scope).await
        }
        async fn list_all(&self) -> Result<Vec<Signal>, StoreError> {
            self.0.list_all().await
        }
        async fn list_recent(&self, query: SignalQuery) -> Result<Vec<Signal>, StoreError> {
            self.0.list_recent(query).await
        }
        async fn count(&self) -> Result<usize, StoreError> {
            self.0.count().await
        }
        async fn append_price(&self, address: &str, point: &PricePoint) -> Result<(), StoreError> {
            self.0.append_price(address, point).await
        }
        async fn price_history(&self, address: &str) -> Result<Vec<PricePoint>, StoreError> {
            self.0.price_history(address).await
        }
    }

    /// SQLite store whose upserts find the connection busy while `contend` is set
    struct ContendedWrites {
        inner: SqliteSignalStore,
        contend: AtomicBool,
    }

    #[async_trait]
    impl SignalStore for ContendedWrites {
        async fn get(&self, address: &str) -> Result<Option<Signal>, StoreError> {
            self.inner.get(address).await
        }
        async fn insert_if_absent(&self, signal: &Signal) -> Result<bool, StoreError> {
            self.inner.insert_if_absent(signal).await
        }
        async fn upsert(&self, signal: &Signal) -> Result<(), StoreError> {
            if self.contend.load(Ordering::SeqCst) {
                // detached; releases the connection on its own
                let _ = self.inner.hold_connection(Duration::from_millis(300));
            }
            self.inner.upsert(signal).await
        }
        async fn list_by_status(&self, status: SignalStatus) -> Result<Vec<Signal>, StoreError> {
            self.inner.list_by_status(status).await
        }
        async fn list_by_scope(&self, scope: &str) -> Result<Vec<Signal>, StoreError> {
            self.inner.list_by_scope(scope).await
        }
        async fn list_all(&self) -> Result<Vec<Signal>, StoreError> {
            self.inner.list_all().await
        }
        async fn list_recent(&self, query: SignalQuery) -> Result<Vec<Signal>, StoreError> {
            self.inner.list_recent(query).await
        }
        async fn count(&self) -> Result<usize, StoreError> {
            self.inner.count().await
        }
        async fn append_price(&self, address: &str, point: &PricePoint) -> Result<(), StoreError> {
            self.inner.append_price(address, point).await
        }
        async fn price_history(&self, address: &str) -> Result<Vec<PricePoint>, StoreError> {
            self.inner.price_history(address).await
        }
    }

    /// Source that never answers
    struct Hang;

    #[async_trait]
    impl MarketDataSource for Hang {
        fn name(&self) -> &'static str {
            "hang"
        }
        async fn fetch(&self, _address: &str) -> Result<Option<MarketSnapshot>, MarketDataError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(None)
        }
    }

    /// Source that answers after a short delay
    struct SlowButGood(f64);

    #[async_trait]
    impl MarketDataSource for SlowButGood {
        fn name(&self) -> &'static str {
            "slow"
        }
        async fn fetch(&self, _address: &str) -> Result<Option<MarketSnapshot>, MarketDataError> {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok(Some(snapshot(self.0)))
        }
    }

    fn signal(address: &str, market_cap: f64) -> Signal {
        Signal::from_parsed(ParsedSignal::new(address).with_market_cap(market_cap), T0)
    }

    fn snapshot(market_cap: f64) -> MarketSnapshot {
        MarketSnapshot::with_market_cap(0.001, market_cap, SnapshotSource::DexScreener)
    }

    #[test]
    fn test_advance_records_passed_checkpoints_once() {
        let schedule = CheckpointSchedule::default();
        let thresholds = AlertThresholds::default();
        let mut s = signal("A", 10_000.0);

        // first observation already past 5min and 15min
        let r = returns::compute(Some(10_000.0), 15_000.0);
        let changes = advance(&mut s, &snapshot(15_000.0), r, T0 + 901, &schedule, &thresholds);
        assert_eq!(changes.milestones, vec!["5min", "15min"]);
        assert!(changes.thresholds.is_empty());
        assert!(!changes.completed);

        // later observation does not rewrite them
        let r = returns::compute(Some(10_000.0), 30_000.0);
        let changes = advance(&mut s, &snapshot(30_000.0), r, T0 + 1000, &schedule, &thresholds);
        assert!(changes.milestones.is_empty());
        assert_eq!(changes.thresholds, vec![2.0]);
        assert_eq!(s.milestone("5min").unwrap().return_multiplier, 1.5);
        assert_eq!(s.milestone("5min").unwrap().recorded_at, T0 + 901);
    }

    #[test]
    fn test_advance_fires_every_reached_threshold_ascending() {
        let mut s = signal("A", 1_000.0);
        let r = returns::compute(Some(1_000.0), 12_000.0);
        let changes = advance(
            &mut s,
            &snapshot(12_000.0),
            r,
            T0 + 10,
            &CheckpointSchedule::default(),
            &AlertThresholds::default(),
        );
        assert_eq!(changes.thresholds, vec![2.0, 5.0, 10.0]);
        assert_eq!(s.alerts_fired, vec![2.0, 5.0, 10.0]);
    }

    #[test]
    fn test_advance_completes_after_final_boundary() {
        let schedule = CheckpointSchedule::default();
        let thresholds = AlertThresholds::default();
        let r = returns::compute(Some(10_000.0), 5_000.0);

        let mut at_boundary = signal("A", 10_000.0);
        let changes = advance(&mut at_boundary, &snapshot(5_000.0), r, T0 + 86_400, &schedule, &thresholds);
        assert!(changes.milestones.contains(&"24h".to_string()));
        assert!(!changes.completed);

        let mut past = signal("B", 10_000.0);
        let changes = advance(&mut past, &snapshot(5_000.0), r, T0 + 86_401, &schedule, &thresholds);
        assert_eq!(changes.milestones.len(), 5);
        assert!(changes.completed);
        assert_eq!(past.status, SignalStatus::Completed);
        assert_eq!(past.milestone("24h").unwrap().return_multiplier, 0.5);
    }

    #[test]
    fn test_zero_entry_records_zero_multiplier() {
        let mut s = signal("A", 0.0);
        let r = returns::compute(Some(0.0), 50_000.0);
        let changes = advance(
            &mut s,
            &snapshot(50_000.0),
            r,
            T0 + 400,
            &CheckpointSchedule::default(),
            &AlertThresholds::default(),
        );
        assert_eq!(changes.milestones, vec!["5min"]);
        assert_eq!(s.milestone("5min").unwrap().return_multiplier, 0.0);
        assert!(changes.thresholds.is_empty());
    }

    fn scheduler(
        store: Arc<dyn SignalStore>,
        gateway: Arc<TableGateway>,
    ) -> (MilestoneScheduler, tokio::sync::mpsc::UnboundedReceiver<AlertEvent>) {
        let (sink, rx) = ChannelAlertSink::channel();
        let scheduler =
            MilestoneScheduler::new(store, gateway, Arc::new(sink), Arc::new(KeyedLocks::new()));
        (scheduler, rx)
    }

    #[tokio::test]
    async fn test_unavailable_snapshot_leaves_signal_untouched() {
        let store = Arc::new(MemorySignalStore::new());
        store.insert_if_absent(&signal("A", 10_000.0)).await.unwrap();
        let gateway = Arc::new(TableGateway::default());
        let (scheduler, mut rx) = scheduler(store.clone(), gateway.clone());

        let report = scheduler.tick_at(T0 + 400).await;

        assert_eq!(report.processed, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
        let stored = store.get("A").await.unwrap().unwrap();
        assert!(stored.milestones.is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_failed_write_emits_no_alert() {
        let store = Arc::new(FailingWrites(MemorySignalStore::new()));
        store.insert_if_absent(&signal("A", 10_000.0)).await.unwrap();
        let gateway = Arc::new(TableGateway::default());
        gateway.set("A", 50_000.0);
        let (scheduler, mut rx) = scheduler(store.clone(), gateway);

        let report = scheduler.tick_at(T0 + 400).await;

        assert_eq!(report.failures, 1);
        assert_eq!(report.alerts, 0);
        assert!(rx.try_recv().is_err());
        // nothing persisted, so the next tick tries again
        assert!(store.get("A").await.unwrap().unwrap().alerts_fired.is_empty());
    }

    #[tokio::test]
    async fn test_tick_fans_out_over_all_signals() {
        let store = Arc::new(MemorySignalStore::new());
        let gateway = Arc::new(TableGateway::default());
        for i in 0..10 {
            let address = format!("S{}", i);
            store.insert_if_absent(&signal(&address, 1_000.0)).await.unwrap();
            gateway.set(&address, 2_500.0);
        }
        let (scheduler, mut rx) = scheduler(store.clone(), gateway.clone());

        let report = scheduler.tick_at(T0 + 60).await;

        assert_eq!(report.processed, 10);
        assert_eq!(report.updated, 10);
        assert_eq!(report.alerts, 10);
        let mut received = 0;
        while rx.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, 10);
        assert_eq!(store.price_history("S3").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_price_only_snapshot_is_skipped() {
        struct PriceOnly;

        #[async_trait]
        impl MarketDataGateway for PriceOnly {
            async fn fetch_snapshot(&self, _address: &str) -> Option<MarketSnapshot> {
                Some(MarketSnapshot::price_only(1.0, SnapshotSource::Jupiter))
            }
        }

        let store = Arc::new(MemorySignalStore::new());
        store.insert_if_absent(&signal("A", 10_000.0)).await.unwrap();
        let (sink, _rx) = ChannelAlertSink::channel();
        let scheduler = MilestoneScheduler::new(
            store.clone(),
            Arc::new(PriceOnly),
            Arc::new(sink),
            Arc::new(KeyedLocks::new()),
        );

        let report = scheduler.tick_at(T0 + 400).await;
        assert_eq!(report.skipped, 1);
        assert!(store.get("A").await.unwrap().unwrap().milestones.is_empty());
    }

    #[tokio::test]
    async fn test_write_timeout_leaves_alert_for_next_tick() {
        let inner = SqliteSignalStore::new_in_memory()
            .unwrap()
            .with_acquire_timeout(Duration::from_millis(100));
        let store = Arc::new(ContendedWrites {
            inner,
            contend: AtomicBool::new(true),
        });
        store.insert_if_absent(&signal("A", 10_000.0)).await.unwrap();
        let gateway = Arc::new(TableGateway::default());
        gateway.set("A", 20_000.0);
        let (scheduler, mut rx) = scheduler(store.clone(), gateway);

        let report = scheduler.tick_at(T0 + 400).await;
        assert_eq!(report.failures, 1);
        assert_eq!(report.alerts, 0);
        assert!(rx.try_recv().is_err());

        // the abandoned write must not land once the connection frees up
        tokio::time::sleep(Duration::from_millis(400)).await;
        let stored = store.get("A").await.unwrap().unwrap();
        assert!(stored.alerts_fired.is_empty());
        assert!(stored.milestones.is_empty());

        store.contend.store(false, Ordering::SeqCst);
        let report = scheduler.tick_at(T0 + 460).await;
        assert_eq!(report.updated, 1);
        assert_eq!(report.alerts, 1);

        let event = rx.try_recv().unwrap();
        assert_eq!(event.threshold, 2.0);
        assert!(rx.try_recv().is_err());
        assert_eq!(store.get("A").await.unwrap().unwrap().alerts_fired, vec![2.0]);
    }

    #[tokio::test]
    async fn test_hanging_source_falls_back_within_tick() {
        let store = Arc::new(MemorySignalStore::new());
        store.insert_if_absent(&signal("A", 10_000.0)).await.unwrap();
        let gateway = FallbackGateway::new(
            vec![Arc::new(Hang) as Arc<dyn MarketDataSource>, Arc::new(SlowButGood(30_000.0))],
            Duration::from_millis(100),
        );
        let (sink, _rx) = ChannelAlertSink::channel();
        let scheduler = MilestoneScheduler::new(
            store.clone(),
            Arc::new(gateway),
            Arc::new(sink),
            Arc::new(KeyedLocks::new()),
        )
        .with_config(SchedulerConfig {
            fetch_timeout: Duration::from_millis(100),
            ..SchedulerConfig::default()
        });

        let report = scheduler.tick_at(T0 + 400).await;

        assert_eq!(report.updated, 1);
        assert_eq!(report.skipped, 0);
        let stored = store.get("A").await.unwrap().unwrap();
        assert_eq!(stored.milestone("5min").unwrap().return_multiplier, 3.0);
    }

    #[tokio::test]
    async fn test_degenerate_call_market_cap_does_not_poison_others() {
        let store = Arc::new(SqliteSignalStore::new_in_memory().unwrap());
        store.insert_if_absent(&signal("GOOD", 10_000.0)).await.unwrap();
        // bypasses admission clamping, as a row written by an older build could
        let mut bad = signal("BAD", 10_000.0);
        bad.market_cap_at_call = 1e-321;
        store.insert_if_absent(&bad).await.unwrap();

        let gateway = Arc::new(TableGateway::default());
        gateway.set("GOOD", 20_000.0);
        gateway.set("BAD", 10_000.0);
        let (scheduler, mut rx) = scheduler(store.clone(), gateway.clone());

        let report = scheduler.tick_at(T0 + 400).await;
        assert_eq!(report.updated, 2);
        assert_eq!(report.failures, 0);
        assert_eq!(report.alerts, 1);
        assert_eq!(rx.try_recv().unwrap().contract_address, "GOOD");

        let bad = store.get("BAD").await.unwrap().unwrap();
        assert_eq!(bad.milestone("5min").unwrap().return_multiplier, 0.0);
        assert!(bad.alerts_fired.is_empty());

        // both stay listable, so the next tick keeps advancing GOOD
        gateway.set("GOOD", 60_000.0);
        let report = scheduler.tick_at(T0 + 1_000).await;
        assert_eq!(report.processed, 2);
        assert_eq!(report.failures, 0);
        let good = store.get("GOOD").await.unwrap().unwrap();
        assert_eq!(good.milestone("15min").unwrap().return_multiplier, 6.0);
        assert_eq!(good.alerts_fired, vec![2.0, 5.0]);
    }
}
