//! Background driver for the milestone scheduler
//!
//! Runs [`MilestoneScheduler::tick`] on a fixed interval until stopped. A
//! stop request lets the in-flight tick finish before the loop exits.

use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

use crate::scheduler::{MilestoneScheduler, TickReport};

/// Report of the most recent tick
#[derive(Debug, Clone, Copy, Serialize)]
pub struct LastTick {
    /// Unix seconds when the tick finished
    pub finished_at: i64,
    pub report: TickReport,
}

pub struct SignalTracker {
    scheduler: Arc<MilestoneScheduler>,
    tick_interval: Duration,
    shutdown: watch::Sender<bool>,
    running: AtomicBool,
    ticks: AtomicU64,
    last_tick: RwLock<Option<LastTick>>,
}

impl SignalTracker {
    pub fn new(scheduler: Arc<MilestoneScheduler>, tick_interval: Duration) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            scheduler,
            tick_interval,
            shutdown,
            running: AtomicBool::new(false),
            ticks: AtomicU64::new(0),
            last_tick: RwLock::new(None),
        }
    }

    /// Spawn the tick loop. The first tick runs immediately.
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    /// Ask the loop to exit after the current tick
    pub fn stop(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn tick_count(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }

    pub fn last_tick(&self) -> Option<LastTick> {
        *self.last_tick.read()
    }

    async fn run(&self) {
        let mut shutdown = self.shutdown.subscribe();
        if *shutdown.borrow() {
            return;
        }

        self.running.store(true, Ordering::SeqCst);
        info!(
            "Starting signal tracker with {}s tick interval",
            self.tick_interval.as_secs()
        );

        let mut ticker = interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => break,
            }

            let report = self.scheduler.tick().await;
            self.ticks.fetch_add(1, Ordering::SeqCst);
            *self.last_tick.write() = Some(LastTick {
                finished_at: chrono::Utc::now().timestamp(),
                report,
            });

            if *shutdown.borrow() {
                break;
            }
        }

        self.running.store(false, Ordering::SeqCst);
        info!("Signal tracker stopped after {} ticks", self.tick_count());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyed_lock::KeyedLocks;
    use crate::notifier::LogAlertSink;
    use crate::store::MemorySignalStore;
    use async_trait::async_trait;
    use crate::store::SignalStore;
    use tokio::sync::{Notify, Semaphore};
    use tracker_core::{MarketSnapshot, ParsedSignal, Signal, SignalStatus, SnapshotSource};
    use tracker_market::MarketDataGateway;

    struct NoData;

    #[async_trait]
    impl MarketDataGateway for NoData {
        async fn fetch_snapshot(&self, _address: &str) -> Option<MarketSnapshot> {
            None
        }
    }

    /// Gateway that parks every fetch until the test releases it
    struct GatedGateway {
        entered: Notify,
        release: Semaphore,
    }

    impl GatedGateway {
        fn new() -> Self {
            Self {
                entered: Notify::new(),
                release: Semaphore::new(0),
            }
        }
    }

    #[async_trait]
    impl MarketDataGateway for GatedGateway {
        async fn fetch_snapshot(&self, _address: &str) -> Option<MarketSnapshot> {
            self.entered.notify_one();
            let _permit = self.release.acquire().await.ok()?;
            Some(MarketSnapshot::with_market_cap(
                0.00002,
                20_000.0,
                SnapshotSource::DexScreener,
            ))
        }
    }

    fn tracker(every: Duration) -> Arc<SignalTracker> {
        let scheduler = MilestoneScheduler::new(
            Arc::new(MemorySignalStore::new()),
            Arc::new(NoData),
            Arc::new(LogAlertSink),
            Arc::new(KeyedLocks::new()),
        );
        Arc::new(SignalTracker::new(Arc::new(scheduler), every))
    }

    #[tokio::test]
    async fn test_first_tick_immediate_and_stop_exits() {
        let tracker = tracker(Duration::from_secs(3600));
        let handle = Arc::clone(&tracker).start();

        for _ in 0..100 {
            if tracker.tick_count() > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(tracker.tick_count(), 1);
        assert!(tracker.is_running());
        assert!(tracker.last_tick().is_some());

        tracker.stop();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(!tracker.is_running());
    }

    #[tokio::test]
    async fn test_ticks_repeat_on_interval() {
        let tracker = tracker(Duration::from_millis(10));
        let handle = Arc::clone(&tracker).start();

        tokio::time::sleep(Duration::from_millis(80)).await;
        tracker.stop();
        handle.await.unwrap();

        assert!(tracker.tick_count() >= 3);
    }

    #[tokio::test]
    async fn test_stop_before_start_never_ticks() {
        let tracker = tracker(Duration::from_millis(10));
        tracker.stop();
        Arc::clone(&tracker).start().await.unwrap();
        assert_eq!(tracker.tick_count(), 0);
    }

    #[tokio::test]
    async fn test_stop_mid_tick_lets_the_tick_finish() {
        let store = Arc::new(MemorySignalStore::new());
        let admitted_at = chrono::Utc::now().timestamp() - 400;
        let signal = Signal::from_parsed(
            ParsedSignal::new("GATED").with_market_cap(10_000.0),
            admitted_at,
        );
        store.insert_if_absent(&signal).await.unwrap();

        let gateway = Arc::new(GatedGateway::new());
        let scheduler = MilestoneScheduler::new(
            store.clone(),
            gateway.clone(),
            Arc::new(LogAlertSink),
            Arc::new(KeyedLocks::new()),
        );
        let tracker = Arc::new(SignalTracker::new(
            Arc::new(scheduler),
            Duration::from_secs(3600),
        ));
        let handle = Arc::clone(&tracker).start();

        tokio::time::timeout(Duration::from_secs(1), gateway.entered.notified())
            .await
            .unwrap();
        tracker.stop();

        // the fetch is still parked, so the loop cannot have exited
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished());
        assert!(tracker.is_running());
        assert_eq!(tracker.tick_count(), 0);

        gateway.release.add_permits(1);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();

        assert!(!tracker.is_running());
        assert_eq!(tracker.tick_count(), 1);
        assert_eq!(tracker.last_tick().unwrap().report.updated, 1);

        let stored = store.get("GATED").await.unwrap().unwrap();
        assert_eq!(stored.status, SignalStatus::Monitoring);
        assert_eq!(stored.milestone("5min").unwrap().return_multiplier, 2.0);
        assert_eq!(stored.alerts_fired, vec![2.0]);
    }
}
