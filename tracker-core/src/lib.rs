//! Core types for the Signal Call Tracker
//!
//! This crate defines the shared data structures used across the tracker,
//! including signal records, milestone checkpoints, market snapshots and the
//! return calculation every component agrees on.

pub mod chain;
pub mod error;
pub mod returns;
pub mod schedule;
pub mod signal;
pub mod snapshot;

pub use chain::Chain;
pub use error::{TrackerError, TrackerResult};
pub use returns::Returns;
pub use schedule::{AlertThresholds, Checkpoint, CheckpointSchedule};
pub use signal::{MilestoneRecord, ParsedSignal, PricePoint, Signal, SignalStatus};
pub use snapshot::{MarketSnapshot, PriceChange, SnapshotSource};
