//! Signal lifecycle services for the Signal Call Tracker
//!
//! This crate provides the service layer: durable signal storage, admission,
//! the milestone scheduler and its driver loop, statistics, and the chat
//! transport that feeds signals in and carries alerts out.

pub mod admission;
pub mod aggregation;
pub mod config;
pub mod intake;
pub mod keyed_lock;
pub mod notifier;
pub mod parser;
pub mod report;
pub mod scheduler;
pub mod store;
pub mod telegram;
pub mod tracker;

pub use admission::{Admission, AdmissionError, SignalAdmission};
pub use aggregation::{
    AggregationEngine, CallResult, GlobalStats, Performance, RankedSignal, SignalSummary,
    Timeframe, WIN_MULTIPLIER,
};
pub use config::{ChatFilter, ConfigError, TrackerConfig};
pub use intake::{IntakeReply, SignalIntake};
pub use keyed_lock::KeyedLocks;
pub use notifier::{AlertEvent, AlertSink, ChannelAlertSink, LogAlertSink, TelegramAlertSink};
pub use parser::parse_message;
pub use scheduler::{MilestoneScheduler, SchedulerConfig, TickReport};
pub use store::{
    MemorySignalStore, SignalQuery, SignalStore, SqliteSignalStore, StoreError,
};
pub use telegram::{InlineButton, InlineKeyboard, TelegramClient, TelegramError, Update};
pub use tracker::{LastTick, SignalTracker};
