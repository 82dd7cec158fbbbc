//! Alert delivery
//!
//! The scheduler hands every threshold crossing to an [`AlertSink`] after the
//! signal carrying it has been persisted. Sinks own their failure handling;
//! a failed delivery is logged and never retried, since the threshold is
//! already recorded as fired.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracker_core::{Chain, Signal};

use crate::report;
use crate::telegram::TelegramClient;

/// One threshold crossing of one signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub contract_address: String,
    pub symbol: String,
    pub chain: Chain,
    /// Chat the signal was called in
    pub scope: Option<String>,
    pub threshold: f64,
    pub current_multiplier: f64,
    /// Market cap the multiplier was computed from
    pub current_value: f64,
    pub current_price: f64,
    pub triggered_at: i64,
}

impl AlertEvent {
    pub fn new(
        signal: &Signal,
        threshold: f64,
        current_multiplier: f64,
        current_value: f64,
        current_price: f64,
        triggered_at: i64,
    ) -> Self {
        Self {
            contract_address: signal.contract_address.clone(),
            symbol: signal.symbol.clone(),
            chain: signal.chain,
            scope: signal.scope.clone(),
            threshold,
            current_multiplier,
            current_value,
            current_price,
            triggered_at,
        }
    }
}

#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn deliver(&self, event: &AlertEvent);
}

/// Writes alerts to the log
#[derive(Debug, Default)]
pub struct LogAlertSink;

#[async_trait]
impl AlertSink for LogAlertSink {
    async fn deliver(&self, event: &AlertEvent) {
        info!(
            "[Alert] {} ({}) hit {}x, now {:.2}x",
            event.symbol, event.contract_address, event.threshold, event.current_multiplier
        );
    }
}

/// Forwards alerts into an mpsc channel
pub struct ChannelAlertSink {
    tx: mpsc::UnboundedSender<AlertEvent>,
}

impl ChannelAlertSink {
    pub fn new(tx: mpsc::UnboundedSender<AlertEvent>) -> Self {
        Self { tx }
    }

    /// Sink plus the receiving end
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<AlertEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl AlertSink for ChannelAlertSink {
    async fn deliver(&self, event: &AlertEvent) {
        if self.tx.send(event.clone()).is_err() {
            debug!("[Alert] channel closed, dropping alert for {}", event.contract_address);
        }
    }
}

/// Posts alerts to the chat the signal was called in
pub struct TelegramAlertSink {
    client: Arc<TelegramClient>,
}

impl TelegramAlertSink {
    pub fn new(client: Arc<TelegramClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AlertSink for TelegramAlertSink {
    async fn deliver(&self, event: &AlertEvent) {
        let Some(chat_id) = event.scope.as_deref() else {
            debug!("[Alert] {} has no chat, not sending", event.contract_address);
            return;
        };

        let text = report::alert_message(event);
        let buttons = report::signal_buttons(&event.contract_address, event.chain);

        if let Err(e) = self.client.send_message(chat_id, &text, Some(&buttons)).await {
            warn!(
                "[Alert] Failed to notify chat {} about {}: {}",
                chat_id, event.contract_address, e
            );
        }
    }
}
