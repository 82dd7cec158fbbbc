//! Chat intake
//!
//! Decides what an incoming chat message is: a bot command, a call to admit,
//! or noise. Produces the reply text; sending it is up to the transport.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};
use tracker_core::{Chain, MarketSnapshot, Signal};
use tracker_market::{MarketDataGateway, RugCheckClient, SecurityReport};

use crate::admission::SignalAdmission;
use crate::aggregation::{AggregationEngine, Timeframe};
use crate::config::ChatFilter;
use crate::parser::parse_message;
use crate::report;
use crate::telegram::InlineKeyboard;

/// Entries in a `/hot` ranking
const HOT_SIGNALS_LIMIT: usize = 10;

/// Message to send back to the originating chat
#[derive(Debug, Clone, PartialEq)]
pub struct IntakeReply {
    pub text: String,
    pub buttons: Option<InlineKeyboard>,
}

impl IntakeReply {
    fn text(text: String) -> Self {
        Self {
            text,
            buttons: None,
        }
    }
}

#[derive(Debug, PartialEq)]
enum Command {
    Help,
    Stats(Timeframe),
    Hot,
}

/// `/stats@MyBot 7d` -> `Stats(7d)`. Unknown commands are ignored.
fn parse_command(text: &str) -> Option<Command> {
    let mut parts = text.split_whitespace();
    let head = parts.next()?.strip_prefix('/')?;
    let name = head.split('@').next().unwrap_or(head).to_lowercase();

    match name.as_str() {
        "start" | "help" => Some(Command::Help),
        "stats" => {
            let timeframe = parts
                .next()
                .and_then(|arg| arg.parse().ok())
                .unwrap_or_default();
            Some(Command::Stats(timeframe))
        }
        "hot" => Some(Command::Hot),
        _ => None,
    }
}

pub struct SignalIntake {
    admission: Arc<SignalAdmission>,
    aggregation: Arc<AggregationEngine>,
    gateway: Arc<dyn MarketDataGateway>,
    rugcheck: Option<Arc<RugCheckClient>>,
    allowed_chats: ChatFilter,
    fetch_timeout: Duration,
}

impl SignalIntake {
    pub fn new(
        admission: Arc<SignalAdmission>,
        aggregation: Arc<AggregationEngine>,
        gateway: Arc<dyn MarketDataGateway>,
    ) -> Self {
        Self {
            admission,
            aggregation,
            gateway,
            rugcheck: None,
            allowed_chats: ChatFilter::Any,
            fetch_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_rugcheck(mut self, client: Arc<RugCheckClient>) -> Self {
        self.rugcheck = Some(client);
        self
    }

    pub fn with_allowed_chats(mut self, allowed_chats: ChatFilter) -> Self {
        self.allowed_chats = allowed_chats;
        self
    }

    pub fn with_fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    /// Handle one text message from `chat_id`
    pub async fn handle_text(
        &self,
        chat_id: &str,
        is_private: bool,
        text: &str,
    ) -> Option<IntakeReply> {
        let text = text.trim();

        if let Some(command) = parse_command(text) {
            if command != Command::Help && !self.allowed_chats.allows(chat_id) {
                debug!("[Intake] Ignoring command from chat {}", chat_id);
                return None;
            }
            return Some(self.run_command(chat_id, command).await);
        }

        let mut fields = parse_message(text)?;
        if !self.allowed_chats.allows(chat_id) {
            debug!("[Intake] Ignoring call from chat {}", chat_id);
            return None;
        }
        fields.scope = Some(chat_id.to_string());

        let admission = match self.admission.admit(fields).await {
            Ok(admission) => admission,
            Err(e) => {
                warn!("[Intake] Admission failed for chat {}: {}", chat_id, e);
                return None;
            }
        };

        if !admission.created {
            return is_private.then(|| IntakeReply::text(report::duplicate_message(&admission.signal)));
        }

        Some(self.admission_reply(&admission.signal).await)
    }

    async fn admission_reply(&self, signal: &Signal) -> IntakeReply {
        let (snapshot, security) = tokio::join!(self.snapshot(signal), self.security(signal));

        IntakeReply {
            text: report::admission_message(signal, snapshot.as_ref(), security.as_ref()),
            buttons: Some(report::signal_buttons(&signal.contract_address, signal.chain)),
        }
    }

    async fn snapshot(&self, signal: &Signal) -> Option<MarketSnapshot> {
        let deadline = self
            .gateway
            .deadline()
            .map_or(self.fetch_timeout, |d| d.max(self.fetch_timeout));
        tokio::time::timeout(deadline, self.gateway.fetch_snapshot(&signal.contract_address))
        .await
        .ok()
        .flatten()
    }

    /// RugCheck only covers Solana tokens
    async fn security(&self, signal: &Signal) -> Option<SecurityReport> {
        let client = self.rugcheck.as_ref()?;
        if signal.chain != Chain::Sol {
            return None;
        }

        match tokio::time::timeout(self.fetch_timeout, client.fetch_report(&signal.contract_address))
            .await
        {
            Ok(Ok(report)) => Some(report),
            Ok(Err(e)) => {
                warn!("[Intake] Security check failed for {}: {}", signal.short_address(), e);
                None
            }
            Err(_) => {
                warn!("[Intake] Security check timed out for {}", signal.short_address());
                None
            }
        }
    }

    async fn run_command(&self, chat_id: &str, command: Command) -> IntakeReply {
        match command {
            Command::Help => IntakeReply::text(report::help_message()),
            Command::Stats(timeframe) => match self.aggregation.summarize(chat_id, timeframe).await {
                Ok(summary) => IntakeReply::text(report::summary_message(
                    &summary,
                    &self.aggregation.schedule().final_checkpoint().label,
                )),
                Err(e) => {
                    error!("[Intake] Failed to summarize chat {}: {}", chat_id, e);
                    IntakeReply::text("⚠️ Stats are unavailable right now".to_string())
                }
            },
            Command::Hot => match self.aggregation.hot_signals(chat_id, HOT_SIGNALS_LIMIT).await {
                Ok(ranked) => IntakeReply::text(report::hot_signals_message(&ranked)),
                Err(e) => {
                    error!("[Intake] Failed to rank chat {}: {}", chat_id, e);
                    IntakeReply::text("⚠️ Stats are unavailable right now".to_string())
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyed_lock::KeyedLocks;
    use crate::store::{MemorySignalStore, SignalStore};
    use async_trait::async_trait;
    use tracker_core::{CheckpointSchedule, SnapshotSource};

    const CALL: &str = "#SOLANA\n代币：Test\n代币符号：$TST\n市值：10K\n合约：AAA111";

    struct FixedGateway;

    #[async_trait]
    impl MarketDataGateway for FixedGateway {
        async fn fetch_snapshot(&self, _address: &str) -> Option<MarketSnapshot> {
            Some(MarketSnapshot::with_market_cap(
                0.00002,
                20_000.0,
                SnapshotSource::DexScreener,
            ))
        }
    }

    fn intake(filter: ChatFilter) -> (SignalIntake, Arc<MemorySignalStore>) {
        let store = Arc::new(MemorySignalStore::new());
        let admission = Arc::new(SignalAdmission::new(
            store.clone(),
            Arc::new(KeyedLocks::new()),
            Duration::from_secs(1),
        ));
        let aggregation = Arc::new(AggregationEngine::new(
            store.clone(),
            CheckpointSchedule::default(),
        ));
        let intake = SignalIntake::new(admission, aggregation, Arc::new(FixedGateway))
            .with_allowed_chats(filter);
        (intake, store)
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("/stats"), Some(Command::Stats(Timeframe::TwentyFourHours)));
        assert_eq!(parse_command("/stats@CallBot 7d"), Some(Command::Stats(Timeframe::SevenDays)));
        assert_eq!(parse_command("/stats nonsense"), Some(Command::Stats(Timeframe::TwentyFourHours)));
        assert_eq!(parse_command("/HOT"), Some(Command::Hot));
        assert_eq!(parse_command("/start"), Some(Command::Help));
        assert_eq!(parse_command("/unknown"), None);
        assert_eq!(parse_command("stats"), None);
    }

    #[tokio::test]
    async fn test_call_is_admitted_with_reply() {
        let (intake, store) = intake(ChatFilter::Any);

        let reply = intake.handle_text("-100", false, CALL).await.unwrap();

        assert!(reply.text.contains("<code>AAA111</code>"));
        assert!(reply.text.contains("2.00x"));
        assert!(reply.buttons.is_some());
        let stored = store.get("AAA111").await.unwrap().unwrap();
        assert_eq!(stored.scope.as_deref(), Some("-100"));
        assert_eq!(stored.market_cap_at_call, 10_000.0);
    }

    #[tokio::test]
    async fn test_duplicate_only_answered_in_private() {
        let (intake, _) = intake(ChatFilter::Any);
        intake.handle_text("-100", false, CALL).await.unwrap();

        assert!(intake.handle_text("-100", false, CALL).await.is_none());
        let private = intake.handle_text("42", true, CALL).await.unwrap();
        assert!(private.text.contains("already tracked"));
    }

    #[tokio::test]
    async fn test_filtered_chat_is_ignored() {
        let (intake, store) = intake(ChatFilter::parse("-100"));

        assert!(intake.handle_text("-200", false, CALL).await.is_none());
        assert!(intake.handle_text("-200", false, "/stats").await.is_none());
        assert!(intake.handle_text("-200", false, "/help").await.is_some());
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_commands_and_chatter() {
        let (intake, _) = intake(ChatFilter::Any);
        intake.handle_text("-100", false, CALL).await.unwrap();

        let stats = intake.handle_text("-100", false, "/stats 7d").await.unwrap();
        assert!(stats.text.contains("Call stats (7d)"));
        assert!(stats.text.contains("Total calls: 1"));

        let hot = intake.handle_text("-100", false, "/hot").await.unwrap();
        assert!(hot.text.contains("$TST monitoring"));

        assert!(intake.handle_text("-100", false, "gm").await.is_none());
    }
}
