//! Signal statistics
//!
//! Read-only views over the store: per-scope summaries, rankings, global
//! stats and per-checkpoint performance. The final checkpoint of the shared
//! [`CheckpointSchedule`] is the one every "final return" is read from.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracker_core::{Chain, CheckpointSchedule, Signal, SignalStatus};

use crate::store::{SignalQuery, SignalStore, StoreError};

/// A call counts as a win at or above this final multiplier
pub const WIN_MULTIPLIER: f64 = 2.0;

/// Number of signals listed in a summary
const RECENT_SIGNALS_LIMIT: usize = 10;

/// Look-back window for statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Timeframe {
    #[default]
    #[serde(rename = "24h")]
    TwentyFourHours,
    #[serde(rename = "7d")]
    SevenDays,
    #[serde(rename = "30d")]
    ThirtyDays,
}

impl Timeframe {
    /// Window length in seconds
    pub fn seconds(&self) -> i64 {
        match self {
            Timeframe::TwentyFourHours => 86_400,
            Timeframe::SevenDays => 7 * 86_400,
            Timeframe::ThirtyDays => 30 * 86_400,
        }
    }

    /// Earliest admission time inside the window ending at `now`
    pub fn cutoff(&self, now: i64) -> i64 {
        now - self.seconds()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::TwentyFourHours => "24h",
            Timeframe::SevenDays => "7d",
            Timeframe::ThirtyDays => "30d",
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "24h" | "1d" => Ok(Timeframe::TwentyFourHours),
            "7d" => Ok(Timeframe::SevenDays),
            "30d" => Ok(Timeframe::ThirtyDays),
            _ => Err(format!("Unknown timeframe: {}", s)),
        }
    }
}

/// A signal together with the multiplier it is ranked by
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallResult {
    pub contract_address: String,
    pub symbol: String,
    pub name: String,
    pub chain: Chain,
    pub return_multiplier: f64,
    pub admitted_at: i64,
}

impl CallResult {
    fn new(signal: &Signal, return_multiplier: f64) -> Self {
        Self {
            contract_address: signal.contract_address.clone(),
            symbol: signal.symbol.clone(),
            name: signal.name.clone(),
            chain: signal.chain,
            return_multiplier,
            admitted_at: signal.admitted_at,
        }
    }
}

/// Per-scope performance over a timeframe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalSummary {
    pub timeframe: Timeframe,
    pub total_calls: usize,
    pub completed_count: usize,
    /// Percent of completed calls at or above [`WIN_MULTIPLIER`]
    pub win_rate: f64,
    pub avg_return: f64,
    pub best_call: Option<CallResult>,
    pub worst_call: Option<CallResult>,
    /// Most recent first
    pub recent_signals: Vec<Signal>,
}

/// One entry of a hot-signal ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedSignal {
    /// 1-based
    pub rank: usize,
    pub contract_address: String,
    pub symbol: String,
    pub chain: Chain,
    pub status: SignalStatus,
    /// Final-checkpoint multiplier, `None` while still unknown
    pub return_multiplier: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalStats {
    pub total_signals: usize,
    pub monitoring_signals: usize,
    /// Signals with a final-checkpoint milestone
    pub completed_signals: usize,
    pub avg_return: f64,
    pub win_rate: f64,
}

/// Returns recorded at one checkpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Performance {
    pub checkpoint: String,
    pub count: usize,
    pub avg_return: f64,
    pub best_call: Option<CallResult>,
    /// Most recently recorded first
    pub calls: Vec<CallResult>,
}

/// Computes statistics from the signal store
pub struct AggregationEngine {
    store: Arc<dyn SignalStore>,
    schedule: CheckpointSchedule,
}

impl AggregationEngine {
    pub fn new(store: Arc<dyn SignalStore>, schedule: CheckpointSchedule) -> Self {
        Self { store, schedule }
    }

    pub fn schedule(&self) -> &CheckpointSchedule {
        &self.schedule
    }

    fn final_label(&self) -> &str {
        &self.schedule.final_checkpoint().label
    }

    fn final_multiplier(&self, signal: &Signal) -> Option<f64> {
        signal
            .milestone(self.final_label())
            .map(|m| m.return_multiplier)
    }

    /// Summary of `scope` over `timeframe`, ending now
    pub async fn summarize(
        &self,
        scope: &str,
        timeframe: Timeframe,
    ) -> Result<SignalSummary, StoreError> {
        self.summarize_at(scope, timeframe, Utc::now().timestamp())
            .await
    }

    pub async fn summarize_at(
        &self,
        scope: &str,
        timeframe: Timeframe,
        now: i64,
    ) -> Result<SignalSummary, StoreError> {
        let cutoff = timeframe.cutoff(now);
        let window: Vec<Signal> = self
            .store
            .list_by_scope(scope)
            .await?
            .into_iter()
            .filter(|s| s.admitted_at >= cutoff)
            .collect();

        let results: Vec<CallResult> = window
            .iter()
            .filter_map(|s| match self.final_multiplier(s) {
                Some(multiplier) => Some(CallResult::new(s, multiplier)),
                // completed without a final reading counts as break-even
                None if s.status == SignalStatus::Completed => Some(CallResult::new(s, 1.0)),
                None => None,
            })
            .collect();

        let (win_rate, avg_return) = rates(&results);

        let mut best_call: Option<&CallResult> = None;
        let mut worst_call: Option<&CallResult> = None;
        for result in &results {
            if best_call.map_or(true, |b| result.return_multiplier > b.return_multiplier) {
                best_call = Some(result);
            }
            if worst_call.map_or(true, |w| result.return_multiplier < w.return_multiplier) {
                worst_call = Some(result);
            }
        }

        let mut recent_signals = window.clone();
        recent_signals.reverse();
        recent_signals.truncate(RECENT_SIGNALS_LIMIT);

        Ok(SignalSummary {
            timeframe,
            total_calls: window.len(),
            completed_count: results.len(),
            win_rate,
            avg_return,
            best_call: best_call.cloned(),
            worst_call: worst_call.cloned(),
            recent_signals,
        })
    }

    /// Signals of a scope ranked by final multiplier, unknown counting as zero
    pub async fn hot_signals(
        &self,
        scope: &str,
        limit: usize,
    ) -> Result<Vec<RankedSignal>, StoreError> {
        let mut ranked: Vec<(Signal, Option<f64>)> = self
            .store
            .list_by_scope(scope)
            .await?
            .into_iter()
            .map(|s| {
                let multiplier = self.final_multiplier(&s);
                (s, multiplier)
            })
            .collect();

        ranked.sort_by(|(_, a), (_, b)| b.unwrap_or(0.0).total_cmp(&a.unwrap_or(0.0)));

        Ok(ranked
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(idx, (signal, return_multiplier))| RankedSignal {
                rank: idx + 1,
                contract_address: signal.contract_address,
                symbol: signal.symbol,
                chain: signal.chain,
                status: signal.status,
                return_multiplier,
            })
            .collect())
    }

    /// Totals across every scope
    pub async fn global_stats(&self) -> Result<GlobalStats, StoreError> {
        let signals = self.store.list_all().await?;

        let results: Vec<CallResult> = signals
            .iter()
            .filter_map(|s| self.final_multiplier(s).map(|m| CallResult::new(s, m)))
            .collect();
        let (win_rate, avg_return) = rates(&results);

        Ok(GlobalStats {
            total_signals: signals.len(),
            monitoring_signals: signals.iter().filter(|s| s.is_monitoring()).count(),
            completed_signals: results.len(),
            avg_return,
            win_rate,
        })
    }

    /// Returns recorded at `checkpoint`, most recent first
    ///
    /// An unknown label yields an empty result.
    pub async fn performance(
        &self,
        checkpoint: &str,
        limit: usize,
    ) -> Result<Performance, StoreError> {
        let mut recorded: Vec<(i64, CallResult)> = self
            .store
            .list_all()
            .await?
            .iter()
            .filter_map(|s| {
                s.milestone(checkpoint)
                    .map(|m| (m.recorded_at, CallResult::new(s, m.return_multiplier)))
            })
            .collect();

        recorded.sort_by(|(a, _), (b, _)| b.cmp(a));
        let calls: Vec<CallResult> = recorded.into_iter().take(limit).map(|(_, c)| c).collect();

        let avg_return = mean(calls.iter().map(|c| c.return_multiplier));
        let best_call = calls
            .iter()
            .fold(None::<&CallResult>, |best, call| match best {
                Some(b) if b.return_multiplier >= call.return_multiplier => Some(b),
                _ => Some(call),
            })
            .cloned();

        Ok(Performance {
            checkpoint: checkpoint.to_string(),
            count: calls.len(),
            avg_return,
            best_call,
            calls,
        })
    }

    /// Raw listing, most recent first
    pub async fn list_signals(&self, query: SignalQuery) -> Result<Vec<Signal>, StoreError> {
        self.store.list_recent(query).await
    }
}

/// `(win rate percent, mean multiplier)`, both zero when empty
fn rates(results: &[CallResult]) -> (f64, f64) {
    if results.is_empty() {
        return (0.0, 0.0);
    }
    let wins = results
        .iter()
        .filter(|r| r.return_multiplier >= WIN_MULTIPLIER)
        .count();
    let win_rate = wins as f64 / results.len() as f64 * 100.0;
    (win_rate, mean(results.iter().map(|r| r.return_multiplier)))
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}
