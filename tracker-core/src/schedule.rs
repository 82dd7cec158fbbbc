//! Milestone checkpoints and alert thresholds
//!
//! Both sets are fixed for a deployment and ordered ascending. The scheduler
//! and the aggregation engine share one [`CheckpointSchedule`], so the
//! checkpoint that retires a signal is the same one statistics are read from.

use crate::error::{TrackerError, TrackerResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One elapsed-time checkpoint after admission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub label: String,
    pub after_secs: i64,
}

impl Checkpoint {
    pub fn new(label: impl Into<String>, after_secs: i64) -> Self {
        Self {
            label: label.into(),
            after_secs,
        }
    }
}

/// Ordered, validated set of checkpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckpointSchedule {
    checkpoints: Vec<Checkpoint>,
}

impl CheckpointSchedule {
    /// Build a schedule. Boundaries must be positive and strictly ascending,
    /// labels non-empty and unique.
    pub fn new(checkpoints: Vec<Checkpoint>) -> TrackerResult<Self> {
        if checkpoints.is_empty() {
            return Err(TrackerError::config("checkpoint schedule cannot be empty"));
        }

        let mut labels = HashSet::new();
        let mut previous = 0;
        for checkpoint in &checkpoints {
            if checkpoint.label.trim().is_empty() {
                return Err(TrackerError::config("checkpoint label cannot be empty"));
            }
            if !labels.insert(checkpoint.label.as_str()) {
                return Err(TrackerError::config(format!(
                    "duplicate checkpoint label: {}",
                    checkpoint.label
                )));
            }
            if checkpoint.after_secs <= previous {
                return Err(TrackerError::config(format!(
                    "checkpoint {} must come after {}s",
                    checkpoint.label, previous
                )));
            }
            previous = checkpoint.after_secs;
        }

        Ok(Self { checkpoints })
    }

    /// Parse `label=seconds` pairs separated by commas, e.g. `5min=300,1h=3600`
    pub fn parse(spec: &str) -> TrackerResult<Self> {
        let checkpoints = spec
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                let (label, secs) = part.split_once('=').ok_or_else(|| {
                    TrackerError::config(format!("expected label=seconds, got '{}'", part))
                })?;
                let secs = secs.trim().parse::<i64>().map_err(|e| {
                    TrackerError::config(format!("invalid seconds for {}: {}", label.trim(), e))
                })?;
                Ok(Checkpoint::new(label.trim(), secs))
            })
            .collect::<TrackerResult<Vec<_>>>()?;

        Self::new(checkpoints)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Checkpoint> {
        self.checkpoints.iter()
    }

    pub fn len(&self) -> usize {
        self.checkpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkpoints.is_empty()
    }

    /// The largest boundary; crossing it retires a signal
    pub fn final_checkpoint(&self) -> &Checkpoint {
        // Non-empty by construction
        &self.checkpoints[self.checkpoints.len() - 1]
    }

    pub fn contains(&self, label: &str) -> bool {
        self.checkpoints.iter().any(|c| c.label == label)
    }

    /// Whether a signal `elapsed` seconds old is past its observation window
    pub fn is_window_over(&self, elapsed: i64) -> bool {
        elapsed > self.final_checkpoint().after_secs
    }
}

impl Default for CheckpointSchedule {
    /// 5min, 15min, 1h, 4h, 24h
    fn default() -> Self {
        Self {
            checkpoints: vec![
                Checkpoint::new("5min", 5 * 60),
                Checkpoint::new("15min", 15 * 60),
                Checkpoint::new("1h", 60 * 60),
                Checkpoint::new("4h", 4 * 60 * 60),
                Checkpoint::new("24h", 24 * 60 * 60),
            ],
        }
    }
}

/// Ordered, validated set of return multipliers that trigger one alert each
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertThresholds {
    thresholds: Vec<f64>,
}

impl AlertThresholds {
    pub fn new(thresholds: Vec<f64>) -> TrackerResult<Self> {
        if thresholds.is_empty() {
            return Err(TrackerError::config("alert thresholds cannot be empty"));
        }

        let mut previous = 0.0;
        for t in &thresholds {
            if !t.is_finite() || *t <= previous {
                return Err(TrackerError::config(format!(
                    "alert thresholds must be positive and strictly ascending, got {}",
                    t
                )));
            }
            previous = *t;
        }

        Ok(Self { thresholds })
    }

    /// Parse a comma separated list, e.g. `2,5,10`
    pub fn parse(spec: &str) -> TrackerResult<Self> {
        let thresholds = spec
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                part.trim_end_matches(['x', 'X'])
                    .parse::<f64>()
                    .map_err(|e| TrackerError::config(format!("invalid threshold '{}': {}", part, e)))
            })
            .collect::<TrackerResult<Vec<_>>>()?;

        Self::new(thresholds)
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.thresholds.iter().copied()
    }

    pub fn contains(&self, threshold: f64) -> bool {
        self.thresholds.iter().any(|t| *t == threshold)
    }
}

impl Default for AlertThresholds {
    /// 2x, 5x, 10x, 50x, 100x
    fn default() -> Self {
        Self {
            thresholds: vec![2.0, 5.0, 10.0, 50.0, 100.0],
        }
    }
}
