//! Tracker configuration

use std::collections::HashSet;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracker_core::{AlertThresholds, CheckpointSchedule};

use crate::scheduler::SchedulerConfig;

/// Chats whose messages are accepted as calls
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ChatFilter {
    #[default]
    Any,
    Only(HashSet<String>),
}

impl ChatFilter {
    /// `*` or empty means any chat, otherwise a comma-separated id list
    pub fn parse(spec: &str) -> Self {
        let spec = spec.trim();
        if spec.is_empty() || spec == "*" {
            return ChatFilter::Any;
        }
        ChatFilter::Only(
            spec.split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn allows(&self, chat_id: &str) -> bool {
        match self {
            ChatFilter::Any => true,
            ChatFilter::Only(ids) => ids.contains(chat_id),
        }
    }
}

/// Runtime configuration of the tracker service
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub db_path: PathBuf,
    pub tick_interval: Duration,
    pub fetch_timeout: Duration,
    pub store_timeout: Duration,
    pub max_concurrency: usize,
    pub schedule: CheckpointSchedule,
    pub thresholds: AlertThresholds,
    /// Without a token alerts only go to the log
    pub telegram_bot_token: Option<String>,
    pub allowed_chats: ChatFilter,
    pub server_port: u16,
    pub rugcheck_enabled: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("data/signals.db"),
            tick_interval: Duration::from_secs(30),
            fetch_timeout: Duration::from_secs(5),
            store_timeout: Duration::from_secs(5),
            max_concurrency: 4,
            schedule: CheckpointSchedule::default(),
            thresholds: AlertThresholds::default(),
            telegram_bot_token: None,
            allowed_chats: ChatFilter::Any,
            server_port: 3000,
            rugcheck_enabled: true,
        }
    }
}

impl TrackerConfig {
    /// Load configuration from environment variables
    ///
    /// Unset variables keep their defaults:
    /// - SIGNALS_DB_PATH (`data/signals.db`)
    /// - TICK_INTERVAL_SECS (30), FETCH_TIMEOUT_SECS (5), STORE_TIMEOUT_SECS (5)
    /// - MAX_CONCURRENCY (4)
    /// - CHECKPOINTS (`5min=300,15min=900,1h=3600,4h=14400,24h=86400`)
    /// - ALERT_THRESHOLDS (`2,5,10,50,100`)
    /// - TELEGRAM_BOT_TOKEN, ALLOWED_CHATS (`*`)
    /// - SERVER_PORT (3000), RUGCHECK_ENABLED (true)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(path) = get("SIGNALS_DB_PATH") {
            config.db_path = PathBuf::from(path);
        }
        if let Some(value) = get("TICK_INTERVAL_SECS") {
            config.tick_interval = Duration::from_secs(positive("TICK_INTERVAL_SECS", &value)?);
        }
        if let Some(value) = get("FETCH_TIMEOUT_SECS") {
            config.fetch_timeout = Duration::from_secs(positive("FETCH_TIMEOUT_SECS", &value)?);
        }
        if let Some(value) = get("STORE_TIMEOUT_SECS") {
            config.store_timeout = Duration::from_secs(positive("STORE_TIMEOUT_SECS", &value)?);
        }
        if let Some(value) = get("MAX_CONCURRENCY") {
            config.max_concurrency = positive("MAX_CONCURRENCY", &value)? as usize;
        }
        if let Some(value) = get("CHECKPOINTS") {
            config.schedule = CheckpointSchedule::parse(&value).map_err(|e| {
                ConfigError::Invalid {
                    field: "CHECKPOINTS".to_string(),
                    error: e.to_string(),
                }
            })?;
        }
        if let Some(value) = get("ALERT_THRESHOLDS") {
            config.thresholds = AlertThresholds::parse(&value).map_err(|e| {
                ConfigError::Invalid {
                    field: "ALERT_THRESHOLDS".to_string(),
                    error: e.to_string(),
                }
            })?;
        }
        config.telegram_bot_token = get("TELEGRAM_BOT_TOKEN");
        if let Some(value) = get("ALLOWED_CHATS") {
            config.allowed_chats = ChatFilter::parse(&value);
        }
        if let Some(value) = get("SERVER_PORT") {
            config.server_port = value.trim().parse().map_err(|_| ConfigError::Invalid {
                field: "SERVER_PORT".to_string(),
                error: format!("'{}' is not a port number", value),
            })?;
        }
        if let Some(value) = get("RUGCHECK_ENABLED") {
            config.rugcheck_enabled = boolean("RUGCHECK_ENABLED", &value)?;
        }

        Ok(config)
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            fetch_timeout: self.fetch_timeout,
            store_timeout: self.store_timeout,
            max_concurrency: self.max_concurrency,
        }
    }
}

fn positive(field: &str, value: &str) -> Result<u64, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::Invalid {
            field: field.to_string(),
            error: format!("expected a positive integer, got '{}'", value),
        }),
    }
}

fn boolean(field: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            field: field.to_string(),
            error: format!("expected true or false, got '{}'", value),
        }),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {error}")]
    Invalid { field: String, error: String },
}
