use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::TimeDelta;
use coordination::escalation::{DelayAnchor, LadderError};
use coordination::{phone, EngineConfig, EscalationEngine, Ladder};
use serde::Deserialize;
use thiserror::Error;

use crate::directory::DirectoryEndpoint;
use crate::inspector::DEFAULT_TRANSFER_TOOL;
use crate::store::ColumnLayout;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("invalid ladder: {0}")]
    Ladder(#[from] LadderError),
}

/// Voice provider account and agent.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub base_url: String,
    pub api_key: String,
    /// Caller id for outbound calls.
    pub from_number: String,
    pub agent_id: String,
    /// Tool whose invocation counts as the callee accepting.
    pub transfer_tool: String,
    pub timeout_secs: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.retellai.com/v2".into(),
            api_key: String::new(),
            from_number: String::new(),
            agent_id: String::new(),
            transfer_tool: DEFAULT_TRANSFER_TOOL.into(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleSettings {
    pub max_attempts: u32,
    pub min_delay_secs: u64,
    pub delay_anchor: DelayAnchor,
    pub tick_interval_secs: u64,
    pub placement_pause_ms: u64,
    /// Lock files older than this are considered abandoned.
    pub stale_lock_secs: u64,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            min_delay_secs: 300,
            delay_anchor: DelayAnchor::LastAttempt,
            tick_interval_secs: 60,
            placement_pause_ms: 2000,
            stale_lock_secs: 900,
        }
    }
}

impl ScheduleSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs.max(1))
    }

    pub fn placement_pause(&self) -> Duration {
        Duration::from_millis(self.placement_pause_ms)
    }

    pub fn stale_lock_after(&self) -> Duration {
        Duration::from_secs(self.stale_lock_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub sheet: PathBuf,
    pub lock: PathBuf,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            sheet: PathBuf::from("calls.json"),
            lock: PathBuf::from("callout-agent.lock"),
        }
    }
}

/// Top-level agent configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub provider: ProviderSettings,
    pub directory: Vec<DirectoryEndpoint>,
    pub schedule: ScheduleSettings,
    pub ladder: Ladder,
    pub columns: ColumnLayout,
    pub store: StoreSettings,
}

impl AgentConfig {
    /// Load from `path` (defaults when `None`), then apply environment
    /// overrides. Does not validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_toml(&text)?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Override fields from `CALLOUT_*` variables looked up through `var`.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        let set = |target: &mut String, key: &str| {
            if let Some(value) = var(key).filter(|v| !v.trim().is_empty()) {
                *target = value;
            }
        };
        set(&mut self.provider.api_key, "CALLOUT_API_KEY");
        set(&mut self.provider.base_url, "CALLOUT_PROVIDER_URL");
        set(&mut self.provider.from_number, "CALLOUT_FROM_NUMBER");
        set(&mut self.provider.agent_id, "CALLOUT_AGENT_ID");
        if let Some(sheet) = var("CALLOUT_SHEET").filter(|v| !v.trim().is_empty()) {
            self.store.sheet = PathBuf::from(sheet);
        }
    }

    /// Reject configurations the scheduler cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.api_key.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "provider.api_key is empty (set CALLOUT_API_KEY)".into(),
            ));
        }
        if self.provider.agent_id.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "provider.agent_id is empty (set CALLOUT_AGENT_ID)".into(),
            ));
        }
        if phone::dialable(&self.provider.from_number).is_none() {
            return Err(ConfigError::Invalid(format!(
                "provider.from_number {:?} is not a dialable number",
                self.provider.from_number
            )));
        }
        let k = self.schedule.max_attempts;
        if k == 0 {
            return Err(ConfigError::Invalid("schedule.max_attempts must be at least 1".into()));
        }
        if self.columns.attempt_call_ids.len() < k as usize {
            return Err(ConfigError::Invalid(format!(
                "columns.attempt_call_ids has {} slots but max_attempts is {k}",
                self.columns.attempt_call_ids.len()
            )));
        }
        if let Some(col) = self.columns.duplicate_column() {
            return Err(ConfigError::Invalid(format!(
                "column {col} is mapped to more than one field"
            )));
        }
        self.ladder.validate()?;
        Ok(())
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_attempts: self.schedule.max_attempts,
            min_delay: TimeDelta::seconds(self.schedule.min_delay_secs as i64),
            delay_anchor: self.schedule.delay_anchor,
        }
    }

    pub fn engine(&self) -> EscalationEngine {
        EscalationEngine::with_config(self.engine_config(), self.ladder.clone())
    }
}
