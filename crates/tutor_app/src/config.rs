use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tutor_core::{PollPolicy, Quality, DEFAULT_GREETING};
use tutor_engine::{EngineSettings, ServiceSettings, DEFAULT_BASE_URL};
use url::Url;

pub const DEFAULT_CONFIG_FILE: &str = "tutor.ron";

const ENV_API_BASE: &str = "TUTOR_API_BASE";
const ENV_POLL_INTERVAL_MS: &str = "TUTOR_POLL_INTERVAL_MS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config {path:?}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api_base: String,
    pub poll_interval_ms: u64,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: Option<u64>,
    pub reply_deadline_secs: u64,
    pub query_deadline_secs: u64,
    pub submit_deadline_secs: u64,
    pub high_quality: bool,
    pub greeting: String,
    pub log_to_terminal: bool,
    pub max_backoff_rounds: u64,
    pub stale_after_failures: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        let policy = PollPolicy::default();
        let engine = EngineSettings::default();
        Self {
            api_base: DEFAULT_BASE_URL.to_string(),
            poll_interval_ms: 2000,
            connect_timeout_secs: 10,
            request_timeout_secs: None,
            reply_deadline_secs: engine.reply_deadline.as_secs(),
            query_deadline_secs: engine.query_deadline.as_secs(),
            submit_deadline_secs: engine.submit_deadline.as_secs(),
            high_quality: false,
            greeting: DEFAULT_GREETING.to_string(),
            log_to_terminal: false,
            max_backoff_rounds: policy.max_backoff_rounds,
            stale_after_failures: policy.stale_after_failures,
        }
    }
}

impl AppConfig {
    /// Load from `path` (defaults when the file is missing), then apply
    /// environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    fn load_with(
        path: &Path,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = match fs::read_to_string(path) {
            Ok(text) => ron::from_str(&text).map_err(|err| ConfigError::Parse {
                path: path.to_path_buf(),
                message: err.to_string(),
            })?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => AppConfig::default(),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        if let Some(base) = env(ENV_API_BASE) {
            config.api_base = base;
        }
        if let Some(raw) = env(ENV_POLL_INTERVAL_MS) {
            config.poll_interval_ms = raw.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!(
                    "{ENV_POLL_INTERVAL_MS} must be an unsigned integer"
                ))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.stale_after_failures == 0 {
            return Err(ConfigError::Invalid(
                "stale_after_failures must be greater than zero".to_string(),
            ));
        }
        if self.reply_deadline_secs == 0
            || self.query_deadline_secs == 0
            || self.submit_deadline_secs == 0
        {
            return Err(ConfigError::Invalid(
                "call deadlines must be greater than zero".to_string(),
            ));
        }
        let base = Url::parse(self.api_base.trim()).map_err(|err| {
            ConfigError::Invalid(format!("api_base {:?} is not a URL: {err}", self.api_base))
        })?;
        if base.cannot_be_a_base() {
            return Err(ConfigError::Invalid(format!(
                "api_base {:?} cannot be used as a base address",
                self.api_base
            )));
        }
        Ok(())
    }

    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            base_url: self.api_base.trim().to_string(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: self.request_timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            reply_deadline: Duration::from_secs(self.reply_deadline_secs),
            query_deadline: Duration::from_secs(self.query_deadline_secs),
            submit_deadline: Duration::from_secs(self.submit_deadline_secs),
        }
    }

    pub fn poll_period(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            max_backoff_rounds: self.max_backoff_rounds,
            stale_after_failures: self.stale_after_failures,
        }
    }

    pub fn quality(&self) -> Quality {
        if self.high_quality {
            Quality::High
        } else {
            Quality::Low
        }
    }
}
