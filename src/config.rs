//! Application configuration
//!
//! Defaults match the reference behaviour. A JSON file named by
//! `CHRONOVOICE_CONFIG` can override any field, and a few environment
//! variables override the file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::capture::CaptureKind;
use crate::recorder::{MimePreferences, SessionConfig};
use crate::schedule::{ActiveHours, CompletionPolicy};
use crate::upload::MockUploadConfig;

pub const CONFIG_PATH_VAR: &str = "CHRONOVOICE_CONFIG";
pub const ROTATION_SECS_VAR: &str = "CHRONOVOICE_ROTATION_SECS";
pub const CAPTURE_KIND_VAR: &str = "CHRONOVOICE_CAPTURE_KIND";
pub const COMPLETION_POLICY_VAR: &str = "CHRONOVOICE_COMPLETION_POLICY";
pub const UPLOAD_FAILURE_RATE_VAR: &str = "CHRONOVOICE_UPLOAD_FAILURE_RATE";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    /// Capture used when a start command doesn't name one
    pub capture_kind: CaptureKind,

    pub rotation_interval_secs: u64,

    pub tick_interval_ms: u64,

    /// Pause between closing a segment and opening the next
    pub restart_delay_ms: u64,

    pub mime_preferences: MimePreferences,

    pub active_hours: ActiveHours,

    pub completion_policy: CompletionPolicy,

    pub upload: MockUploadConfig,

    pub task_fetch_latency_ms: u64,

    /// How long the demo binary records before stopping
    pub demo_duration_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            capture_kind: CaptureKind::AudioPlusDisplay,
            rotation_interval_secs: 20 * 60,
            tick_interval_ms: 1000,
            restart_delay_ms: 100,
            mime_preferences: MimePreferences::default(),
            active_hours: ActiveHours::default(),
            completion_policy: CompletionPolicy::Remove,
            upload: MockUploadConfig::default(),
            task_fetch_latency_ms: 800,
            demo_duration_secs: 5,
        }
    }
}

impl AppConfig {
    /// Load from the optional config file and the environment, then validate
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(CONFIG_PATH_VAR) {
            Ok(path) => {
                tracing::info!("Loading configuration from {}", path);
                Self::from_file(Path::new(&path))?
            }
            Err(_) => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Apply overrides from `lookup` (the environment, in production)
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(value) = lookup(ROTATION_SECS_VAR) {
            self.rotation_interval_secs = value
                .trim()
                .parse()
                .map_err(|_| invalid(ROTATION_SECS_VAR, &value))?;
        }
        if let Some(value) = lookup(CAPTURE_KIND_VAR) {
            self.capture_kind = value.parse().map_err(ConfigError::Invalid)?;
        }
        if let Some(value) = lookup(COMPLETION_POLICY_VAR) {
            self.completion_policy = value.parse().map_err(ConfigError::Invalid)?;
        }
        if let Some(value) = lookup(UPLOAD_FAILURE_RATE_VAR) {
            self.upload.failure_rate = value
                .trim()
                .parse()
                .map_err(|_| invalid(UPLOAD_FAILURE_RATE_VAR, &value))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rotation_interval_secs == 0 {
            return Err(ConfigError::Invalid("rotationIntervalSecs must be greater than zero".into()));
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid("tickIntervalMs must be greater than zero".into()));
        }
        let hours = self.active_hours;
        if hours.start > 23 || hours.end > 23 || hours.start > hours.end {
            return Err(ConfigError::Invalid(format!(
                "activeHours {}..={} is not a window within 0-23",
                hours.start, hours.end
            )));
        }
        if !(0.0..=1.0).contains(&self.upload.failure_rate) {
            return Err(ConfigError::Invalid(format!(
                "upload.failureRate {} is outside [0, 1]",
                self.upload.failure_rate
            )));
        }
        Ok(())
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            rotation_interval: Duration::from_secs(self.rotation_interval_secs),
            tick_interval: Duration::from_millis(self.tick_interval_ms),
            restart_delay: Duration::from_millis(self.restart_delay_ms),
            mime_preferences: self.mime_preferences.clone(),
        }
    }
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::Invalid(format!("{}={} is not a valid value", key, value))
}
