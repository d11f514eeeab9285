//! Tunable settings loaded from a TOML file
//!
//! Every section is optional and falls back to defaults:
//!
//! ```toml
//! [generation]
//! temperature = 0.7
//! top_k = 40
//! top_p = 0.8
//! max_output_tokens = 1024
//!
//! [retry]
//! max_retries = 2
//! base_delay_ms = 1000
//!
//! [session]
//! tick_ms = 1000
//! idle_timeout_secs = 1800
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::providers::RetryPolicy;

/// Root settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VivaSettings {
    /// Generation parameters sent with every completion request
    #[serde(default)]
    pub generation: GenerationSettings,

    /// Rate-limit retry behaviour
    #[serde(default)]
    pub retry: RetrySettings,

    /// Session runner settings
    #[serde(default)]
    pub session: SessionSettings,
}

impl VivaSettings {
    /// Load settings from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load settings from a TOML string
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let settings: VivaSettings = toml::from_str(content)?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let g = &self.generation;
        if !(0.0..=2.0).contains(&g.temperature) {
            return Err(ConfigError::Validation(format!(
                "generation.temperature must be within 0..=2, got {}",
                g.temperature
            )));
        }
        if !(0.0..=1.0).contains(&g.top_p) {
            return Err(ConfigError::Validation(format!(
                "generation.top_p must be within 0..=1, got {}",
                g.top_p
            )));
        }
        if g.max_output_tokens == 0 {
            return Err(ConfigError::Validation(
                "generation.max_output_tokens must be positive".into(),
            ));
        }
        if self.session.tick_ms == 0 {
            return Err(ConfigError::Validation("session.tick_ms must be positive".into()));
        }
        if self.session.idle_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "session.idle_timeout_secs must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Completion service generation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSettings {
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_top_k")]
    pub top_k: u32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    #[serde(default = "default_candidate_count")]
    pub candidate_count: u32,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_top_k() -> u32 {
    40
}

fn default_top_p() -> f32 {
    0.8
}

fn default_max_output_tokens() -> u32 {
    1024
}

fn default_candidate_count() -> u32 {
    1
}

impl GenerationSettings {
    pub fn new(temperature: f32, top_k: u32, top_p: f32, max_output_tokens: u32) -> Self {
        Self {
            temperature,
            top_k,
            top_p,
            max_output_tokens,
            candidate_count: default_candidate_count(),
        }
    }
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            top_k: default_top_k(),
            top_p: default_top_p(),
            max_output_tokens: default_max_output_tokens(),
            candidate_count: default_candidate_count(),
        }
    }
}

/// Retry settings for rate-limited requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay unit in milliseconds, multiplied by the attempt number
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    2
}

fn default_base_delay_ms() -> u64 {
    1000
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        RetryPolicy::new(settings.max_retries, Duration::from_millis(settings.base_delay_ms))
    }
}

/// Session runner settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Timer tick period in milliseconds
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    /// Unused sessions are dropped after this many seconds
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

fn default_tick_ms() -> u64 {
    1000
}

fn default_idle_timeout_secs() -> u64 {
    30 * 60
}

impl SessionSettings {
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            idle_timeout_secs: default_idle_timeout_secs(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}
