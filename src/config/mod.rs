//! Application configuration

pub mod settings;

use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use settings::{ConfigError, GenerationSettings, VivaSettings};

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-pro";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    #[serde(skip_serializing)]
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub data_dir: PathBuf,
    pub settings_path: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".into()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            gemini_api_key: env::var("GEMINI_API_KEY")
                .or_else(|_| env::var("VITE_GEMINI_API_KEY"))
                .ok()
                .filter(|k| !k.trim().is_empty()),
            gemini_model: env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_GEMINI_MODEL.into()),
            gemini_base_url: env::var("GEMINI_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_GEMINI_BASE_URL.into()),
            data_dir: env::var("ACE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data")),
            settings_path: env::var("ACE_SETTINGS").ok().map(PathBuf::from),
        })
    }

    /// Loads the TOML settings file if one is configured, defaults otherwise
    pub fn load_settings(&self) -> Result<VivaSettings, ConfigError> {
        let settings = match &self.settings_path {
            Some(path) => VivaSettings::from_file(path)?,
            None => VivaSettings::default(),
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn history_db_path(&self) -> PathBuf {
        self.data_dir.join("ace-viva.db")
    }
}
