//! Uploader configuration.
//!
//! Stored as TOML at `~/.config/multiupload/config.toml`, or wherever
//! `MULTIUPLOAD_CONFIG` points.

use std::path::{Path, PathBuf};

use multiupload_http::Endpoints;
use multiupload_session::SessionConfig;
use serde::{Deserialize, Serialize};

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "MULTIUPLOAD_CONFIG";

/// Uploader configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL used to derive endpoints when `endpoints` is not set.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Page title used in the error summary.
    #[serde(default = "default_title")]
    pub title: String,

    /// Explicit endpoint URLs.
    #[serde(default)]
    pub endpoints: Option<Endpoints>,

    #[serde(default)]
    pub session: SessionConfig,
}

fn default_base_url() -> String {
    "http://localhost:9000".into()
}

fn default_title() -> String {
    "Upload your documents".into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            title: default_title(),
            endpoints: None,
            session: SessionConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from disk, or creates a default if not found.
    pub fn load() -> anyhow::Result<Self> {
        let path = config_path();

        if path.exists() {
            Self::load_from(&path)
        } else {
            let config = Config::default();
            config.save_to(&path)?;
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.session.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// Endpoints to talk to, explicit or derived from `base_url`.
    pub fn endpoints(&self) -> Endpoints {
        self.endpoints
            .clone()
            .unwrap_or_else(|| Endpoints::under(&self.base_url))
    }
}

/// Returns the configuration file path.
fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return PathBuf::from(path);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
    PathBuf::from(home)
        .join(".config")
        .join("multiupload")
        .join("config.toml")
}
