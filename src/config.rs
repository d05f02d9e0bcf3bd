use crate::gmail::GMAIL_BASE_URL;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "settings.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database_url: String,
    pub credentials_path: String,
    /// Root of the Gmail REST API
    pub api_base_url: String,
    pub dispatch: DispatchConfig,
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub chunk_size: usize,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub max_messages: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite:gtriage.db?mode=rwc".to_string(),
            credentials_path: "credentials.json".to_string(),
            api_base_url: GMAIL_BASE_URL.to_string(),
            dispatch: DispatchConfig::default(),
            sync: SyncConfig::default(),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            timeout_secs: 30,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self { max_messages: 100 }
    }
}

impl Config {
    /// Reads settings from `path`. A missing file means defaults; a file
    /// that exists but does not parse is an error.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        use std::fs;
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }
}
