//! Service configuration structures

use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
pub const CONFIG_PATH_ENV: &str = "MEME_SIGNAL_CONFIG";
pub const HOST_ENV: &str = "MEME_SIGNAL_HOST";
pub const PORT_ENV: &str = "MEME_SIGNAL_PORT";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub server: Server,
    pub model: Model,
    pub chart: Chart,
    pub logging: Logging,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Server {
    pub host: String,
    pub port: u16,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Model {
    pub directory: PathBuf,
    pub booster_file: String,
    pub metadata_file: String,
    pub feature_columns_file: String,
    pub label_encoder_file: String,
}

impl Default for Model {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            booster_file: "smart_meme_coin_xgboost.json".to_string(),
            metadata_file: "model_metadata.json".to_string(),
            feature_columns_file: "feature_columns.json".to_string(),
            label_encoder_file: "label_encoder.json".to_string(),
        }
    }
}

impl Model {
    pub fn booster_path(&self) -> PathBuf {
        self.directory.join(&self.booster_file)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.directory.join(&self.metadata_file)
    }

    pub fn feature_columns_path(&self) -> PathBuf {
        self.directory.join(&self.feature_columns_file)
    }

    pub fn label_encoder_path(&self) -> PathBuf {
        self.directory.join(&self.label_encoder_file)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Chart {
    pub enabled: bool,
    pub api_base: String,
    pub chart_base: String,
    pub timeout_secs: u64,
    pub cache_secs: u64,
}

impl Default for Chart {
    fn default() -> Self {
        Self {
            enabled: true,
            api_base: "https://api.dexscreener.com/latest/dex/tokens".to_string(),
            chart_base: "https://dexscreener.com/solana".to_string(),
            timeout_secs: 10,
            cache_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Logging {
    pub level: String,
    pub directory: PathBuf,
    pub file_name: String,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: PathBuf::from("logs"),
            file_name: "meme-signal.log".to_string(),
        }
    }
}

impl Config {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|source| ConfigError::Toml {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load from `MEME_SIGNAL_CONFIG` (or `config.toml`), falling back to
    /// defaults when the file does not exist, then apply env overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV)
            .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        let mut config = if Path::new(&path).exists() {
            Self::load_from_file(&path)?
        } else {
            Self::default()
        };

        config.apply_overrides(
            std::env::var(HOST_ENV).ok(),
            std::env::var(PORT_ENV).ok(),
        )?;
        Ok(config)
    }

    pub fn apply_overrides(
        &mut self,
        host: Option<String>,
        port: Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(host) = host.filter(|h| !h.trim().is_empty()) {
            self.server.host = host.trim().to_string();
        }

        if let Some(port) = port {
            self.server.port = port.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: PORT_ENV.to_string(),
                value: port.clone(),
            })?;
        }

        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
