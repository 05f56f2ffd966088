use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("config was not loaded from a file")]
    NoPath,
}

fn default_http_port() -> u16 {
    80
}

fn default_https_port() -> u16 {
    443
}

fn default_logging_path() -> PathBuf {
    PathBuf::from("logs")
}

fn default_logo_cache_path() -> PathBuf {
    PathBuf::from(".cache/logo")
}

/// Server configuration, kept in a YAML file next to the binary. Recents
/// and favourites are written back so they survive restarts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub m3u_path: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_https_port")]
    pub https_port: u16,
    #[serde(default)]
    pub cer_path: Option<PathBuf>,
    #[serde(default)]
    pub pem_path: Option<PathBuf>,
    #[serde(default)]
    pub key_path: Option<PathBuf>,
    #[serde(default)]
    pub log_to_file: bool,
    #[serde(default = "default_logging_path")]
    pub logging_path: PathBuf,
    /// Where scaled channel logos are cached.
    #[serde(default = "default_logo_cache_path")]
    pub logo_cache_path: PathBuf,
    #[serde(default)]
    pub recents: Vec<String>,
    #[serde(default)]
    pub favorites: Vec<String>,
    #[serde(skip)]
    path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            m3u_path: String::new(),
            http_port: default_http_port(),
            https_port: default_https_port(),
            cer_path: None,
            pem_path: None,
            key_path: None,
            log_to_file: false,
            logging_path: default_logging_path(),
            logo_cache_path: default_logo_cache_path(),
            recents: Vec::new(),
            favorites: Vec::new(),
            path: None,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let mut config: Config = serde_yaml::from_str(&contents)?;
        config.path = Some(path.to_path_buf());
        tracing::debug!(target: "config", path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let path = self.path.as_ref().ok_or(ConfigError::NoPath)?;
        fs::write(path, serde_yaml::to_string(self)?)?;
        Ok(())
    }

    pub fn save_m3u_path(&mut self, m3u_path: impl Into<String>) -> Result<(), ConfigError> {
        self.m3u_path = m3u_path.into();
        self.save()
    }

    pub fn save_recents(&mut self, recents: Vec<String>) -> Result<(), ConfigError> {
        self.recents = recents;
        self.save()
    }

    pub fn clear_recents(&mut self) -> Result<(), ConfigError> {
        self.save_recents(Vec::new())
    }

    pub fn save_favorites(&mut self, favorites: Vec<String>) -> Result<(), ConfigError> {
        self.favorites = favorites;
        self.save()
    }

    pub fn clear_favorites(&mut self) -> Result<(), ConfigError> {
        self.save_favorites(Vec::new())
    }
}
