/// Application configuration
///
/// Defaults come from the platform directories:
/// - Linux: ~/.local/share/whats-in-the-box
/// - macOS: ~/Library/Application Support/whats-in-the-box
/// - Windows: %APPDATA%\whats-in-the-box
///
/// An optional `config.json` in the platform config directory overrides any field.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::link::{DeepLinks, DEFAULT_SCHEME};
use crate::qr::{QrService, DEFAULT_SIZE};

const APP_DIR: &str = "whats-in-the-box";
const DB_FILE: &str = "whats_in_the_box.db";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Holds the catalog database
    pub data_dir: PathBuf,
    /// Where box photos are saved. Defaults to `<data_dir>/Documents`.
    pub documents_dir: Option<PathBuf>,
    /// Where exported QR codes go. Defaults to the user's download directory.
    pub downloads_dir: Option<PathBuf>,
    /// Scheme of box deep links
    pub url_scheme: String,
    /// Side of generated QR codes in pixels
    pub qr_size: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        let mut data_dir = dirs::data_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));
        data_dir.push(APP_DIR);

        Self {
            data_dir,
            documents_dir: None,
            downloads_dir: None,
            url_scheme: DEFAULT_SCHEME.to_string(),
            qr_size: DEFAULT_SIZE,
        }
    }
}

impl AppConfig {
    /// Load `config.json` from the platform config directory if present,
    /// otherwise use the defaults.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.json"))
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;

        info!("⚙️  Loaded config from {}", path.display());
        Ok(config)
    }

    /// Point the catalog and photos at another directory
    pub fn with_data_dir(mut self, data_dir: PathBuf) -> Self {
        self.data_dir = data_dir;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.qr_size == 0 {
            return Err(ConfigError::Invalid("qr_size must be positive".to_string()));
        }

        let mut chars = self.url_scheme.chars();
        let valid_scheme = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
            && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        if !valid_scheme {
            return Err(ConfigError::Invalid(format!(
                "url_scheme {:?} is not a valid URL scheme",
                self.url_scheme
            )));
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE)
    }

    pub fn documents_dir(&self) -> PathBuf {
        self.documents_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("Documents"))
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.downloads_dir
            .clone()
            .or_else(dirs::download_dir)
            .unwrap_or_else(|| self.data_dir.join("Downloads"))
    }

    pub fn deep_links(&self) -> DeepLinks {
        DeepLinks::new(self.url_scheme.as_str())
    }

    pub fn qr_service(&self) -> QrService {
        QrService::new(self.qr_size)
    }
}
