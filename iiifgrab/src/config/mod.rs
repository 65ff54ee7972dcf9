//! Configuration file handling for ~/.iiifgrab/config.ini.
//!
//! Loads and saves user configuration with sensible defaults. A missing
//! file simply yields defaults; an unreadable or invalid file is an
//! error so typos don't silently fall back.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use crate::engine::{
    EngineConfig, DEFAULT_CONCURRENCY, DEFAULT_FULL_IMAGE_TIMEOUT, DEFAULT_TILE_TIMEOUT,
};

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    Read(#[from] ini::Error),

    /// Failed to write config file
    #[error("Failed to write config file: {0}")]
    Write(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// Failed to create config directory
    #[error("Failed to create config directory: {0}")]
    Directory(std::io::Error),
}

/// `[download]` section settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSettings {
    /// Maximum concurrent tile fetches.
    pub concurrency: usize,
    /// Per-request tile/manifest timeout in seconds.
    pub tile_timeout_secs: u64,
    /// Per-request full-image timeout in seconds.
    pub full_image_timeout_secs: u64,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            tile_timeout_secs: DEFAULT_TILE_TIMEOUT.as_secs(),
            full_image_timeout_secs: DEFAULT_FULL_IMAGE_TIMEOUT.as_secs(),
        }
    }
}

/// `[output]` section settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSettings {
    /// Directory where composited images are written.
    pub directory: PathBuf,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
        }
    }
}

/// User configuration, persisted as an INI file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    /// Download behaviour.
    pub download: DownloadSettings,
    /// Output location.
    pub output: OutputSettings,
}

impl ConfigFile {
    /// Load configuration from the default path (~/.iiifgrab/config.ini).
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from a specific path.
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        parse_ini(&ini)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigFileError::Directory)?;
        }

        let mut ini = Ini::new();
        ini.with_section(Some("download"))
            .set("concurrency", self.download.concurrency.to_string())
            .set("tile_timeout", self.download.tile_timeout_secs.to_string())
            .set(
                "full_image_timeout",
                self.download.full_image_timeout_secs.to_string(),
            );
        ini.with_section(Some("output"))
            .set("directory", self.output.directory.display().to_string());

        ini.write_to_file(path)
            .map_err(|e| ConfigFileError::Write(e.to_string()))
    }

    /// Create the default config file if it doesn't exist.
    ///
    /// Returns the path to the config file.
    pub fn ensure_exists() -> Result<PathBuf, ConfigFileError> {
        let path = config_file_path();
        if !path.exists() {
            Self::default().save_to(&path)?;
        }
        Ok(path)
    }
}

impl From<&ConfigFile> for EngineConfig {
    fn from(config: &ConfigFile) -> Self {
        EngineConfig::default()
            .with_concurrency(config.download.concurrency)
            .with_tile_timeout(Duration::from_secs(config.download.tile_timeout_secs))
            .with_full_image_timeout(Duration::from_secs(config.download.full_image_timeout_secs))
    }
}

/// Get the path to the config directory (~/.iiifgrab).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".iiifgrab")
}

/// Get the path to the config file (~/.iiifgrab/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    if let Some(section) = ini.section(Some("download")) {
        if let Some(value) = section.get("concurrency") {
            config.download.concurrency = parse_value(
                "download",
                "concurrency",
                value,
                "must be a positive integer",
            )?;
            if config.download.concurrency == 0 {
                return Err(invalid("download", "concurrency", value, "must be non-zero"));
            }
        }
        if let Some(value) = section.get("tile_timeout") {
            config.download.tile_timeout_secs =
                parse_value("download", "tile_timeout", value, "must be seconds")?;
        }
        if let Some(value) = section.get("full_image_timeout") {
            config.download.full_image_timeout_secs =
                parse_value("download", "full_image_timeout", value, "must be seconds")?;
        }
    }

    if let Some(section) = ini.section(Some("output")) {
        if let Some(value) = section.get("directory") {
            config.output.directory = PathBuf::from(value);
        }
    }

    Ok(config)
}

fn parse_value<T: std::str::FromStr>(
    section: &str,
    key: &str,
    value: &str,
    reason: &str,
) -> Result<T, ConfigFileError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(section, key, value, reason))
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
