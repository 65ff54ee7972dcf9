//! CLI error types.

use std::fmt;

use iiifgrab::config::ConfigFileError;

/// Errors that abort the whole run, as opposed to per-image failures.
#[derive(Debug)]
pub enum CliError {
    /// Configuration file could not be loaded.
    Config(ConfigFileError),

    /// Output directory could not be created.
    OutputDir(std::io::Error),

    /// HTTP clients could not be constructed.
    Client(String),

    /// No manifest URLs to process.
    NoManifests,
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::OutputDir(e) => write!(f, "Cannot create output directory: {}", e),
            CliError::Client(msg) => write!(f, "Cannot create HTTP client: {}", msg),
            CliError::NoManifests => write!(f, "No IIIF manifests found in the given URLs"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) => Some(e),
            CliError::OutputDir(e) => Some(e),
            CliError::Client(_) | CliError::NoManifests => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e)
    }
}
