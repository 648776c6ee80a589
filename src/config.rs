//! Persisted application settings stored as TOML under the `.moodwave` root.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::app_dirs;

/// Default filename used to store the app configuration.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Application settings loaded from the TOML config file.
///
/// Every field carries a serde default so configs written by older builds
/// keep loading after new fields are added.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    /// Endpoint that accepts the multipart audio upload.
    #[serde(default = "default_upload_url")]
    pub upload_url: String,
    /// Endpoint that streams analysis events for an uploaded file.
    #[serde(default = "default_process_url")]
    pub process_url: String,
    /// Master playback volume (0.0-1.0).
    #[serde(default = "default_volume")]
    pub volume: f32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            upload_url: default_upload_url(),
            process_url: default_process_url(),
            volume: default_volume(),
        }
    }
}

fn default_upload_url() -> String {
    "http://localhost:3000/api/upload".to_string()
}

fn default_process_url() -> String {
    "http://localhost:8000/api/process-audio".to_string()
}

fn default_volume() -> f32 {
    1.0
}

/// Errors that can occur while loading or saving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to resolve the application directory.
    #[error(transparent)]
    AppDir(#[from] app_dirs::AppDirError),
    /// Failed to read the config file.
    #[error("Failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to write the config file.
    #[error("Failed to write config at {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to create a parent directory for the config file.
    #[error("Failed to create config directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The config file is not valid TOML.
    #[error("Failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    /// The config could not be serialized to TOML.
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    /// A configured endpoint is not a valid absolute URL.
    #[error("Invalid {field} endpoint '{value}': {source}")]
    InvalidEndpoint {
        field: &'static str,
        value: String,
        source: url::ParseError,
    },
}

impl AppConfig {
    /// Validate that both service endpoints parse as absolute URLs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_endpoint("upload_url", &self.upload_url)?;
        validate_endpoint("process_url", &self.process_url)?;
        Ok(())
    }
}

fn validate_endpoint(field: &'static str, value: &str) -> Result<(), ConfigError> {
    url::Url::parse(value).map_err(|source| ConfigError::InvalidEndpoint {
        field,
        value: value.to_string(),
        source,
    })?;
    Ok(())
}

/// Resolve the config file path inside the app root.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    Ok(app_dirs::app_root_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the config, falling back to defaults when the file does not exist.
pub fn load_or_default() -> Result<AppConfig, ConfigError> {
    let path = config_path()?;
    load_from_path(&path)
}

/// Load configuration from a specific path.
pub fn load_from_path(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config: AppConfig = toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    config.validate()?;
    Ok(config)
}

/// Persist configuration to disk, overwriting any previous contents.
pub fn save(config: &AppConfig) -> Result<(), ConfigError> {
    let path = config_path()?;
    save_to_path(config, &path)
}

/// Save configuration to a specific path, creating parent directories as needed.
pub fn save_to_path(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let text = toml::to_string_pretty(config)?;
    std::fs::write(path, text).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = load_from_path(&dir.path().join(CONFIG_FILE_NAME)).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn round_trips_through_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let config = AppConfig {
            upload_url: "http://example.com/upload".into(),
            process_url: "http://example.com/process".into(),
            volume: 0.5,
        };
        save_to_path(&config, &path).unwrap();
        let loaded = load_from_path(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "volume = 0.25\n").unwrap();
        let loaded = load_from_path(&path).unwrap();
        assert_eq!(loaded.volume, 0.25);
        assert_eq!(loaded.upload_url, AppConfig::default().upload_url);
    }

    #[test]
    fn rejects_relative_endpoint() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "upload_url = \"/api/upload\"\n").unwrap();
        let err = load_from_path(&path).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEndpoint { field, .. } if field == "upload_url"));
    }
}
