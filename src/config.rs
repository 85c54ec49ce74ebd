//! Configuration file handling for photobooth.
//!
//! Loads configuration from `~/.config/photobooth/config.toml` or a custom path.

use crate::background::DEFAULT_BACKGROUND;
use crate::session::TOTAL_SLOTS;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub strip: StripConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SessionConfig {
    pub total_slots: usize,
    pub default_background: PathBuf,
    /// Matte values at or above this are the subject
    pub mask_threshold: f32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            total_slots: TOTAL_SLOTS,
            default_background: PathBuf::from(DEFAULT_BACKGROUND),
            mask_threshold: 0.5,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StripConfig {
    /// Short-axis size of each photo
    pub baseline: u32,
    /// Frame artwork border on every side
    pub margin: u32,
    /// Space between framed photos
    pub gap: u32,
    pub frames_dir: PathBuf,
}

impl Default for StripConfig {
    fn default() -> Self {
        Self {
            baseline: 100,
            margin: 5,
            gap: 1,
            frames_dir: PathBuf::from("pictures"),
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct StoreConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl StoreConfig {
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(default_store_path)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Invalid config: {0}")]
    Invalid(String),
}

impl Config {
    /// Load configuration from a file path.
    /// Returns default config if the file doesn't exist.
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(PathBuf::from).unwrap_or_else(default_path);

        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let config = Self::from_toml(&content).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.clone(),
                source,
            },
            other => other,
        })?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.session.total_slots == 0 {
            return Err(ConfigError::Invalid("session.total_slots must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.session.mask_threshold) {
            return Err(ConfigError::Invalid(format!(
                "session.mask_threshold must be between 0.0 and 1.0, got {}",
                self.session.mask_threshold
            )));
        }
        if self.strip.baseline == 0 {
            return Err(ConfigError::Invalid("strip.baseline must be at least 1".into()));
        }
        Ok(())
    }
}

/// Get the default config file path.
pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("photobooth").join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("photobooth.toml"))
}

/// Get the default key-value store path.
pub fn default_store_path() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("photobooth").join("store.json"))
        .unwrap_or_else(|| PathBuf::from("photobooth-store.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_is_default() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.session.total_slots, 4);
        assert_eq!(config.session.mask_threshold, 0.5);
        assert_eq!(config.strip.baseline, 100);
        assert_eq!(config.strip.margin, 5);
        assert!(config.store.path.is_none());
    }

    #[test]
    fn test_partial_sections() {
        let config = Config::from_toml(
            r#"
            [session]
            mask_threshold = 0.7

            [strip]
            frames_dir = "/srv/frames"

            [store]
            path = "/tmp/booth.json"
            "#,
        )
        .unwrap();
        assert_eq!(config.session.total_slots, 4);
        assert_eq!(config.session.mask_threshold, 0.7);
        assert_eq!(config.strip.frames_dir, PathBuf::from("/srv/frames"));
        assert_eq!(config.strip.gap, 1);
        assert_eq!(config.store.resolved_path(), PathBuf::from("/tmp/booth.json"));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            Config::from_toml("[session]\ntotal_slots = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Config::from_toml("[session]\nmask_threshold = 2.0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Config::from_toml("[strip]\nbaseline = \"wide\""),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(Some(dir.path().join("absent.toml").as_path())).unwrap();
        assert_eq!(config.session.total_slots, 4);
    }

    #[test]
    fn test_load_reports_path_on_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[session\n").unwrap();
        let err = Config::load(Some(path.as_path())).unwrap_err();
        assert!(err.to_string().contains("bad.toml"));
    }
}
