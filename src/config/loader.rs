//! Configuration Loader
//!
//! Finds and parses the rotation configuration file.

use crate::config::provider::RotationConfig;
use crate::error::{Result, RotationError};
use std::path::{Path, PathBuf};

/// Configuration loader with support for multiple locations
pub struct ConfigLoader {
    config: RotationConfig,
    source: Option<PathBuf>,
}

impl ConfigLoader {
    /// Load from the first default location that exists.
    ///
    /// Falls back to an empty configuration when no file is found.
    pub fn new() -> Result<Self> {
        let _ = dotenvy::dotenv();

        for path in Self::get_config_paths() {
            if path.exists() {
                return Self::from_path(path);
            }
        }

        tracing::debug!("no rotation config file found, using empty configuration");
        Ok(Self {
            config: RotationConfig::default(),
            source: None,
        })
    }

    /// Create a loader with a specific config file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            RotationError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let config = Self::parse(&content).map_err(|e| {
            RotationError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        tracing::debug!(
            path = %path.display(),
            providers = config.providers.len(),
            "loaded rotation config"
        );

        Ok(Self {
            config,
            source: Some(path.to_path_buf()),
        })
    }

    /// Create a loader from JSON text
    pub fn from_json(content: &str) -> Result<Self> {
        Ok(Self {
            config: Self::parse(content)?,
            source: None,
        })
    }

    fn parse(content: &str) -> Result<RotationConfig> {
        let mut config: RotationConfig = serde_json::from_str(content)?;
        config.resolve_env();
        Ok(config)
    }

    /// Get list of config paths to check
    fn get_config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        // 1. Environment variable
        if let Ok(custom_path) = std::env::var("KEYROTOR_CONFIG") {
            paths.push(PathBuf::from(custom_path));
        }

        // 2. Current directory
        paths.push(PathBuf::from("keyrotor.json"));

        // 3. User config directory
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("keyrotor").join("config.json"));
        }

        // 4. Home directory
        if let Some(home_dir) = dirs::home_dir() {
            paths.push(home_dir.join(".keyrotor").join("config.json"));
        }

        paths
    }

    /// File the configuration came from, if any
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &RotationConfig {
        &self.config
    }

    /// Take ownership of the configuration
    pub fn into_config(self) -> RotationConfig {
        self.config
    }
}
