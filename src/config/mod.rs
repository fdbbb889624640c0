//! Configuration module
//!
//! Stand connection defaults and the shell's saved settings

use crate::core::port::PortConfig;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Get the application configuration directory
pub fn config_dir() -> Option<PathBuf> {
    ProjectDirs::from("com", "pinroute", "Pinroute").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Saved shell settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Port used when the shell is started without `--port`
    pub default_port: Option<String>,
    /// Serial parameters for the stand link
    pub serial: PortConfig,
}

impl AppConfig {
    /// Load config from the default location, falling back to defaults
    /// when no file exists
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        match config_dir() {
            Some(dir) => Self::load_from(&dir.join("config.toml")),
            None => Ok(Self::default()),
        }
    }

    /// Load config from an explicit path
    pub fn load_from(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        let dir = config_dir().ok_or("could not determine config directory")?;
        std::fs::create_dir_all(&dir)?;
        self.save_to(&dir.join("config.toml"))
    }

    /// Save config to an explicit path
    pub fn save_to(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }
}
