//! Harness configuration
//!
//! Where the external module lives and how to host it. Stored as JSON in the
//! platform config directory; missing fields fall back to defaults.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use shelves_python_bridge::ModuleSpec;
use thiserror::Error;

const CONFIG_FILE_NAME: &str = "harness.json";

/// Errors that can occur during config operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
}

/// Result type for config operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// How the module is run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostKind {
    /// Child interpreter talking JSON lines over stdio
    #[default]
    Process,
    /// CPython embedded in this process (needs the `embedded` feature)
    Embedded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Module location and constructor flag
    pub module: ModuleSpec,
    pub host: HostKind,
    /// Interpreter used by the process host
    pub python: PathBuf,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            module: ModuleSpec::default(),
            host: HostKind::Process,
            python: PathBuf::from("python3"),
        }
    }
}

impl HarnessConfig {
    /// `<config dir>/harness.json`, if the platform has a config directory
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("io.github", "shelves", "shelves-harness")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    /// Load config from file.
    ///
    /// Returns error if file doesn't exist.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Load config from file, writing the defaults if it doesn't exist.
    pub fn load_or_create(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            return Self::load(path);
        }
        let config = Self::default();
        config.save(path)?;
        Ok(config)
    }

    /// Save atomically (write to temp file, then rename).
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        let temp_path = path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(content.as_bytes())?;
            file.write_all(b"\n")?;
            file.sync_all()?;
        }
        fs::rename(&temp_path, path)?;
        Ok(())
    }
}
