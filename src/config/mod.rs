//! config
//!
//! Preference loading and persistence.
//!
//! # Locations
//!
//! Searched in order:
//! 1. `$BIBSYNC_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/bibsync/config.toml`
//! 3. `~/.bibsync/config.toml` (canonical write location)
//!
//! Missing files are not an error; defaults apply. Writes are atomic
//! (temp file + rename) so a crash cannot leave a half-written file.

pub mod schema;

pub use schema::SyncPreferences;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors from preference operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read preferences file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse preferences file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("failed to write preferences file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid preference value: {0}")]
    InvalidValue(String),

    #[error("home directory not found")]
    NoHomeDir,
}

impl SyncPreferences {
    /// Load preferences from the standard locations.
    ///
    /// # Errors
    ///
    /// Returns an error if a preferences file exists but cannot be parsed
    /// or fails validation. A missing file yields defaults.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var("BIBSYNC_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Self::load_from(&path);
            }
        }

        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("bibsync/config.toml");
            if path.exists() {
                return Self::load_from(&path);
            }
        }

        if let Some(home) = dirs::home_dir() {
            let path = home.join(".bibsync/config.toml");
            if path.exists() {
                return Self::load_from(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load preferences from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let prefs: Self = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        prefs.validate()?;
        Ok(prefs)
    }

    /// Write preferences to the canonical location.
    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = Self::canonical_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Write preferences to an explicit path, atomically.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
                path: path.to_path_buf(),
                source: e,
            })?;
        }

        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

        let temp_path = path.with_extension("toml.tmp");
        let mut file = fs::File::create(&temp_path).map_err(|e| ConfigError::WriteError {
            path: temp_path.clone(),
            source: e,
        })?;

        file.write_all(contents.as_bytes())
            .map_err(|e| ConfigError::WriteError {
                path: temp_path.clone(),
                source: e,
            })?;

        file.sync_all().map_err(|e| ConfigError::WriteError {
            path: temp_path.clone(),
            source: e,
        })?;

        fs::rename(&temp_path, path).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(())
    }

    /// The canonical preferences path, `~/.bibsync/config.toml`.
    pub fn canonical_path() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(".bibsync/config.toml"))
    }
}
