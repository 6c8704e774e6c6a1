//! config::schema
//!
//! The persisted preferences schema.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Synchronization preferences.
///
/// All fields are optional in the file; accessor methods apply defaults.
/// The `password` field holds the remote password encrypted with
/// [`crate::secrets::encrypt_secret`] when `password_encrypted` is set,
/// or the raw value otherwise (discouraged, but the user's choice).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncPreferences {
    /// Master switch for synchronization.
    pub enabled: Option<bool>,

    /// Gate pushes behind a call-count frequency.
    pub frequency_gating: Option<bool>,

    /// Number of synchronize requests per actual push.
    pub push_frequency: Option<i32>,

    /// Remote username (HTTPS transports).
    pub username: Option<String>,

    /// Remote password, base64-encoded ciphertext when encrypted.
    pub password: Option<String>,

    /// Whether `password` is encrypted with a runtime key phrase.
    pub password_encrypted: Option<bool>,

    /// Directory holding the SSH private key.
    pub ssh_key_dir: Option<PathBuf>,

    /// Whether the SSH key requires a passphrase.
    pub ssh_key_encrypted: Option<bool>,

    /// Remote name to pull from and push to.
    pub remote: Option<String>,
}

impl SyncPreferences {
    /// Check whether synchronization is enabled. Defaults to `false`.
    pub fn enabled(&self) -> bool {
        self.enabled.unwrap_or(false)
    }

    /// Check whether frequency gating is enabled. Defaults to `false`
    /// (synchronize on every request).
    pub fn frequency_gating(&self) -> bool {
        self.frequency_gating.unwrap_or(false)
    }

    /// The configured push frequency. Defaults to 1.
    pub fn push_frequency(&self) -> i32 {
        self.push_frequency.unwrap_or(1)
    }

    /// The remote username. Defaults to the empty string.
    pub fn username(&self) -> &str {
        self.username.as_deref().unwrap_or("")
    }

    /// The stored password, if any.
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Whether the stored password is encrypted.
    pub fn password_encrypted(&self) -> bool {
        self.password_encrypted.unwrap_or(false)
    }

    /// The SSH key directory, if configured.
    pub fn ssh_key_dir(&self) -> Option<&Path> {
        self.ssh_key_dir.as_deref()
    }

    /// Whether the SSH key requires a passphrase.
    pub fn ssh_key_encrypted(&self) -> bool {
        self.ssh_key_encrypted.unwrap_or(false)
    }

    /// The remote name. Defaults to `origin`.
    pub fn remote(&self) -> &str {
        self.remote.as_deref().unwrap_or("origin")
    }

    /// Validate loaded preferences.
    ///
    /// Note that `push_frequency <= 0` is accepted here: an invalid
    /// frequency is a runtime policy violation surfaced by the throttle,
    /// not a parse error.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(remote) = &self.remote {
            if remote.is_empty() {
                return Err(ConfigError::InvalidValue(
                    "remote name cannot be empty".into(),
                ));
            }
        }

        Ok(())
    }
}
