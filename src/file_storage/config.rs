//! # Storage Configuration
//!
//! Loaded once at startup from a JSON file and shared read-only afterwards.
//! Zero-length validity windows and empty secrets are rejected here, so the
//! signer never has to fall back at call time.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::errors::{StorageError, StorageResult};

/// One year, in seconds
pub const DEFAULT_URL_EXPIRY_SECS: u64 = 31_536_000;

/// Thirty days, in milliseconds
pub const DEFAULT_SESSION_EXPIRY_MILLIS: u64 = 2_592_000_000;

/// Filesystem storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// First segment of every signed URI
    pub bucket_name: String,

    /// Second segment of every signed URI
    pub storage_folder_name: String,

    /// Directory all keys resolve under
    pub storage_root_path: PathBuf,

    /// Shared with the verifier that serves signed URLs
    pub shared_secret: String,

    /// Validity window for non-session URLs (default: one year)
    #[serde(default = "default_url_expiry")]
    pub general_url_expiry_seconds: u64,

    /// Validity window for session URLs (default: 30 days)
    #[serde(default = "default_session_expiry")]
    pub session_absolute_expiry_millis: u64,
}

fn default_url_expiry() -> u64 {
    DEFAULT_URL_EXPIRY_SECS
}

fn default_session_expiry() -> u64 {
    DEFAULT_SESSION_EXPIRY_MILLIS
}

impl StorageConfig {
    /// Create a config with default windows
    pub fn new(
        bucket_name: impl Into<String>,
        storage_folder_name: impl Into<String>,
        storage_root_path: impl Into<PathBuf>,
        shared_secret: impl Into<String>,
    ) -> Self {
        Self {
            bucket_name: bucket_name.into(),
            storage_folder_name: storage_folder_name.into(),
            storage_root_path: storage_root_path.into(),
            shared_secret: shared_secret.into(),
            general_url_expiry_seconds: default_url_expiry(),
            session_absolute_expiry_millis: default_session_expiry(),
        }
    }

    /// Load and validate configuration from a JSON file
    pub fn load(path: &Path) -> StorageResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            StorageError::InvalidConfig(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let config: StorageConfig = serde_json::from_str(&content)
            .map_err(|e| StorageError::InvalidConfig(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Reject configurations that would weaken signed URLs or misroute keys
    pub fn validate(&self) -> StorageResult<()> {
        for (field, value) in [
            ("bucket_name", &self.bucket_name),
            ("storage_folder_name", &self.storage_folder_name),
        ] {
            if value.is_empty() {
                return Err(StorageError::InvalidConfig(format!("{} must not be empty", field)));
            }
            if value.contains('/') {
                return Err(StorageError::InvalidConfig(format!(
                    "{} must be a single path segment: '{}'",
                    field, value
                )));
            }
        }

        if self.storage_root_path.as_os_str().is_empty() {
            return Err(StorageError::InvalidConfig(
                "storage_root_path must not be empty".into(),
            ));
        }

        if self.shared_secret.is_empty() {
            return Err(StorageError::InvalidConfig("shared_secret must not be empty".into()));
        }

        if self.general_url_expiry_seconds == 0 {
            return Err(StorageError::InvalidConfig(
                "general_url_expiry_seconds must be > 0".into(),
            ));
        }

        // Session windows are signed in whole seconds
        if self.session_absolute_expiry_millis < 1000 {
            return Err(StorageError::InvalidConfig(
                "session_absolute_expiry_millis must be >= 1000".into(),
            ));
        }

        Ok(())
    }

    /// Validity window for session URLs, in whole seconds
    pub fn session_window_secs(&self) -> u64 {
        self.session_absolute_expiry_millis / 1000
    }

    /// Validity window for all other URLs, in whole seconds
    pub fn general_window_secs(&self) -> u64 {
        self.general_url_expiry_seconds
    }
}
