//! Client configuration parsing and management.
//!
//! Configuration is read from a TOML file (`sleuth.toml` by default). Every
//! field has a default, so an empty file or no file at all yields a working
//! configuration pointing at a local backend.
//!
//! The API base URL may be overridden with the `SLEUTH_API_URL` environment
//! variable; see [`ClientConfig::apply_env`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Environment variable overriding [`ClientConfig::api_base_url`].
pub const API_URL_ENV: &str = "SLEUTH_API_URL";

/// Default backend location.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

/// Default request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 40;

/// Default display window for transient notifications in seconds.
pub const DEFAULT_NOTIFICATION_SECS: u64 = 3;

/// Default storage key holding the persisted session token.
pub const DEFAULT_TOKEN_KEY: &str = "session_token";

/// Top-level client configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientConfig {
    /// Backend base URL, without a trailing slash.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Timeout applied to every outbound request.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// How long a submission notification stays visible.
    #[serde(default = "default_notification_secs")]
    pub notification_secs: u64,

    /// Path to the static case catalog (JSON array).
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,

    /// Session token persistence.
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            notification_secs: default_notification_secs(),
            catalog_path: None,
            storage: StorageConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_toml(&content)
    }

    /// Load configuration from `path` if it exists, defaults otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or a value fails validation.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Apply environment overrides.
    #[must_use]
    pub fn apply_env(self) -> Self {
        self.with_api_url_override(std::env::var(API_URL_ENV).ok())
    }

    /// Replace the API base URL when `value` is a non-empty string.
    #[must_use]
    pub fn with_api_url_override(mut self, value: Option<String>) -> Self {
        if let Some(url) = value.filter(|url| !url.trim().is_empty()) {
            self.api_base_url = url;
        }
        self
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] for an empty base URL, a zero
    /// timeout, or an empty token key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_base_url.trim().is_empty() {
            return Err(ConfigError::Validation(
                "api_base_url must not be empty".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.storage.token_key.trim().is_empty() {
            return Err(ConfigError::Validation(
                "storage.token_key must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Base URL with any trailing slash removed.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.api_base_url.trim_end_matches('/')
    }

    /// Request timeout as a [`Duration`].
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Notification display window as a [`Duration`].
    #[must_use]
    pub const fn notification_window(&self) -> Duration {
        Duration::from_secs(self.notification_secs)
    }
}

/// Where the session token is persisted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// JSON file under [`StorageConfig::state_dir`].
    #[default]
    File,
    /// OS keyring entry.
    Keyring,
}

/// Token storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageConfig {
    /// Storage backend.
    #[serde(default)]
    pub backend: StorageBackend,

    /// Fixed key the token is stored under (file stem or keyring account).
    #[serde(default = "default_token_key")]
    pub token_key: String,

    /// Directory for file-backed storage.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    /// Keyring service name.
    #[serde(default = "default_keyring_service")]
    pub keyring_service: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            token_key: default_token_key(),
            state_dir: default_state_dir(),
            keyring_service: default_keyring_service(),
        }
    }
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

const fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

const fn default_notification_secs() -> u64 {
    DEFAULT_NOTIFICATION_SECS
}

fn default_token_key() -> String {
    DEFAULT_TOKEN_KEY.to_string()
}

fn default_keyring_service() -> String {
    "sleuth.session".to_string()
}

fn default_state_dir() -> PathBuf {
    // ${XDG_STATE_HOME}/sleuth, falling back to ~/.local/state/sleuth
    if let Ok(dir) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(dir).join("sleuth");
    }
    std::env::var("HOME").map_or_else(
        |_| PathBuf::from("/tmp/sleuth"),
        |home| PathBuf::from(home).join(".local/state/sleuth"),
    )
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// I/O error reading configuration file.
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Validation error.
    #[error("configuration validation failed: {0}")]
    Validation(String),
}
