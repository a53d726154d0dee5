//! Durable storage for the session token.
//!
//! Exactly one record is kept, under a fixed key. It survives restarts and
//! is cleared on logout, wallet disconnect and revocation.
//!
//! The record is JSON:
//!
//! ```json
//! {"access_token": "...", "wallet_address": "0x...", "expires_at": 1735689600}
//! ```

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{StorageBackend, StorageConfig};

/// Errors from token storage backends.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    /// Filesystem failure.
    #[error("token storage I/O error at {path}: {source}")]
    Io {
        /// Path involved.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// OS keyring failure.
    #[error("keyring error: {message}")]
    Keyring {
        /// Error description.
        message: String,
    },

    /// The stored record could not be decoded.
    #[error("stored session record is corrupt: {message}")]
    Corrupt {
        /// Decoder error description.
        message: String,
    },
}

/// The persisted part of a session.
#[derive(Debug, Clone)]
pub struct PersistedSession {
    /// Bearer token.
    pub access_token: SecretString,
    /// Address the token was issued for.
    pub wallet_address: String,
    /// Token expiry.
    pub expires_at: Option<DateTime<Utc>>,
}

impl PersistedSession {
    /// Whether the token expired at or before `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expiry| expiry <= now)
    }

    fn encode(&self) -> Result<String, StorageError> {
        let record = StoredRecord {
            access_token: self.access_token.expose_secret().to_string(),
            wallet_address: self.wallet_address.clone(),
            expires_at: self.expires_at.map(|expiry| expiry.timestamp()),
        };
        serde_json::to_string(&record).map_err(|error| StorageError::Corrupt {
            message: error.to_string(),
        })
    }

    fn decode(raw: &str) -> Result<Self, StorageError> {
        let record: StoredRecord =
            serde_json::from_str(raw).map_err(|error| StorageError::Corrupt {
                message: error.to_string(),
            })?;
        if record.access_token.is_empty() {
            return Err(StorageError::Corrupt {
                message: "empty access_token".to_string(),
            });
        }
        Ok(Self {
            access_token: SecretString::from(record.access_token),
            wallet_address: record.wallet_address,
            expires_at: record
                .expires_at
                .and_then(|secs| DateTime::from_timestamp(secs, 0)),
        })
    }
}

#[derive(Serialize, Deserialize)]
struct StoredRecord {
    access_token: String,
    wallet_address: String,
    #[serde(default)]
    expires_at: Option<i64>,
}

/// A single-slot durable store for the session token.
pub trait TokenStorage: Send + Sync {
    /// Reads the stored record, `None` if nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails or the record is corrupt.
    fn load(&self) -> Result<Option<PersistedSession>, StorageError>;

    /// Replaces the stored record.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn save(&self, session: &PersistedSession) -> Result<(), StorageError>;

    /// Removes the stored record. Removing an absent record succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn clear(&self) -> Result<(), StorageError>;

    /// Returns the backend name for logging.
    fn name(&self) -> &'static str;
}

/// Builds the backend selected by `config`.
#[must_use]
pub fn storage_from_config(config: &StorageConfig) -> Arc<dyn TokenStorage> {
    match config.backend {
        StorageBackend::File => Arc::new(FileTokenStorage::new(
            config.state_dir.join(format!("{}.json", config.token_key)),
        )),
        StorageBackend::Keyring => Arc::new(KeyringTokenStorage::new(
            config.keyring_service.clone(),
            config.token_key.clone(),
        )),
    }
}

/// Stores the record as a JSON file, written atomically with mode 0600.
#[derive(Debug, Clone)]
pub struct FileTokenStorage {
    path: PathBuf,
}

impl FileTokenStorage {
    /// Creates a store at `path`. Parent directories are created on save.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the record.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl TokenStorage for FileTokenStorage {
    fn load(&self) -> Result<Option<PersistedSession>, StorageError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => PersistedSession::decode(&raw).map(Some),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(self.io_error(error)),
        }
    }

    fn save(&self, session: &PersistedSession) -> Result<(), StorageError> {
        let encoded = session.encode()?;
        let dir = self
            .path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir).map_err(|error| self.io_error(error))?;

        // Random temp name in the same directory, then rename over the target.
        let mut named_temp =
            tempfile::NamedTempFile::new_in(dir).map_err(|error| self.io_error(error))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            named_temp
                .as_file()
                .set_permissions(fs::Permissions::from_mode(0o600))
                .map_err(|error| self.io_error(error))?;
        }

        named_temp
            .as_file_mut()
            .write_all(encoded.as_bytes())
            .map_err(|error| self.io_error(error))?;
        named_temp
            .as_file()
            .sync_all()
            .map_err(|error| self.io_error(error))?;
        named_temp
            .persist(&self.path)
            .map_err(|error| self.io_error(error.error))?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(self.io_error(error)),
        }
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

/// Stores the record in the OS keyring.
#[derive(Debug, Clone)]
pub struct KeyringTokenStorage {
    service: String,
    account: String,
}

impl KeyringTokenStorage {
    /// Creates a store for `service`/`account`.
    #[must_use]
    pub const fn new(service: String, account: String) -> Self {
        Self { service, account }
    }

    fn entry(&self) -> Result<keyring::Entry, StorageError> {
        keyring::Entry::new(&self.service, &self.account).map_err(|error| StorageError::Keyring {
            message: error.to_string(),
        })
    }
}

impl TokenStorage for KeyringTokenStorage {
    fn load(&self) -> Result<Option<PersistedSession>, StorageError> {
        match self.entry()?.get_password() {
            Ok(raw) => PersistedSession::decode(&raw).map(Some),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(StorageError::Keyring {
                message: error.to_string(),
            }),
        }
    }

    fn save(&self, session: &PersistedSession) -> Result<(), StorageError> {
        let encoded = session.encode()?;
        self.entry()?
            .set_password(&encoded)
            .map_err(|error| StorageError::Keyring {
                message: error.to_string(),
            })?;

        // A keyring build without a platform store accepts writes into a
        // per-entry mock; read back through a new entry to catch that.
        match self.entry()?.get_password() {
            Ok(stored) if stored == encoded => Ok(()),
            Ok(_) | Err(keyring::Error::NoEntry) => Err(StorageError::Keyring {
                message: format!(
                    "credential store did not retain the entry for {}/{}",
                    self.service, self.account
                ),
            }),
            Err(error) => Err(StorageError::Keyring {
                message: error.to_string(),
            }),
        }
    }

    fn clear(&self) -> Result<(), StorageError> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(StorageError::Keyring {
                message: error.to_string(),
            }),
        }
    }

    fn name(&self) -> &'static str {
        "keyring"
    }
}

/// In-process store for tests and embedding.
///
/// Keeps the encoded record so the same (de)serialization path as the
/// durable backends is exercised.
#[derive(Debug, Default)]
pub struct MemoryTokenStorage {
    slot: Mutex<Option<String>>,
    clears: Mutex<u64>,
}

impl MemoryTokenStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-loaded with `session`.
    #[must_use]
    pub fn with_session(session: &PersistedSession) -> Self {
        let storage = Self::new();
        *storage.slot.lock().unwrap_or_else(PoisonError::into_inner) = session.encode().ok();
        storage
    }

    /// Whether a record is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Number of `clear` calls so far.
    #[must_use]
    pub fn clear_count(&self) -> u64 {
        *self.clears.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TokenStorage for MemoryTokenStorage {
    fn load(&self) -> Result<Option<PersistedSession>, StorageError> {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.as_deref().map(PersistedSession::decode).transpose()
    }

    fn save(&self, session: &PersistedSession) -> Result<(), StorageError> {
        let encoded = session.encode()?;
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(encoded);
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
        *self.clears.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
