//! Pluggable persistence for the session token pair.
//!
//! The store itself owns the in-memory pair; persistence is only the
//! load/save/clear hook that lets a session survive restarts. Backends are
//! injectable so the store's atomic-update contract can be tested without
//! touching a real filesystem.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from a persistence backend.
#[derive(Debug, Error)]
pub enum PersistError {
    /// Filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored tokens could not be (de)serialized.
    #[error("token serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Serializable form of the token pair.
///
/// Secrets are exposed here on purpose: this is the single canonical
/// at-rest representation (one key set, not the `access`/`access_token`
/// duplication this replaces).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedTokens {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Storage hook for the token pair.
pub trait TokenPersistence: Send + Sync {
    /// Load the persisted pair, if any.
    ///
    /// # Errors
    ///
    /// Returns `PersistError` if the backend is unreadable or corrupt.
    fn load(&self) -> Result<Option<PersistedTokens>, PersistError>;

    /// Persist the pair, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns `PersistError` if the backend cannot be written.
    fn save(&self, tokens: &PersistedTokens) -> Result<(), PersistError>;

    /// Remove any persisted pair. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns `PersistError` if the backend cannot be modified.
    fn clear(&self) -> Result<(), PersistError>;
}

/// Token persistence backed by a JSON file.
#[derive(Debug)]
pub struct FsTokenPersistence {
    path: PathBuf,
}

impl FsTokenPersistence {
    /// Create a backend persisting to `path`. Parent directories are
    /// created on first save.
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl TokenPersistence for FsTokenPersistence {
    fn load(&self) -> Result<Option<PersistedTokens>, PersistError> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, tokens: &PersistedTokens) -> Result<(), PersistError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(tokens)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), PersistError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory persistence for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryTokenPersistence {
    slot: Mutex<Option<PersistedTokens>>,
}

impl MemoryTokenPersistence {
    /// Create an empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenPersistence for MemoryTokenPersistence {
    fn load(&self) -> Result<Option<PersistedTokens>, PersistError> {
        Ok(self.slot.lock().map_or(None, |slot| slot.clone()))
    }

    fn save(&self, tokens: &PersistedTokens) -> Result<(), PersistError> {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(tokens.clone());
        }
        Ok(())
    }

    fn clear(&self) -> Result<(), PersistError> {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = None;
        }
        Ok(())
    }
}
