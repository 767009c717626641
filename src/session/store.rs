//! Client-side session storage
//!
//! A small key/value store holding serialized records. Writes replace the
//! whole value: a reader sees either the previous record or the new one,
//! never a mix. Concurrent handshakes therefore race only on which record
//! lands last.

use crate::models::SessionRecord;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use uuid::Uuid;

/// Well-known storage keys
pub mod keys {
    /// Serialized [`crate::models::SessionRecord`] of the logged-in user
    pub const USER: &str = "user";
}

#[derive(Debug)]
pub enum StoreError {
    /// Keys are restricted to `[A-Za-z0-9_-]`
    InvalidKey(String),
    Io(io::Error),
    /// A stored value could not be decoded
    Corrupt(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::InvalidKey(key) => write!(f, "Invalid storage key: {key}"),
            StoreError::Io(err) => write!(f, "Session storage I/O failed: {err}"),
            StoreError::Corrupt(msg) => write!(f, "Stored session is corrupt: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for StoreError {
    fn from(err: io::Error) -> Self {
        StoreError::Io(err)
    }
}

pub trait SessionStore: Send + Sync {
    /// Replace the value stored under `key`
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or the value cannot be written
    fn write(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// # Errors
    ///
    /// Returns an error if the key is invalid or the backing storage fails
    fn read(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Remove `key`; removing a missing key is not an error
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or the backing storage fails
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

fn validate_key(key: &str) -> Result<(), StoreError> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}

/// Process-local store
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryStore {
    fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        validate_key(key)?;
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        validate_key(key)?;
        Ok(self
            .values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        validate_key(key)?;
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}

/// One JSON file per key inside a directory
///
/// Values are written to a uniquely named temporary file and renamed into
/// place, so a crash mid-write leaves the previous record intact.
#[derive(Debug, Clone)]
pub struct FileStore {
    directory: PathBuf,
}

impl FileStore {
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        validate_key(key)?;
        Ok(self.directory.join(format!("{key}.json")))
    }
}

impl SessionStore for FileStore {
    fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.directory)?;

        let temp_path = self
            .directory
            .join(format!(".{key}.{}.tmp", Uuid::new_v4().simple()));
        if let Err(err) =
            fs::write(&temp_path, value).and_then(|()| fs::rename(&temp_path, &path))
        {
            let _ = fs::remove_file(&temp_path);
            return Err(err.into());
        }
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(path) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// Replace the stored user record
///
/// # Errors
///
/// Returns an error if the record cannot be serialized or written
pub fn persist_user(store: &dyn SessionStore, record: &SessionRecord) -> Result<(), StoreError> {
    let serialized = record
        .to_json()
        .map_err(|e| StoreError::Corrupt(e.to_string()))?;
    store.write(keys::USER, &serialized)
}

/// The logged-in user, if any
///
/// # Errors
///
/// Returns an error if the storage fails or the stored value is not JSON
pub fn current_user(store: &dyn SessionStore) -> Result<Option<SessionRecord>, StoreError> {
    store
        .read(keys::USER)?
        .map(|raw| SessionRecord::from_json(&raw).map_err(|e| StoreError::Corrupt(e.to_string())))
        .transpose()
}

/// Whether a user record is stored
///
/// # Errors
///
/// Returns an error if the storage fails
pub fn is_logged_in(store: &dyn SessionStore) -> Result<bool, StoreError> {
    Ok(store.read(keys::USER)?.is_some())
}

/// Forget the logged-in user
///
/// # Errors
///
/// Returns an error if the storage fails
pub fn logout(store: &dyn SessionStore) -> Result<(), StoreError> {
    store.remove(keys::USER)
}
