use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use keyring::Entry;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::Credential;

/// Fixed key the credential is stored under, in every backend
pub const TOKEN_KEY: &str = "token";

/// Keychain service name
const SERVICE_NAME: &str = "taskdo";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Token file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Token file is corrupt: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Keychain access failed: {0}")]
    Keyring(#[from] keyring::Error),
}

/// Durable home for the session credential.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Result<Option<Credential>, StorageError>;

    fn save(&self, credential: &Credential) -> Result<(), StorageError>;

    /// Removing an entry that does not exist is not an error
    fn clear(&self) -> Result<(), StorageError>;
}

// ============================================================================
// File
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct StoredToken {
    token: Credential,
    saved_at: DateTime<Utc>,
}

/// Stores the credential as `token.json` in a directory.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    dir: PathBuf,
}

impl FileTokenStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", TOKEN_KEY))
    }

    /// Open for writing with owner-only permissions from creation on.
    #[cfg(unix)]
    fn open_private(path: &Path) -> std::io::Result<File> {
        use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)?;
        // `mode` only applies to new files
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
        Ok(file)
    }

    #[cfg(not(unix))]
    fn open_private(path: &Path) -> std::io::Result<File> {
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<Credential>, StorageError> {
        let path = self.path();
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let stored: StoredToken = serde_json::from_str(&contents)?;
        debug!(saved_at = %stored.saved_at, "Loaded token file");
        Ok(Some(stored.token))
    }

    fn save(&self, credential: &Credential) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.dir)?;
        let stored = StoredToken {
            token: credential.clone(),
            saved_at: Utc::now(),
        };
        let contents = serde_json::to_string_pretty(&stored)?;
        let mut file = Self::open_private(&self.path())?;
        file.write_all(contents.as_bytes())?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        match std::fs::remove_file(self.path()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// OS keychain
// ============================================================================

/// Stores the credential in the OS keychain, account `token`.
#[derive(Debug, Clone)]
pub struct KeyringTokenStore {
    service: String,
}

impl Default for KeyringTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyringTokenStore {
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    /// Use a keychain service other than `taskdo`
    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    fn entry(&self) -> Result<Entry, StorageError> {
        Ok(Entry::new(&self.service, TOKEN_KEY)?)
    }
}

impl TokenStore for KeyringTokenStore {
    fn load(&self) -> Result<Option<Credential>, StorageError> {
        match self.entry()?.get_password() {
            Ok(token) => Ok(Credential::new(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, credential: &Credential) -> Result<(), StorageError> {
        self.entry()?.set_password(credential.as_str())?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// Memory
// ============================================================================

/// Process-local store. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenStore {
    slot: Arc<Mutex<Option<Credential>>>,
}

impl MemoryTokenStore {
    pub fn with_credential(credential: Credential) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(credential))),
        }
    }

    /// Current stored value, for inspection
    pub fn current(&self) -> Option<Credential> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<Credential>, StorageError> {
        Ok(self.current())
    }

    fn save(&self, credential: &Credential) -> Result<(), StorageError> {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(credential.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential(token: &str) -> Credential {
        Credential::new(token).expect("non-empty token")
    }

    #[test]
    fn test_file_store_missing_file_is_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileTokenStore::new(dir.path().join("nested"));
        assert!(store.load().expect("load").is_none());
        // Clearing when nothing was saved is fine
        store.clear().expect("clear");
    }

    #[test]
    fn test_file_store_save_load_clear() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileTokenStore::new(dir.path().join("taskdo"));

        store.save(&credential("abc123")).expect("save");
        assert!(store.path().exists());
        assert_eq!(store.load().expect("load"), Some(credential("abc123")));

        store.save(&credential("def456")).expect("overwrite");
        assert_eq!(store.load().expect("load"), Some(credential("def456")));

        store.clear().expect("clear");
        assert!(!store.path().exists());
        assert!(store.load().expect("load").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_file_store_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileTokenStore::new(dir.path());
        store.save(&credential("abc123")).expect("save");

        let mode = std::fs::metadata(store.path()).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn test_file_store_tightens_existing_file() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileTokenStore::new(dir.path());
        std::fs::write(store.path(), "{}").expect("write");
        std::fs::set_permissions(store.path(), std::fs::Permissions::from_mode(0o644))
            .expect("chmod");

        store.save(&credential("abc123")).expect("save");
        let mode = std::fs::metadata(store.path()).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(store.load().expect("load"), Some(credential("abc123")));
    }

    #[test]
    fn test_file_store_corrupt_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileTokenStore::new(dir.path());
        std::fs::write(store.path(), "{not json").expect("write");
        assert!(matches!(store.load(), Err(StorageError::Json(_))));

        std::fs::write(store.path(), r#"{"token":"","saved_at":"2024-01-01T00:00:00Z"}"#)
            .expect("write");
        assert!(matches!(store.load(), Err(StorageError::Json(_))));
    }

    #[test]
    fn test_keyring_store_service() {
        assert_eq!(KeyringTokenStore::new().service(), "taskdo");
        assert_eq!(KeyringTokenStore::with_service("taskdo-dev").service(), "taskdo-dev");
    }

    /// Needs a reachable OS keychain; returns early on hosts without one.
    #[test]
    fn test_keyring_store_persists_across_instances() {
        let service = format!("taskdo-test-{}", std::process::id());
        let store = KeyringTokenStore::with_service(service.as_str());

        match store.save(&credential("abc123")) {
            Ok(()) => {}
            Err(StorageError::Keyring(
                keyring::Error::NoStorageAccess(_) | keyring::Error::PlatformFailure(_),
            )) => {
                eprintln!("skipping: no OS keychain available");
                return;
            }
            Err(e) => panic!("save failed: {}", e),
        }

        // A fresh instance reads what the first one wrote
        let reopened = KeyringTokenStore::with_service(service.as_str());
        assert_eq!(reopened.load().expect("load"), Some(credential("abc123")));

        reopened.clear().expect("clear");
        assert!(store.load().expect("load").is_none());
        // Clearing twice is fine
        store.clear().expect("clear again");
    }

    #[test]
    fn test_memory_store_clones_share_slot() {
        let store = MemoryTokenStore::default();
        let other = store.clone();
        store.save(&credential("abc123")).expect("save");
        assert_eq!(other.current(), Some(credential("abc123")));
        other.clear().expect("clear");
        assert!(store.load().expect("load").is_none());
    }
}
