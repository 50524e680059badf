//! Single-slot persistence for the current token record.
//!
//! Every backend follows the same contract: a missing, unreadable or
//! unavailable slot reads as "no token", and writes to an unavailable
//! medium are dropped after a warning. Nothing here fails the caller.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use keyring::Entry;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::error::AuthError;
use super::token::TokenRecord;

/// File name of the token slot in the cache directory
pub const TOKEN_FILE: &str = "auth_token.json";

/// Keyring service name for the token slot
const KEYRING_SERVICE: &str = "holocron";

/// Keyring account name for the token slot
const KEYRING_KEY: &str = "authToken";

pub trait TokenStore: Send + Sync {
    /// Read the slot. Corrupt or missing data reads as `None`.
    fn load(&self) -> Option<TokenRecord>;

    /// Overwrite the slot.
    fn save(&self, record: &TokenRecord);

    /// Empty the slot. A no-op when already empty.
    fn clear(&self);
}

/// Which durable medium holds the token slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenBackend {
    #[default]
    File,
    Keyring,
}

impl TokenBackend {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "file" => Some(TokenBackend::File),
            "keyring" => Some(TokenBackend::Keyring),
            _ => None,
        }
    }
}

/// Open the configured backend, degrading to a no-op store when the
/// medium cannot be reached.
pub fn open_token_store(backend: TokenBackend, cache_dir: Option<PathBuf>) -> Arc<dyn TokenStore> {
    match backend {
        TokenBackend::File => match cache_dir {
            Some(dir) => Arc::new(FileTokenStore::new(dir)),
            None => {
                let err = AuthError::StoreUnavailable("no cache directory".to_string());
                warn!(error = %err, "Token persistence disabled");
                Arc::new(NullTokenStore)
            }
        },
        TokenBackend::Keyring => match KeyringTokenStore::new() {
            Ok(store) => Arc::new(store),
            Err(e) => {
                let err = AuthError::StoreUnavailable(e.to_string());
                warn!(error = %err, "Token persistence disabled");
                Arc::new(NullTokenStore)
            }
        },
    }
}

fn decode(contents: &str) -> Option<TokenRecord> {
    match serde_json::from_str(contents) {
        Ok(record) => Some(record),
        Err(e) => {
            let err = AuthError::StoreCorrupt(e.to_string());
            warn!(error = %err, "Ignoring stored token");
            None
        }
    }
}

// ============================================================================
// File backend
// ============================================================================

/// Stores the slot as a JSON file in the cache directory.
pub struct FileTokenStore {
    cache_dir: PathBuf,
}

impl FileTokenStore {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    pub fn path(&self) -> PathBuf {
        self.cache_dir.join(TOKEN_FILE)
    }

    fn read(path: &Path) -> Result<Option<String>> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(path).context("Failed to read token file")?;
        Ok(Some(contents))
    }

    fn write(&self, record: &TokenRecord) -> Result<()> {
        let path = self.path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create cache directory")?;
        }
        let contents = serde_json::to_string_pretty(record)?;
        std::fs::write(&path, contents).context("Failed to write token file")?;
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        let path = self.path();
        if path.exists() {
            std::fs::remove_file(&path).context("Failed to remove token file")?;
        }
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Option<TokenRecord> {
        match Self::read(&self.path()) {
            Ok(Some(contents)) => decode(&contents),
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Token file unavailable");
                None
            }
        }
    }

    fn save(&self, record: &TokenRecord) {
        if let Err(e) = self.write(record) {
            warn!(error = %e, "Failed to persist token");
        } else {
            debug!(path = ?self.path(), "Token persisted");
        }
    }

    fn clear(&self) {
        if let Err(e) = self.remove() {
            warn!(error = %e, "Failed to clear token file");
        }
    }
}

// ============================================================================
// Keyring backend
// ============================================================================

/// Stores the slot as a JSON secret in the OS keychain.
pub struct KeyringTokenStore {
    entry: Entry,
}

impl KeyringTokenStore {
    pub fn new() -> Result<Self> {
        let entry = Entry::new(KEYRING_SERVICE, KEYRING_KEY)
            .context("Failed to create keyring entry")?;
        Ok(Self { entry })
    }
}

impl TokenStore for KeyringTokenStore {
    fn load(&self) -> Option<TokenRecord> {
        match self.entry.get_password() {
            Ok(contents) => decode(&contents),
            Err(keyring::Error::NoEntry) => None,
            Err(e) => {
                warn!(error = %e, "Keychain unavailable");
                None
            }
        }
    }

    fn save(&self, record: &TokenRecord) {
        let result = serde_json::to_string(record)
            .context("Failed to encode token")
            .and_then(|json| {
                self.entry
                    .set_password(&json)
                    .context("Failed to store token in keychain")
            });
        if let Err(e) = result {
            warn!(error = %e, "Failed to persist token");
        }
    }

    fn clear(&self) {
        match self.entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => {}
            Err(e) => warn!(error = %e, "Failed to delete token from keychain"),
        }
    }
}

// ============================================================================
// In-process and no-op backends
// ============================================================================

/// Keeps the slot in memory. Lost when the process exits.
#[derive(Default)]
pub struct MemoryTokenStore {
    slot: Mutex<Option<TokenRecord>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(record: TokenRecord) -> Self {
        Self {
            slot: Mutex::new(Some(record)),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Option<TokenRecord> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn save(&self, record: &TokenRecord) {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(record.clone());
    }

    fn clear(&self) {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

/// Used when no durable medium exists. Remembers nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTokenStore;

impl TokenStore for NullTokenStore {
    fn load(&self) -> Option<TokenRecord> {
        None
    }

    fn save(&self, _record: &TokenRecord) {}

    fn clear(&self) {}
}
