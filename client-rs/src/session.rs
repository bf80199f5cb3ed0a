//! Tab-scoped session id persistence
//!
//! Session ids live as long as the storage backing them. When storage is
//! unavailable (e.g. private browsing) the resolver simply omits the id.

use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

/// Storage key under which the session id is kept
pub const SESSION_KEY: &str = "video-session-id";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Session storage unavailable: {0}")]
pub struct StorageUnavailable(pub String);

/// Key/value storage scoped to one browsing session
pub trait SessionStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageUnavailable>;

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageUnavailable>;
}

/// Process-local session storage
#[derive(Debug, Default)]
pub struct MemorySessionStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for MemorySessionStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageUnavailable> {
        let items = self
            .items
            .lock()
            .map_err(|e| StorageUnavailable(e.to_string()))?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageUnavailable> {
        let mut items = self
            .items
            .lock()
            .map_err(|e| StorageUnavailable(e.to_string()))?;
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Storage that always refuses, as in privacy mode
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableSessionStorage;

impl SessionStorage for UnavailableSessionStorage {
    fn get_item(&self, _key: &str) -> Result<Option<String>, StorageUnavailable> {
        Err(StorageUnavailable("storage disabled".to_string()))
    }

    fn set_item(&self, _key: &str, _value: &str) -> Result<(), StorageUnavailable> {
        Err(StorageUnavailable("storage disabled".to_string()))
    }
}

/// Fetch the session id, creating and persisting one on first use.
///
/// Returns `None` when storage cannot be read or written.
pub fn session_id(storage: &dyn SessionStorage) -> Option<String> {
    match storage.get_item(SESSION_KEY) {
        Ok(Some(existing)) => Some(existing),
        Ok(None) => {
            let fresh = Uuid::new_v4().simple().to_string();
            match storage.set_item(SESSION_KEY, &fresh) {
                Ok(()) => Some(fresh),
                Err(e) => {
                    warn!("Could not persist session id: {}", e);
                    None
                }
            }
        }
        Err(e) => {
            warn!("Could not read session id: {}", e);
            None
        }
    }
}
