//! # Storage Module - Persisted Key-Value Store
//!
//! Every piece of durable state (the owned collection, the cooldown timestamp,
//! the notification flag and the catalog cache) lives behind a small string
//! key-value interface. Values are whole serialized blobs; every write is a
//! full-value, last-writer-wins overwrite.
//!
//! ## Backends
//!
//! - [`FileStore`] - one file per key under a data directory, written via a
//!   temp file + rename so a crash never leaves a half-written value
//! - [`MemoryStore`] - process-local map for tests and offline harnesses
//!
//! ## Layout
//!
//! ```text
//! data/
//! ├── .store.lock                 ← advisory lock shared by all keys
//! ├── amiiboFinderUserList.json   ← owned collection
//! ├── amiiboFinderFullList.json   ← cached catalog
//! ├── lastUnlockTime.json         ← epoch millis of last unlock
//! └── amiiboNotificationSent.json ← "true" / "false"
//! ```
//!
//! Key names are part of the on-disk format; renaming one orphans user data.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::errors::Result;
use log::warn;
use serde::de::DeserializeOwned;

/// Serialized owned collection (JSON array of items).
pub const KEY_COLLECTION: &str = "amiiboFinderUserList";
/// Epoch milliseconds of the last successful unlock.
pub const KEY_LAST_UNLOCK: &str = "lastUnlockTime";
/// Whether the "gift ready" notification already fired for this cooldown.
pub const KEY_NOTIFICATION_SENT: &str = "amiiboNotificationSent";
/// Cached catalog (JSON array of items), kept without expiry.
pub const KEY_CATALOG_CACHE: &str = "amiiboFinderFullList";

/// Process-surviving textual key-value store.
pub trait KeyValueStore: Send + Sync {
    /// Read the blob stored under `key`, `None` when absent.
    fn get(&self, key: &str) -> Result<Option<String>>;
    /// Replace the blob stored under `key`.
    fn set(&self, key: &str, value: &str) -> Result<()>;
    /// Remove `key`; removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

/// Read and decode a JSON blob, degrading to `None` when it is absent,
/// unreadable or malformed.
pub fn read_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = match store.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            warn!("storage: unable to read {}: {}", key, e);
            return None;
        }
    };
    // Guard against accidental leading NULs from interrupted writes
    let cleaned = raw.trim_start_matches('\0');
    match serde_json::from_str(cleaned) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("storage: discarding malformed {}: {}", key, e);
            None
        }
    }
}

/// Read a plain text flag (`"true"` / anything else).
pub fn read_flag(store: &dyn KeyValueStore, key: &str) -> bool {
    match store.get(key) {
        Ok(Some(raw)) => raw.trim() == "true",
        Ok(None) => false,
        Err(e) => {
            warn!("storage: unable to read {}: {}", key, e);
            false
        }
    }
}

pub fn write_flag(store: &dyn KeyValueStore, key: &str, value: bool) -> Result<()> {
    store.set(key, if value { "true" } else { "false" })
}
