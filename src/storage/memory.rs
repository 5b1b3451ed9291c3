use super::KeyValueStore;
use crate::errors::{FinderError, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// In-process store. `fail_writes` lets tests simulate a full disk.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `set`/`remove` fail until reset.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values
            .lock()
            .expect("memory store mutex poisoned")
            .contains_key(key)
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(FinderError::Storage("write rejected".into()));
        }
        Ok(())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .values
            .lock()
            .expect("memory store mutex poisoned")
            .get(key)
            .cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.check_writable()?;
        self.values
            .lock()
            .expect("memory store mutex poisoned")
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.check_writable()?;
        self.values
            .lock()
            .expect("memory store mutex poisoned")
            .remove(key);
        Ok(())
    }
}
