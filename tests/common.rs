//! Test utilities & fixtures.
//! The catalog fixture under `tests/test-data-int` mirrors a trimmed live API response.
#![allow(dead_code)]

use amiibofinder::catalog::{CatalogEnvelope, CatalogSource};
use amiibofinder::collection::{CollectionStore, Item};
use amiibofinder::errors::{FinderError, Result};
use amiibofinder::storage::FileStore;
use amiibofinder::unlock::{EngineSettings, ImagePreloader, ManualClock, Notifier, UnlockEngine};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn fixture_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("test-data-int")
}

/// Catalog records from `catalog.json`.
pub fn fixture_catalog() -> Vec<Item> {
    let raw = std::fs::read_to_string(fixture_root().join("catalog.json")).expect("fixture");
    let envelope: CatalogEnvelope = serde_json::from_str(&raw).expect("fixture json");
    envelope.items
}

/// Catalog source that serves a fixed list, or fails while `offline` is set.
pub struct FakeCatalog {
    items: Vec<Item>,
    pub offline: AtomicBool,
    pub calls: AtomicUsize,
}

impl FakeCatalog {
    pub fn new(items: Vec<Item>) -> Self {
        Self {
            items,
            offline: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogSource for FakeCatalog {
    async fn fetch(&self) -> Result<Vec<Item>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(FinderError::Network("connect timeout".into()));
        }
        Ok(self.items.clone())
    }
}

/// Preloader that takes a fixed time and records the URLs it saw.
pub struct SlowPreloader {
    pub delay: Duration,
    pub urls: Mutex<Vec<String>>,
}

impl SlowPreloader {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            urls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ImagePreloader for SlowPreloader {
    async fn preload(&self, url: &str) {
        tokio::time::sleep(self.delay).await;
        self.urls.lock().unwrap().push(url.to_string());
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub denied: AtomicBool,
    pub sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

impl Notifier for RecordingNotifier {
    fn permission_granted(&self) -> bool {
        !self.denied.load(Ordering::SeqCst)
    }

    fn notify(&self, title: &str, body: &str) {
        self.sent
            .lock()
            .unwrap()
            .push((title.to_string(), body.to_string()));
    }
}

/// Everything an engine test needs, backed by a temp directory.
pub struct Harness {
    pub dir: tempfile::TempDir,
    pub store: Arc<FileStore>,
    pub collection: Arc<Mutex<CollectionStore>>,
    pub catalog: Arc<FakeCatalog>,
    pub clock: Arc<ManualClock>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Harness {
    pub fn new(items: Vec<Item>) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(FileStore::open(dir.path()).expect("store"));
        Self::with_store(dir, store, items, Arc::new(ManualClock::default()))
    }

    fn with_store(
        dir: tempfile::TempDir,
        store: Arc<FileStore>,
        items: Vec<Item>,
        clock: Arc<ManualClock>,
    ) -> Self {
        let collection = Arc::new(Mutex::new(CollectionStore::load(store.clone())));
        Self {
            dir,
            store,
            collection,
            catalog: Arc::new(FakeCatalog::new(items)),
            clock,
            notifier: Arc::new(RecordingNotifier::default()),
        }
    }

    /// Same data directory and clock, fresh in-memory state: a process restart.
    pub fn restart(self) -> Self {
        let Harness {
            dir, store, catalog, clock, ..
        } = self;
        let mut next = Self::with_store(dir, store, Vec::new(), clock);
        next.catalog = catalog;
        next
    }

    pub fn engine(&self) -> UnlockEngine {
        UnlockEngine::new(
            self.store.clone(),
            self.collection.clone(),
            self.catalog.clone(),
            self.clock.clone(),
            EngineSettings::default(),
        )
        .with_notifier(self.notifier.clone())
    }

    pub fn owned(&self) -> Vec<Item> {
        self.collection.lock().unwrap().items().to_vec()
    }
}
