//! # Unlock Engine
//!
//! Cooldown-gated acquisition of one random, not-yet-owned catalog item.
//!
//! ## States
//!
//! ```text
//!            unlock() [cooldown == 0]
//!   IDLE ─────────────────────────────▶ UNLOCKING
//!    ▲  ▲                                 │     │
//!    │  └── network failure / complete ───┘     │ success
//!    │                                          ▼
//!    └──────── tick() [cooldown reached 0] ── LOCKED
//! ```
//!
//! - A second `unlock()` while UNLOCKING is a no-op ([`UnlockOutcome::InFlight`]).
//! - `tick()` only ever moves LOCKED to IDLE and fires the "gift ready"
//!   notification; it never starts an unlock.
//! - Failed acquisitions never start the cooldown.
//!
//! ## Acquisition
//!
//! 1. Catalog from cache, else one fetch (cached forever on success)
//! 2. `available = catalog - owned`, keyed by `head + tail`
//! 3. Empty `available` → [`UnlockOutcome::CollectionComplete`]
//! 4. Uniform random pick
//! 5. Reveal delay and image preload run concurrently; both must finish
//! 6. Stamp `unlockedAt`, strip the `type` tag, persist timestamp + item,
//!    reset the notification flag. A pick that became owned during step 5
//!    writes nothing and selection restarts at step 2
//! 7. Emit [`UnlockEvent::Celebrate`]
//!
//! ## Notification policy
//!
//! The first `tick()` after the engine is created suppresses the "gift ready"
//! notification when the cooldown had already expired before the process
//! started; it marks the cycle as notified instead. Expiry observed while the
//! engine is running notifies exactly once per cooldown cycle.

pub mod clock;
pub mod cooldown;
pub mod notify;
pub mod preload;
pub mod watcher;

pub use clock::{Clock, ManualClock, SystemClock};
pub use cooldown::{format_remaining, remaining_cooldown};
pub use notify::{LogNotifier, Notifier};
pub use preload::{ImagePreloader, NoopPreloader};
pub use watcher::{spawn_cooldown_watcher, CooldownWatcher};

#[cfg(feature = "http")]
pub use preload::HttpImagePreloader;

use crate::catalog::{CatalogCache, CatalogSource};
use crate::collection::{CollectionStore, Item};
use crate::config::UnlockConfig;
use crate::metrics;
use crate::storage::{
    read_flag, write_flag, KeyValueStore, KEY_LAST_UNLOCK, KEY_NOTIFICATION_SENT,
};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use rand::seq::SliceRandom;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Minimum interval between successful unlocks.
pub const COOLDOWN_DURATION: Duration = Duration::from_secs(2 * 60 * 60);
/// Minimum reveal time, joined with the image preload.
pub const REVEAL_DELAY: Duration = Duration::from_millis(800);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockState {
    Idle,
    Locked,
    Unlocking,
}

/// Result of one `unlock()` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnlockOutcome {
    /// A new item joined the collection; cooldown started.
    Unlocked(Item),
    /// Every catalog item is already owned. Cooldown not started.
    CollectionComplete,
    /// Catalog could not be obtained. Retry is allowed immediately.
    NetworkFailure(String),
    /// Persisting the unlock failed; nothing was written.
    StorageFailure(String),
    /// Another unlock is in flight; this request did nothing.
    InFlight,
    /// Cooldown still running.
    CoolingDown(Duration),
}

/// Fire-and-forget signals for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnlockEvent {
    Celebrate(Item),
    CooldownReady,
}

/// Point-in-time view for countdown displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnlockStatus {
    pub state: UnlockState,
    pub remaining: Duration,
    pub last_unlock_at: Option<DateTime<Utc>>,
}

impl UnlockStatus {
    pub fn is_locked(&self) -> bool {
        !self.remaining.is_zero()
    }

    pub fn can_unlock(&self) -> bool {
        self.state != UnlockState::Unlocking && self.remaining.is_zero()
    }
}

/// Timing knobs; defaults are the production constants.
#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    pub cooldown: Duration,
    pub reveal_delay: Duration,
    pub image_timeout: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            cooldown: COOLDOWN_DURATION,
            reveal_delay: REVEAL_DELAY,
            image_timeout: Duration::from_secs(10),
        }
    }
}

impl From<&UnlockConfig> for EngineSettings {
    fn from(cfg: &UnlockConfig) -> Self {
        Self {
            cooldown: cfg.cooldown(),
            reveal_delay: cfg.reveal_delay(),
            image_timeout: cfg.image_timeout(),
        }
    }
}

struct Inner {
    state: UnlockState,
    first_check: bool,
}

enum CommitError {
    AlreadyOwned,
    Storage(String),
}

pub struct UnlockEngine {
    store: Arc<dyn KeyValueStore>,
    collection: Arc<Mutex<CollectionStore>>,
    catalog: CatalogCache,
    clock: Arc<dyn Clock>,
    preloader: Arc<dyn ImagePreloader>,
    notifier: Arc<dyn Notifier>,
    events: Option<mpsc::UnboundedSender<UnlockEvent>>,
    settings: EngineSettings,
    inner: Mutex<Inner>,
}

impl UnlockEngine {
    /// Build an engine over an already loaded collection. The initial state
    /// is LOCKED when a persisted cooldown is still running, IDLE otherwise.
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        collection: Arc<Mutex<CollectionStore>>,
        source: Arc<dyn CatalogSource>,
        clock: Arc<dyn Clock>,
        settings: EngineSettings,
    ) -> Self {
        let catalog = CatalogCache::new(store.clone(), source);
        let mut engine = Self {
            store,
            collection,
            catalog,
            clock,
            preloader: Arc::new(NoopPreloader),
            notifier: Arc::new(LogNotifier::default()),
            events: None,
            settings,
            inner: Mutex::new(Inner {
                state: UnlockState::Idle,
                first_check: true,
            }),
        };
        if !engine.remaining_cooldown().is_zero() {
            engine.inner.get_mut().expect("unlock state mutex poisoned").state =
                UnlockState::Locked;
        }
        engine
    }

    pub fn with_preloader(mut self, preloader: Arc<dyn ImagePreloader>) -> Self {
        self.preloader = preloader;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_events(mut self, events: mpsc::UnboundedSender<UnlockEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn collection(&self) -> Arc<Mutex<CollectionStore>> {
        self.collection.clone()
    }

    pub fn settings(&self) -> EngineSettings {
        self.settings
    }

    pub fn state(&self) -> UnlockState {
        self.lock_inner().state
    }

    pub fn last_unlock_at(&self) -> Option<DateTime<Utc>> {
        match self.store.get(KEY_LAST_UNLOCK) {
            Ok(Some(raw)) => cooldown::decode_timestamp(&raw),
            Ok(None) => None,
            Err(e) => {
                warn!("unlock: unable to read cooldown timestamp: {}", e);
                None
            }
        }
    }

    pub fn remaining_cooldown(&self) -> Duration {
        remaining_cooldown(
            self.last_unlock_at(),
            self.clock.now(),
            self.settings.cooldown,
        )
    }

    pub fn status(&self) -> UnlockStatus {
        let last_unlock_at = self.last_unlock_at();
        UnlockStatus {
            state: self.state(),
            remaining: remaining_cooldown(last_unlock_at, self.clock.now(), self.settings.cooldown),
            last_unlock_at,
        }
    }

    /// User-initiated unlock. Runs the whole acquisition to one of its
    /// terminal outcomes; there is no cancellation.
    pub async fn unlock(&self) -> UnlockOutcome {
        {
            let mut inner = self.lock_inner();
            if inner.state == UnlockState::Unlocking {
                debug!("unlock: request ignored, acquisition already in flight");
                metrics::inc_rejected_in_flight();
                return UnlockOutcome::InFlight;
            }
            let remaining = self.remaining_cooldown();
            if !remaining.is_zero() {
                inner.state = UnlockState::Locked;
                metrics::inc_rejected_cooldown();
                return UnlockOutcome::CoolingDown(remaining);
            }
            inner.state = UnlockState::Unlocking;
        }

        metrics::inc_unlock_attempts();
        let outcome = self.acquire().await;

        let next = match outcome {
            UnlockOutcome::Unlocked(_) => UnlockState::Locked,
            _ => UnlockState::Idle,
        };
        self.lock_inner().state = next;
        outcome
    }

    async fn acquire(&self) -> UnlockOutcome {
        let catalog = match self.catalog.get_or_fetch().await {
            Ok(items) => items,
            Err(e) => {
                warn!("unlock: {}", e);
                metrics::inc_network_failures();
                return UnlockOutcome::NetworkFailure(e.to_string());
            }
        };

        // The collection can change while the reveal is pending (an import,
        // another handle on the same store), so a pick that turns out to be
        // owned at commit time is discarded and selection runs again.
        loop {
            let pick = {
                let owned = self.lock_collection().owned_ids();
                let available: Vec<&Item> = catalog
                    .iter()
                    .filter(|item| !owned.contains(&item.id()))
                    .collect();
                debug!(
                    "unlock: {} of {} catalog items available",
                    available.len(),
                    catalog.len()
                );
                match available.choose(&mut rand::thread_rng()) {
                    Some(item) => (*item).clone(),
                    None => {
                        info!("unlock: collection complete ({} owned)", owned.len());
                        metrics::inc_collection_complete();
                        return UnlockOutcome::CollectionComplete;
                    }
                }
            };

            // Both branches start before either is awaited
            let reveal = tokio::time::sleep(self.settings.reveal_delay);
            let preload = tokio::time::timeout(
                self.settings.image_timeout,
                self.preloader.preload(&pick.image_url),
            );
            let (_, preloaded) = tokio::join!(reveal, preload);
            if preloaded.is_err() {
                debug!("unlock: image preload timed out for {}", pick.image_url);
            }

            let now = self.clock.now();
            let item = pick.into_owned(now.format("%Y-%m-%d").to_string());
            match self.commit(&item, now) {
                Ok(()) => {
                    info!("unlock: acquired {} ({})", item.name, item.id());
                    metrics::inc_unlocks();
                    self.emit(UnlockEvent::Celebrate(item.clone()));
                    return UnlockOutcome::Unlocked(item);
                }
                Err(CommitError::AlreadyOwned) => {
                    debug!("unlock: {} was acquired elsewhere; picking again", item.id());
                }
                Err(CommitError::Storage(reason)) => {
                    metrics::inc_storage_failures();
                    return UnlockOutcome::StorageFailure(reason);
                }
            }
        }
    }

    /// Persist the cooldown timestamp and the new item as one unit: if the
    /// item cannot be stored the previous timestamp is restored. The
    /// collection stays locked throughout, and an item that is already owned
    /// writes nothing.
    fn commit(&self, item: &Item, now: DateTime<Utc>) -> std::result::Result<(), CommitError> {
        let mut collection = self.lock_collection();
        if collection.contains(&item.id()) {
            return Err(CommitError::AlreadyOwned);
        }

        let previous = self.store.get(KEY_LAST_UNLOCK).ok().flatten();
        if let Err(e) = self
            .store
            .set(KEY_LAST_UNLOCK, &cooldown::encode_timestamp(now))
        {
            warn!("unlock: unable to persist cooldown: {}", e);
            return Err(CommitError::Storage(e.to_string()));
        }

        let failure = match collection.try_add(item.clone()) {
            Ok(true) => None,
            Ok(false) => Some(CommitError::AlreadyOwned),
            Err(e) => {
                warn!("unlock: unable to persist item {}: {}", item.id(), e);
                Some(CommitError::Storage(e.to_string()))
            }
        };
        if let Some(failure) = failure {
            let restored = match previous {
                Some(prev) => self.store.set(KEY_LAST_UNLOCK, &prev),
                None => self.store.remove(KEY_LAST_UNLOCK),
            };
            if let Err(re) = restored {
                warn!("unlock: unable to restore cooldown timestamp: {}", re);
            }
            return Err(failure);
        }

        if let Err(e) = write_flag(self.store.as_ref(), KEY_NOTIFICATION_SENT, false) {
            warn!("unlock: unable to reset notification flag: {}", e);
        }
        Ok(())
    }

    /// One poll of the cooldown. Moves LOCKED to IDLE once the cooldown hits
    /// zero and sends the "gift ready" notification at most once per cycle.
    /// Returns the event it emitted, if any.
    pub fn tick(&self) -> Option<UnlockEvent> {
        let last_unlock_at = self.last_unlock_at();
        let remaining = remaining_cooldown(last_unlock_at, self.clock.now(), self.settings.cooldown);

        {
            let mut inner = self.lock_inner();
            let first_check = std::mem::replace(&mut inner.first_check, false);
            if inner.state == UnlockState::Unlocking || last_unlock_at.is_none() {
                return None;
            }
            if !remaining.is_zero() {
                inner.state = UnlockState::Locked;
                return None;
            }
            inner.state = UnlockState::Idle;

            if read_flag(self.store.as_ref(), KEY_NOTIFICATION_SENT) {
                return None;
            }
            if first_check {
                debug!("unlock: cooldown expired before startup; notification suppressed");
                self.mark_notified();
                return None;
            }
        }

        if self.notifier.permission_granted() {
            self.notifier.notify(notify::NOTIFY_TITLE, notify::NOTIFY_BODY);
            metrics::inc_notifications_sent();
        } else {
            debug!("unlock: notification permission not granted");
        }
        self.mark_notified();
        info!("unlock: cooldown finished, gift ready");
        self.emit(UnlockEvent::CooldownReady);
        Some(UnlockEvent::CooldownReady)
    }

    fn mark_notified(&self) {
        if let Err(e) = write_flag(self.store.as_ref(), KEY_NOTIFICATION_SENT, true) {
            warn!("unlock: unable to persist notification flag: {}", e);
        }
    }

    fn emit(&self, event: UnlockEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    fn lock_inner(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("unlock state mutex poisoned")
    }

    fn lock_collection(&self) -> std::sync::MutexGuard<'_, CollectionStore> {
        self.collection.lock().expect("collection mutex poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{FinderError, Result};
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedCatalog(Vec<Item>);

    #[async_trait]
    impl CatalogSource for FixedCatalog {
        async fn fetch(&self) -> Result<Vec<Item>> {
            Ok(self.0.clone())
        }
    }

    struct Offline;

    #[async_trait]
    impl CatalogSource for Offline {
        async fn fetch(&self) -> Result<Vec<Item>> {
            Err(FinderError::Network("connection refused".into()))
        }
    }

    #[derive(Default)]
    struct CountingNotifier {
        sent: AtomicUsize,
    }

    impl Notifier for CountingNotifier {
        fn permission_granted(&self) -> bool {
            true
        }
        fn notify(&self, _title: &str, _body: &str) {
            self.sent.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn catalog(n: usize) -> Vec<Item> {
        (0..n)
            .map(|i| {
                let mut item =
                    Item::new(&format!("{i:08x}"), "00000002", &format!("Figure {i}"), "Series");
                item.kind = Some("Figure".into());
                item
            })
            .collect()
    }

    fn engine_with(
        source: Arc<dyn CatalogSource>,
    ) -> (Arc<MemoryStore>, Arc<ManualClock>, UnlockEngine) {
        let mem = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::default());
        let collection = Arc::new(Mutex::new(CollectionStore::load(mem.clone())));
        let engine = UnlockEngine::new(
            mem.clone(),
            collection,
            source,
            clock.clone(),
            EngineSettings::default(),
        );
        (mem, clock, engine)
    }

    #[tokio::test(start_paused = true)]
    async fn unlock_adds_unowned_item_and_starts_cooldown() {
        let (_mem, _clock, engine) = engine_with(Arc::new(FixedCatalog(catalog(3))));
        let outcome = engine.unlock().await;
        let UnlockOutcome::Unlocked(item) = outcome else {
            panic!("expected unlock, got {outcome:?}");
        };
        assert!(item.kind.is_none());
        assert!(item.unlocked_at.is_some());
        assert!(!item.is_favorite);
        assert_eq!(engine.state(), UnlockState::Locked);
        assert_eq!(engine.remaining_cooldown(), COOLDOWN_DURATION);
        assert_eq!(engine.collection().lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unlock_during_cooldown_is_rejected() {
        let (_mem, clock, engine) = engine_with(Arc::new(FixedCatalog(catalog(3))));
        assert!(matches!(engine.unlock().await, UnlockOutcome::Unlocked(_)));
        clock.advance(Duration::from_secs(60));
        match engine.unlock().await {
            UnlockOutcome::CoolingDown(left) => {
                assert_eq!(left, COOLDOWN_DURATION - Duration::from_secs(60))
            }
            other => panic!("expected cooldown, got {other:?}"),
        }
        assert_eq!(engine.collection().lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn network_failure_returns_to_idle_without_cooldown() {
        let (mem, _clock, engine) = engine_with(Arc::new(Offline));
        assert!(matches!(
            engine.unlock().await,
            UnlockOutcome::NetworkFailure(_)
        ));
        assert_eq!(engine.state(), UnlockState::Idle);
        assert_eq!(engine.remaining_cooldown(), Duration::ZERO);
        assert!(!mem.contains(KEY_LAST_UNLOCK));
        // Immediate retry is allowed (and fails the same way)
        assert!(matches!(
            engine.unlock().await,
            UnlockOutcome::NetworkFailure(_)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn complete_collection_does_not_start_cooldown() {
        let (_mem, clock, engine) = engine_with(Arc::new(FixedCatalog(catalog(2))));
        for _ in 0..2 {
            assert!(matches!(engine.unlock().await, UnlockOutcome::Unlocked(_)));
            clock.advance(COOLDOWN_DURATION);
        }
        let before = engine.last_unlock_at();
        assert_eq!(engine.unlock().await, UnlockOutcome::CollectionComplete);
        assert_eq!(engine.state(), UnlockState::Idle);
        assert_eq!(engine.last_unlock_at(), before);
        assert_eq!(engine.collection().lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn storage_failure_rolls_back_cooldown() {
        let (mem, _clock, engine) = engine_with(Arc::new(FixedCatalog(catalog(2))));
        // Warm the catalog cache, then make writes fail
        engine.catalog.get_or_fetch().await.unwrap();
        mem.set_fail_writes(true);
        assert!(matches!(
            engine.unlock().await,
            UnlockOutcome::StorageFailure(_)
        ));
        mem.set_fail_writes(false);
        assert_eq!(engine.state(), UnlockState::Idle);
        assert!(engine.last_unlock_at().is_none());
        assert!(engine.collection().lock().unwrap().is_empty());
    }

    /// Accepts everything except writes to the collection blob.
    struct CollectionWritesFail(MemoryStore);

    impl KeyValueStore for CollectionWritesFail {
        fn get(&self, key: &str) -> Result<Option<String>> {
            self.0.get(key)
        }
        fn set(&self, key: &str, value: &str) -> Result<()> {
            if key == crate::storage::KEY_COLLECTION {
                return Err(FinderError::Storage("disk full".into()));
            }
            self.0.set(key, value)
        }
        fn remove(&self, key: &str) -> Result<()> {
            self.0.remove(key)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failed_item_write_restores_previous_timestamp() {
        let store = Arc::new(CollectionWritesFail(MemoryStore::new()));
        store.0.set(KEY_LAST_UNLOCK, "1000").unwrap();
        let clock = Arc::new(ManualClock::default());
        let collection = Arc::new(Mutex::new(CollectionStore::load(store.clone())));
        let engine = UnlockEngine::new(
            store.clone(),
            collection,
            Arc::new(FixedCatalog(catalog(2))),
            clock,
            EngineSettings::default(),
        );
        assert!(matches!(
            engine.unlock().await,
            UnlockOutcome::StorageFailure(_)
        ));
        assert_eq!(store.0.get(KEY_LAST_UNLOCK).unwrap().as_deref(), Some("1000"));
        assert_eq!(engine.state(), UnlockState::Idle);
        assert!(engine.collection().lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_requests_collapse_to_one() {
        let (_mem, _clock, engine) = engine_with(Arc::new(FixedCatalog(catalog(5))));
        let (a, b, c) = tokio::join!(engine.unlock(), engine.unlock(), engine.unlock());
        assert!(matches!(a, UnlockOutcome::Unlocked(_)));
        assert_eq!(b, UnlockOutcome::InFlight);
        assert_eq!(c, UnlockOutcome::InFlight);
        assert_eq!(engine.collection().lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn tick_notifies_once_per_cycle() {
        let notifier = Arc::new(CountingNotifier::default());
        let (_mem, clock, engine) = engine_with(Arc::new(FixedCatalog(catalog(3))));
        let engine = engine.with_notifier(notifier.clone());

        assert_eq!(engine.tick(), None);
        assert!(matches!(engine.unlock().await, UnlockOutcome::Unlocked(_)));
        assert_eq!(engine.tick(), None);
        assert_eq!(engine.state(), UnlockState::Locked);

        clock.advance(COOLDOWN_DURATION + Duration::from_secs(1));
        assert_eq!(engine.tick(), Some(UnlockEvent::CooldownReady));
        assert_eq!(engine.state(), UnlockState::Idle);
        assert_eq!(engine.remaining_cooldown(), Duration::ZERO);
        assert_eq!(engine.tick(), None);
        assert_eq!(notifier.sent.load(Ordering::SeqCst), 1);

        // Next cycle notifies again
        assert!(matches!(engine.unlock().await, UnlockOutcome::Unlocked(_)));
        clock.advance(COOLDOWN_DURATION);
        assert_eq!(engine.tick(), Some(UnlockEvent::CooldownReady));
        assert_eq!(notifier.sent.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn tick_never_starts_an_unlock() {
        let (_mem, clock, engine) = engine_with(Arc::new(FixedCatalog(catalog(3))));
        assert!(matches!(engine.unlock().await, UnlockOutcome::Unlocked(_)));
        clock.advance(COOLDOWN_DURATION * 2);
        for _ in 0..5 {
            engine.tick();
        }
        assert_eq!(engine.collection().lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn celebration_event_is_emitted() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (_mem, _clock, engine) = engine_with(Arc::new(FixedCatalog(catalog(1))));
        let engine = engine.with_events(tx);
        let UnlockOutcome::Unlocked(item) = engine.unlock().await else {
            panic!("expected unlock");
        };
        assert_eq!(rx.try_recv().unwrap(), UnlockEvent::Celebrate(item));
    }

    #[test]
    fn status_reports_lock() {
        let status = UnlockStatus {
            state: UnlockState::Locked,
            remaining: Duration::from_secs(5),
            last_unlock_at: None,
        };
        assert!(status.is_locked());
        assert!(!status.can_unlock());
    }
}
