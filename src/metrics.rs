//! Process-wide unlock counters.
//! Cheap atomics; read via [`snapshot`] for `status` output and tests.
use std::sync::atomic::{AtomicU64, Ordering};

static UNLOCK_ATTEMPTS: AtomicU64 = AtomicU64::new(0);
static UNLOCKS: AtomicU64 = AtomicU64::new(0);
static NETWORK_FAILURES: AtomicU64 = AtomicU64::new(0);
static STORAGE_FAILURES: AtomicU64 = AtomicU64::new(0);
static COLLECTION_COMPLETE: AtomicU64 = AtomicU64::new(0);
static REJECTED_IN_FLIGHT: AtomicU64 = AtomicU64::new(0);
static REJECTED_COOLDOWN: AtomicU64 = AtomicU64::new(0);
static NOTIFICATIONS_SENT: AtomicU64 = AtomicU64::new(0);

pub fn inc_unlock_attempts() {
    UNLOCK_ATTEMPTS.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_unlocks() {
    UNLOCKS.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_network_failures() {
    NETWORK_FAILURES.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_storage_failures() {
    STORAGE_FAILURES.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_collection_complete() {
    COLLECTION_COMPLETE.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_rejected_in_flight() {
    REJECTED_IN_FLIGHT.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_rejected_cooldown() {
    REJECTED_COOLDOWN.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_notifications_sent() {
    NOTIFICATIONS_SENT.fetch_add(1, Ordering::Relaxed);
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    pub unlock_attempts: u64,
    pub unlocks: u64,
    pub network_failures: u64,
    pub storage_failures: u64,
    pub collection_complete: u64,
    pub rejected_in_flight: u64,
    pub rejected_cooldown: u64,
    pub notifications_sent: u64,
}

pub fn snapshot() -> Snapshot {
    Snapshot {
        unlock_attempts: UNLOCK_ATTEMPTS.load(Ordering::Relaxed),
        unlocks: UNLOCKS.load(Ordering::Relaxed),
        network_failures: NETWORK_FAILURES.load(Ordering::Relaxed),
        storage_failures: STORAGE_FAILURES.load(Ordering::Relaxed),
        collection_complete: COLLECTION_COMPLETE.load(Ordering::Relaxed),
        rejected_in_flight: REJECTED_IN_FLIGHT.load(Ordering::Relaxed),
        rejected_cooldown: REJECTED_COOLDOWN.load(Ordering::Relaxed),
        notifications_sent: NOTIFICATIONS_SENT.load(Ordering::Relaxed),
    }
}
