//! # Amiibo Finder - Unlock/Collection Core
//!
//! Amiibo Finder lets a user build a personal collection of catalog figures
//! through a randomized, cooldown-limited "unlock", then browse that
//! collection with filters and sort modes. This crate is the toolkit-neutral
//! core: state, persistence and side-effect orchestration. The bundled binary
//! drives it from the command line.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use amiibofinder::catalog::HttpCatalog;
//! use amiibofinder::collection::CollectionStore;
//! use amiibofinder::config::Config;
//! use amiibofinder::storage::FileStore;
//! use amiibofinder::unlock::{SystemClock, UnlockEngine, UnlockOutcome};
//! use std::sync::{Arc, Mutex};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     let store = Arc::new(FileStore::open(&config.storage.data_dir)?);
//!     let collection = Arc::new(Mutex::new(CollectionStore::load(store.clone())));
//!     let engine = UnlockEngine::new(
//!         store,
//!         collection,
//!         Arc::new(HttpCatalog::new(config.catalog.clone())),
//!         Arc::new(SystemClock),
//!         (&config.unlock).into(),
//!     );
//!     if let UnlockOutcome::Unlocked(item) = engine.unlock().await {
//!         println!("New figure: {}", item.name);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`storage`] - string key-value persistence (file-backed and in-memory)
//! - [`collection`] - item record, owned collection store, import/export
//! - [`catalog`] - catalog source trait, HTTP source and fetch-once cache
//! - [`unlock`] - cooldown-gated acquisition state machine and watcher
//! - [`filter`] - pure filter/sort projection over the collection
//! - [`config`] - TOML configuration
//! - [`errors`] - crate error type
//! - [`metrics`] - process-wide unlock counters
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐
//! │  Unlock Engine  │────▶│ Catalog Source  │
//! └─────────────────┘     └─────────────────┘
//!          │
//! ┌─────────────────┐     ┌─────────────────┐
//! │ Collection Store│◀────│ Filter / Sort   │ (read only)
//! └─────────────────┘     └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │ Key-Value Store │
//! └─────────────────┘
//! ```

pub mod catalog;
pub mod collection;
pub mod config;
pub mod errors;
pub mod filter;
pub mod metrics;
pub mod storage;
pub mod unlock;
