//! # Catalog Module
//!
//! The catalog is the full, read-only set of unlockable items. It is fetched
//! from a [`CatalogSource`] at most once and then cached in the key-value
//! store without expiry.

#[cfg(feature = "http")]
mod http;

#[cfg(feature = "http")]
pub use http::HttpCatalog;

use crate::collection::Item;
use crate::errors::Result;
use crate::storage::{read_json, KeyValueStore, KEY_CATALOG_CACHE};
use async_trait::async_trait;
use log::{debug, info, warn};
use serde::Deserialize;
use std::sync::Arc;

/// Remote (or scripted) provider of the full item list.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// One request for the complete catalog. Any transport, status or
    /// decoding problem is reported as [`crate::errors::FinderError::Network`].
    async fn fetch(&self) -> Result<Vec<Item>>;
}

/// Response envelope. The live API names the list `amiibo`.
#[derive(Debug, Deserialize)]
pub struct CatalogEnvelope {
    #[serde(alias = "amiibo")]
    pub items: Vec<Item>,
}

/// Get-or-fetch wrapper around a [`CatalogSource`].
pub struct CatalogCache {
    store: Arc<dyn KeyValueStore>,
    source: Arc<dyn CatalogSource>,
}

impl CatalogCache {
    pub fn new(store: Arc<dyn KeyValueStore>, source: Arc<dyn CatalogSource>) -> Self {
        Self { store, source }
    }

    /// Cached catalog, if one has been stored.
    pub fn cached(&self) -> Option<Vec<Item>> {
        read_json(self.store.as_ref(), KEY_CATALOG_CACHE)
    }

    /// Return the cached catalog or fetch and cache it.
    ///
    /// A failed cache write is logged and the fetched list still returned; the
    /// next call simply fetches again. Empty responses are never cached.
    pub async fn get_or_fetch(&self) -> Result<Vec<Item>> {
        if let Some(items) = self.cached() {
            debug!("catalog: using cached list ({} items)", items.len());
            return Ok(items);
        }

        let items = self.source.fetch().await?;
        if items.is_empty() {
            warn!("catalog: source returned an empty list; not caching");
            return Ok(items);
        }
        match serde_json::to_string(&items) {
            Ok(blob) => {
                if let Err(e) = self.store.set(KEY_CATALOG_CACHE, &blob) {
                    warn!("catalog: unable to cache list: {}", e);
                } else {
                    info!("catalog: fetched and cached {} items", items.len());
                }
            }
            Err(e) => warn!("catalog: serialize error: {}", e),
        }
        Ok(items)
    }
}
