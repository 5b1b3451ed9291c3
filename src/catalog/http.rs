//! HTTP catalog source.
//!
//! One GET against the configured endpoint; the first page is the whole
//! catalog as far as this crate is concerned.

use super::{CatalogEnvelope, CatalogSource};
use crate::collection::Item;
use crate::config::CatalogConfig;
use crate::errors::{FinderError, Result};
use async_trait::async_trait;
use log::debug;
use std::time::Duration;
use tokio::time::timeout;

pub struct HttpCatalog {
    config: CatalogConfig,
    client: reqwest::Client,
}

impl HttpCatalog {
    pub fn new(config: CatalogConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl CatalogSource for HttpCatalog {
    async fn fetch(&self) -> Result<Vec<Item>> {
        debug!("Fetching catalog from: {}", self.config.url);

        let request = self.client.get(&self.config.url);
        let timeout_duration = Duration::from_secs(self.config.timeout_seconds as u64);

        let response = timeout(timeout_duration, request.send())
            .await
            .map_err(|_| {
                FinderError::Network(format!(
                    "request timeout after {}s",
                    self.config.timeout_seconds
                ))
            })?
            .map_err(|e| FinderError::Network(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(FinderError::Network(format!(
                "API returned status: {}",
                response.status()
            )));
        }

        let envelope: CatalogEnvelope = response
            .json()
            .await
            .map_err(|e| FinderError::Network(format!("failed to parse JSON response: {}", e)))?;

        debug!("Catalog response carried {} items", envelope.items.len());
        Ok(envelope.items)
    }
}
