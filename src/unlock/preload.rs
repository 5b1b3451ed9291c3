//! Image preloading for the reveal.
//!
//! A preload never fails from the engine's point of view: a broken or slow
//! image only means the reveal shows without a warm cache.

use async_trait::async_trait;

#[async_trait]
pub trait ImagePreloader: Send + Sync {
    /// Resolve once the asset is fetched, or once fetching gave up.
    async fn preload(&self, url: &str);
}

/// Preloader for harnesses without any image pipeline.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPreloader;

#[async_trait]
impl ImagePreloader for NoopPreloader {
    async fn preload(&self, _url: &str) {}
}

/// Fetches the image body over HTTP and discards it, warming any shared cache.
#[cfg(feature = "http")]
pub struct HttpImagePreloader {
    client: reqwest::Client,
}

#[cfg(feature = "http")]
impl HttpImagePreloader {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

#[cfg(feature = "http")]
impl Default for HttpImagePreloader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "http")]
#[async_trait]
impl ImagePreloader for HttpImagePreloader {
    async fn preload(&self, url: &str) {
        if url.is_empty() {
            return;
        }
        match self.client.get(url).send().await {
            Ok(resp) => match resp.bytes().await {
                Ok(body) => log::debug!("preload: {} ({} bytes)", url, body.len()),
                Err(e) => log::debug!("preload: body error for {}: {}", url, e),
            },
            Err(e) => log::debug!("preload: request error for {}: {}", url, e),
        }
    }
}
