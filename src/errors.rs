use thiserror::Error;

/// Errors surfaced by the collection, catalog and unlock layers.
#[derive(Debug, Error)]
pub enum FinderError {
    /// Catalog unreachable, non-2xx response, timeout or malformed payload.
    /// Recoverable: the caller may retry immediately.
    #[error("catalog unavailable: {0}")]
    Network(String),

    /// Import payload is not a JSON array of item-shaped objects.
    #[error("invalid import format: {0}")]
    ImportFormat(String),

    /// Export requested while the collection holds no items.
    #[error("collection is empty")]
    EmptyCollection,

    /// Key-value store rejected a write or remove.
    #[error("storage error: {0}")]
    Storage(String),

    /// Wrapper around IO errors (directory creation, temp files, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapper around serde_json serialization errors.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FinderError>;
