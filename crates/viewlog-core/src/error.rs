use thiserror::Error;

/// Infrastructure errors: configuration, local database, filesystem.
#[derive(Debug, Error)]
pub enum ViewlogError {
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures reported by a [`CatalogFetcher`](crate::traits::CatalogFetcher).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// HTTP 429 from the catalog.
    #[error("rate limited by the catalog")]
    RateLimited,

    #[error("catalog returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("failed to decode catalog response: {0}")]
    Decode(String),
}

impl FetchError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited)
    }
}

/// Failures reported by a [`RecordStore`](crate::traits::RecordStore).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("failed to read viewed records: {0}")]
    Read(String),

    #[error("failed to write viewed record: {0}")]
    Write(String),

    #[error("record store is closed")]
    Closed,
}

/// Errors surfaced by [`EpisodeCatalog`](crate::catalog::EpisodeCatalog).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("episode {0} is not in the loaded catalog")]
    NotFoundLocal(u32),
}
