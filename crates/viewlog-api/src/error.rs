use thiserror::Error;
use viewlog_core::FetchError;

/// Errors from the catalog API client.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("rate limited (status 429)")]
    RateLimited,

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("parse error: {0}")]
    Parse(String),
}

impl From<ApiError> for FetchError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::RateLimited => FetchError::RateLimited,
            ApiError::Api { status, message } => FetchError::Status { status, message },
            ApiError::Parse(message) => FetchError::Decode(message),
            ApiError::Http(e) if e.is_decode() => FetchError::Decode(e.to_string()),
            ApiError::Http(e) => FetchError::Network(e.to_string()),
            ApiError::Url(e) => FetchError::Network(e.to_string()),
        }
    }
}
