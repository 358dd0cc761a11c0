//! HTTP client for the Rick and Morty catalog API.

pub mod client;
pub mod error;
pub mod types;

pub use client::CatalogClient;
pub use error::ApiError;
