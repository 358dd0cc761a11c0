use std::time::Duration;

use reqwest::{Client, StatusCode};
use url::Url;
use viewlog_core::models::{Character, Episode};
use viewlog_core::traits::CatalogFetcher;
use viewlog_core::FetchError;

use crate::error::ApiError;
use crate::types::{ApiCharacter, EpisodesResponse, OneOrMany};

pub const DEFAULT_BASE_URL: &str = "https://rickandmortyapi.com/api/";

/// Client for the public Rick and Morty REST API.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    base_url: Url,
    http: Client,
}

impl CatalogClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("viewlog/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            base_url: normalize_base(base_url)?,
            http,
        })
    }

    /// Resolve `path` against the base URL.
    pub fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.base_url.join(path)?)
    }

    /// Check the HTTP response for errors and return the body text on failure.
    async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        tracing::warn!(status = status.as_u16(), "Catalog API error");
        Err(status_error(status, body))
    }

    /// First page of `GET /episode`; further pages are not requested.
    pub async fn get_episodes(&self) -> Result<Vec<Episode>, ApiError> {
        let url = self.endpoint("episode")?;
        tracing::debug!(%url, "Fetching episodes");
        let resp = self.http.get(url).send().await?;
        let resp = Self::check_response(resp).await?;
        let page: EpisodesResponse = resp
            .json()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))?;

        Ok(page
            .results
            .into_iter()
            .map(|e| e.into_episode())
            .collect())
    }

    pub async fn get_characters(&self, ids: &[u32]) -> Result<Vec<Character>, ApiError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let url = self.endpoint(&characters_path(ids))?;
        tracing::debug!(%url, count = ids.len(), "Fetching characters");
        let resp = self.http.get(url).send().await?;
        let resp = Self::check_response(resp).await?;
        let body: OneOrMany<ApiCharacter> = resp
            .json()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))?;

        Ok(body
            .into_vec()
            .into_iter()
            .map(ApiCharacter::into_character)
            .collect())
    }
}

impl CatalogFetcher for CatalogClient {
    async fn fetch_all_episodes(&self) -> Result<Vec<Episode>, FetchError> {
        Ok(self.get_episodes().await?)
    }

    async fn fetch_characters_by_ids(&self, ids: &[u32]) -> Result<Vec<Character>, FetchError> {
        Ok(self.get_characters(ids).await?)
    }
}

/// Make sure the base URL ends in `/` so `join` appends instead of replacing.
fn normalize_base(base_url: &str) -> Result<Url, ApiError> {
    let trimmed = base_url.trim();
    if trimmed.ends_with('/') {
        Ok(Url::parse(trimmed)?)
    } else {
        Ok(Url::parse(&format!("{trimmed}/"))?)
    }
}

fn characters_path(ids: &[u32]) -> String {
    let joined = ids
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",");
    format!("character/{joined}")
}

fn status_error(status: StatusCode, body: String) -> ApiError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return ApiError::RateLimited;
    }
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_owned))
        .unwrap_or(body);
    ApiError::Api {
        status: status.as_u16(),
        message,
    }
}
