//! API client for the public Star Wars API.
//!
//! Fetches paginated character records and resolves the planet URLs they
//! reference. Requests are unauthenticated; the session only gates whether
//! the UI offers browsing at all.

use std::time::Duration;

use anyhow::{Context, Result};
use futures::future::join_all;
use reqwest::{header, Client};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::models::{CharacterPage, Planet};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Public Star Wars API
pub const DEFAULT_API_BASE_URL: &str = "https://swapi.dev/api";

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn people_url(&self, page: u32) -> String {
        format!("{}/people/?page={}", self.base_url, page.max(1))
    }

    /// Fetch one page of characters (pages start at 1)
    pub async fn fetch_characters(&self, page: u32) -> Result<CharacterPage> {
        let page: CharacterPage = self.get(&self.people_url(page)).await?;
        debug!(count = page.count, returned = page.results.len(), "Characters fetched");
        Ok(page)
    }

    /// Fetch the planet behind a character's `homeworld` URL
    pub async fn fetch_homeworld(&self, url: &str) -> Result<Planet> {
        if url.is_empty() {
            return Err(ApiError::NotFound("character has no homeworld".to_string()).into());
        }
        self.get(url).await
    }

    /// Resolve several planet URLs concurrently. Failed lookups come back
    /// as `None` next to their URL.
    pub async fn fetch_planets(&self, urls: &[String]) -> Vec<(String, Option<Planet>)> {
        let lookups = urls.iter().map(|url| async move {
            match self.fetch_homeworld(url).await {
                Ok(planet) => (url.clone(), Some(planet)),
                Err(e) => {
                    debug!(url = %url, error = %e, "Planet lookup failed");
                    (url.clone(), None)
                }
            }
        });
        join_all(lookups).await
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .client
            .get(url)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(ApiError::from)
            .with_context(|| format!("Failed to send GET request to {}", url))?;

        let response = Self::check_response(response).await?;
        response
            .json()
            .await
            .with_context(|| format!("Failed to parse JSON response from {}", url))
    }
}
