//! Unsplash photo search
//!
//! The access key stays on the server. Hits are relayed as the provider
//! returned them.

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::{debug, instrument};

use snapseek_core::{ImageResult, ImageSearch, SearchTerm};

use crate::error::{Error, Result};

pub const API_URL: &str = "https://api.unsplash.com";

/// Results per page when not configured
pub const DEFAULT_PER_PAGE: u32 = 10;

/// Largest page Unsplash serves
pub const MAX_PER_PAGE: u32 = 30;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Vec<ImageResult>,
}

#[derive(Clone)]
pub struct UnsplashClient {
    client: Client,
    access_key: String,
    base_url: String,
    per_page: u32,
}

impl UnsplashClient {
    pub fn new(client: Client, access_key: impl Into<String>) -> Self {
        Self {
            client,
            access_key: access_key.into(),
            base_url: API_URL.into(),
            per_page: DEFAULT_PER_PAGE,
        }
    }

    #[cfg(test)]
    fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Results requested per search, clamped to `1..=MAX_PER_PAGE`
    pub fn with_per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page.clamp(1, MAX_PER_PAGE);
        self
    }

    pub fn search_url(&self, term: &SearchTerm) -> Result<Url> {
        let per_page = self.per_page.to_string();
        Url::parse_with_params(
            &format!("{}/search/photos", self.base_url.trim_end_matches('/')),
            &[("query", term.as_str()), ("per_page", per_page.as_str())],
        )
        .map_err(|e| Error::Protocol(format!("bad search endpoint: {e}")))
    }

    #[instrument(skip(self), fields(term = %term))]
    async fn fetch(&self, term: &SearchTerm) -> Result<Vec<ImageResult>> {
        let response = self
            .client
            .get(self.search_url(term)?)
            .header("Authorization", format!("Client-ID {}", self.access_key))
            .header("Accept-Version", "v1")
            .send()
            .await?;

        let body: SearchResponse = crate::read_json(response).await?;
        debug!(hits = body.results.len(), "Unsplash search complete");
        Ok(body.results)
    }
}

#[async_trait]
impl ImageSearch for UnsplashClient {
    async fn search(&self, term: &SearchTerm) -> snapseek_core::Result<Vec<ImageResult>> {
        self.fetch(term).await.map_err(|e| e.upstream("unsplash"))
    }
}
