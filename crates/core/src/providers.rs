//! External provider seams
//!
//! Identity providers and the image search provider are network services.
//! Their clients live in `snapseek-net`; core only sees these traits.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{ExternalProfile, ImageResult, Provider, SearchTerm};

/// A delegated-login provider (OAuth authorization code flow)
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Which provider this client speaks for
    fn provider(&self) -> Provider;

    /// Consent page URL carrying the opaque `state` value
    fn authorize_url(&self, state: &str) -> Result<String>;

    /// Redeem an authorization code for the caller's stable profile
    async fn exchange(&self, code: &str) -> Result<ExternalProfile>;
}

/// The external image search provider
#[async_trait]
pub trait ImageSearch: Send + Sync {
    /// Run a search and return the provider's hits in provider order
    async fn search(&self, term: &SearchTerm) -> Result<Vec<ImageResult>>;
}
