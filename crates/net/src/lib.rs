//! Snapseek Network Library
//!
//! Outbound HTTP clients for the external services Snapseek depends on.
//!
//! # Architecture
//!
//! - **OAuth**: one authorization-code client, parameterised per provider
//! - **Google / GitHub**: endpoints and profile mapping for each provider
//! - **Unsplash**: the image search provider
//!
//! Every client implements a `snapseek-core` trait, so the HTTP layer only
//! ever sees `IdentityProvider` and `ImageSearch`.
//!
//! # Usage
//!
//! ```ignore
//! let http = snapseek_net::http_client()?;
//! let google = snapseek_net::google::client(http.clone(), config);
//! let images = UnsplashClient::new(http, access_key);
//! ```

pub mod error;
pub mod github;
pub mod google;
pub mod oauth;
pub mod unsplash;

use std::time::Duration;

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;

pub use error::{Error, Result};
pub use oauth::{OAuthClient, OAuthConfig, OAuthEndpoints};
pub use unsplash::UnsplashClient;

/// Per-request timeout for every outbound call
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest slice of an error body kept for logs
const MAX_ERROR_BODY: usize = 512;

/// Shared HTTP client. GitHub rejects requests without a User-Agent.
pub fn http_client() -> Result<Client> {
    Client::builder()
        .user_agent(concat!("snapseek/", env!("CARGO_PKG_VERSION")))
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(Error::from)
}

/// Decode a JSON body, turning non-2xx responses into [`Error::Status`]
pub(crate) async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let mut end = MAX_ERROR_BODY;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            body.truncate(end);
        }
        return Err(Error::Status {
            status: status.as_u16(),
            body,
        });
    }

    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| Error::Protocol(format!("invalid JSON body: {e}")))
}
