//! OAuth 2.0 authorization code client
//!
//! One client type serves every provider; providers differ only in their
//! endpoints, scopes and how the profile JSON maps to an [`ExternalProfile`].

use async_trait::async_trait;
use reqwest::{header, Client, Url};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};

use snapseek_core::{ExternalProfile, IdentityProvider, Provider};

use crate::error::{Error, Result};

/// Credentials registered with a provider
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Where the provider sends the browser back to
    pub callback_url: String,
}

/// Provider endpoints and scopes
#[derive(Debug, Clone)]
pub struct OAuthEndpoints {
    pub authorize: String,
    pub token: String,
    pub profile: String,
    pub scopes: &'static [&'static str],
}

/// Maps the provider's profile document to a stable identity
pub type ProfileMapper = fn(&Value) -> Result<(String, String)>;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Clone)]
pub struct OAuthClient {
    provider: Provider,
    client: Client,
    config: OAuthConfig,
    endpoints: OAuthEndpoints,
    map_profile: ProfileMapper,
}

impl OAuthClient {
    pub fn new(
        provider: Provider,
        client: Client,
        config: OAuthConfig,
        endpoints: OAuthEndpoints,
        map_profile: ProfileMapper,
    ) -> Self {
        Self {
            provider,
            client,
            config,
            endpoints,
            map_profile,
        }
    }

    #[cfg(test)]
    fn with_endpoints(mut self, endpoints: OAuthEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn build_authorize_url(&self, state: &str) -> Result<Url> {
        let scope = self.endpoints.scopes.join(" ");
        Url::parse_with_params(
            &self.endpoints.authorize,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.callback_url.as_str()),
                ("response_type", "code"),
                ("scope", scope.as_str()),
                ("state", state),
            ],
        )
        .map_err(|e| Error::Protocol(format!("bad authorize endpoint: {e}")))
    }

    #[instrument(skip(self, code), fields(provider = %self.provider))]
    async fn fetch_access_token(&self, code: &str) -> Result<String> {
        let response = self
            .client
            .post(&self.endpoints.token)
            .header(header::ACCEPT, "application/json")
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.config.callback_url.as_str()),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
            ])
            .send()
            .await?;

        let token: TokenResponse = crate::read_json(response).await?;
        match (token.access_token, token.error) {
            (Some(access_token), None) => Ok(access_token),
            (_, Some(error)) => Err(Error::Protocol(format!(
                "token endpoint refused: {error} {}",
                token.error_description.unwrap_or_default()
            ))),
            (None, None) => Err(Error::Protocol("token response without access_token".into())),
        }
    }

    #[instrument(skip(self, access_token), fields(provider = %self.provider))]
    async fn fetch_profile(&self, access_token: &str) -> Result<ExternalProfile> {
        let response = self
            .client
            .get(&self.endpoints.profile)
            .bearer_auth(access_token)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        let document: Value = crate::read_json(response).await?;
        let (external_id, display_name) = (self.map_profile)(&document)?;
        debug!(external_id = %external_id, "Fetched provider profile");

        Ok(ExternalProfile {
            provider: self.provider,
            external_id,
            display_name,
        })
    }
}

#[async_trait]
impl IdentityProvider for OAuthClient {
    fn provider(&self) -> Provider {
        self.provider
    }

    fn authorize_url(&self, state: &str) -> snapseek_core::Result<String> {
        self.build_authorize_url(state)
            .map(String::from)
            .map_err(|e| e.upstream(self.provider.as_str()))
    }

    async fn exchange(&self, code: &str) -> snapseek_core::Result<ExternalProfile> {
        let provider = self.provider.as_str();
        let access_token = self
            .fetch_access_token(code)
            .await
            .map_err(|e| e.upstream(provider))?;
        self.fetch_profile(&access_token)
            .await
            .map_err(|e| e.upstream(provider))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapper(doc: &Value) -> Result<(String, String)> {
        Ok((doc["id"].to_string(), "name".into()))
    }

    fn client() -> OAuthClient {
        OAuthClient::new(
            Provider::Google,
            Client::new(),
            OAuthConfig {
                client_id: "cid".into(),
                client_secret: "secret".into(),
                callback_url: "http://localhost:5000/auth/google/callback".into(),
            },
            OAuthEndpoints {
                authorize: "https://idp.test/authorize".into(),
                token: "https://idp.test/token".into(),
                profile: "https://idp.test/me".into(),
                scopes: &["profile", "email"],
            },
            mapper,
        )
    }

    #[test]
    fn test_authorize_url_carries_state_and_redirect() {
        let url = client().build_authorize_url("abc-123").unwrap();
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        assert_eq!(url.host_str(), Some("idp.test"));
        assert!(pairs.contains(&("state".into(), "abc-123".into())));
        assert!(pairs.contains(&("scope".into(), "profile email".into())));
        assert!(pairs.contains(&("response_type".into(), "code".into())));
        assert!(pairs.contains(&(
            "redirect_uri".into(),
            "http://localhost:5000/auth/google/callback".into()
        )));
        // The secret never goes to the browser
        assert!(!url.as_str().contains("secret"));
    }

    #[test]
    fn test_bad_authorize_endpoint() {
        let c = client().with_endpoints(OAuthEndpoints {
            authorize: "not a url".into(),
            token: String::new(),
            profile: String::new(),
            scopes: &[],
        });
        assert!(IdentityProvider::authorize_url(&c, "s").is_err());
    }
}
