//! Google sign-in

use reqwest::Client;
use serde_json::Value;

use snapseek_core::Provider;

use crate::error::{Error, Result};
use crate::oauth::{OAuthClient, OAuthConfig, OAuthEndpoints};

pub const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

pub fn endpoints() -> OAuthEndpoints {
    OAuthEndpoints {
        authorize: AUTHORIZE_URL.into(),
        token: TOKEN_URL.into(),
        profile: USERINFO_URL.into(),
        scopes: &["profile", "email"],
    }
}

pub fn client(http: Client, config: OAuthConfig) -> OAuthClient {
    OAuthClient::new(Provider::Google, http, config, endpoints(), map_profile)
}

/// OpenID userinfo: `sub` is the stable id
fn map_profile(doc: &Value) -> Result<(String, String)> {
    let sub = doc
        .get("sub")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::Protocol("google userinfo without sub".into()))?;

    let name = doc
        .get("name")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .or_else(|| doc.get("email").and_then(Value::as_str))
        .unwrap_or(sub);

    Ok((sub.to_string(), name.to_string()))
}
