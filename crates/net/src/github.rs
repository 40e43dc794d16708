//! GitHub sign-in

use reqwest::Client;
use serde_json::Value;

use snapseek_core::Provider;

use crate::error::{Error, Result};
use crate::oauth::{OAuthClient, OAuthConfig, OAuthEndpoints};

pub const AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
pub const TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
pub const USER_URL: &str = "https://api.github.com/user";

pub fn endpoints() -> OAuthEndpoints {
    OAuthEndpoints {
        authorize: AUTHORIZE_URL.into(),
        token: TOKEN_URL.into(),
        profile: USER_URL.into(),
        scopes: &["user:email"],
    }
}

pub fn client(http: Client, config: OAuthConfig) -> OAuthClient {
    OAuthClient::new(Provider::GitHub, http, config, endpoints(), map_profile)
}

/// GitHub user: numeric `id`; `name` is optional, `login` is not
fn map_profile(doc: &Value) -> Result<(String, String)> {
    let id = match doc.get("id") {
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        _ => return Err(Error::Protocol("github user without id".into())),
    };

    let login = doc.get("login").and_then(Value::as_str);
    let name = doc
        .get("name")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .or(login)
        .unwrap_or(&id);

    Ok((id.clone(), name.to_string()))
}
