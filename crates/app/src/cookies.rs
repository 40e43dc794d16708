//! Session cookie handling
//!
//! The cookie value is `<session id>.<mac>`, where the MAC is HMAC-SHA256 of
//! the session id under the server secret. A forged or tampered cookie never
//! reaches the session store.

use axum::http::header::{InvalidHeaderValue, COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "snapseek_session";

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
pub struct CookieSigner {
    mac: HmacSha256,
    secure: bool,
    max_age_secs: i64,
}

impl CookieSigner {
    pub fn new(
        secret: &[u8],
        secure: bool,
        ttl_hours: i64,
    ) -> Result<Self, hmac::digest::InvalidLength> {
        Ok(Self {
            mac: HmacSha256::new_from_slice(secret)?,
            secure,
            max_age_secs: ttl_hours.saturating_mul(3600),
        })
    }

    fn tag(&self, session_id: &Uuid) -> HmacSha256 {
        let mut mac = self.mac.clone();
        mac.update(session_id.as_bytes());
        mac
    }

    pub fn sign(&self, session_id: Uuid) -> String {
        let tag = self.tag(&session_id).finalize().into_bytes();
        format!("{}.{}", session_id, URL_SAFE_NO_PAD.encode(tag))
    }

    /// The session id inside a signed value, if the MAC checks out
    pub fn verify(&self, value: &str) -> Option<Uuid> {
        let (id, tag) = value.split_once('.')?;
        let session_id = Uuid::parse_str(id).ok()?;
        let tag = URL_SAFE_NO_PAD.decode(tag).ok()?;
        self.tag(&session_id).verify_slice(&tag).ok()?;
        Some(session_id)
    }

    /// Session token carried by a request, if any
    pub fn session_from_headers(&self, headers: &HeaderMap) -> Option<Uuid> {
        parse_cookie(headers, SESSION_COOKIE).and_then(|value| self.verify(&value))
    }

    pub fn set_cookie(&self, session_id: Uuid) -> Result<HeaderValue, InvalidHeaderValue> {
        HeaderValue::from_str(&format!(
            "{}={}; Max-Age={}; {}",
            SESSION_COOKIE,
            self.sign(session_id),
            self.max_age_secs,
            self.attributes()
        ))
    }

    pub fn clear_cookie(&self) -> Result<HeaderValue, InvalidHeaderValue> {
        HeaderValue::from_str(&format!(
            "{}=deleted; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT; {}",
            SESSION_COOKIE,
            self.attributes()
        ))
    }

    fn attributes(&self) -> &'static str {
        if self.secure {
            "HttpOnly; Secure; SameSite=Lax; Path=/"
        } else {
            "HttpOnly; SameSite=Lax; Path=/"
        }
    }
}

/// Value of cookie `name`, across every `Cookie` header
pub fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    for cookie in headers.get_all(COOKIE) {
        let Ok(s) = cookie.to_str() else {
            continue;
        };
        for part in s.split(';') {
            if let Some((k, v)) = part.trim().split_once('=') {
                if k == name {
                    return Some(v.to_string());
                }
            }
        }
    }
    None
}
