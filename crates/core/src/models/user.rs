//! User model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

/// Supported external identity providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Google,
    GitHub,
}

impl Provider {
    pub const ALL: [Provider; 2] = [Provider::Google, Provider::GitHub];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Google => "google",
            Provider::GitHub => "github",
        }
    }

    /// Column in `users` holding this provider's external id
    pub(crate) fn column(&self) -> &'static str {
        match self {
            Provider::Google => "google_id",
            Provider::GitHub => "github_id",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "google" => Ok(Provider::Google),
            "github" => Ok(Provider::GitHub),
            other => Err(Error::NotFound(format!("identity provider '{other}'"))),
        }
    }
}

/// Profile returned by a provider after a successful handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalProfile {
    pub provider: Provider,
    /// Stable provider-scoped identifier
    pub external_id: String,
    pub display_name: String,
}

/// An internal user account, bound to one or more provider identities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub google_id: Option<String>,
    pub github_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    /// New user owning a single provider identity
    pub fn from_profile(profile: &ExternalProfile) -> Self {
        let mut user = Self {
            id: Uuid::new_v4(),
            name: profile.display_name.clone(),
            google_id: None,
            github_id: None,
            created_at: Utc::now(),
            last_login: None,
        };
        *user.external_id_slot(profile.provider) = Some(profile.external_id.clone());
        user
    }

    pub fn external_id(&self, provider: Provider) -> Option<&str> {
        match provider {
            Provider::Google => self.google_id.as_deref(),
            Provider::GitHub => self.github_id.as_deref(),
        }
    }

    fn external_id_slot(&mut self, provider: Provider) -> &mut Option<String> {
        match provider {
            Provider::Google => &mut self.google_id,
            Provider::GitHub => &mut self.github_id,
        }
    }
}

/// Active session for a logged-in user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user_id: Uuid, duration_hours: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            created_at: now,
            expires_at: now + chrono::Duration::hours(duration_hours),
        }
    }

    pub fn is_valid(&self) -> bool {
        Utc::now() < self.expires_at
    }
}
