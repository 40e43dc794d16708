//! Delegated login attempt model
//!
//! One login attempt moves through
//! `Unauthenticated -> ProviderRedirected -> ProviderCallbackReceived -> {Authenticated | Failed}`.
//! The redirected step is persisted as a [`LoginAttempt`] keyed by the opaque
//! `state` value the provider echoes back on its callback.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{Provider, Session, User};

/// Minutes a provider redirect stays redeemable
pub const LOGIN_ATTEMPT_TTL_MINUTES: i64 = 10;

/// A pending redirect to a provider's consent page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginAttempt {
    pub state: String,
    pub provider: Provider,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl LoginAttempt {
    pub fn new(provider: Provider, state: String) -> Self {
        let now = Utc::now();
        Self {
            state,
            provider,
            created_at: now,
            expires_at: now + chrono::Duration::minutes(LOGIN_ATTEMPT_TTL_MINUTES),
        }
    }

    pub fn is_valid(&self) -> bool {
        Utc::now() < self.expires_at
    }
}

/// Query parameters a provider appends to its callback redirect
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Why a login attempt ended in `Failed`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoginFailure {
    #[error("provider is not configured")]
    ProviderDisabled,

    #[error("consent denied: {0}")]
    ConsentDenied(String),

    #[error("unknown or expired login attempt")]
    UnknownAttempt,

    #[error("callback arrived for a different provider")]
    ProviderMismatch,

    #[error("callback carried no authorization code")]
    MissingCode,

    #[error("provider handshake failed: {0}")]
    Handshake(String),

    #[error("could not persist login: {0}")]
    Persistence(String),
}

/// States of a single login attempt
#[derive(Debug, Clone)]
pub enum LoginState {
    Unauthenticated,
    ProviderRedirected {
        attempt: LoginAttempt,
        authorize_url: String,
    },
    ProviderCallbackReceived {
        provider: Provider,
        code: String,
    },
    Authenticated {
        user: User,
        session: Session,
        /// True when this login created the user
        created: bool,
    },
    Failed {
        provider: Provider,
        reason: LoginFailure,
    },
}

impl LoginState {
    pub fn name(&self) -> &'static str {
        match self {
            LoginState::Unauthenticated => "unauthenticated",
            LoginState::ProviderRedirected { .. } => "provider_redirected",
            LoginState::ProviderCallbackReceived { .. } => "provider_callback_received",
            LoginState::Authenticated { .. } => "authenticated",
            LoginState::Failed { .. } => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LoginState::Authenticated { .. } | LoginState::Failed { .. }
        )
    }

    pub(crate) fn failed(provider: Provider, reason: LoginFailure) -> Self {
        LoginState::Failed { provider, reason }
    }
}
