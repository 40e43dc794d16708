//! Shared server state

use std::sync::Arc;

use axum::http::HeaderMap;
use uuid::Uuid;

use snapseek_core::{AuthCoordinator, Database, ImageSearch, SessionManager};

use crate::config::{Config, ConfigError};
use crate::cookies::CookieSigner;

/// Everything a request handler needs. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub auth: Arc<AuthCoordinator>,
    pub images: Arc<dyn ImageSearch>,
    pub cookies: CookieSigner,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(
        config: Config,
        db: Database,
        auth: AuthCoordinator,
        images: Arc<dyn ImageSearch>,
    ) -> Result<Self, ConfigError> {
        let cookies = CookieSigner::new(
            config.session_secret.as_bytes(),
            config.cookie_secure,
            auth.sessions().ttl_hours(),
        )
        .map_err(|_| ConfigError::WeakSecret)?;

        Ok(Self {
            db: Arc::new(db),
            auth: Arc::new(auth),
            images,
            cookies,
            config: Arc::new(config),
        })
    }

    pub fn sessions(&self) -> SessionManager {
        *self.auth.sessions()
    }

    /// The verified session token on a request, if any
    pub fn session_token(&self, headers: &HeaderMap) -> Option<Uuid> {
        self.cookies.session_from_headers(headers)
    }
}
