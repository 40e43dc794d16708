//! Federated login coordinator
//!
//! Drives one login attempt through its states:
//!
//! - [`AuthCoordinator::begin`]: `Unauthenticated -> ProviderRedirected | Failed`
//! - [`AuthCoordinator::handle_callback`]: `-> ProviderCallbackReceived -> Authenticated`,
//!   or `Failed` at any step
//!
//! `Failed` never leaves a session behind.

use std::collections::HashMap;
use std::sync::Arc;

use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::{info, instrument, warn};

use super::session::SessionManager;
use crate::blocking::run_blocking;
use crate::error::Result;
use crate::models::{
    CallbackParams, ExternalProfile, LoginAttempt, LoginFailure, LoginState, Provider, Session,
    User,
};
use crate::providers::IdentityProvider;
use crate::storage::{LoginAttemptRepository, Storage, UserRepository};

/// 256-bit random value, base64url without padding
fn gen_state() -> String {
    let mut buf = [0u8; 32];
    OsRng.fill_bytes(&mut buf);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf)
}

pub struct AuthCoordinator {
    providers: HashMap<Provider, Arc<dyn IdentityProvider>>,
    sessions: SessionManager,
}

impl AuthCoordinator {
    pub fn new(sessions: SessionManager) -> Self {
        Self {
            providers: HashMap::new(),
            sessions,
        }
    }

    /// Enable a provider. A later registration for the same provider wins.
    pub fn with_provider(mut self, client: Arc<dyn IdentityProvider>) -> Self {
        self.providers.insert(client.provider(), client);
        self
    }

    pub fn is_enabled(&self, provider: Provider) -> bool {
        self.providers.contains_key(&provider)
    }

    pub fn enabled_providers(&self) -> Vec<Provider> {
        Provider::ALL
            .into_iter()
            .filter(|p| self.is_enabled(*p))
            .collect()
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Start a login: remember a fresh `state` and point at the consent page
    #[instrument(skip(self, store))]
    pub fn begin<S>(&self, store: &S, provider: Provider) -> LoginState
    where
        S: LoginAttemptRepository + ?Sized,
    {
        let Some(client) = self.providers.get(&provider) else {
            return LoginState::failed(provider, LoginFailure::ProviderDisabled);
        };

        let attempt = LoginAttempt::new(provider, gen_state());
        let authorize_url = match client.authorize_url(&attempt.state) {
            Ok(url) => url,
            Err(e) => return LoginState::failed(provider, LoginFailure::Handshake(e.to_string())),
        };
        if let Err(e) = store.create_login_attempt(&attempt) {
            return LoginState::failed(provider, LoginFailure::Persistence(e.to_string()));
        }

        LoginState::ProviderRedirected {
            attempt,
            authorize_url,
        }
    }

    /// Run the whole callback leg of a login attempt to a terminal state.
    ///
    /// Store access runs on the blocking pool; the token exchange is the
    /// only step awaited on the runtime.
    #[instrument(skip(self, store, params))]
    pub async fn handle_callback<S>(
        &self,
        store: Arc<S>,
        provider: Provider,
        params: CallbackParams,
    ) -> LoginState
    where
        S: Storage + ?Sized + 'static,
    {
        let Some(client) = self.providers.get(&provider) else {
            return LoginState::failed(provider, LoginFailure::ProviderDisabled);
        };

        let state = {
            let store = Arc::clone(&store);
            run_blocking(move || Ok(receive_callback(store.as_ref(), provider, params)))
                .await
                .unwrap_or_else(|e| {
                    LoginState::failed(provider, LoginFailure::Persistence(e.to_string()))
                })
        };
        let LoginState::ProviderCallbackReceived { provider, code } = state else {
            return state;
        };

        let profile = match client.exchange(&code).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!(%provider, error = %e, "Provider handshake failed");
                return LoginState::failed(provider, LoginFailure::Handshake(e.to_string()));
            }
        };
        if profile.provider != provider {
            return LoginState::failed(provider, LoginFailure::ProviderMismatch);
        }

        let sessions = self.sessions;
        match run_blocking(move || complete_login(store.as_ref(), sessions, &profile)).await {
            Ok((user, session, created)) => LoginState::Authenticated {
                user,
                session,
                created,
            },
            Err(e) => LoginState::failed(provider, LoginFailure::Persistence(e.to_string())),
        }
    }
}

/// Validate the provider's redirect back to us.
///
/// The pending attempt is consumed whether or not the callback succeeds.
fn receive_callback<S>(store: &S, provider: Provider, params: CallbackParams) -> LoginState
where
    S: LoginAttemptRepository + ?Sized,
{
    let taken = match params.state.as_deref() {
        Some(state) => store.take_login_attempt(state),
        None => Ok(None),
    };
    let attempt = match taken {
        Ok(attempt) => attempt,
        Err(e) => return LoginState::failed(provider, LoginFailure::Persistence(e.to_string())),
    };

    if let Some(error) = params.error {
        return LoginState::failed(provider, LoginFailure::ConsentDenied(error));
    }
    let Some(attempt) = attempt else {
        return LoginState::failed(provider, LoginFailure::UnknownAttempt);
    };
    if attempt.provider != provider {
        return LoginState::failed(provider, LoginFailure::ProviderMismatch);
    }
    match params.code {
        Some(code) if !code.is_empty() => LoginState::ProviderCallbackReceived { provider, code },
        _ => LoginState::failed(provider, LoginFailure::MissingCode),
    }
}

/// The session is issued last, so a failed write never leaves one behind.
#[instrument(skip(store, sessions, profile), fields(provider = %profile.provider))]
fn complete_login<S>(
    store: &S,
    sessions: SessionManager,
    profile: &ExternalProfile,
) -> Result<(User, Session, bool)>
where
    S: UserRepository + ?Sized,
{
    let (user, created) = store.find_or_create_user(profile)?;
    store.update_last_login(user.id)?;
    let session = sessions.issue(store, user.id)?;
    info!(user_id = %user.id, created, "Login completed");
    Ok((user, session, created))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::models::{SearchRecord, SearchTerm, TermCount};
    use crate::storage::{Database, SearchRepository};
    use async_trait::async_trait;
    use uuid::Uuid;

    /// Treats the authorization code as the external id
    struct FakeProvider {
        provider: Provider,
        fail: bool,
    }

    #[async_trait]
    impl IdentityProvider for FakeProvider {
        fn provider(&self) -> Provider {
            self.provider
        }

        fn authorize_url(&self, state: &str) -> Result<String> {
            Ok(format!("https://idp.test/authorize?state={state}"))
        }

        async fn exchange(&self, code: &str) -> Result<ExternalProfile> {
            if self.fail {
                return Err(Error::upstream(self.provider.as_str(), "token endpoint down"));
            }
            Ok(ExternalProfile {
                provider: self.provider,
                external_id: code.to_string(),
                display_name: format!("user-{code}"),
            })
        }
    }

    fn coordinator(fail: bool) -> AuthCoordinator {
        AuthCoordinator::new(SessionManager::default())
            .with_provider(Arc::new(FakeProvider {
                provider: Provider::Google,
                fail,
            }))
            .with_provider(Arc::new(FakeProvider {
                provider: Provider::GitHub,
                fail,
            }))
    }

    fn redirected_state(auth: &AuthCoordinator, db: &Database, provider: Provider) -> String {
        match auth.begin(db, provider) {
            LoginState::ProviderRedirected {
                attempt,
                authorize_url,
            } => {
                assert!(authorize_url.contains(&attempt.state));
                attempt.state
            }
            other => panic!("expected redirect, got {}", other.name()),
        }
    }

    fn callback(code: &str, state: &str) -> CallbackParams {
        CallbackParams {
            code: Some(code.into()),
            state: Some(state.into()),
            error: None,
        }
    }

    #[tokio::test]
    async fn test_first_login_creates_user_second_reuses() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let auth = coordinator(false);

        let state = redirected_state(&auth, &db, Provider::Google);
        let first = auth
            .handle_callback(db.clone(), Provider::Google, callback("g123", &state))
            .await;
        let LoginState::Authenticated {
            user: u1,
            created: true,
            ..
        } = first
        else {
            panic!("first login should create a user");
        };

        let state = redirected_state(&auth, &db, Provider::Google);
        let second = auth
            .handle_callback(db.clone(), Provider::Google, callback("g123", &state))
            .await;
        let LoginState::Authenticated {
            user: u2,
            session,
            created: false,
        } = second
        else {
            panic!("second login should reuse the user");
        };

        assert_eq!(u1.id, u2.id);
        assert_eq!(auth.sessions().resolve(db.as_ref(), session.id).unwrap(), Some(u1.id));
        assert!(db.find_user_by_id(u1.id).unwrap().unwrap().last_login.is_some());
    }

    #[tokio::test]
    async fn test_handshake_failure_creates_nothing() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let auth = coordinator(true);

        let state = redirected_state(&auth, &db, Provider::GitHub);
        let outcome = auth
            .handle_callback(db.clone(), Provider::GitHub, callback("h1", &state))
            .await;

        assert!(matches!(
            outcome,
            LoginState::Failed {
                reason: LoginFailure::Handshake(_),
                ..
            }
        ));
        assert!(db
            .find_user_by_external_id(Provider::GitHub, "h1")
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_unknown_state_fails() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let auth = coordinator(false);

        let outcome = auth
            .handle_callback(db.clone(), Provider::Google, callback("g1", "forged"))
            .await;
        assert!(matches!(
            outcome,
            LoginState::Failed {
                reason: LoginFailure::UnknownAttempt,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_state_cannot_be_replayed() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let auth = coordinator(false);

        let state = redirected_state(&auth, &db, Provider::Google);
        let first = auth
            .handle_callback(db.clone(), Provider::Google, callback("g1", &state))
            .await;
        assert!(matches!(first, LoginState::Authenticated { .. }));

        let replay = auth
            .handle_callback(db.clone(), Provider::Google, callback("g1", &state))
            .await;
        assert!(matches!(replay, LoginState::Failed { .. }));
    }

    /// A store whose last-login write always fails
    struct StaleLoginStore(Database);

    impl UserRepository for StaleLoginStore {
        fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
            self.0.find_user_by_id(id)
        }

        fn find_user_by_external_id(
            &self,
            provider: Provider,
            external_id: &str,
        ) -> Result<Option<User>> {
            self.0.find_user_by_external_id(provider, external_id)
        }

        fn find_or_create_user(&self, profile: &ExternalProfile) -> Result<(User, bool)> {
            self.0.find_or_create_user(profile)
        }

        fn update_last_login(&self, _user_id: Uuid) -> Result<()> {
            Err(Error::Validation("disk full".into()))
        }

        fn create_session(&self, session: &Session) -> Result<()> {
            self.0.create_session(session)
        }

        fn find_valid_session(&self, session_id: Uuid) -> Result<Option<Session>> {
            self.0.find_valid_session(session_id)
        }

        fn delete_session(&self, session_id: Uuid) -> Result<bool> {
            self.0.delete_session(session_id)
        }

        fn delete_user_sessions(&self, user_id: Uuid) -> Result<u64> {
            self.0.delete_user_sessions(user_id)
        }

        fn cleanup_expired_sessions(&self) -> Result<u64> {
            self.0.cleanup_expired_sessions()
        }
    }

    impl SearchRepository for StaleLoginStore {
        fn append_search(&self, user_id: Uuid, term: &SearchTerm) -> Result<SearchRecord> {
            self.0.append_search(user_id, term)
        }

        fn list_searches_for_user(&self, user_id: Uuid) -> Result<Vec<SearchRecord>> {
            self.0.list_searches_for_user(user_id)
        }

        fn top_terms(&self, limit: u32) -> Result<Vec<TermCount>> {
            self.0.top_terms(limit)
        }
    }

    impl LoginAttemptRepository for StaleLoginStore {
        fn create_login_attempt(&self, attempt: &LoginAttempt) -> Result<()> {
            self.0.create_login_attempt(attempt)
        }

        fn take_login_attempt(&self, state: &str) -> Result<Option<LoginAttempt>> {
            self.0.take_login_attempt(state)
        }

        fn cleanup_expired_login_attempts(&self) -> Result<u64> {
            self.0.cleanup_expired_login_attempts()
        }
    }

    #[tokio::test]
    async fn test_failed_last_login_write_leaves_no_session() {
        let store = Arc::new(StaleLoginStore(Database::open_in_memory().unwrap()));
        let auth = coordinator(false);

        let state = redirected_state(&auth, &store.0, Provider::Google);
        let outcome = auth
            .handle_callback(store.clone(), Provider::Google, callback("g7", &state))
            .await;

        assert!(matches!(
            outcome,
            LoginState::Failed {
                reason: LoginFailure::Persistence(_),
                ..
            }
        ));
        let user = store
            .find_user_by_external_id(Provider::Google, "g7")
            .unwrap()
            .unwrap();
        assert_eq!(store.delete_user_sessions(user.id).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_callback_for_other_provider_fails() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let auth = coordinator(false);

        let state = redirected_state(&auth, &db, Provider::Google);
        let outcome = auth
            .handle_callback(db.clone(), Provider::GitHub, callback("x", &state))
            .await;
        assert!(matches!(
            outcome,
            LoginState::Failed {
                reason: LoginFailure::ProviderMismatch,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_denied_consent_fails_and_consumes_attempt() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let auth = coordinator(false);

        let state = redirected_state(&auth, &db, Provider::Google);
        let denied = auth
            .handle_callback(
                db.clone(),
                Provider::Google,
                CallbackParams {
                    code: None,
                    state: Some(state.clone()),
                    error: Some("access_denied".into()),
                },
            )
            .await;
        assert!(matches!(
            denied,
            LoginState::Failed {
                reason: LoginFailure::ConsentDenied(_),
                ..
            }
        ));
        assert!(db.take_login_attempt(&state).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_code_fails() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let auth = coordinator(false);

        let state = redirected_state(&auth, &db, Provider::GitHub);
        let outcome = auth
            .handle_callback(
                db.clone(),
                Provider::GitHub,
                CallbackParams {
                    code: None,
                    state: Some(state),
                    error: None,
                },
            )
            .await;
        assert!(matches!(
            outcome,
            LoginState::Failed {
                reason: LoginFailure::MissingCode,
                ..
            }
        ));
    }

    #[test]
    fn test_disabled_provider() {
        let db = Database::open_in_memory().unwrap();
        let auth = AuthCoordinator::new(SessionManager::default());

        assert!(auth.enabled_providers().is_empty());
        let outcome = auth.begin(&db, Provider::Google);
        assert!(matches!(
            outcome,
            LoginState::Failed {
                reason: LoginFailure::ProviderDisabled,
                ..
            }
        ));
    }

    #[test]
    fn test_states_are_unique() {
        assert_ne!(gen_state(), gen_state());
        assert_eq!(gen_state().len(), 43);
    }
}
