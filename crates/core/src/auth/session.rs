//! Server-side session lifecycle

use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::Session;
use crate::storage::{LoginAttemptRepository, UserRepository};

/// Default session lifetime: one week
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 24 * 7;

/// Longest accepted session lifetime: ten years
pub const MAX_SESSION_TTL_HOURS: i64 = 24 * 365 * 10;

/// Issues, resolves and destroys sessions
#[derive(Debug, Clone, Copy)]
pub struct SessionManager {
    ttl_hours: i64,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self {
            ttl_hours: DEFAULT_SESSION_TTL_HOURS,
        }
    }
}

impl SessionManager {
    /// `ttl_hours` is capped at [`MAX_SESSION_TTL_HOURS`]
    pub fn new(ttl_hours: i64) -> Self {
        Self {
            ttl_hours: ttl_hours.min(MAX_SESSION_TTL_HOURS),
        }
    }

    pub fn ttl_hours(&self) -> i64 {
        self.ttl_hours
    }

    /// Create a session bound to `user_id`
    #[instrument(skip(self, store))]
    pub fn issue<S>(&self, store: &S, user_id: Uuid) -> Result<Session>
    where
        S: UserRepository + ?Sized,
    {
        let session = Session::new(user_id, self.ttl_hours);
        store.create_session(&session)?;
        info!(session_id = %session.id, "Session issued");
        Ok(session)
    }

    /// The user behind `token`, or `None` if unknown or expired
    pub fn resolve<S>(&self, store: &S, token: Uuid) -> Result<Option<Uuid>>
    where
        S: UserRepository + ?Sized,
    {
        Ok(store.find_valid_session(token)?.map(|s| s.user_id))
    }

    /// Gate for protected operations: resolves or fails with `Unauthorized`
    pub fn require<S>(&self, store: &S, token: Option<Uuid>) -> Result<Uuid>
    where
        S: UserRepository + ?Sized,
    {
        let Some(token) = token else {
            return Err(Error::Unauthorized);
        };
        self.resolve(store, token)?.ok_or(Error::Unauthorized)
    }

    /// Destroy a session. Unknown or already destroyed tokens are fine.
    #[instrument(skip(self, store))]
    pub fn destroy<S>(&self, store: &S, token: Uuid) -> Result<()>
    where
        S: UserRepository + ?Sized,
    {
        let removed = store.delete_session(token)?;
        debug!(removed, "Session destroyed");
        Ok(())
    }

    /// Destroy every session of a user
    pub fn destroy_all<S>(&self, store: &S, user_id: Uuid) -> Result<u64>
    where
        S: UserRepository + ?Sized,
    {
        store.delete_user_sessions(user_id)
    }

    /// Remove expired sessions and stale login attempts
    pub fn sweep<S>(&self, store: &S) -> Result<(u64, u64)>
    where
        S: UserRepository + LoginAttemptRepository + ?Sized,
    {
        let sessions = store.cleanup_expired_sessions()?;
        let attempts = store.cleanup_expired_login_attempts()?;
        if sessions > 0 || attempts > 0 {
            debug!(sessions, attempts, "Swept expired auth state");
        }
        Ok((sessions, attempts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExternalProfile, Provider};
    use crate::storage::Database;

    fn setup() -> (Database, Uuid) {
        let db = Database::open_in_memory().unwrap();
        let (user, _) = db
            .find_or_create_user(&ExternalProfile {
                provider: Provider::Google,
                external_id: "g123".into(),
                display_name: "Alice".into(),
            })
            .unwrap();
        (db, user.id)
    }

    #[test]
    fn test_issue_then_resolve() {
        let (db, user_id) = setup();
        let sessions = SessionManager::default();

        let session = sessions.issue(&db, user_id).unwrap();
        assert_eq!(sessions.resolve(&db, session.id).unwrap(), Some(user_id));
        assert_eq!(sessions.require(&db, Some(session.id)).unwrap(), user_id);
    }

    #[test]
    fn test_require_without_token_is_unauthorized() {
        let (db, _) = setup();
        let sessions = SessionManager::default();

        assert!(matches!(sessions.require(&db, None), Err(Error::Unauthorized)));
        assert!(matches!(
            sessions.require(&db, Some(Uuid::new_v4())),
            Err(Error::Unauthorized)
        ));
    }

    #[test]
    fn test_destroy_is_immediate_and_idempotent() {
        let (db, user_id) = setup();
        let sessions = SessionManager::default();
        let session = sessions.issue(&db, user_id).unwrap();

        sessions.destroy(&db, session.id).unwrap();
        assert_eq!(sessions.resolve(&db, session.id).unwrap(), None);

        sessions.destroy(&db, session.id).unwrap();
        sessions.destroy(&db, Uuid::new_v4()).unwrap();
    }

    #[test]
    fn test_expired_ttl_never_resolves() {
        let (db, user_id) = setup();
        let sessions = SessionManager::new(-1);
        let session = sessions.issue(&db, user_id).unwrap();

        assert_eq!(sessions.resolve(&db, session.id).unwrap(), None);
        assert_eq!(sessions.sweep(&db).unwrap(), (1, 0));
    }

    #[test]
    fn test_destroy_all() {
        let (db, user_id) = setup();
        let sessions = SessionManager::default();
        let a = sessions.issue(&db, user_id).unwrap();
        let b = sessions.issue(&db, user_id).unwrap();

        assert_eq!(sessions.destroy_all(&db, user_id).unwrap(), 2);
        assert_eq!(sessions.resolve(&db, a.id).unwrap(), None);
        assert_eq!(sessions.resolve(&db, b.id).unwrap(), None);
    }

    #[test]
    fn test_oversized_ttl_is_capped() {
        let (db, user_id) = setup();
        let sessions = SessionManager::new(10_000_000_000);
        assert_eq!(sessions.ttl_hours(), MAX_SESSION_TTL_HOURS);

        let session = sessions.issue(&db, user_id).unwrap();
        assert_eq!(sessions.resolve(&db, session.id).unwrap(), Some(user_id));
    }
}
