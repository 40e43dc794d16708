//! User, identity binding and session storage operations

use chrono::Utc;
use parking_lot::MutexGuard;
use rusqlite::{params, Connection, Row};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::parse::{format_datetime, parse_datetime, parse_datetime_opt, parse_uuid, OptionalExt};
use crate::error::{Error, Result};
use crate::models::{ExternalProfile, Provider, Session, User};

const USER_COLUMNS: &str = "id, name, google_id, github_id, created_at, last_login";

pub struct UserStore<'a> {
    conn: MutexGuard<'a, Connection>,
}

impl<'a> UserStore<'a> {
    pub fn new(conn: MutexGuard<'a, Connection>) -> Self {
        Self { conn }
    }

    fn map_user(row: &Row<'_>) -> rusqlite::Result<User> {
        Ok(User {
            id: parse_uuid(&row.get::<_, String>(0)?)?,
            name: row.get(1)?,
            google_id: row.get(2)?,
            github_id: row.get(3)?,
            created_at: parse_datetime(&row.get::<_, String>(4)?)?,
            last_login: parse_datetime_opt(row.get::<_, Option<String>>(5)?)?,
        })
    }

    /// Find user by ID
    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))?;

        let user = stmt
            .query_row(params![id.to_string()], Self::map_user)
            .optional()?;

        Ok(user)
    }

    /// Find the user owning a provider identity
    #[instrument(skip(self))]
    pub fn find_by_external_id(
        &self,
        provider: Provider,
        external_id: &str,
    ) -> Result<Option<User>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE {} = ?1",
            provider.column()
        ))?;

        let user = stmt
            .query_row(params![external_id], Self::map_user)
            .optional()?;

        Ok(user)
    }

    /// Return the owner of `profile`'s identity, creating it if none exists.
    ///
    /// The insert is guarded by the per-provider UNIQUE column, so two
    /// concurrent first logins converge on one row. The flag reports whether
    /// this call created the user.
    #[instrument(skip(self, profile), fields(provider = %profile.provider))]
    pub fn find_or_create(&self, profile: &ExternalProfile) -> Result<(User, bool)> {
        let candidate = User::from_profile(profile);
        let inserted = self.conn.execute(
            &format!(
                "INSERT INTO users (id, name, {}, created_at, last_login)
                 VALUES (?1, ?2, ?3, ?4, NULL)
                 ON CONFLICT DO NOTHING",
                profile.provider.column()
            ),
            params![
                candidate.id.to_string(),
                candidate.name,
                profile.external_id,
                format_datetime(&candidate.created_at),
            ],
        )?;

        let user = self
            .find_by_external_id(profile.provider, &profile.external_id)?
            .ok_or_else(|| {
                Error::NotFound(format!(
                    "{} identity {}",
                    profile.provider, profile.external_id
                ))
            })?;

        let created = inserted == 1;
        debug!(user_id = %user.id, created, "Resolved provider identity");
        Ok((user, created))
    }

    /// Update last login time
    pub fn update_last_login(&self, user_id: Uuid) -> Result<()> {
        self.conn.execute(
            "UPDATE users SET last_login = ?1 WHERE id = ?2",
            params![format_datetime(&Utc::now()), user_id.to_string()],
        )?;
        Ok(())
    }

    /// Create a session
    #[instrument(skip(self, session), fields(user_id = %session.user_id))]
    pub fn create_session(&self, session: &Session) -> Result<()> {
        self.conn.execute(
            "INSERT INTO sessions (id, user_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                session.id.to_string(),
                session.user_id.to_string(),
                format_datetime(&session.created_at),
                format_datetime(&session.expires_at),
            ],
        )?;
        Ok(())
    }

    /// Find valid session
    #[instrument(skip(self))]
    pub fn find_valid_session(&self, session_id: Uuid) -> Result<Option<Session>> {
        let mut stmt = self.conn.prepare(
            "SELECT s.id, s.user_id, s.created_at, s.expires_at
             FROM sessions s
             INNER JOIN users u ON u.id = s.user_id
             WHERE s.id = ?1 AND s.expires_at > ?2",
        )?;

        let now = format_datetime(&Utc::now());
        let session = stmt
            .query_row(params![session_id.to_string(), now], |row| {
                Ok(Session {
                    id: parse_uuid(&row.get::<_, String>(0)?)?,
                    user_id: parse_uuid(&row.get::<_, String>(1)?)?,
                    created_at: parse_datetime(&row.get::<_, String>(2)?)?,
                    expires_at: parse_datetime(&row.get::<_, String>(3)?)?,
                })
            })
            .optional()?;

        Ok(session)
    }

    /// Delete session. Returns whether a row was removed.
    pub fn delete_session(&self, session_id: Uuid) -> Result<bool> {
        let count = self.conn.execute(
            "DELETE FROM sessions WHERE id = ?1",
            params![session_id.to_string()],
        )?;
        Ok(count > 0)
    }

    /// Delete all sessions for user
    pub fn delete_user_sessions(&self, user_id: Uuid) -> Result<u64> {
        let count = self.conn.execute(
            "DELETE FROM sessions WHERE user_id = ?1",
            params![user_id.to_string()],
        )?;
        Ok(count as u64)
    }

    /// Clean up expired sessions
    pub fn cleanup_expired_sessions(&self) -> Result<u64> {
        let count = self.conn.execute(
            "DELETE FROM sessions WHERE expires_at <= ?1",
            params![format_datetime(&Utc::now())],
        )?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use crate::models::{ExternalProfile, Provider, Session};
    use crate::storage::Database;

    fn profile(provider: Provider, id: &str, name: &str) -> ExternalProfile {
        ExternalProfile {
            provider,
            external_id: id.into(),
            display_name: name.into(),
        }
    }

    #[test]
    fn test_find_or_create_reuses_owner() {
        let db = Database::open_in_memory().unwrap();

        let (first, created) = db
            .users()
            .find_or_create(&profile(Provider::Google, "g123", "Alice"))
            .unwrap();
        assert!(created);
        assert_eq!(first.google_id.as_deref(), Some("g123"));

        let (second, created) = db
            .users()
            .find_or_create(&profile(Provider::Google, "g123", "Alice Renamed"))
            .unwrap();
        assert!(!created);
        assert_eq!(second.id, first.id);
        assert_eq!(second.name, "Alice");
    }

    #[test]
    fn test_same_external_id_on_other_provider_is_distinct() {
        let db = Database::open_in_memory().unwrap();

        let (google, _) = db
            .users()
            .find_or_create(&profile(Provider::Google, "777", "G"))
            .unwrap();
        let (github, created) = db
            .users()
            .find_or_create(&profile(Provider::GitHub, "777", "H"))
            .unwrap();

        assert!(created);
        assert_ne!(google.id, github.id);
        assert!(github.google_id.is_none());
    }

    #[test]
    fn test_find_by_external_id_missing() {
        let db = Database::open_in_memory().unwrap();
        let found = db
            .users()
            .find_by_external_id(Provider::GitHub, "nobody")
            .unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn test_session_lifecycle() {
        let db = Database::open_in_memory().unwrap();
        let (user, _) = db
            .users()
            .find_or_create(&profile(Provider::GitHub, "9", "Nine"))
            .unwrap();

        let session = Session::new(user.id, 1);
        db.users().create_session(&session).unwrap();

        let found = db.users().find_valid_session(session.id).unwrap().unwrap();
        assert_eq!(found.user_id, user.id);

        assert!(db.users().delete_session(session.id).unwrap());
        assert!(!db.users().delete_session(session.id).unwrap());
        assert!(db.users().find_valid_session(session.id).unwrap().is_none());
    }

    #[test]
    fn test_expired_sessions_do_not_resolve_and_are_swept() {
        let db = Database::open_in_memory().unwrap();
        let (user, _) = db
            .users()
            .find_or_create(&profile(Provider::Google, "e", "Expired"))
            .unwrap();

        let expired = Session::new(user.id, -1);
        let live = Session::new(user.id, 1);
        db.users().create_session(&expired).unwrap();
        db.users().create_session(&live).unwrap();

        assert!(db.users().find_valid_session(expired.id).unwrap().is_none());
        assert_eq!(db.users().cleanup_expired_sessions().unwrap(), 1);
        assert!(db.users().find_valid_session(live.id).unwrap().is_some());
    }

    #[test]
    fn test_delete_user_sessions() {
        let db = Database::open_in_memory().unwrap();
        let (user, _) = db
            .users()
            .find_or_create(&profile(Provider::Google, "m", "Many"))
            .unwrap();
        for _ in 0..3 {
            db.users().create_session(&Session::new(user.id, 1)).unwrap();
        }
        assert_eq!(db.users().delete_user_sessions(user.id).unwrap(), 3);
    }
}
