//! SQLite storage layer for Snapseek

mod login_attempts;
mod migrations;
mod parse;
mod searches;
mod traits;
mod users;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    ExternalProfile, LoginAttempt, Provider, SearchRecord, SearchTerm, Session, TermCount, User,
};
use rusqlite::Connection;
use std::path::Path;
use tracing::instrument;

pub use login_attempts::LoginAttemptStore;
pub use searches::SearchStore;
pub use traits::{LoginAttemptRepository, SearchRepository, Storage, UserRepository};
pub use users::UserStore;

/// Main database handle
///
/// The connection sits behind a mutex. Each store accessor holds the lock
/// for as long as the returned store lives, so keep stores short-lived and
/// never hold one across an `.await`.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create database at the given path
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init()?;
        Ok(db)
    }

    /// Open in-memory database (for testing)
    #[instrument]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init()?;
        Ok(db)
    }

    /// Initialize database schema via migrations
    fn init(&self) -> Result<()> {
        migrations::run_migrations(&self.conn.lock())?;
        Ok(())
    }

    /// Get current schema version
    pub fn schema_version(&self) -> u32 {
        self.conn
            .lock()
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap_or(0)
    }

    /// Get user store
    pub fn users(&self) -> UserStore<'_> {
        UserStore::new(self.conn.lock())
    }

    /// Get search log store
    pub fn searches(&self) -> SearchStore<'_> {
        SearchStore::new(self.conn.lock())
    }

    /// Get pending login store
    pub fn login_attempts(&self) -> LoginAttemptStore<'_> {
        LoginAttemptStore::new(self.conn.lock())
    }
}

// Implement repository traits for Database
// This enables using Database through the trait interface

impl UserRepository for Database {
    fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        self.users().find_by_id(id)
    }

    fn find_user_by_external_id(
        &self,
        provider: Provider,
        external_id: &str,
    ) -> Result<Option<User>> {
        self.users().find_by_external_id(provider, external_id)
    }

    fn find_or_create_user(&self, profile: &ExternalProfile) -> Result<(User, bool)> {
        self.users().find_or_create(profile)
    }

    fn update_last_login(&self, user_id: Uuid) -> Result<()> {
        self.users().update_last_login(user_id)
    }

    fn create_session(&self, session: &Session) -> Result<()> {
        self.users().create_session(session)
    }

    fn find_valid_session(&self, session_id: Uuid) -> Result<Option<Session>> {
        self.users().find_valid_session(session_id)
    }

    fn delete_session(&self, session_id: Uuid) -> Result<bool> {
        self.users().delete_session(session_id)
    }

    fn delete_user_sessions(&self, user_id: Uuid) -> Result<u64> {
        self.users().delete_user_sessions(user_id)
    }

    fn cleanup_expired_sessions(&self) -> Result<u64> {
        self.users().cleanup_expired_sessions()
    }
}

impl SearchRepository for Database {
    fn append_search(&self, user_id: Uuid, term: &SearchTerm) -> Result<SearchRecord> {
        self.searches().append(user_id, term)
    }

    fn list_searches_for_user(&self, user_id: Uuid) -> Result<Vec<SearchRecord>> {
        self.searches().list_for_user(user_id)
    }

    fn top_terms(&self, limit: u32) -> Result<Vec<TermCount>> {
        self.searches().top_terms(limit)
    }
}

impl LoginAttemptRepository for Database {
    fn create_login_attempt(&self, attempt: &LoginAttempt) -> Result<()> {
        self.login_attempts().create(attempt)
    }

    fn take_login_attempt(&self, state: &str) -> Result<Option<LoginAttempt>> {
        self.login_attempts().take(state)
    }

    fn cleanup_expired_login_attempts(&self) -> Result<u64> {
        self.login_attempts().cleanup_expired()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_on_disk_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapseek.db");

        let user_id = {
            let db = Database::open(&path).unwrap();
            let (user, _) = db
                .find_or_create_user(&ExternalProfile {
                    provider: Provider::Google,
                    external_id: "g-disk".into(),
                    display_name: "Disk".into(),
                })
                .unwrap();
            db.append_search(user.id, &SearchTerm::parse("rivers").unwrap())
                .unwrap();
            user.id
        };

        let reopened = Database::open(&path).unwrap();
        assert!(reopened.schema_version() > 0);
        assert!(reopened.find_user_by_id(user_id).unwrap().is_some());
        assert_eq!(reopened.searches().count_for_user(user_id).unwrap(), 1);
    }

    #[test]
    fn test_database_is_storage() {
        fn assert_storage<S: Storage>() {}
        assert_storage::<Database>();
    }
}
