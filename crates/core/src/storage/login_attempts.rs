//! Pending provider login attempts

use chrono::Utc;
use parking_lot::MutexGuard;
use rusqlite::{params, Connection};
use tracing::instrument;

use super::parse::{format_datetime, parse_datetime, parse_provider, OptionalExt};
use crate::error::Result;
use crate::models::LoginAttempt;

pub struct LoginAttemptStore<'a> {
    conn: MutexGuard<'a, Connection>,
}

impl<'a> LoginAttemptStore<'a> {
    pub fn new(conn: MutexGuard<'a, Connection>) -> Self {
        Self { conn }
    }

    /// Record a redirect to a provider
    #[instrument(skip(self, attempt), fields(provider = %attempt.provider))]
    pub fn create(&self, attempt: &LoginAttempt) -> Result<()> {
        self.conn.execute(
            "INSERT INTO login_attempts (state, provider, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                attempt.state,
                attempt.provider.as_str(),
                format_datetime(&attempt.created_at),
                format_datetime(&attempt.expires_at),
            ],
        )?;
        Ok(())
    }

    /// Remove and return the attempt for `state`, if it has not expired.
    ///
    /// An attempt can be taken at most once.
    #[instrument(skip(self, state))]
    pub fn take(&self, state: &str) -> Result<Option<LoginAttempt>> {
        let tx = self.conn.unchecked_transaction()?;

        let attempt = tx
            .query_row(
                "SELECT state, provider, created_at, expires_at FROM login_attempts WHERE state = ?1",
                params![state],
                |row| {
                    Ok(LoginAttempt {
                        state: row.get(0)?,
                        provider: parse_provider(&row.get::<_, String>(1)?)?,
                        created_at: parse_datetime(&row.get::<_, String>(2)?)?,
                        expires_at: parse_datetime(&row.get::<_, String>(3)?)?,
                    })
                },
            )
            .optional()?;

        if attempt.is_some() {
            tx.execute(
                "DELETE FROM login_attempts WHERE state = ?1",
                params![state],
            )?;
        }
        tx.commit()?;

        Ok(attempt.filter(LoginAttempt::is_valid))
    }

    /// Clean up expired attempts
    pub fn cleanup_expired(&self) -> Result<u64> {
        let count = self.conn.execute(
            "DELETE FROM login_attempts WHERE expires_at <= ?1",
            params![format_datetime(&Utc::now())],
        )?;
        Ok(count as u64)
    }
}
