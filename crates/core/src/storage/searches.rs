//! Search log storage operations
//!
//! The `searches` table is insert-only. There is no update or delete path.

use chrono::{Duration, SubsecRound, Utc};
use parking_lot::MutexGuard;
use rusqlite::{params, Connection};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{format_datetime, parse_datetime, parse_uuid};
use crate::error::Result;
use crate::models::{SearchRecord, SearchTerm, TermCount};

pub struct SearchStore<'a> {
    conn: MutexGuard<'a, Connection>,
}

impl<'a> SearchStore<'a> {
    pub fn new(conn: MutexGuard<'a, Connection>) -> Self {
        Self { conn }
    }

    /// Append a search for `user_id`.
    ///
    /// The timestamp is assigned here and is strictly greater than any
    /// earlier record of the same user.
    #[instrument(skip(self, term), fields(term = %term))]
    pub fn append(&self, user_id: Uuid, term: &SearchTerm) -> Result<SearchRecord> {
        let tx = self.conn.unchecked_transaction()?;

        let last: Option<String> = tx.query_row(
            "SELECT MAX(searched_at) FROM searches WHERE user_id = ?1",
            params![user_id.to_string()],
            |row| row.get(0),
        )?;

        let mut timestamp = Utc::now().trunc_subsecs(6);
        if let Some(last) = last {
            let last = parse_datetime(&last)?;
            if timestamp <= last {
                timestamp = last + Duration::microseconds(1);
            }
        }

        let record = SearchRecord {
            id: Uuid::new_v4(),
            user_id,
            term: term.as_str().to_string(),
            timestamp,
        };

        tx.execute(
            "INSERT INTO searches (id, user_id, term, searched_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                record.id.to_string(),
                record.user_id.to_string(),
                record.term,
                format_datetime(&record.timestamp),
            ],
        )?;
        tx.commit()?;

        Ok(record)
    }

    /// All searches of a user, newest first
    #[instrument(skip(self))]
    pub fn list_for_user(&self, user_id: Uuid) -> Result<Vec<SearchRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, term, searched_at
             FROM searches
             WHERE user_id = ?1
             ORDER BY searched_at DESC, seq DESC",
        )?;

        let records = stmt
            .query_map(params![user_id.to_string()], |row| {
                Ok(SearchRecord {
                    id: parse_uuid(&row.get::<_, String>(0)?)?,
                    user_id: parse_uuid(&row.get::<_, String>(1)?)?,
                    term: row.get(2)?,
                    timestamp: parse_datetime(&row.get::<_, String>(3)?)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// Most frequent terms across all users.
    ///
    /// Ordered by count descending, then term ascending.
    #[instrument(skip(self))]
    pub fn top_terms(&self, limit: u32) -> Result<Vec<TermCount>> {
        let mut stmt = self.conn.prepare(
            "SELECT term, COUNT(*) AS hits
             FROM searches
             GROUP BY term
             ORDER BY hits DESC, term ASC
             LIMIT ?1",
        )?;

        let terms = stmt
            .query_map(params![limit], |row| {
                Ok(TermCount {
                    term: row.get(0)?,
                    count: row.get::<_, i64>(1)? as u64,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(terms)
    }

    /// Number of searches logged by a user
    #[cfg(test)]
    pub(crate) fn count_for_user(&self, user_id: Uuid) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM searches WHERE user_id = ?1",
            params![user_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}
