//! Versioned schema migrations
//!
//! Applied versions are recorded in `schema_migrations`.

use chrono::Utc;
use rusqlite::{params, Connection};
use tracing::{debug, info, instrument};

use super::parse::format_datetime;
use crate::error::Result;

/// One schema step. Versions start at 1 and have no gaps.
pub struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// Applied in order; never edit a released entry, append a new one
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Initial schema",
        sql: r#"
            -- Users table, one nullable identity slot per provider
            -- UNIQUE allows many NULLs but at most one owner per external id
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                google_id TEXT UNIQUE,
                github_id TEXT UNIQUE,
                created_at TEXT NOT NULL,
                last_login TEXT
            );

            -- Sessions table
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
        "#,
    },
    Migration {
        version: 2,
        description: "Add append-only search log",
        sql: r#"
            -- seq keeps insertion order for records sharing a timestamp
            CREATE TABLE IF NOT EXISTS searches (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                user_id TEXT NOT NULL,
                term TEXT NOT NULL,
                searched_at TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id)
            );
        "#,
    },
    Migration {
        version: 3,
        description: "Add pending provider login attempts",
        sql: r#"
            CREATE TABLE IF NOT EXISTS login_attempts (
                state TEXT PRIMARY KEY,
                provider TEXT NOT NULL,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL
            );
        "#,
    },
    Migration {
        version: 4,
        description: "Add indexes for query performance",
        sql: r#"
            -- Session indexes
            CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at);

            -- Search indexes: history by user, aggregation by term
            CREATE INDEX IF NOT EXISTS idx_searches_user_time ON searches(user_id, searched_at);
            CREATE INDEX IF NOT EXISTS idx_searches_term ON searches(term);

            CREATE INDEX IF NOT EXISTS idx_login_attempts_expires ON login_attempts(expires_at);
        "#,
    },
];

const MIGRATIONS_TABLE: &str = "CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    description TEXT NOT NULL,
    applied_at TEXT NOT NULL
)";

fn schema_version(conn: &Connection) -> Result<u32> {
    let version: Option<u32> =
        conn.query_row("SELECT MAX(version) FROM schema_migrations", [], |row| row.get(0))?;
    Ok(version.unwrap_or(0))
}

/// Apply one migration and its bookkeeping row atomically
fn apply(conn: &Connection, migration: &Migration) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(migration.sql)?;
    tx.execute(
        "INSERT INTO schema_migrations (version, description, applied_at) VALUES (?1, ?2, ?3)",
        params![
            migration.version,
            migration.description,
            format_datetime(&Utc::now())
        ],
    )?;
    tx.commit()?;
    Ok(())
}

/// Bring the schema up to date. Returns how many migrations ran.
#[instrument(skip(conn))]
pub fn run_migrations(conn: &Connection) -> Result<usize> {
    conn.execute(MIGRATIONS_TABLE, [])?;

    let from = schema_version(conn)?;
    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > from).collect();
    if pending.is_empty() {
        debug!(version = from, "Schema up to date");
        return Ok(0);
    }

    for migration in &pending {
        info!(
            version = migration.version,
            description = migration.description,
            "Applying migration"
        );
        apply(conn, migration)?;
    }

    info!(from, to = schema_version(conn)?, "Database schema updated");
    Ok(pending.len())
}
