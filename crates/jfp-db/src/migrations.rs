//! Embedded SQL migrations and runner.
//!
//! Migrations are stored as `&str` constants and executed in order. A
//! `schema_migrations` table tracks which versions have been applied.

use jfp_core::{Error, Result};
use rusqlite::Connection;

/// V1: initial schema -- proxy users, backends, per-user backend mappings, sessions.
const V1_INITIAL: &str = r#"
CREATE TABLE users (
    id            TEXT PRIMARY KEY,
    username      TEXT UNIQUE NOT NULL,
    display_name  TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    is_admin      INTEGER NOT NULL DEFAULT 0,
    avatar        BLOB,
    avatar_content_type TEXT,
    created_at    TEXT NOT NULL
);

CREATE TABLE backends (
    id                 TEXT PRIMARY KEY,
    name               TEXT NOT NULL,
    base_url           TEXT NOT NULL,
    jellyfin_server_id TEXT UNIQUE NOT NULL,
    prefix             TEXT UNIQUE NOT NULL,
    enabled            INTEGER NOT NULL DEFAULT 1,
    created_at         TEXT NOT NULL
);

CREATE TABLE backend_user_mappings (
    id              TEXT PRIMARY KEY,
    user_id         TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    backend_id      TEXT NOT NULL REFERENCES backends(id) ON DELETE CASCADE,
    backend_user_id TEXT NOT NULL,
    backend_token   TEXT,
    enabled         INTEGER NOT NULL DEFAULT 1,
    UNIQUE (user_id, backend_id)
);

CREATE TABLE sessions (
    id            TEXT PRIMARY KEY,
    token         TEXT UNIQUE NOT NULL,
    user_id       TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    device_id     TEXT,
    device_name   TEXT,
    app_name      TEXT,
    app_version   TEXT,
    last_activity TEXT NOT NULL,
    created_at    TEXT NOT NULL
);

CREATE INDEX idx_mappings_user       ON backend_user_mappings(user_id);
CREATE INDEX idx_mappings_backend    ON backend_user_mappings(backend_id);
CREATE INDEX idx_sessions_user       ON sessions(user_id);
CREATE INDEX idx_sessions_token      ON sessions(token);
"#;

/// Ordered list of (version, sql) pairs.
const MIGRATIONS: &[(i64, &str)] = &[(1, V1_INITIAL)];

/// Run all pending migrations on `conn`.
///
/// Creates the `schema_migrations` tracking table if it does not exist,
/// then applies each outstanding migration inside a transaction.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
    )
    .map_err(|e| Error::database(format!("failed to create schema_migrations: {e}")))?;

    for &(version, sql) in MIGRATIONS {
        let already: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM schema_migrations WHERE version = ?1",
                [version],
                |row| row.get(0),
            )
            .map_err(|e| Error::database(e.to_string()))?;

        if already {
            continue;
        }

        let tx = conn
            .unchecked_transaction()
            .map_err(|e| Error::database(e.to_string()))?;

        tx.execute_batch(sql)
            .map_err(|e| Error::database(format!("migration V{version} failed: {e}")))?;

        tx.execute(
            "INSERT INTO schema_migrations (version) VALUES (?1)",
            [version],
        )
        .map_err(|e| Error::database(e.to_string()))?;

        tx.commit().map_err(|e| Error::database(e.to_string()))?;
    }

    Ok(())
}
