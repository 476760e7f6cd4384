//! Queries against the `sessions` table.

use chrono::{DateTime, Utc};
use jfp_core::{Error, Result, SessionId, UserId};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::models::Session;

fn from_row(row: &Row) -> rusqlite::Result<Session> {
    let id: String = row.get("id")?;
    let user_id: String = row.get("user_id")?;
    let last_activity: String = row.get("last_activity")?;
    let created_at: String = row.get("created_at")?;
    Ok(Session {
        id: id.parse().map_err(|_| {
            rusqlite::Error::InvalidColumnType(0, "id".into(), rusqlite::types::Type::Text)
        })?,
        token: row.get("token")?,
        user_id: user_id.parse().map_err(|_| {
            rusqlite::Error::InvalidColumnType(1, "user_id".into(), rusqlite::types::Type::Text)
        })?,
        device_id: row.get("device_id")?,
        device_name: row.get("device_name")?,
        app_name: row.get("app_name")?,
        app_version: row.get("app_version")?,
        last_activity: last_activity
            .parse::<DateTime<Utc>>()
            .unwrap_or_else(|_| Utc::now()),
        created_at: created_at
            .parse::<DateTime<Utc>>()
            .unwrap_or_else(|_| Utc::now()),
    })
}

pub fn create(conn: &Connection, session: &Session) -> Result<()> {
    conn.execute(
        "INSERT INTO sessions (id, token, user_id, device_id, device_name, app_name, app_version, last_activity, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            session.id.to_string(),
            session.token,
            session.user_id.to_string(),
            session.device_id,
            session.device_name,
            session.app_name,
            session.app_version,
            session.last_activity.to_rfc3339(),
            session.created_at.to_rfc3339(),
        ],
    )
    .map_err(|e| Error::database(e.to_string()))?;
    Ok(())
}

pub fn get_by_token(conn: &Connection, token: &str) -> Result<Option<Session>> {
    conn.query_row(
        "SELECT * FROM sessions WHERE token = ?1",
        params![token],
        from_row,
    )
    .optional()
    .map_err(|e| Error::database(e.to_string()))
}

/// Update `last_activity`. Callers debounce this at the middleware layer so
/// a burst of requests does not translate into a write per request.
pub fn touch(conn: &Connection, id: SessionId, at: DateTime<Utc>) -> Result<()> {
    conn.execute(
        "UPDATE sessions SET last_activity = ?1 WHERE id = ?2",
        params![at.to_rfc3339(), id.to_string()],
    )
    .map_err(|e| Error::database(e.to_string()))?;
    Ok(())
}

pub fn delete(conn: &Connection, id: SessionId) -> Result<()> {
    conn.execute("DELETE FROM sessions WHERE id = ?1", params![id.to_string()])
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(())
}

pub fn delete_by_token(conn: &Connection, token: &str) -> Result<()> {
    conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(())
}

/// Delete every session for `user_id` except `keep`. Used on password change.
pub fn delete_for_user_except(
    conn: &Connection,
    user_id: UserId,
    keep: SessionId,
) -> Result<usize> {
    conn.execute(
        "DELETE FROM sessions WHERE user_id = ?1 AND id != ?2",
        params![user_id.to_string(), keep.to_string()],
    )
    .map_err(|e| Error::database(e.to_string()))
}

/// Delete sessions whose `last_activity` is older than `cutoff`. Used by the
/// idle-TTL sweep.
pub fn delete_idle_since(conn: &Connection, cutoff: DateTime<Utc>) -> Result<usize> {
    conn.execute(
        "DELETE FROM sessions WHERE last_activity < ?1",
        params![cutoff.to_rfc3339()],
    )
    .map_err(|e| Error::database(e.to_string()))
}
