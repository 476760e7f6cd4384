//! Queries against the `backends` table.

use chrono::{DateTime, Utc};
use jfp_core::{BackendId, Error, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::models::Backend;

fn from_row(row: &Row) -> rusqlite::Result<Backend> {
    let id: String = row.get("id")?;
    let created_at: String = row.get("created_at")?;
    Ok(Backend {
        id: id.parse().map_err(|_| {
            rusqlite::Error::InvalidColumnType(0, "id".into(), rusqlite::types::Type::Text)
        })?,
        name: row.get("name")?,
        base_url: row.get("base_url")?,
        jellyfin_server_id: row.get("jellyfin_server_id")?,
        prefix: row.get("prefix")?,
        enabled: row.get::<_, i64>("enabled")? != 0,
        created_at: created_at
            .parse::<DateTime<Utc>>()
            .unwrap_or_else(|_| Utc::now()),
    })
}

pub fn create(conn: &Connection, backend: &Backend) -> Result<()> {
    conn.execute(
        "INSERT INTO backends (id, name, base_url, jellyfin_server_id, prefix, enabled, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            backend.id.to_string(),
            backend.name,
            backend.base_url,
            backend.jellyfin_server_id,
            backend.prefix,
            backend.enabled as i64,
            backend.created_at.to_rfc3339(),
        ],
    )
    .map_err(|e| Error::database(e.to_string()))?;
    Ok(())
}

pub fn get(conn: &Connection, id: BackendId) -> Result<Option<Backend>> {
    conn.query_row(
        "SELECT * FROM backends WHERE id = ?1",
        params![id.to_string()],
        from_row,
    )
    .optional()
    .map_err(|e| Error::database(e.to_string()))
}

pub fn get_by_prefix(conn: &Connection, prefix: &str) -> Result<Option<Backend>> {
    conn.query_row(
        "SELECT * FROM backends WHERE prefix = ?1",
        params![prefix],
        from_row,
    )
    .optional()
    .map_err(|e| Error::database(e.to_string()))
}

pub fn list(conn: &Connection) -> Result<Vec<Backend>> {
    let mut stmt = conn
        .prepare("SELECT * FROM backends ORDER BY created_at")
        .map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([], from_row)
        .map_err(|e| Error::database(e.to_string()))?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| Error::database(e.to_string()))
}

pub fn list_enabled(conn: &Connection) -> Result<Vec<Backend>> {
    Ok(list(conn)?.into_iter().filter(|b| b.enabled).collect())
}

/// Update the mutable fields of a backend. `prefix` and `jellyfin_server_id`
/// are immutable after creation and are not settable here.
pub fn update(
    conn: &Connection,
    id: BackendId,
    name: &str,
    base_url: &str,
    enabled: bool,
) -> Result<()> {
    let changed = conn
        .execute(
            "UPDATE backends SET name = ?1, base_url = ?2, enabled = ?3 WHERE id = ?4",
            params![name, base_url, enabled as i64, id.to_string()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    if changed == 0 {
        return Err(Error::not_found("backend", id));
    }
    Ok(())
}

pub fn delete(conn: &Connection, id: BackendId) -> Result<()> {
    let changed = conn
        .execute("DELETE FROM backends WHERE id = ?1", params![id.to_string()])
        .map_err(|e| Error::database(e.to_string()))?;
    if changed == 0 {
        return Err(Error::not_found("backend", id));
    }
    Ok(())
}
