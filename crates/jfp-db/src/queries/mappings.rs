//! Queries against the `backend_user_mappings` table.

use jfp_core::{BackendId, Error, MappingId, Result, UserId};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::models::BackendUserMapping;

fn from_row(row: &Row) -> rusqlite::Result<BackendUserMapping> {
    let id: String = row.get("id")?;
    let user_id: String = row.get("user_id")?;
    let backend_id: String = row.get("backend_id")?;
    Ok(BackendUserMapping {
        id: id.parse().map_err(|_| {
            rusqlite::Error::InvalidColumnType(0, "id".into(), rusqlite::types::Type::Text)
        })?,
        user_id: user_id.parse().map_err(|_| {
            rusqlite::Error::InvalidColumnType(1, "user_id".into(), rusqlite::types::Type::Text)
        })?,
        backend_id: backend_id.parse().map_err(|_| {
            rusqlite::Error::InvalidColumnType(2, "backend_id".into(), rusqlite::types::Type::Text)
        })?,
        backend_user_id: row.get("backend_user_id")?,
        backend_token: row.get("backend_token")?,
        enabled: row.get::<_, i64>("enabled")? != 0,
    })
}

pub fn create(conn: &Connection, mapping: &BackendUserMapping) -> Result<()> {
    conn.execute(
        "INSERT INTO backend_user_mappings (id, user_id, backend_id, backend_user_id, backend_token, enabled)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            mapping.id.to_string(),
            mapping.user_id.to_string(),
            mapping.backend_id.to_string(),
            mapping.backend_user_id,
            mapping.backend_token,
            mapping.enabled as i64,
        ],
    )
    .map_err(|e| Error::database(e.to_string()))?;
    Ok(())
}

pub fn get(conn: &Connection, id: MappingId) -> Result<Option<BackendUserMapping>> {
    conn.query_row(
        "SELECT * FROM backend_user_mappings WHERE id = ?1",
        params![id.to_string()],
        from_row,
    )
    .optional()
    .map_err(|e| Error::database(e.to_string()))
}

pub fn get_for_user_backend(
    conn: &Connection,
    user_id: UserId,
    backend_id: BackendId,
) -> Result<Option<BackendUserMapping>> {
    conn.query_row(
        "SELECT * FROM backend_user_mappings WHERE user_id = ?1 AND backend_id = ?2",
        params![user_id.to_string(), backend_id.to_string()],
        from_row,
    )
    .optional()
    .map_err(|e| Error::database(e.to_string()))
}

pub fn list_for_user(conn: &Connection, user_id: UserId) -> Result<Vec<BackendUserMapping>> {
    let mut stmt = conn
        .prepare("SELECT * FROM backend_user_mappings WHERE user_id = ?1")
        .map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map(params![user_id.to_string()], from_row)
        .map_err(|e| Error::database(e.to_string()))?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| Error::database(e.to_string()))
}

pub fn update_token(conn: &Connection, id: MappingId, token: Option<&str>) -> Result<()> {
    conn.execute(
        "UPDATE backend_user_mappings SET backend_token = ?1 WHERE id = ?2",
        params![token, id.to_string()],
    )
    .map_err(|e| Error::database(e.to_string()))?;
    Ok(())
}

pub fn delete(conn: &Connection, id: MappingId) -> Result<()> {
    let changed = conn
        .execute(
            "DELETE FROM backend_user_mappings WHERE id = ?1",
            params![id.to_string()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    if changed == 0 {
        return Err(Error::not_found("backend_user_mapping", id));
    }
    Ok(())
}
