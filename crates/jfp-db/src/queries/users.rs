//! Queries against the `users` table.

use chrono::{DateTime, Utc};
use jfp_core::{Error, Result, UserId};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::models::ProxyUser;

fn from_row(row: &Row) -> rusqlite::Result<ProxyUser> {
    let id: String = row.get("id")?;
    let created_at: String = row.get("created_at")?;
    Ok(ProxyUser {
        id: id.parse().map_err(|_| {
            rusqlite::Error::InvalidColumnType(0, "id".into(), rusqlite::types::Type::Text)
        })?,
        username: row.get("username")?,
        display_name: row.get("display_name")?,
        password_hash: row.get("password_hash")?,
        is_admin: row.get::<_, i64>("is_admin")? != 0,
        avatar: row.get("avatar")?,
        avatar_content_type: row.get("avatar_content_type")?,
        created_at: created_at
            .parse::<DateTime<Utc>>()
            .unwrap_or_else(|_| Utc::now()),
    })
}

pub fn create(conn: &Connection, user: &ProxyUser) -> Result<()> {
    conn.execute(
        "INSERT INTO users (id, username, display_name, password_hash, is_admin, avatar, avatar_content_type, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            user.id.to_string(),
            user.username,
            user.display_name,
            user.password_hash,
            user.is_admin as i64,
            user.avatar,
            user.avatar_content_type,
            user.created_at.to_rfc3339(),
        ],
    )
    .map_err(|e| Error::database(e.to_string()))?;
    Ok(())
}

pub fn get(conn: &Connection, id: UserId) -> Result<Option<ProxyUser>> {
    conn.query_row(
        "SELECT * FROM users WHERE id = ?1",
        params![id.to_string()],
        from_row,
    )
    .optional()
    .map_err(|e| Error::database(e.to_string()))
}

pub fn get_by_username(conn: &Connection, username: &str) -> Result<Option<ProxyUser>> {
    conn.query_row(
        "SELECT * FROM users WHERE username = ?1",
        params![username],
        from_row,
    )
    .optional()
    .map_err(|e| Error::database(e.to_string()))
}

pub fn list(conn: &Connection) -> Result<Vec<ProxyUser>> {
    let mut stmt = conn
        .prepare("SELECT * FROM users ORDER BY username")
        .map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([], from_row)
        .map_err(|e| Error::database(e.to_string()))?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| Error::database(e.to_string()))
}

pub fn count(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
        .map_err(|e| Error::database(e.to_string()))
}

pub fn update_password(conn: &Connection, id: UserId, password_hash: &str) -> Result<()> {
    let changed = conn
        .execute(
            "UPDATE users SET password_hash = ?1 WHERE id = ?2",
            params![password_hash, id.to_string()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    if changed == 0 {
        return Err(Error::not_found("user", id));
    }
    Ok(())
}

pub fn update_avatar(
    conn: &Connection,
    id: UserId,
    avatar: Option<Vec<u8>>,
    content_type: Option<String>,
) -> Result<()> {
    conn.execute(
        "UPDATE users SET avatar = ?1, avatar_content_type = ?2 WHERE id = ?3",
        params![avatar, content_type, id.to_string()],
    )
    .map_err(|e| Error::database(e.to_string()))?;
    Ok(())
}

pub fn delete(conn: &Connection, id: UserId) -> Result<()> {
    let changed = conn
        .execute("DELETE FROM users WHERE id = ?1", params![id.to_string()])
        .map_err(|e| Error::database(e.to_string()))?;
    if changed == 0 {
        return Err(Error::not_found("user", id));
    }
    Ok(())
}

/// Seed an initial admin account if (and only if) the `users` table is empty.
/// Called once at startup; returns `true` if a seed row was inserted.
pub fn seed_initial_admin(conn: &Connection, username: &str, password: &str) -> Result<bool> {
    if count(conn)? > 0 {
        return Ok(false);
    }
    let hash = bcrypt::hash(password, 12).map_err(|e| Error::Internal(e.to_string()))?;
    let admin = ProxyUser {
        id: UserId::new(),
        username: username.to_string(),
        display_name: username.to_string(),
        password_hash: hash,
        is_admin: true,
        avatar: None,
        avatar_content_type: None,
        created_at: Utc::now(),
    };
    create(conn, &admin)?;
    Ok(true)
}
