//! Internal Rust models matching the database schema.

use chrono::{DateTime, Utc};
use jfp_core::{BackendId, MappingId, SessionId, UserId};
use serde::{Deserialize, Serialize};

/// A proxy-managed user account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyUser {
    pub id: UserId,
    pub username: String,
    pub display_name: String,
    pub password_hash: String,
    pub is_admin: bool,
    pub avatar: Option<Vec<u8>>,
    pub avatar_content_type: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A registered backend Jellyfin server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Backend {
    pub id: BackendId,
    pub name: String,
    pub base_url: String,
    pub jellyfin_server_id: String,
    /// Immutable after creation; part of every proxy ID this backend contributes.
    pub prefix: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

/// A (user, backend) credential mapping. At most one per pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendUserMapping {
    pub id: MappingId,
    pub user_id: UserId,
    pub backend_id: BackendId,
    pub backend_user_id: String,
    pub backend_token: Option<String>,
    pub enabled: bool,
}

/// A login session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub token: String,
    pub user_id: UserId,
    pub device_id: Option<String>,
    pub device_name: Option<String>,
    pub app_name: Option<String>,
    pub app_version: Option<String>,
    pub last_activity: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
