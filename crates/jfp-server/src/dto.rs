//! Shared Jellyfin-compatible wire DTOs.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct JellyfinUser {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "ServerId")]
    pub server_id: String,
    #[serde(rename = "HasPassword")]
    pub has_password: bool,
    #[serde(rename = "HasConfiguredPassword")]
    pub has_configured_password: bool,
    #[serde(rename = "Policy")]
    pub policy: UserPolicy,
    #[serde(rename = "Configuration")]
    pub configuration: UserConfiguration,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserPolicy {
    #[serde(rename = "IsAdministrator")]
    pub is_administrator: bool,
    #[serde(rename = "IsDisabled")]
    pub is_disabled: bool,
    #[serde(rename = "EnableAllFolders")]
    pub enable_all_folders: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserConfiguration {
    #[serde(rename = "PlayDefaultAudioTrack")]
    pub play_default_audio_track: bool,
    #[serde(rename = "SubtitleMode")]
    pub subtitle_mode: String,
}

impl Default for UserConfiguration {
    fn default() -> Self {
        Self {
            play_default_audio_track: true,
            subtitle_mode: "Default".into(),
        }
    }
}

pub fn make_user(id: &str, server_id: &str, name: &str, is_admin: bool) -> JellyfinUser {
    JellyfinUser {
        id: id.to_string(),
        name: name.to_string(),
        server_id: server_id.to_string(),
        has_password: true,
        has_configured_password: true,
        policy: UserPolicy {
            is_administrator: is_admin,
            is_disabled: false,
            enable_all_folders: true,
        },
        configuration: UserConfiguration::default(),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "UserId")]
    pub user_id: String,
    #[serde(rename = "UserName")]
    pub user_name: String,
    #[serde(rename = "DeviceId")]
    pub device_id: String,
    #[serde(rename = "DeviceName")]
    pub device_name: String,
    #[serde(rename = "Client")]
    pub client: String,
    #[serde(rename = "ApplicationVersion")]
    pub application_version: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthResult {
    #[serde(rename = "User")]
    pub user: JellyfinUser,
    #[serde(rename = "SessionInfo")]
    pub session_info: SessionInfo,
    #[serde(rename = "AccessToken")]
    pub access_token: String,
    #[serde(rename = "ServerId")]
    pub server_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthByNameRequest {
    #[serde(rename = "Username", alias = "username")]
    pub username: String,
    #[serde(rename = "Pw", alias = "pw", alias = "Password", alias = "password")]
    pub password: String,
}

/// Client identity parsed from a MediaBrowser-style `Authorization` header,
/// e.g. `MediaBrowser Client="Jellyfin Web", Device="Chrome", DeviceId="abc", Version="10.9.0"`.
#[derive(Debug, Clone, Default)]
pub struct DeviceIdentity {
    pub client: String,
    pub device: String,
    pub device_id: String,
    pub version: String,
}

pub fn parse_mediabrowser_header(header: &str) -> DeviceIdentity {
    let mut identity = DeviceIdentity {
        client: "Unknown Client".into(),
        device: "Unknown Device".into(),
        device_id: "unknown-device".into(),
        version: "0.0.0".into(),
    };

    for part in header.split(',') {
        let part = part.trim();
        if let Some((key, value)) = part.split_once('=') {
            let value = value.trim().trim_matches('"');
            match key.trim().to_ascii_lowercase().as_str() {
                "client" => identity.client = value.to_string(),
                "device" => identity.device = value.to_string(),
                "deviceid" => identity.device_id = value.to_string(),
                "version" => identity.version = value.to_string(),
                _ => {}
            }
        }
    }
    identity
}
