//! Login, logout and password management.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Path, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use chrono::Utc;
use serde::Deserialize;

use crate::context::AppContext;
use crate::dto::{self, AuthByNameRequest, AuthResult};
use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use jfp_core::Error;
use jfp_db::queries;

fn client_ip(headers: &HeaderMap, addr: &SocketAddr) -> String {
    headers
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| addr.ip().to_string())
}

pub async fn authenticate_by_name(
    State(ctx): State<AppContext>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(body): Json<AuthByNameRequest>,
) -> Result<impl IntoResponse, AppError> {
    let ip = client_ip(&headers, &addr);

    if !ctx.login_limiter.allow(&ip) {
        return Err(Error::RateLimited("too many login attempts".into()).into());
    }

    let conn = jfp_db::get_conn(&ctx.db)?;
    let user = queries::users::get_by_username(&conn, &body.username)?;

    let user = match user {
        Some(u) if bcrypt::verify(&body.password, &u.password_hash).unwrap_or(false) => u,
        _ => {
            ctx.login_limiter.record_failure(&ip);
            return Err(Error::Unauthorized("invalid username or password".into()).into());
        }
    };

    ctx.login_limiter.record_success(&ip);

    let identity = headers
        .get("Authorization")
        .or_else(|| headers.get("X-Emby-Authorization"))
        .and_then(|v| v.to_str().ok())
        .map(dto::parse_mediabrowser_header)
        .unwrap_or_default();

    let token = uuid::Uuid::new_v4().to_string();
    let session = jfp_db::Session {
        id: jfp_core::SessionId::new(),
        token: token.clone(),
        user_id: user.id,
        device_id: Some(identity.device_id.clone()),
        device_name: Some(identity.device.clone()),
        app_name: Some(identity.client.clone()),
        app_version: Some(identity.version.clone()),
        last_activity: Utc::now(),
        created_at: Utc::now(),
    };
    queries::sessions::create(&conn, &session)?;

    let server_id = ctx.proxy_server_id().to_string();
    let result = AuthResult {
        user: dto::make_user(&user.id.to_string(), &server_id, &user.username, user.is_admin),
        session_info: dto::SessionInfo {
            id: session.id.to_string(),
            user_id: user.id.to_string(),
            user_name: user.username.clone(),
            device_id: identity.device_id,
            device_name: identity.device,
            client: identity.client,
            application_version: identity.version,
        },
        access_token: token,
        server_id,
    };

    Ok(Json(result))
}

pub async fn logout(
    State(ctx): State<AppContext>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let conn = jfp_db::get_conn(&ctx.db)?;
    queries::sessions::delete(&conn, auth.session.id)?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    #[serde(rename = "CurrentPw", alias = "current_password", default)]
    pub current_password: String,
    #[serde(rename = "NewPw", alias = "new_password")]
    pub new_password: String,
}

pub async fn change_password(
    State(ctx): State<AppContext>,
    Extension(auth): Extension<AuthUser>,
    Path(user_id): Path<String>,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    if user_id != auth.user.id.to_string() && !auth.user.is_admin {
        return Err(Error::Forbidden("cannot change another user's password".into()).into());
    }

    if !auth.user.is_admin
        && !bcrypt::verify(&body.current_password, &auth.user.password_hash).unwrap_or(false)
    {
        return Err(Error::Unauthorized("current password incorrect".into()).into());
    }

    let hash = bcrypt::hash(&body.new_password, bcrypt::DEFAULT_COST)
        .map_err(|e| Error::Internal(e.to_string()))?;

    let conn = jfp_db::get_conn(&ctx.db)?;
    queries::users::update_password(&conn, auth.user.id, &hash)?;

    let keep = auth.session.id;
    queries::sessions::delete_for_user_except(&conn, auth.user.id, keep)?;
    let _ = Utc::now();
    Ok(axum::http::StatusCode::NO_CONTENT)
}

pub async fn me(Extension(auth): Extension<AuthUser>) -> impl IntoResponse {
    Json(serde_json::json!({
        "Id": auth.user.id.to_string(),
        "Name": auth.user.username,
        "IsAdministrator": auth.user.is_admin,
    }))
}
