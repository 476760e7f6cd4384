//! Admin-only management of proxy users, registered backends, and the
//! per-user credential mappings between them. None of these routes touch a
//! backend; they only manage the proxy's own database.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::{Extension, Json};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::context::AppContext;
use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use jfp_core::{BackendId, Error, MappingId, UserId};
use jfp_db::queries;

fn require_admin(auth: &AuthUser) -> Result<(), AppError> {
    if auth.user.is_admin {
        Ok(())
    } else {
        Err(Error::Forbidden("administrator privileges required".into()).into())
    }
}

// --- Users -----------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub is_admin: bool,
}

pub async fn list_users(
    State(ctx): State<AppContext>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    require_admin(&auth)?;
    let conn = jfp_db::get_conn(&ctx.db)?;
    let users = queries::users::list(&conn)?;
    let redacted: Vec<_> = users
        .into_iter()
        .map(|u| json!({"id": u.id.to_string(), "username": u.username, "isAdmin": u.is_admin}))
        .collect();
    Ok(Json(redacted))
}

pub async fn create_user(
    State(ctx): State<AppContext>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    require_admin(&auth)?;
    if body.password.len() < 8 {
        return Err(Error::Validation("password must be at least 8 characters".into()).into());
    }
    let hash = bcrypt::hash(&body.password, bcrypt::DEFAULT_COST).map_err(|e| Error::Internal(e.to_string()))?;
    let user = jfp_db::ProxyUser {
        id: UserId::new(),
        username: body.username.clone(),
        display_name: body.username,
        password_hash: hash,
        is_admin: body.is_admin,
        avatar: None,
        avatar_content_type: None,
        created_at: Utc::now(),
    };
    let conn = jfp_db::get_conn(&ctx.db)?;
    queries::users::create(&conn, &user)?;
    Ok(Json(json!({"id": user.id.to_string()})))
}

pub async fn delete_user(
    State(ctx): State<AppContext>,
    Extension(auth): Extension<AuthUser>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    require_admin(&auth)?;
    let id: UserId = user_id.parse().map_err(|_| Error::Validation("invalid user id".into()))?;
    let conn = jfp_db::get_conn(&ctx.db)?;
    queries::users::delete(&conn, id)?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

// --- Backends ----------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateBackendRequest {
    pub name: String,
    pub base_url: String,
    pub jellyfin_server_id: String,
    pub prefix: String,
}

pub async fn list_backends(
    State(ctx): State<AppContext>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    require_admin(&auth)?;
    let conn = jfp_db::get_conn(&ctx.db)?;
    let backends = queries::backends::list(&conn)?;
    let rendered: Vec<_> = backends
        .into_iter()
        .map(|b| {
            json!({
                "id": b.id.to_string(),
                "name": b.name,
                "baseUrl": b.base_url,
                "prefix": b.prefix,
                "enabled": b.enabled,
                "available": ctx.health.is_available(b.id),
            })
        })
        .collect();
    Ok(Json(rendered))
}

pub async fn create_backend(
    State(ctx): State<AppContext>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<CreateBackendRequest>,
) -> Result<impl IntoResponse, AppError> {
    require_admin(&auth)?;
    if body.prefix.contains('_') {
        return Err(Error::Validation("prefix must not contain an underscore".into()).into());
    }
    let backend = jfp_db::Backend {
        id: BackendId::new(),
        name: body.name,
        base_url: body.base_url.trim_end_matches('/').to_string(),
        jellyfin_server_id: body.jellyfin_server_id,
        prefix: body.prefix,
        enabled: true,
        created_at: Utc::now(),
    };
    let conn = jfp_db::get_conn(&ctx.db)?;
    queries::backends::create(&conn, &backend)?;
    Ok(Json(json!({"id": backend.id.to_string(), "prefix": backend.prefix})))
}

#[derive(Debug, Deserialize)]
pub struct UpdateBackendRequest {
    pub name: String,
    pub base_url: String,
    pub enabled: bool,
}

pub async fn update_backend(
    State(ctx): State<AppContext>,
    Extension(auth): Extension<AuthUser>,
    Path(backend_id): Path<String>,
    Json(body): Json<UpdateBackendRequest>,
) -> Result<impl IntoResponse, AppError> {
    require_admin(&auth)?;
    let id: BackendId = backend_id.parse().map_err(|_| Error::Validation("invalid backend id".into()))?;
    let conn = jfp_db::get_conn(&ctx.db)?;
    queries::backends::update(&conn, id, &body.name, body.base_url.trim_end_matches('/'), body.enabled)?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

pub async fn delete_backend(
    State(ctx): State<AppContext>,
    Extension(auth): Extension<AuthUser>,
    Path(backend_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    require_admin(&auth)?;
    let id: BackendId = backend_id.parse().map_err(|_| Error::Validation("invalid backend id".into()))?;
    let conn = jfp_db::get_conn(&ctx.db)?;
    queries::backends::delete(&conn, id)?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

// --- Mappings ----------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateMappingRequest {
    pub user_id: String,
    pub backend_id: String,
    pub backend_user_id: String,
    pub backend_token: Option<String>,
}

pub async fn create_mapping(
    State(ctx): State<AppContext>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<CreateMappingRequest>,
) -> Result<impl IntoResponse, AppError> {
    require_admin(&auth)?;
    let user_id: UserId = body.user_id.parse().map_err(|_| Error::Validation("invalid user id".into()))?;
    let backend_id: BackendId = body.backend_id.parse().map_err(|_| Error::Validation("invalid backend id".into()))?;
    let mapping = jfp_db::BackendUserMapping {
        id: MappingId::new(),
        user_id,
        backend_id,
        backend_user_id: body.backend_user_id,
        backend_token: body.backend_token,
        enabled: true,
    };
    let conn = jfp_db::get_conn(&ctx.db)?;
    queries::mappings::create(&conn, &mapping)?;
    Ok(Json(json!({"id": mapping.id.to_string()})))
}

pub async fn delete_mapping(
    State(ctx): State<AppContext>,
    Extension(auth): Extension<AuthUser>,
    Path(mapping_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    require_admin(&auth)?;
    let id: MappingId = mapping_id.parse().map_err(|_| Error::Validation("invalid mapping id".into()))?;
    let conn = jfp_db::get_conn(&ctx.db)?;
    queries::mappings::delete(&conn, id)?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}
