//! Playback reporting (`Sessions/Playing*`) and watched/favorite toggles,
//! with best-effort cross-backend state replication.
//!
//! Jellyfin clients only ever talk to the backend that owns the item being
//! played. When a mutation like "mark played" succeeds there, a background
//! task tries to replicate it onto every other backend the user is mapped
//! to, by matching the item's `ProviderIds` (TMDB preferred, then IMDB).
//! Replication failures are logged at debug level and never surface to the
//! caller — the primary mutation already succeeded.

use std::collections::HashMap;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::{Extension, Json};
use reqwest::Method;
use serde_json::Value;

use crate::backend_client::BackendClient;
use crate::backend_pool::BackendPool;
use crate::context::AppContext;
use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use crate::router;
use jfp_core::{Error, UserId};

const SYNC_TIMEOUT: Duration = Duration::from_secs(10);
const PROVIDER_PRIORITY: &[&str] = &["Tmdb", "Imdb"];

#[derive(Clone, Copy)]
enum WatchAction {
    MarkPlayed,
    UnmarkPlayed,
    MarkFavorite,
    UnmarkFavorite,
}

impl WatchAction {
    fn method(self) -> Method {
        match self {
            WatchAction::MarkPlayed | WatchAction::MarkFavorite => Method::POST,
            WatchAction::UnmarkPlayed | WatchAction::UnmarkFavorite => Method::DELETE,
        }
    }

    fn path_segment(self) -> &'static str {
        match self {
            WatchAction::MarkPlayed | WatchAction::UnmarkPlayed => "PlayedItems",
            WatchAction::MarkFavorite | WatchAction::UnmarkFavorite => "FavoriteItems",
        }
    }
}

pub async fn report_playing(
    State(ctx): State<AppContext>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    forward_session_report(&ctx, auth, "/Sessions/Playing", body).await
}

pub async fn report_progress(
    State(ctx): State<AppContext>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    forward_session_report(&ctx, auth, "/Sessions/Playing/Progress", body).await
}

pub async fn report_stopped(
    State(ctx): State<AppContext>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    forward_session_report(&ctx, auth, "/Sessions/Playing/Stopped", body).await
}

async fn forward_session_report(
    ctx: &AppContext,
    auth: AuthUser,
    path: &str,
    mut body: Value,
) -> Result<impl IntoResponse, AppError> {
    let item_id = body
        .get("ItemId")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| Error::Validation("ItemId is required".into()))?;

    let Some((client, local_id)) = router::resolve_single(&ctx.backends, auth.user.id, &item_id).await? else {
        return Err(Error::NotFound { entity: "item".into(), id: item_id }.into());
    };

    if let Some(map) = body.as_object_mut() {
        map.insert("ItemId".into(), Value::String(local_id));
    }

    let (status, _) = client.proxy_json(Method::POST, path, &[], Some(body), ctx.proxy_server_id()).await?;
    Ok(axum::http::StatusCode::from_u16(status.as_u16()).unwrap_or(axum::http::StatusCode::NO_CONTENT))
}

pub async fn mark_played(
    State(ctx): State<AppContext>,
    Extension(auth): Extension<AuthUser>,
    Path((_user_id, item_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    apply_watch_action(ctx, auth, item_id, WatchAction::MarkPlayed).await
}

pub async fn unmark_played(
    State(ctx): State<AppContext>,
    Extension(auth): Extension<AuthUser>,
    Path((_user_id, item_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    apply_watch_action(ctx, auth, item_id, WatchAction::UnmarkPlayed).await
}

pub async fn mark_favorite(
    State(ctx): State<AppContext>,
    Extension(auth): Extension<AuthUser>,
    Path((_user_id, item_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    apply_watch_action(ctx, auth, item_id, WatchAction::MarkFavorite).await
}

pub async fn unmark_favorite(
    State(ctx): State<AppContext>,
    Extension(auth): Extension<AuthUser>,
    Path((_user_id, item_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    apply_watch_action(ctx, auth, item_id, WatchAction::UnmarkFavorite).await
}

async fn apply_watch_action(
    ctx: AppContext,
    auth: AuthUser,
    item_id: String,
    action: WatchAction,
) -> Result<impl IntoResponse, AppError> {
    let Some((client, local_id)) = router::resolve_single(&ctx.backends, auth.user.id, &item_id).await? else {
        return Err(Error::NotFound { entity: "item".into(), id: item_id }.into());
    };

    let backend_user_id = client
        .backend_user_id
        .clone()
        .ok_or_else(|| Error::Forbidden("no credentials for this backend".into()))?;
    let path = format!("/Users/{backend_user_id}/{}/{local_id}", action.path_segment());
    let (status, value) = client.proxy_json(action.method(), &path, &[], None, ctx.proxy_server_id()).await?;

    if status.is_success() {
        let pool = ctx.backends.clone();
        let source_prefix = client.prefix.clone();
        let user_id = auth.user.id;
        tokio::spawn(async move {
            if let Err(e) = tokio::time::timeout(
                SYNC_TIMEOUT,
                sync_watch_state(pool, user_id, client, local_id, action),
            )
            .await
            {
                tracing::debug!(backend = %source_prefix, error = %e, "watch-state sync timed out");
            }
        });
    }

    Ok(Json(value))
}

async fn sync_watch_state(
    pool: BackendPool,
    user_id: UserId,
    owning_client: BackendClient,
    local_id: String,
    action: WatchAction,
) {
    let item_path = format!("/Items/{local_id}");
    let fetch = owning_client
        .proxy_json(Method::GET, &item_path, &[("Fields".into(), "ProviderIds".into())], None, "")
        .await;

    let (provider_key, provider_value, item_type) = match fetch {
        Ok((status, value)) if status.is_success() => {
            let Some((key, value)) = pick_provider_id(&value) else {
                tracing::debug!("item has no matchable provider id; skipping sync");
                return;
            };
            let item_type = value_str(&value, "Type").unwrap_or_default();
            (key, value, item_type)
        }
        Ok((status, _)) => {
            tracing::debug!(%status, "owning backend rejected provider-id lookup");
            return;
        }
        Err(e) => {
            tracing::debug!(error = %e, "failed to fetch provider ids from owning backend");
            return;
        }
    };
    let _ = item_type;

    let other_clients = match pool.all_for_user(user_id) {
        Ok(clients) => clients.into_iter().filter(|c| c.prefix != owning_client.prefix),
        Err(e) => {
            tracing::debug!(error = %e, "failed to list other backends for sync");
            return;
        }
    };

    for client in other_clients {
        let search_query = vec![
            ("Recursive".to_string(), "true".to_string()),
            (format!("Has{provider_key}Id"), "true".to_string()),
            ("Fields".to_string(), "ProviderIds".to_string()),
            ("Limit".to_string(), "50".to_string()),
        ];
        let search = client.proxy_json(Method::GET, "/Items", &search_query, None, "").await;
        let Ok((status, results)) = search else { continue };
        if !status.is_success() {
            continue;
        }
        let Some(items) = results.get("Items").and_then(|v| v.as_array()) else { continue };
        let Some(matching) = items.iter().find(|item| {
            item.get("ProviderIds")
                .and_then(|p| p.get(&provider_key))
                .and_then(|v| v.as_str())
                .map(|v| v == provider_value)
                .unwrap_or(false)
        }) else {
            continue;
        };
        let Some(proxy_item_id) = matching.get("Id").and_then(|v| v.as_str()) else { continue };
        let (_, target_id) = crate::idcodec::decode_lenient(proxy_item_id);
        let Some(backend_user_id) = client.backend_user_id.clone() else { continue };
        let mutate_path = format!("/Users/{backend_user_id}/{}/{target_id}", action.path_segment());
        if let Err(e) = client.proxy_json(action.method(), &mutate_path, &[], None, "").await {
            tracing::debug!(backend = %client.prefix, error = %e, "replayed watch-state mutation failed");
        }
    }
}

fn pick_provider_id(item: &Value) -> Option<(String, String)> {
    let ids = item.get("ProviderIds")?.as_object()?;
    for key in PROVIDER_PRIORITY {
        if let Some(v) = ids.get(*key).and_then(|v| v.as_str()) {
            if !v.is_empty() {
                return Some((key.to_string(), v.to_string()));
            }
        }
    }
    None
}

fn value_str(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(|v| v.as_str()).map(|s| s.to_string())
}
