//! Library browsing: views, virtual folders and item listing.
//!
//! Dispatch follows three shapes:
//!
//! - a path/query naming one proxy item or library (`s1_abc`) goes to that
//!   backend alone;
//! - a path/query naming a `merged_<type>` virtual library fans out to every
//!   member backend and concatenates results;
//! - `Users/:id/Views` always synthesizes, since there is no single backend
//!   to ask for "the merged list of libraries".

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::{Extension, Json};
use reqwest::Method;
use serde_json::{json, Value};

use crate::context::AppContext;
use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use crate::query_canon;
use crate::router;
use jfp_core::Error;

fn query_pairs(query: &HashMap<String, String>) -> Vec<(String, String)> {
    query.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
}

pub async fn list_views(
    State(ctx): State<AppContext>,
    Extension(auth): Extension<AuthUser>,
    Path(_user_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let views = router::synthesize_virtual_libraries(&ctx.backends, auth.user.id, ctx.proxy_server_id()).await?;
    let mut items: Vec<Value> = views
        .merged
        .iter()
        .map(|lib| router::virtual_library_to_view(lib, ctx.proxy_server_id()))
        .collect();
    items.extend(views.standalone);

    Ok(Json(json!({
        "TotalRecordCount": items.len(),
        "Items": items,
    })))
}

/// `GET /Items` and `GET /Users/:id/Items`: list items under a parent. If
/// `ParentId` names a `merged_<type>` virtual library, fan out; if it names a
/// proxy item, forward to that one backend; with no parent at all, fan out
/// across every mapped backend.
pub async fn list_items(
    State(ctx): State<AppContext>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let pairs = query_pairs(&query);
    let parent_id = query.get("ParentId").or_else(|| query.get("parentId")).cloned();

    match parent_id.as_deref() {
        Some(pid) if crate::idcodec::is_merged(pid) => {
            let (start_index, limit) = query_canon::extract_pagination(&pairs);
            let mut stripped = query_canon::strip_pagination(
                pairs.into_iter().filter(|(k, _)| query_canon::canonical_name(k) != "ParentId").collect(),
            );
            stripped.push(("Recursive".to_string(), "true".to_string()));
            if let Some(collection_type) = crate::idcodec::decode_merged(pid) {
                if let Some(item_type) = router::item_type_for_collection(collection_type) {
                    stripped.push(("IncludeItemTypes".to_string(), item_type.to_string()));
                }
            }
            let result = router::fan_out_items(&ctx.backends, auth.user.id, "/Items", &stripped, ctx.proxy_server_id()).await?;
            if !result.errors.is_empty() {
                tracing::debug!(errors = ?result.errors, "partial fan-out result");
            }
            let total = result.total_record_count;
            let items = router::paginate(result.items, start_index, limit);
            Ok(Json(json!({
                "Items": items,
                "TotalRecordCount": total,
            })))
        }
        Some(pid) => {
            let Some((prefix, _)) = crate::idcodec::decode(pid) else {
                return Err(Error::NotFound { entity: "item".into(), id: pid.to_string() }.into());
            };
            let client = ctx
                .backends
                .for_user(prefix, auth.user.id)?
                .ok_or_else(|| Error::NotFound { entity: "item".into(), id: pid.to_string() })?;
            let canon = query_canon::canonicalize_all(&pairs, client.backend_user_id.as_deref());
            let (_, value) = client.proxy_json(Method::GET, "/Items", &canon, None, ctx.proxy_server_id()).await?;
            Ok(Json(value))
        }
        None => {
            let (start_index, limit) = query_canon::extract_pagination(&pairs);
            let stripped = query_canon::strip_pagination(pairs);
            let result = router::fan_out_items(&ctx.backends, auth.user.id, "/Items", &stripped, ctx.proxy_server_id()).await?;
            let total = result.total_record_count;
            let items = router::paginate(result.items, start_index, limit);
            Ok(Json(json!({
                "Items": items,
                "TotalRecordCount": total,
            })))
        }
    }
}

/// `GET /Users/:id/Items/:itemId` and `GET /Items/:itemId`: single-item
/// lookup always resolves to one backend.
pub async fn get_item(
    State(ctx): State<AppContext>,
    Extension(auth): Extension<AuthUser>,
    Path(item_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let Some((client, local_id)) = router::resolve_single(&ctx.backends, auth.user.id, &item_id).await? else {
        return Err(Error::NotFound { entity: "item".into(), id: item_id }.into());
    };
    let path = format!("/Items/{local_id}");
    let (_, value) = client.proxy_json(Method::GET, &path, &[], None, ctx.proxy_server_id()).await?;
    Ok(Json(value))
}

/// Alias for `GET /Users/:userId/Items/:itemId`: the user segment is only
/// there for Jellyfin API-shape compatibility and is not itself used, since
/// credentials are already resolved from the authenticated session.
pub async fn get_item_for_user(
    State(ctx): State<AppContext>,
    Extension(auth): Extension<AuthUser>,
    Path((_user_id, item_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let Some((client, local_id)) = router::resolve_single(&ctx.backends, auth.user.id, &item_id).await? else {
        return Err(Error::NotFound { entity: "item".into(), id: item_id }.into());
    };
    let path = format!("/Items/{local_id}");
    let (_, value) = client.proxy_json(Method::GET, &path, &[], None, ctx.proxy_server_id()).await?;
    Ok(Json(value))
}
