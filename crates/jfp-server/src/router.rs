//! Routing policies that decide which backend(s) answer a request and how
//! their responses are combined.
//!
//! Three policies cover the whole surface:
//!
//! - **single-backend**: the request names one proxy-namespaced item or
//!   library; decode its prefix and forward to that backend alone.
//! - **fan-out aggregation**: the request has no backend in its path (e.g.
//!   `/Items` with a `media_` virtual parent); ask every backend the caller
//!   has a mapping for, in parallel, and concatenate the `Items` arrays.
//! - **virtual-library synthesis**: the request is `Users/:id/Views` or
//!   similar; synthesize one entry per distinct collection type across all
//!   of the user's backends instead of forwarding anything.

use std::collections::HashMap;

use jfp_core::{Result, UserId};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use tokio::task::JoinSet;

use crate::backend_client::BackendClient;
use crate::backend_pool::BackendPool;
use crate::idcodec;
use crate::query_canon;

/// Maps a virtual library's `CollectionType` to the backend `IncludeItemTypes`
/// value used when browsing into it, per the Jellyfin item-type vocabulary.
const COLLECTION_ITEM_TYPES: &[(&str, &str)] = &[
    ("movies", "movie"),
    ("tvshows", "series"),
    ("music", "musicalbum"),
    ("books", "book"),
    ("boxsets", "boxset"),
    ("musicvideos", "musicvideo"),
    ("photos", "photo"),
    ("homevideos", "video"),
    ("livetv", "liveTvchannel"),
];

pub fn item_type_for_collection(collection_type: &str) -> Option<&'static str> {
    COLLECTION_ITEM_TYPES
        .iter()
        .find(|(k, _)| *k == collection_type)
        .map(|(_, v)| *v)
}

/// Split a proxy-namespaced item id into its backend prefix and the
/// backend-local id, resolving a ready [`BackendClient`] for the caller.
pub async fn resolve_single(
    pool: &BackendPool,
    user_id: UserId,
    proxy_id: &str,
) -> Result<Option<(BackendClient, String)>> {
    let Some((prefix, local_id)) = idcodec::decode(proxy_id) else {
        return Ok(None);
    };
    let Some(client) = pool.for_user(prefix, user_id)? else {
        return Ok(None);
    };
    Ok(Some((client, local_id.to_string())))
}

/// Result of fanning a JSON call out across every backend a user has access
/// to. Failed or unavailable backends are silently dropped from `items` but
/// counted in `errors` so callers can decide whether to surface a partial
/// result.
pub struct FanOutResult {
    pub items: Vec<Value>,
    pub total_record_count: i64,
    pub errors: Vec<String>,
}

/// Fan a JSON GET out to every backend the user has a mapping for, merging
/// each response's `Items` array (falling back to treating a non-object
/// response as a single item). Runs all backend calls concurrently.
///
/// `query` is canonicalised per backend before it's sent: each backend gets
/// its own mapped `UserId` substituted in, any proxy-prefixed id params
/// decoded back to the backend's own namespace, and the caller's proxy
/// session token (`apikey`/`api_key`) stripped so it never reaches a
/// backend. The merged set is sorted per `SortBy`/`SortOrder` before return;
/// callers are responsible for re-applying `StartIndex`/`Limit`.
pub async fn fan_out_items(
    pool: &BackendPool,
    user_id: UserId,
    path: &str,
    query: &[(String, String)],
    proxy_server_id: &str,
) -> Result<FanOutResult> {
    let clients = pool.all_for_user(user_id)?;
    let path = path.to_string();
    let proxy_server_id = proxy_server_id.to_string();
    let sort_field = first_sort_field(query);
    let descending = sort_is_descending(query);

    let mut set = JoinSet::new();
    for client in clients {
        let path = path.clone();
        let proxy_server_id = proxy_server_id.clone();
        let backend_query = query_canon::canonicalize_all(query, client.backend_user_id.as_deref());
        set.spawn(async move {
            let result = client
                .proxy_json(Method::GET, &path, &backend_query, None, &proxy_server_id)
                .await;
            (client.prefix.clone(), result)
        });
    }

    let mut items = Vec::new();
    let mut errors = Vec::new();
    let mut total: i64 = 0;

    while let Some(joined) = set.join_next().await {
        let (prefix, result) = match joined {
            Ok(pair) => pair,
            Err(e) => {
                errors.push(format!("join error: {e}"));
                continue;
            }
        };
        match result {
            Ok((status, value)) if status.is_success() => {
                if let Some(arr) = value.get("Items").and_then(|v| v.as_array()) {
                    items.extend(arr.iter().cloned());
                    if let Some(count) = value.get("TotalRecordCount").and_then(|v| v.as_i64()) {
                        total += count;
                    } else {
                        total += arr.len() as i64;
                    }
                } else if value.is_object() {
                    items.push(value);
                    total += 1;
                }
            }
            Ok((status, _)) => errors.push(format!("{prefix}: backend returned {status}")),
            Err(e) => errors.push(format!("{prefix}: {e}")),
        }
    }

    sort_items(&mut items, sort_field.as_deref(), descending);

    Ok(FanOutResult {
        items,
        total_record_count: total,
        errors,
    })
}

/// Slice a merged, already-sorted item list by client-requested
/// `StartIndex`/`Limit`. The caller reports the pre-slice length as
/// `TotalRecordCount`.
pub fn paginate(items: Vec<Value>, start_index: usize, limit: Option<usize>) -> Vec<Value> {
    let start = start_index.min(items.len());
    match limit {
        Some(n) => items.into_iter().skip(start).take(n).collect(),
        None => items.into_iter().skip(start).collect(),
    }
}

fn first_sort_field(query: &[(String, String)]) -> Option<String> {
    query
        .iter()
        .find(|(k, _)| query_canon::canonical_name(k) == "SortBy")
        .and_then(|(_, v)| v.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn sort_is_descending(query: &[(String, String)]) -> bool {
    query
        .iter()
        .find(|(k, _)| query_canon::canonical_name(k) == "SortOrder")
        .map(|(_, v)| v.eq_ignore_ascii_case("Descending"))
        .unwrap_or(false)
}

enum SortKey {
    Text(String),
    Number(f64),
}

fn text_key(item: &Value, field: &str) -> Option<SortKey> {
    item.get(field)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| SortKey::Text(s.to_ascii_lowercase()))
}

fn number_key(item: &Value, field: &str) -> Option<SortKey> {
    item.get(field).and_then(|v| v.as_f64()).map(SortKey::Number)
}

fn sort_key_for(item: &Value, field: &str) -> Option<SortKey> {
    match field {
        "DateCreated" => text_key(item, "DateCreated"),
        "PremiereDate" => text_key(item, "PremiereDate"),
        "CommunityRating" => number_key(item, "CommunityRating"),
        "ProductionYear" => number_key(item, "ProductionYear"),
        "Name" => text_key(item, "Name"),
        _ => text_key(item, "SortName").or_else(|| text_key(item, "Name")),
    }
}

/// Sort merged fan-out items by `field` (default `SortName`, falling back to
/// `Name`), honouring `descending`. Items missing the sort key always sort
/// last, regardless of direction. Stable, so backends that returned no
/// sortable field at all keep their original relative order.
fn sort_items(items: &mut [Value], field: Option<&str>, descending: bool) {
    let field = field.unwrap_or("SortName");
    items.sort_by(|a, b| {
        match (sort_key_for(a, field), sort_key_for(b, field)) {
            (None, None) => std::cmp::Ordering::Equal,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (Some(_), None) => std::cmp::Ordering::Less,
            (Some(x), Some(y)) => {
                let ord = match (&x, &y) {
                    (SortKey::Text(a), SortKey::Text(b)) => a.cmp(b),
                    (SortKey::Number(a), SortKey::Number(b)) => {
                        a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal)
                    }
                    _ => std::cmp::Ordering::Equal,
                };
                if descending {
                    ord.reverse()
                } else {
                    ord
                }
            }
        }
    });
}

/// One synthesized virtual library entry: a `merged_<collectionType>` view
/// backed by every matching view across the user's backends.
#[derive(Debug, Clone)]
pub struct VirtualLibrary {
    pub collection_type: String,
    pub name: String,
    pub member_views: Vec<Value>,
}

/// Result of merging `/Users/:id/Views` across every backend a user is
/// mapped to: `merged` groups same-type libraries under one virtual entry,
/// `standalone` carries through libraries whose `CollectionType` is empty or
/// unrecognised, keyed by their own already-proxy-prefixed `Id`.
pub struct LibraryViews {
    pub merged: Vec<VirtualLibrary>,
    pub standalone: Vec<Value>,
}

/// Fetch `Users/:backendUserId/Views` from every backend the user has a
/// mapping for, then group the results by lower-cased `CollectionType` into
/// virtual libraries, preserving the order each type was first seen in.
/// Views whose backend has no mapped credentials for this user are skipped
/// entirely by `all_for_user`.
pub async fn synthesize_virtual_libraries(
    pool: &BackendPool,
    user_id: UserId,
    proxy_server_id: &str,
) -> Result<LibraryViews> {
    let clients = pool.all_for_user(user_id)?;
    let proxy_server_id = proxy_server_id.to_string();

    let mut set = JoinSet::new();
    for client in clients {
        let proxy_server_id = proxy_server_id.clone();
        set.spawn(async move {
            let backend_user_id = client.backend_user_id.clone().unwrap_or_default();
            let path = format!("/Users/{backend_user_id}/Views");
            client.proxy_json(Method::GET, &path, &[], None, &proxy_server_id).await
        });
    }

    let mut order: Vec<String> = Vec::new();
    let mut by_type: HashMap<String, VirtualLibrary> = HashMap::new();
    let mut standalone = Vec::new();

    while let Some(joined) = set.join_next().await {
        let Ok(Ok((status, value))) = joined else { continue };
        if !status.is_success() {
            continue;
        }
        let Some(views) = value.get("Items").and_then(|v| v.as_array()) else {
            continue;
        };
        for view in views {
            match view.get("CollectionType").and_then(|v| v.as_str()) {
                Some(ct) if !ct.is_empty() => {
                    let key = ct.to_ascii_lowercase();
                    if !by_type.contains_key(&key) {
                        order.push(key.clone());
                        by_type.insert(
                            key.clone(),
                            VirtualLibrary {
                                collection_type: key.clone(),
                                name: display_name_for(&key),
                                member_views: Vec::new(),
                            },
                        );
                    }
                    by_type.get_mut(&key).expect("just inserted above").member_views.push(view.clone());
                }
                _ => standalone.push(view.clone()),
            }
        }
    }

    let merged = order.into_iter().filter_map(|key| by_type.remove(&key)).collect();

    Ok(LibraryViews { merged, standalone })
}

fn display_name_for(collection_type: &str) -> String {
    match collection_type {
        "movies" => "Movies".to_string(),
        "tvshows" => "Shows".to_string(),
        "music" => "Music".to_string(),
        "books" => "Books".to_string(),
        "homevideos" => "Home Videos".to_string(),
        other => {
            let mut chars = other.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        }
    }
}

/// Render a [`VirtualLibrary`] as a Jellyfin `BaseItemDto`-shaped view,
/// carrying the merged proxy id so later requests against it resolve back to
/// every member backend view.
pub fn virtual_library_to_view(lib: &VirtualLibrary, proxy_server_id: &str) -> Value {
    serde_json::json!({
        "Id": idcodec::encode_merged(&lib.collection_type),
        "Name": lib.name,
        "ServerId": proxy_server_id,
        "CollectionType": lib.collection_type,
        "Type": "CollectionFolder",
        "IsFolder": true,
    })
}

pub fn status_is_client_error(status: StatusCode) -> bool {
    status.is_client_error()
}
