//! PlaybackInfo rewriting and HLS/segment/stream delivery.
//!
//! The pipeline runs in two shapes: `PlaybackInfo` is a JSON call that gets
//! its URL-bearing fields rewritten in place; everything downstream of it
//! (HLS playlists, segments, direct `/stream`, subtitles) is served either by
//! chunked passthrough or by a 302 redirect straight to the backend when
//! direct-stream mode is enabled.

use std::collections::HashMap;

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::{Extension, Json};
use reqwest::Method;
use serde_json::Value;

use crate::backend_client::STREAM_PASSTHROUGH_HEADERS;
use crate::context::AppContext;
use crate::error::AppError;
use crate::middleware::auth::{self, AuthUser};
use crate::router;
use jfp_core::Error;

/// Fields on a `PlaybackInfo` response (and nested `MediaSources` entries)
/// whose value is a URL that needs backend-base/ID/ApiKey rewriting.
const URL_FIELDS: &[&str] = &["TranscodingUrl", "DirectStreamUrl"];

pub async fn playback_info(
    State(ctx): State<AppContext>,
    Extension(auth): Extension<AuthUser>,
    Path(item_id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    body: Option<Json<Value>>,
) -> Result<impl IntoResponse, AppError> {
    let Some((client, local_id)) = router::resolve_single(&ctx.backends, auth.user.id, &item_id).await? else {
        return Err(Error::NotFound { entity: "item".into(), id: item_id }.into());
    };

    let path = format!("/Items/{local_id}/PlaybackInfo");
    let pairs: Vec<(String, String)> = query.into_iter().collect();
    let (status, mut value) = client
        .proxy_json(Method::POST, &path, &pairs, body.map(|Json(v)| v), ctx.proxy_server_id())
        .await?;

    if status.is_success() {
        rewrite_playback_value(
            &mut value,
            &client.base_url,
            ctx.config.server.external_url.as_deref().unwrap_or(""),
            &client.prefix,
            &auth.session.token,
        );
    }

    Ok(Json(value))
}

fn rewrite_playback_value(value: &mut Value, base_url: &str, external_url: &str, prefix: &str, proxy_token: &str) {
    match value {
        Value::Object(map) => {
            for (key, v) in map.iter_mut() {
                if URL_FIELDS.contains(&key.as_str()) {
                    if let Value::String(s) = v {
                        *s = rewrite_url_field(s, base_url, external_url, prefix, proxy_token);
                    }
                } else {
                    rewrite_playback_value(v, base_url, external_url, prefix, proxy_token);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                rewrite_playback_value(item, base_url, external_url, prefix, proxy_token);
            }
        }
        _ => {}
    }
}

/// Rewrite a single URL-bearing string: swap the backend base for the
/// external URL, prefix bare backend IDs in URL context, strip any existing
/// `ApiKey` and append the caller's proxy token.
fn rewrite_url_field(raw: &str, base_url: &str, external_url: &str, prefix: &str, proxy_token: &str) -> String {
    let mut s = raw.to_string();
    if !external_url.is_empty() && !base_url.is_empty() {
        s = s.replace(base_url, external_url);
    }
    s = prefix_bare_ids(&s, prefix);
    s = strip_api_key(&s);
    if proxy_token.is_empty() {
        return s;
    }
    let sep = if s.contains('?') { "&" } else { "?" };
    format!("{s}{sep}ApiKey={proxy_token}")
}

/// Prefix bare backend item IDs (32-hex or dashed UUID form) that appear in
/// URL context (surrounded by `/`, `?`, `=`, `"`, `&` or end-of-string).
fn prefix_bare_ids(s: &str, prefix: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = String::with_capacity(s.len());
    let mut i = 0;
    while i < bytes.len() {
        if let Some(len) = id_token_len(&s[i..]) {
            let boundary_before = i == 0 || !is_id_char(bytes[i - 1]);
            let after = i + len;
            let boundary_after = after >= bytes.len() || !is_id_char(bytes[after]);
            if boundary_before && boundary_after {
                out.push_str(prefix);
                out.push('_');
                out.push_str(&s[i..after]);
                i = after;
                continue;
            }
        }
        out.push(bytes[i] as char);
        i += 1;
    }
    out
}

fn is_id_char(b: u8) -> bool {
    b.is_ascii_hexdigit() || b == b'-'
}

/// Returns the byte length of an ID token starting at `s`'s first character,
/// if one is present: 32 plain hex chars, or the 8-4-4-4-12 dashed form.
fn id_token_len(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    if bytes.len() >= 36 && is_dashed_uuid(&bytes[..36]) {
        return Some(36);
    }
    if bytes.len() >= 32 {
        let candidate = &bytes[..32];
        if candidate.iter().all(|b| b.is_ascii_hexdigit()) {
            return Some(32);
        }
    }
    None
}

fn is_dashed_uuid(b: &[u8]) -> bool {
    let groups = [8, 4, 4, 4, 12];
    let mut pos = 0;
    for (idx, len) in groups.iter().enumerate() {
        if pos + len > b.len() {
            return false;
        }
        if !b[pos..pos + len].iter().all(|c| c.is_ascii_hexdigit()) {
            return false;
        }
        pos += len;
        if idx < groups.len() - 1 {
            if pos >= b.len() || b[pos] != b'-' {
                return false;
            }
            pos += 1;
        }
    }
    true
}

/// Strip every `ApiKey=<value>` occurrence from a URL's query string,
/// cleaning up the leftover `?`/`&` so the result is still well-formed.
fn strip_api_key(s: &str) -> String {
    let Some(q_idx) = s.find('?') else { return s.to_string() };
    let (path, query) = s.split_at(q_idx);
    let query = &query[1..];
    let kept: Vec<&str> = query
        .split('&')
        .filter(|pair| {
            let key = pair.split('=').next().unwrap_or("");
            !key.eq_ignore_ascii_case("apikey")
        })
        .collect();
    if kept.is_empty() {
        path.to_string()
    } else {
        format!("{path}?{}", kept.join("&"))
    }
}

/// `GET` on an HLS master/variant playlist. Proxies the raw text from the
/// owning backend with its own token, then swaps every embedded `ApiKey`
/// (leaked backend token or none at all) for the caller's proxy token.
pub async fn hls_playlist(
    State(ctx): State<AppContext>,
    Path(proxy_id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let proxy_token = resolve_playlist_token(&ctx, &headers, &query).await?;
    let Some((prefix, local_id)) = crate::idcodec::decode(&proxy_id) else {
        return Err(Error::NotFound { entity: "playlist".into(), id: proxy_id }.into());
    };
    let client = ctx
        .backends
        .for_backend(prefix)?
        .ok_or_else(|| Error::NotFound { entity: "backend".into(), id: prefix.to_string() })?;

    let backend_query: Vec<(String, String)> = query
        .into_iter()
        .filter(|(k, _)| !k.eq_ignore_ascii_case("apikey"))
        .collect();
    let path = format!("/videos/{local_id}/master.m3u8");
    let (status, bytes, _headers) = client.proxy_raw(Method::GET, &path, &backend_query).await?;

    if !status.is_success() {
        return Err(Error::Backend { backend: prefix.to_string(), message: format!("playlist fetch failed: {status}") }.into());
    }

    let text = String::from_utf8_lossy(&bytes);
    let rewritten = rewrite_playlist(&text, &proxy_token);

    let mut response = Response::new(Body::from(rewritten));
    response
        .headers_mut()
        .insert("content-type", "application/vnd.apple.mpegurl".parse().unwrap());
    Ok(response)
}

async fn resolve_playlist_token(
    ctx: &AppContext,
    headers: &HeaderMap,
    query: &HashMap<String, String>,
) -> Result<String, AppError> {
    if let Some(token) = auth::extract_token(headers, query) {
        return Ok(token);
    }
    for (key, value) in query {
        if key.eq_ignore_ascii_case("apikey") {
            let conn = jfp_db::get_conn(&ctx.db)?;
            if jfp_db::queries::sessions::get_by_token(&conn, value)?.is_some() {
                return Ok(value.clone());
            }
        }
    }
    Err(Error::Unauthorized("no valid session token on playlist request".into()).into())
}

fn rewrite_playlist(text: &str, proxy_token: &str) -> String {
    text.lines()
        .map(|line| {
            if line.is_empty() {
                line.to_string()
            } else if let Some(pos) = line.find("URI=\"") {
                let (head, rest) = line.split_at(pos + 5);
                let Some(end) = rest.find('"') else { return line.to_string() };
                let (uri, tail) = rest.split_at(end);
                let new_uri = swap_api_key(uri, proxy_token);
                format!("{head}{new_uri}{tail}")
            } else if line.starts_with('#') {
                line.to_string()
            } else {
                swap_api_key(line, proxy_token)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn swap_api_key(url: &str, proxy_token: &str) -> String {
    let stripped = strip_api_key(url);
    let sep = if stripped.contains('?') { "&" } else { "?" };
    format!("{stripped}{sep}ApiKey={proxy_token}")
}

/// Streams bytes from the owning backend for segments, direct `/stream`,
/// subtitles, `universal` audio, images and downloads. Falls back to a 302
/// redirect when direct-stream mode is enabled in configuration.
pub async fn stream_media(
    State(ctx): State<AppContext>,
    Path(proxy_id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let Some((prefix, local_id)) = crate::idcodec::decode(&proxy_id) else {
        return Err(Error::NotFound { entity: "item".into(), id: proxy_id }.into());
    };
    let client = ctx
        .backends
        .for_backend(prefix)?
        .ok_or_else(|| Error::NotFound { entity: "backend".into(), id: prefix.to_string() })?;

    let backend_query: Vec<(String, String)> = query
        .into_iter()
        .filter(|(k, _)| !k.eq_ignore_ascii_case("apikey"))
        .collect();
    let path = format!("/Videos/{local_id}/stream");

    if ctx.config.streaming.direct_stream {
        let url = client.direct_url(&path, &backend_query);
        return Ok(Redirect::temporary(&url).into_response());
    }

    let range = headers.get("Range").and_then(|v| v.to_str().ok());
    let upstream = client.proxy_stream(Method::GET, &path, &backend_query, range).await?;

    let status = StatusCode::from_u16(upstream.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut builder = Response::builder().status(status);
    for name in STREAM_PASSTHROUGH_HEADERS {
        if let Some(value) = upstream.headers().get(*name) {
            builder = builder.header(*name, value.clone());
        }
    }
    let body = Body::from_stream(upstream.bytes_stream());
    Ok(builder.body(body).unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_single_api_key() {
        let url = "/videos/abc/stream?ApiKey=secret&static=true";
        assert_eq!(strip_api_key(url), "/videos/abc/stream?static=true");
    }

    #[test]
    fn strips_duplicate_api_keys() {
        let url = "/videos/abc/stream?ApiKey=leaked&other=val&ApiKey=proxy";
        assert_eq!(strip_api_key(url), "/videos/abc/stream?other=val");
    }

    #[test]
    fn strip_with_no_query_is_noop() {
        assert_eq!(strip_api_key("/videos/abc/stream"), "/videos/abc/stream");
    }

    #[test]
    fn prefixes_plain_hex_id() {
        let s = "/videos/abcd1234abcd1234abcd1234abcd1234/master.m3u8";
        let rewritten = prefix_bare_ids(s, "s1");
        assert!(rewritten.contains("s1_abcd1234abcd1234abcd1234abcd1234"));
    }

    #[test]
    fn prefixes_dashed_uuid() {
        let s = "?MediaSourceId=abcdef12-1234-1234-1234-123456789abc";
        let rewritten = prefix_bare_ids(s, "s1");
        assert!(rewritten.contains("s1_abcdef12-1234-1234-1234-123456789abc"));
    }

    #[test]
    fn rewrite_url_field_strips_backend_key_and_injects_proxy_token() {
        let raw = "http://backend.local/videos/abcd1234abcd1234abcd1234abcd1234/master.m3u8?ApiKey=BACKENDSECRET&MediaSourceId=abcd1234abcd1234abcd1234abcd1234";
        let rewritten = rewrite_url_field(raw, "http://backend.local", "https://proxy.example.com", "s1", "proxytoken");
        assert!(rewritten.starts_with("https://proxy.example.com"));
        assert!(!rewritten.contains("BACKENDSECRET"));
        assert!(rewritten.contains("ApiKey=proxytoken"));
        assert!(rewritten.contains("s1_abcd1234abcd1234abcd1234abcd1234"));
    }

    #[test]
    fn rewrite_playlist_swaps_backend_key_for_proxy_token() {
        let playlist = "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=1000\nmain.m3u8?ApiKey=BACKEND&MediaSourceId=x\n";
        let rewritten = rewrite_playlist(playlist, "proxytoken");
        assert!(rewritten.contains("main.m3u8?MediaSourceId=x&ApiKey=proxytoken"));
        assert!(!rewritten.contains("BACKEND"));
        assert!(rewritten.contains("#EXTM3U"));
    }

    #[test]
    fn rewrite_playlist_handles_uri_attribute_in_comments() {
        let playlist = "#EXT-X-KEY:METHOD=AES-128,URI=\"key.bin?ApiKey=BACKEND\"\n";
        let rewritten = rewrite_playlist(playlist, "proxytoken");
        assert!(rewritten.contains("URI=\"key.bin?ApiKey=proxytoken\""));
    }
}
