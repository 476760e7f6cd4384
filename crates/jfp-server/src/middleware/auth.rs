//! Session authentication middleware.
//!
//! Accepts tokens from, in order: `X-Emby-Token`, `X-MediaBrowser-Token`, the
//! `Authorization` header's `Token="..."` parameter, and the `api_key`/
//! `ApiKey` query parameter.

use axum::extract::{Query, Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use chrono::{Duration as ChronoDuration, Utc};
use std::collections::HashMap;

use crate::context::AppContext;
use crate::error::AppError;
use jfp_core::Error;
use jfp_db::{queries, Session};

/// Debounce window for session activity writes.
const ACTIVITY_DEBOUNCE: ChronoDuration = ChronoDuration::minutes(5);

#[derive(Clone)]
pub struct AuthUser {
    pub user: jfp_db::ProxyUser,
    pub session: Session,
}

pub fn extract_token(headers: &HeaderMap, query: &HashMap<String, String>) -> Option<String> {
    if let Some(v) = headers.get("X-Emby-Token").and_then(|v| v.to_str().ok()) {
        if !v.is_empty() {
            return Some(v.to_string());
        }
    }
    if let Some(v) = headers.get("X-MediaBrowser-Token").and_then(|v| v.to_str().ok()) {
        if !v.is_empty() {
            return Some(v.to_string());
        }
    }
    if let Some(auth) = headers.get("Authorization").and_then(|v| v.to_str().ok()) {
        if let Some(token) = extract_token_param(auth) {
            return Some(token);
        }
    }
    query
        .get("api_key")
        .or_else(|| query.get("ApiKey"))
        .filter(|v| !v.is_empty())
        .cloned()
}

/// Parses `Token="..."` out of a MediaBrowser-style `Authorization` header,
/// e.g. `MediaBrowser Client="...", Device="...", Token="abc123"`.
fn extract_token_param(header: &str) -> Option<String> {
    for part in header.split(',') {
        let part = part.trim();
        if let Some(rest) = part.strip_prefix("Token=") {
            let token = rest.trim_matches('"');
            if !token.is_empty() {
                return Some(token.to_string());
            }
        }
    }
    None
}

pub async fn auth_middleware(
    State(ctx): State<AppContext>,
    Query(query): Query<HashMap<String, String>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_token(req.headers(), &query)
        .ok_or_else(|| Error::Unauthorized("missing auth token".into()))?;

    let conn = jfp_db::get_conn(&ctx.db)?;
    let session = queries::sessions::get_by_token(&conn, &token)?
        .ok_or_else(|| Error::Unauthorized("invalid session".into()))?;

    if let Some(ttl) = ctx.config.session.idle_ttl {
        let idle_for = Utc::now() - session.last_activity;
        let ttl = ChronoDuration::from_std(ttl).unwrap_or_else(|_| ChronoDuration::weeks(5200));
        if idle_for > ttl {
            queries::sessions::delete(&conn, session.id)?;
            return Err(Error::Unauthorized("session expired".into()).into());
        }
    }

    let user = queries::users::get(&conn, session.user_id)?
        .ok_or_else(|| Error::Unauthorized("user no longer exists".into()))?;

    if Utc::now() - session.last_activity > ACTIVITY_DEBOUNCE {
        queries::sessions::touch(&conn, session.id, Utc::now())?;
    }

    req.extensions_mut().insert(AuthUser { user, session });
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn extracts_from_emby_token_header() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Emby-Token", HeaderValue::from_static("abc"));
        assert_eq!(extract_token(&headers, &HashMap::new()), Some("abc".into()));
    }

    #[test]
    fn extracts_from_mediabrowser_token_header() {
        let mut headers = HeaderMap::new();
        headers.insert("X-MediaBrowser-Token", HeaderValue::from_static("def"));
        assert_eq!(extract_token(&headers, &HashMap::new()), Some("def".into()));
    }

    #[test]
    fn extracts_token_from_authorization_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "Authorization",
            HeaderValue::from_static(r#"MediaBrowser Client="web", Device="pc", Token="xyz""#),
        );
        assert_eq!(extract_token(&headers, &HashMap::new()), Some("xyz".into()));
    }

    #[test]
    fn extracts_from_query_param() {
        let mut query = HashMap::new();
        query.insert("api_key".to_string(), "qqq".to_string());
        assert_eq!(extract_token(&HeaderMap::new(), &query), Some("qqq".into()));
    }

    #[test]
    fn header_precedence_over_query() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Emby-Token", HeaderValue::from_static("header-token"));
        let mut query = HashMap::new();
        query.insert("api_key".to_string(), "query-token".to_string());
        assert_eq!(extract_token(&headers, &query), Some("header-token".into()));
    }

    #[test]
    fn no_token_anywhere_is_none() {
        assert!(extract_token(&HeaderMap::new(), &HashMap::new()).is_none());
    }
}
