//! Operational health endpoints, distinct from the Jellyfin-facing
//! `System/Info` routes: these describe the proxy process itself and are
//! meant for a load balancer or orchestrator, not a media client.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::context::AppContext;

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "ok"})))
}

/// Readiness also reports which backends the health checker currently
/// considers available, without gating the status code on them — the proxy
/// itself is ready even if every backend is down.
pub async fn readyz(State(ctx): State<AppContext>) -> impl IntoResponse {
    let conn = match jfp_db::get_conn(&ctx.db) {
        Ok(conn) => conn,
        Err(_) => return (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"status": "db unavailable"}))),
    };

    let backends = jfp_db::queries::backends::list_enabled(&conn).unwrap_or_default();
    let statuses: Vec<_> = backends
        .iter()
        .map(|b| {
            let status = ctx.health.status(b.id);
            json!({
                "prefix": b.prefix,
                "available": status.available,
                "failureCount": status.failure_count,
            })
        })
        .collect();

    (StatusCode::OK, Json(json!({"status": "ready", "backends": statuses})))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn healthz_returns_ok() {
        let response = healthz().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
