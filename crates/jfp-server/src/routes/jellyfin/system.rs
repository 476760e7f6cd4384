//! System/branding endpoints. These describe the proxy itself rather than
//! any backend, so they are answered locally with no backend call.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::context::AppContext;

pub async fn public_info(State(ctx): State<AppContext>) -> impl IntoResponse {
    Json(json!({
        "ServerName": ctx.config.server.server_name,
        "Version": env!("CARGO_PKG_VERSION"),
        "Id": ctx.proxy_server_id(),
        "ProductName": "Jellyfin",
        "StartupWizardCompleted": true,
    }))
}

pub async fn info(State(ctx): State<AppContext>) -> impl IntoResponse {
    Json(json!({
        "ServerName": ctx.config.server.server_name,
        "Version": env!("CARGO_PKG_VERSION"),
        "Id": ctx.proxy_server_id(),
        "OperatingSystem": std::env::consts::OS,
        "SupportsLibraryMonitor": false,
        "LocalAddress": ctx.config.server.external_url.clone().unwrap_or_default(),
    }))
}

pub async fn branding_config() -> impl IntoResponse {
    Json(json!({
        "LoginDisclaimer": "",
        "CustomCss": "",
        "SplashscreenEnabled": false,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jfp_core::config::Config;

    #[tokio::test]
    async fn public_info_reports_configured_server_name() {
        let db = jfp_db::init_memory_pool().unwrap();
        let ctx = AppContext::new(db, Config::default());
        let response = public_info(State(ctx)).await.into_response();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }
}
