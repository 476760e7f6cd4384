//! jfp-server: the HTTP API surface, routing policies and background tasks
//! that make several Jellyfin servers look like one to a client.

pub mod backend_client;
pub mod backend_pool;
pub mod context;
pub mod dto;
pub mod error;
pub mod health;
pub mod idcodec;
pub mod middleware;
pub mod query_canon;
pub mod router;
pub mod routes;
pub mod translator;
pub mod view_cache;

use std::net::SocketAddr;
use std::time::Duration;

use axum::middleware as axum_middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use jfp_core::config::Config;

use crate::context::AppContext;
use crate::middleware::auth::auth_middleware;
use crate::middleware::request_id::request_id_middleware;

/// Start the proxy: open the database, seed an admin if configured, spawn
/// the health-check and login-limiter housekeeping loops, and serve HTTP
/// until a shutdown signal arrives.
pub async fn start(config: Config) -> jfp_core::Result<()> {
    for warning in config.validate() {
        tracing::warn!("config warning: {warning}");
    }

    let db = if config.server.db_path.is_empty() {
        jfp_db::init_memory_pool()?
    } else {
        jfp_db::init_pool(&config.server.db_path)?
    };

    if let (Some(username), Some(password)) = (&config.admin_seed.username, &config.admin_seed.password) {
        let conn = jfp_db::get_conn(&db)?;
        if jfp_db::queries::users::seed_initial_admin(&conn, username, password)? {
            tracing::info!(%username, "seeded initial admin account");
        }
    }

    let ctx = AppContext::new(db, config.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let health_ctx = ctx.clone();
    let health_shutdown = shutdown_rx.clone();
    let health_handle = tokio::spawn(async move {
        crate::health::run_health_loop(
            health_ctx.health.clone(),
            health_ctx.db.clone(),
            health_ctx.json_client.clone(),
            health_ctx.config.health.check_interval,
            health_shutdown,
        )
        .await;
    });

    let limiter_ctx = ctx.clone();
    let mut limiter_shutdown = shutdown_rx.clone();
    let limiter_handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(60));
        loop {
            tokio::select! {
                _ = ticker.tick() => limiter_ctx.login_limiter.gc(),
                _ = limiter_shutdown.changed() => {
                    if *limiter_shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    });

    let idle_ctx = ctx.clone();
    let mut idle_shutdown = shutdown_rx.clone();
    let idle_handle = tokio::spawn(async move {
        let Some(ttl) = idle_ctx.config.session.idle_ttl else { return };
        let mut ticker = tokio::time::interval(Duration::from_secs(300));
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let cutoff = chrono::Utc::now() - chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::weeks(5200));
                    if let Ok(conn) = jfp_db::get_conn(&idle_ctx.db) {
                        if let Err(e) = jfp_db::queries::sessions::delete_idle_since(&conn, cutoff) {
                            tracing::debug!(error = %e, "idle session sweep failed");
                        }
                    }
                }
                _ = idle_shutdown.changed() => {
                    if *idle_shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    });

    let addr: SocketAddr = config
        .server
        .listen_address
        .parse()
        .map_err(|e| jfp_core::Error::Internal(format!("invalid listen address: {e}")))?;

    let app = build_router(ctx);

    tracing::info!(%addr, "starting jellyfed");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| jfp_core::Error::Internal(format!("failed to bind {addr}: {e}")))?;

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| jfp_core::Error::Internal(format!("server error: {e}")))?;

    let _ = shutdown_tx.send(true);
    let _ = tokio::time::timeout(config.server.shutdown_timeout, async {
        let _ = tokio::join!(health_handle, limiter_handle, idle_handle);
    })
    .await;

    tracing::info!("jellyfed shutdown complete");
    Ok(())
}

pub fn build_router(ctx: AppContext) -> Router {
    let cors = if ctx.config.server.cors_origins.is_empty() {
        CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
    } else {
        let origins: Vec<_> = ctx
            .config
            .server
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new().allow_origin(origins).allow_methods(Any).allow_headers(Any)
    };

    let public = Router::new()
        .route("/System/Info/Public", get(routes::jellyfin::system::public_info))
        .route("/branding/configuration", get(routes::jellyfin::system::branding_config))
        .route("/Users/AuthenticateByName", post(routes::auth::authenticate_by_name))
        .route("/videos/{id}/master.m3u8", get(routes::jellyfin::playback::hls_playlist));

    let protected = Router::new()
        .route("/System/Info", get(routes::jellyfin::system::info))
        .route("/Sessions/Logout", post(routes::auth::logout))
        .route("/Users/Me", get(routes::auth::me))
        .route("/Users/{id}/Password", post(routes::auth::change_password))
        .route("/Users/{id}/Views", get(routes::jellyfin::items::list_views))
        .route("/Items", get(routes::jellyfin::items::list_items))
        .route("/Users/{id}/Items", get(routes::jellyfin::items::list_items))
        .route("/Items/{id}", get(routes::jellyfin::items::get_item))
        .route("/Users/{id}/Items/{itemId}", get(routes::jellyfin::items::get_item_for_user))
        .route("/Items/{id}/PlaybackInfo", post(routes::jellyfin::playback::playback_info))
        .route("/Videos/{id}/stream", get(routes::jellyfin::playback::stream_media))
        .route("/Sessions/Playing", post(routes::jellyfin::playstate::report_playing))
        .route("/Sessions/Playing/Progress", post(routes::jellyfin::playstate::report_progress))
        .route("/Sessions/Playing/Stopped", post(routes::jellyfin::playstate::report_stopped))
        .route("/Users/{userId}/PlayedItems/{itemId}", post(routes::jellyfin::playstate::mark_played))
        .route("/Users/{userId}/PlayedItems/{itemId}", delete(routes::jellyfin::playstate::unmark_played))
        .route("/Users/{userId}/FavoriteItems/{itemId}", post(routes::jellyfin::playstate::mark_favorite))
        .route("/Users/{userId}/FavoriteItems/{itemId}", delete(routes::jellyfin::playstate::unmark_favorite))
        .route("/socket", get(routes::socket::upgrade))
        .route("/proxy/users", get(routes::admin::list_users))
        .route("/proxy/users", post(routes::admin::create_user))
        .route("/proxy/users/{id}", delete(routes::admin::delete_user))
        .route("/proxy/backends", get(routes::admin::list_backends))
        .route("/proxy/backends", post(routes::admin::create_backend))
        .route("/proxy/backends/{id}", axum::routing::put(routes::admin::update_backend))
        .route("/proxy/backends/{id}", delete(routes::admin::delete_backend))
        .route("/proxy/mappings", post(routes::admin::create_mapping))
        .route("/proxy/mappings/{id}", delete(routes::admin::delete_mapping))
        .layer(axum_middleware::from_fn_with_state(ctx.clone(), auth_middleware));

    Router::new()
        .route("/health", get(routes::health::healthz))
        .route("/ready", get(routes::health::readyz))
        .merge(public)
        .merge(protected)
        .layer(axum_middleware::from_fn(request_id_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("shutdown signal received");
}
