//! Application context shared by every route handler via Axum state.
//!
//! Cheaply cloneable: every field is either `Arc`-backed or already a handle
//! type (the `r2d2` pool, `reqwest::Client`).

use std::sync::Arc;
use std::time::Duration;

use jfp_core::config::Config;
use jfp_db::DbPool;

use crate::backend_pool::BackendPool;
use crate::health::HealthRegistry;
use crate::middleware::login_limiter::LoginLimiter;
use crate::view_cache::ViewCache;

#[derive(Clone)]
pub struct AppContext {
    pub db: DbPool,
    pub config: Arc<Config>,
    pub backends: BackendPool,
    pub health: HealthRegistry,
    pub view_cache: ViewCache,
    pub login_limiter: LoginLimiter,
    /// Bounded-timeout client for JSON API calls.
    pub json_client: reqwest::Client,
    /// Near-unbounded-timeout client for media streaming.
    pub stream_client: reqwest::Client,
}

impl AppContext {
    pub fn new(db: DbPool, config: Config) -> Self {
        let config = Arc::new(config);
        let health = HealthRegistry::new();

        let json_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(15))
            .build()
            .expect("json http client builds");

        let stream_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .expect("stream http client builds");

        let backends = BackendPool::new(db.clone(), health.clone(), json_client.clone(), stream_client.clone());

        let login_limiter = LoginLimiter::new(
            config.login_limiter.max_attempts,
            config.login_limiter.window,
            config.login_limiter.ban_duration,
        );

        Self {
            db,
            config,
            backends,
            health,
            view_cache: ViewCache::default(),
            login_limiter,
            json_client,
            stream_client,
        }
    }

    pub fn proxy_server_id(&self) -> &str {
        &self.config.server.server_id
    }
}
