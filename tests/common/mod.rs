//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`] which wires an in-memory DB, default config, and
//! full [`AppContext`], plus [`TestHarness::with_server`] which starts Axum on
//! a random port for HTTP-level testing.

use std::net::SocketAddr;

use chrono::Utc;
use jfp_core::config::Config;
use jfp_core::{BackendId, MappingId, SessionId, UserId};
use jfp_db::{init_memory_pool, queries, Backend, BackendUserMapping, DbPool, ProxyUser, Session};

use jfp_server::context::AppContext;

pub struct TestHarness {
    pub ctx: AppContext,
    pub db: DbPool,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let db = init_memory_pool().expect("failed to create in-memory pool");
        let ctx = AppContext::new(db.clone(), config);
        Self { ctx, db }
    }

    pub async fn with_server() -> (Self, SocketAddr) {
        Self::with_server_config(Config::default()).await
    }

    pub async fn with_server_config(config: Config) -> (Self, SocketAddr) {
        let harness = Self::with_config(config);
        let app = jfp_server::build_router(harness.ctx.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        (harness, addr)
    }

    pub fn conn(&self) -> jfp_db::PooledConnection {
        jfp_db::get_conn(&self.db).expect("failed to get db connection")
    }

    /// Create a bcrypt-hashed proxy user and return (user_id, id_string).
    pub fn create_user(&self, username: &str, password: &str, is_admin: bool) -> (UserId, String) {
        let hash = bcrypt::hash(password, 4).expect("bcrypt hash failed");
        let conn = self.conn();
        let user = ProxyUser {
            id: UserId::new(),
            username: username.to_string(),
            display_name: username.to_string(),
            password_hash: hash,
            is_admin,
            avatar: None,
            avatar_content_type: None,
            created_at: Utc::now(),
        };
        queries::users::create(&conn, &user).expect("failed to create test user");
        (user.id, user.id.to_string())
    }

    /// Create a session for a user and return the raw bearer token.
    pub fn create_session(&self, user_id: UserId) -> String {
        let token = uuid::Uuid::new_v4().to_string();
        let conn = self.conn();
        let session = Session {
            id: SessionId::new(),
            token: token.clone(),
            user_id,
            device_id: Some("test-device".into()),
            device_name: Some("Test Harness".into()),
            app_name: Some("integration-tests".into()),
            app_version: Some("1.0".into()),
            last_activity: Utc::now(),
            created_at: Utc::now(),
        };
        queries::sessions::create(&conn, &session).expect("failed to create test session");
        token
    }

    /// Register a backend with a given prefix and return its id.
    pub fn create_backend(&self, prefix: &str, name: &str, base_url: &str) -> BackendId {
        let conn = self.conn();
        let backend = Backend {
            id: BackendId::new(),
            name: name.to_string(),
            base_url: base_url.to_string(),
            jellyfin_server_id: format!("be-{prefix}"),
            prefix: prefix.to_string(),
            enabled: true,
            created_at: Utc::now(),
        };
        queries::backends::create(&conn, &backend).expect("failed to create test backend");
        backend.id
    }

    /// Map a proxy user onto a backend with its own backend-local user id/token.
    pub fn create_mapping(
        &self,
        user_id: UserId,
        backend_id: BackendId,
        backend_user_id: &str,
        backend_token: &str,
    ) -> MappingId {
        let conn = self.conn();
        let mapping = BackendUserMapping {
            id: MappingId::new(),
            user_id,
            backend_id,
            backend_user_id: backend_user_id.to_string(),
            backend_token: Some(backend_token.to_string()),
            enabled: true,
        };
        queries::mappings::create(&conn, &mapping).expect("failed to create test mapping");
        mapping.id
    }
}
