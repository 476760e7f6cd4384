//! Application configuration types.
//!
//! The top-level [`Config`] struct is populated from environment variables at
//! process start via [`Config::from_env`]. Every field defaults sensibly so
//! the proxy can boot with nothing set beyond a database path.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub session: SessionConfig,
    pub login_limiter: LoginLimiterConfig,
    pub admin_seed: AdminSeedConfig,
    pub streaming: StreamingConfig,
    pub health: HealthConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            session: SessionConfig::default(),
            login_limiter: LoginLimiterConfig::default(),
            admin_seed: AdminSeedConfig::default(),
            streaming: StreamingConfig::default(),
            health: HealthConfig::default(),
        }
    }
}

impl Config {
    /// Populate configuration from environment variables, falling back to
    /// defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Some(v) = env_string("JFP_DATABASE_PATH") {
            cfg.server.db_path = v;
        }
        if let Some(v) = env_string("JFP_LISTEN_ADDRESS") {
            cfg.server.listen_address = v;
        }
        if let Some(v) = env_string("JFP_EXTERNAL_URL") {
            cfg.server.external_url = Some(v);
        }
        if let Some(v) = env_string("JFP_SERVER_ID") {
            cfg.server.server_id = v;
        }
        if let Some(v) = env_string("JFP_SERVER_NAME") {
            cfg.server.server_name = v;
        }
        if let Some(v) = env_u64("JFP_SHUTDOWN_TIMEOUT_SECS") {
            cfg.server.shutdown_timeout = Duration::from_secs(v);
        }
        if let Some(v) = env_string("JFP_CORS_ORIGINS") {
            cfg.server.cors_origins = v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
        }
        if let Some(v) = env_u64("JFP_USER_BITRATE_CAP") {
            cfg.server.user_bitrate_cap = Some(v);
        }

        if let Some(v) = env_u64("JFP_SESSION_IDLE_TTL_SECS") {
            cfg.session.idle_ttl = if v == 0 { None } else { Some(Duration::from_secs(v)) };
        }

        if let Some(v) = env_u32("JFP_LOGIN_MAX_ATTEMPTS") {
            cfg.login_limiter.max_attempts = v;
        }
        if let Some(v) = env_u64("JFP_LOGIN_WINDOW_SECS") {
            cfg.login_limiter.window = Duration::from_secs(v);
        }
        if let Some(v) = env_u64("JFP_LOGIN_BAN_SECS") {
            cfg.login_limiter.ban_duration = Duration::from_secs(v);
        }

        if let Some(v) = env_string("JFP_INITIAL_ADMIN_USERNAME") {
            cfg.admin_seed.username = Some(v);
        }
        if let Some(v) = env_string("JFP_INITIAL_ADMIN_PASSWORD") {
            cfg.admin_seed.password = Some(v);
        }

        if let Some(v) = env_bool("JFP_DIRECT_STREAM") {
            cfg.streaming.direct_stream = v;
        }

        if let Some(v) = env_u64("JFP_HEALTH_CHECK_INTERVAL_SECS") {
            cfg.health.check_interval = Duration::from_secs(v);
        }

        cfg
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.db_path.is_empty() {
            warnings.push("server.db_path is empty; using in-memory storage".into());
        }

        if self.streaming.direct_stream && self.server.external_url.is_none() {
            warnings.push(
                "direct-stream mode is enabled but external_url is unset; redirects will be relative".into(),
            );
        }

        if self.login_limiter.max_attempts == 0 {
            warnings.push("login rate limiting is disabled (max_attempts = 0)".into());
        }

        if self.admin_seed.username.is_some() && self.admin_seed.password.is_none() {
            warnings.push("initial admin username is set but password is missing; seed will be skipped".into());
        }

        if self.session.idle_ttl.is_none() {
            warnings.push("session idle TTL is disabled; sessions never expire from inactivity".into());
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// HTTP server and identity settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_address: String,
    pub external_url: Option<String>,
    pub db_path: String,
    pub server_id: String,
    pub server_name: String,
    pub shutdown_timeout: Duration,
    pub cors_origins: Vec<String>,
    pub user_bitrate_cap: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0:8096".into(),
            external_url: None,
            db_path: "./data/jellyfed.db".into(),
            server_id: "jellyfed-proxy".into(),
            server_name: "Jellyfed".into(),
            shutdown_timeout: Duration::from_secs(15),
            cors_origins: Vec::new(),
            user_bitrate_cap: None,
        }
    }
}

/// Session lifecycle settings.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// `None` means sessions never expire from inactivity.
    pub idle_ttl: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_ttl: Some(Duration::from_secs(14 * 24 * 3600)),
        }
    }
}

/// Login rate limiter thresholds.
#[derive(Debug, Clone)]
pub struct LoginLimiterConfig {
    pub max_attempts: u32,
    pub window: Duration,
    pub ban_duration: Duration,
}

impl Default for LoginLimiterConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window: Duration::from_secs(300),
            ban_duration: Duration::from_secs(900),
        }
    }
}

/// Bootstrap credentials for an initial admin account, seeded once if the
/// users table is empty.
#[derive(Debug, Clone, Default)]
pub struct AdminSeedConfig {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Playback delivery settings.
#[derive(Debug, Clone)]
pub struct StreamingConfig {
    /// When true, media requests 302-redirect to the backend instead of being piped.
    pub direct_stream: bool,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self { direct_stream: false }
    }
}

/// Backend health checker cadence.
#[derive(Debug, Clone)]
pub struct HealthConfig {
    pub check_interval: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(30),
        }
    }
}

// ---------------------------------------------------------------------------
// Env helpers
// ---------------------------------------------------------------------------

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_u64(key: &str) -> Option<u64> {
    env_string(key).and_then(|v| v.parse().ok())
}

fn env_u32(key: &str) -> Option<u32> {
    env_string(key).and_then(|v| v.parse().ok())
}

fn env_bool(key: &str) -> Option<bool> {
    env_string(key).and_then(|v| match v.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    })
}
