//! Backend health tracking and live circuit breaker.
//!
//! A background task probes every enabled backend's `/System/Info/Public`
//! on a fixed interval; live request failures can also trip a backend to
//! unavailable immediately, without waiting for the next probe.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use jfp_core::BackendId;

const PROBE_FAILURE_THRESHOLD: u32 = 2;
const LIVE_FAILURE_THRESHOLD: u32 = 5;

#[derive(Debug, Clone)]
pub struct BackendHealthStatus {
    pub available: bool,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub failure_count: u32,
}

impl Default for BackendHealthStatus {
    fn default() -> Self {
        Self {
            available: true,
            last_checked_at: None,
            last_error: None,
            failure_count: 0,
        }
    }
}

/// Shared, thread-safe registry of per-backend health state.
#[derive(Clone, Default)]
pub struct HealthRegistry {
    statuses: Arc<DashMap<BackendId, BackendHealthStatus>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy, never a reference, so callers cannot mutate shared state.
    pub fn status(&self, id: BackendId) -> BackendHealthStatus {
        self.statuses.get(&id).map(|e| e.clone()).unwrap_or_default()
    }

    pub fn is_available(&self, id: BackendId) -> bool {
        self.statuses.get(&id).map(|e| e.available).unwrap_or(true)
    }

    /// Called by the periodic health probe on success.
    pub fn record_probe_success(&self, id: BackendId) {
        let mut entry = self.statuses.entry(id).or_default();
        entry.available = true;
        entry.failure_count = 0;
        entry.last_error = None;
        entry.last_checked_at = Some(Utc::now());
    }

    /// Called by the periodic health probe on failure. Anti-flap: only the
    /// 2nd consecutive probe failure flips `available` to false.
    pub fn record_probe_failure(&self, id: BackendId, error: impl Into<String>) {
        let mut entry = self.statuses.entry(id).or_default();
        entry.failure_count += 1;
        entry.last_error = Some(error.into());
        entry.last_checked_at = Some(Utc::now());
        if entry.failure_count >= PROBE_FAILURE_THRESHOLD {
            entry.available = false;
        }
    }

    /// Called after a live outbound request to the backend fails. Trips the
    /// breaker after 5 consecutive failures without waiting for a probe.
    pub fn record_request_failure(&self, id: BackendId) {
        let mut entry = self.statuses.entry(id).or_default();
        entry.failure_count += 1;
        if entry.failure_count >= LIVE_FAILURE_THRESHOLD {
            entry.available = false;
        }
    }

    /// Called after a live outbound request to the backend succeeds. Resets
    /// the live failure counter while the backend is still available; does
    /// NOT flip an unavailable backend back to available (only a probe can).
    pub fn record_request_success(&self, id: BackendId) {
        if let Some(mut entry) = self.statuses.get_mut(&id) {
            if entry.available {
                entry.failure_count = 0;
            }
        }
    }
}

/// Run the periodic health-probe loop until `shutdown` resolves.
pub async fn run_health_loop(
    registry: HealthRegistry,
    db: jfp_db::DbPool,
    json_client: reqwest::Client,
    interval: Duration,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                probe_all(&registry, &db, &json_client).await;
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

async fn probe_all(registry: &HealthRegistry, db: &jfp_db::DbPool, json_client: &reqwest::Client) {
    let backends = match jfp_db::get_conn(db).and_then(|conn| jfp_db::queries::backends::list_enabled(&conn)) {
        Ok(b) => b,
        Err(e) => {
            tracing::warn!("health probe: failed to list backends: {e}");
            return;
        }
    };

    let mut tasks = tokio::task::JoinSet::new();
    for backend in backends {
        let registry = registry.clone();
        let client = json_client.clone();
        tasks.spawn(async move {
            let url = format!("{}/System/Info/Public", backend.base_url.trim_end_matches('/'));
            let result = tokio::time::timeout(Duration::from_secs(5), client.get(&url).send()).await;
            match result {
                Ok(Ok(resp)) if resp.status().is_success() => {
                    registry.record_probe_success(backend.id);
                }
                Ok(Ok(resp)) => {
                    registry.record_probe_failure(backend.id, format!("status {}", resp.status()));
                }
                Ok(Err(e)) => registry.record_probe_failure(backend.id, e.to_string()),
                Err(_) => registry.record_probe_failure(backend.id, "probe timed out"),
            }
        });
    }
    while tasks.join_next().await.is_some() {}
}
