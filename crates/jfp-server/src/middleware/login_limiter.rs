//! Per-IP login rate limiting: sliding window plus ban.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

struct RateEntry {
    attempts: u32,
    window_end: DateTime<Utc>,
    banned_until: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct LoginLimiter {
    entries: Arc<DashMap<String, RateEntry>>,
    max_attempts: u32,
    window: Duration,
    ban_duration: Duration,
}

impl LoginLimiter {
    pub fn new(max_attempts: u32, window: Duration, ban_duration: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            max_attempts,
            window,
            ban_duration,
        }
    }

    /// `max_attempts <= 0` disables the limiter entirely.
    pub fn enabled(&self) -> bool {
        self.max_attempts > 0
    }

    /// Returns `true` if a login attempt from `ip` is currently allowed.
    pub fn allow(&self, ip: &str) -> bool {
        if !self.enabled() {
            return true;
        }
        match self.entries.get(ip) {
            Some(entry) => match entry.banned_until {
                Some(until) => Utc::now() >= until,
                None => true,
            },
            None => true,
        }
    }

    pub fn record_failure(&self, ip: &str) {
        if !self.enabled() {
            return;
        }
        let now = Utc::now();
        let mut entry = self.entries.entry(ip.to_string()).or_insert_with(|| RateEntry {
            attempts: 0,
            window_end: now + chrono::Duration::from_std(self.window).unwrap_or_default(),
            banned_until: None,
        });

        if now > entry.window_end {
            entry.attempts = 0;
            entry.window_end = now + chrono::Duration::from_std(self.window).unwrap_or_default();
            entry.banned_until = None;
        }

        entry.attempts += 1;
        if entry.attempts >= self.max_attempts {
            entry.banned_until = Some(now + chrono::Duration::from_std(self.ban_duration).unwrap_or_default());
        }
    }

    pub fn record_success(&self, ip: &str) {
        self.entries.remove(ip);
    }

    /// Remove entries whose window and ban have both lapsed. Intended to run
    /// on a periodic background tick (every few minutes).
    pub fn gc(&self) {
        let now = Utc::now();
        self.entries.retain(|_, entry| {
            let window_active = now <= entry.window_end;
            let banned = entry.banned_until.map(|b| now < b).unwrap_or(false);
            window_active || banned
        });
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}
