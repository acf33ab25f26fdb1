//! Per-credential admission control.
//!
//! Fixed-window counter per API key. The key map only takes its write lock
//! to insert a new key; each window's check-and-increment runs under that
//! window's own mutex, so keys never contend with each other.
//!
//! Windows are never evicted. Cardinality is bounded by the number of
//! distinct keys callers present.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};

use crate::config::RateLimitConfig;

/// Decision for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    Rejected,
}

/// Counter state for one credential.
#[derive(Debug, Clone, Copy)]
struct RateWindow {
    window_start: Instant,
    count: u32,
}

/// Rate-limit gate in front of the orchestrator.
pub struct AdmissionController {
    enabled: bool,
    limit: u32,
    window: Duration,
    windows: RwLock<HashMap<String, Arc<Mutex<RateWindow>>>>,
}

impl AdmissionController {
    pub fn new(enabled: bool, limit: u32, window: Duration) -> Self {
        Self {
            enabled,
            limit,
            window,
            windows: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(
            config.enabled,
            config.requests_per_minute,
            // A zero-length window would reset on every request
            Duration::from_secs(config.window_secs.max(1)),
        )
    }

    /// Check a request arriving now.
    pub fn check(&self, key: Option<&str>) -> Admission {
        self.check_at(key, Instant::now())
    }

    /// Check a request arriving at `now`.
    ///
    /// Requests without a key pass; authorization rejects them later.
    pub fn check_at(&self, key: Option<&str>, now: Instant) -> Admission {
        if !self.enabled {
            return Admission::Allowed;
        }
        let Some(key) = key.map(str::trim).filter(|k| !k.is_empty()) else {
            return Admission::Allowed;
        };

        let slot = self.window_for(key, now);
        let mut window = slot.lock();
        if now.saturating_duration_since(window.window_start) >= self.window {
            window.window_start = now;
            window.count = 0;
        }
        window.count = window.count.saturating_add(1);

        if window.count > self.limit {
            tracing::warn!(count = window.count, limit = self.limit, "rate limit exceeded");
            Admission::Rejected
        } else {
            Admission::Allowed
        }
    }

    /// Number of keys seen so far.
    pub fn tracked_keys(&self) -> usize {
        self.windows.read().len()
    }

    fn window_for(&self, key: &str, now: Instant) -> Arc<Mutex<RateWindow>> {
        if let Some(slot) = self.windows.read().get(key) {
            return slot.clone();
        }
        self.windows
            .write()
            .entry(key.to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(RateWindow {
                    window_start: now,
                    count: 0,
                }))
            })
            .clone()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
