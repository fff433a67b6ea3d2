//! Fixed-window rate limiting per client.
//!
//! Each client key owns a request count and the instant its window ends.
//! The first request at or after that instant starts a fresh window with a
//! count of one. Counts live in process memory only, so every instance of
//! the service enforces its own limit.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::http::HeaderMap;
use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::config::RateLimitConfig;

/// Bucket shared by every request that carries no forwarded address.
///
/// Distinct unidentified clients throttle each other through this key.
pub const ANONYMOUS_CLIENT: &str = "anonymous";

/// Source of the current instant.
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> Instant;
}

/// Wall clock backed by [`Instant::now`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset_nanos: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset_nanos: AtomicU64::new(0),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.offset_nanos
            .fetch_add(by.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + Duration::from_nanos(self.offset_nanos.load(Ordering::SeqCst))
    }
}

/// Outcome of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allow,
    Reject { retry_after_secs: u64 },
}

/// Threshold and window length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitSettings {
    pub max_requests: u32,
    pub window: Duration,
}

impl From<&RateLimitConfig> for LimitSettings {
    fn from(config: &RateLimitConfig) -> Self {
        Self {
            max_requests: config.max_requests,
            window: Duration::from_secs(config.window_secs),
        }
    }
}

impl Default for LimitSettings {
    fn default() -> Self {
        Self::from(&RateLimitConfig::default())
    }
}

#[derive(Debug, Clone, Copy)]
struct WindowEntry {
    count: u32,
    reset_at: Instant,
}

/// Fixed-window counter keyed by client.
///
/// The per-key entry lock held across read-compare-write keeps concurrent
/// requests from the same client from racing inside one process.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    entries: DashMap<String, WindowEntry>,
    settings: ArcSwap<LimitSettings>,
    clock: Arc<dyn Clock>,
}

impl FixedWindowLimiter {
    pub fn new(settings: LimitSettings) -> Self {
        Self::with_clock(settings, Arc::new(SystemClock))
    }

    pub fn with_clock(settings: LimitSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            settings: ArcSwap::from_pointee(settings),
            clock,
        }
    }

    /// Count one request for `key` and decide whether it may proceed.
    pub fn check(&self, key: &str) -> RateDecision {
        let settings = self.settings.load();
        let now = self.clock.now();

        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert(WindowEntry { count: 0, reset_at: now });

        if now >= entry.reset_at {
            *entry = WindowEntry {
                count: 1,
                reset_at: now + settings.window,
            };
            return RateDecision::Allow;
        }

        if entry.count < settings.max_requests {
            entry.count += 1;
            return RateDecision::Allow;
        }

        RateDecision::Reject {
            retry_after_secs: ceil_secs(entry.reset_at - now),
        }
    }

    /// Requests counted for `key` in its current window, if it has one.
    pub fn count_for(&self, key: &str) -> Option<u32> {
        let now = self.clock.now();
        self.entries
            .get(key)
            .filter(|e| now < e.reset_at)
            .map(|e| e.count)
    }

    /// Swap threshold and window. Existing windows keep their reset instant.
    pub fn update_settings(&self, settings: LimitSettings) {
        self.settings.store(Arc::new(settings));
    }

    pub fn settings(&self) -> LimitSettings {
        **self.settings.load()
    }

    /// Drop entries whose window has ended. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, e| now < e.reset_at);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Periodically purge expired entries until shutdown.
    pub async fn run_sweeper(self: Arc<Self>, interval: Duration, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval_secs = interval.as_secs(), "Rate limit sweeper starting");
        let mut ticker = tokio::time::interval(interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let purged = self.purge_expired();
                    if purged > 0 {
                        tracing::debug!(purged, remaining = self.len(), "Purged expired rate limit windows");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Rate limit sweeper stopping");
                    return;
                }
            }
        }
    }
}

fn ceil_secs(remaining: Duration) -> u64 {
    remaining.as_nanos().div_ceil(1_000_000_000) as u64
}

/// Derive the rate limit key for a request.
///
/// Uses the first address in `X-Forwarded-For`; requests without one share
/// [`ANONYMOUS_CLIENT`].
pub fn client_key(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(ANONYMOUS_CLIENT)
        .to_string()
}
