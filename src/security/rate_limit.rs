//! Fixed-window rate limiting per operation class.
//!
//! Each limiter instance (auth, forms, messages, ...) owns its own store, so
//! exhausting one class never touches another. A record's update-and-compare
//! happens under the store's per-key lock; different keys live in different
//! shards and do not block each other.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::time;

use crate::config::schema::{LimiterConfig, LimitersConfig};
use crate::observability::metrics;

/// Source of wall-clock milliseconds.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now_ms(&self) -> u64;
}

/// Clock backed by `SystemTime`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// Manually advanced clock for deterministic tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: AtomicU64::new(start_ms),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Counter state for one (limiter, identifier) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitRecord {
    pub identifier: String,
    pub window_start: u64,
    pub count: u32,
    pub limit: u32,
    pub window_duration_ms: u64,
}

impl RateLimitRecord {
    fn open(identifier: &str, limit: u32, window_duration_ms: u64, now_ms: u64) -> Self {
        Self {
            identifier: identifier.to_string(),
            window_start: now_ms,
            count: 1,
            limit,
            window_duration_ms,
        }
    }

    /// Epoch milliseconds at which this window closes.
    pub fn reset_at(&self) -> u64 {
        self.window_start.saturating_add(self.window_duration_ms)
    }

    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.reset_at()
    }
}

/// Outcome of a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Epoch milliseconds at which the current window closes.
    pub reset_at: u64,
}

impl RateLimitDecision {
    fn from_record(record: &RateLimitRecord) -> Self {
        if record.count > record.limit {
            Self {
                allowed: false,
                limit: record.limit,
                remaining: 0,
                reset_at: record.reset_at(),
            }
        } else {
            Self {
                allowed: true,
                limit: record.limit,
                remaining: record.limit - record.count,
                reset_at: record.reset_at(),
            }
        }
    }

    fn unlimited(now_ms: u64) -> Self {
        Self {
            allowed: true,
            limit: u32::MAX,
            remaining: u32::MAX,
            reset_at: now_ms,
        }
    }

    /// Whole seconds until the window closes, rounded up.
    pub fn retry_after_secs(&self, now_ms: u64) -> u64 {
        self.reset_at.saturating_sub(now_ms).div_ceil(1000)
    }
}

/// Storage behind a limiter.
///
/// `hit` must perform its read-modify-write atomically per key. Swapping the
/// in-memory store for a shared one does not change any caller.
pub trait RateLimitStore: Send + Sync {
    /// Record one request for `identifier` and return the updated record.
    fn hit(&self, identifier: &str, limit: u32, window_ms: u64, now_ms: u64) -> RateLimitRecord;

    /// Drop records whose window already closed. Returns how many were removed.
    fn sweep(&self, now_ms: u64) -> usize;

    /// Number of tracked identifiers.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-local store on a sharded concurrent map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<String, RateLimitRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RateLimitStore for MemoryStore {
    fn hit(&self, identifier: &str, limit: u32, window_ms: u64, now_ms: u64) -> RateLimitRecord {
        // The entry guard holds the shard lock for the whole update.
        match self.records.entry(identifier.to_string()) {
            Entry::Occupied(mut entry) => {
                let record = entry.get_mut();
                if record.is_expired(now_ms) {
                    *record = RateLimitRecord::open(identifier, limit, window_ms, now_ms);
                } else {
                    record.count = record.count.saturating_add(1);
                }
                record.clone()
            }
            Entry::Vacant(entry) => entry
                .insert(RateLimitRecord::open(identifier, limit, window_ms, now_ms))
                .clone(),
        }
    }

    fn sweep(&self, now_ms: u64) -> usize {
        let before = self.records.len();
        self.records.retain(|_, record| !record.is_expired(now_ms));
        before.saturating_sub(self.records.len())
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

/// One limiter instance with its own window, ceiling, and keyspace.
pub struct RateLimiter {
    name: String,
    config: LimiterConfig,
    store: Arc<dyn RateLimitStore>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("tracked", &self.store.len())
            .finish()
    }
}

impl RateLimiter {
    pub fn new(name: impl Into<String>, config: LimiterConfig, clock: Arc<dyn Clock>) -> Self {
        Self::with_store(name, config, Arc::new(MemoryStore::new()), clock)
    }

    pub fn with_store(
        name: impl Into<String>,
        config: LimiterConfig,
        store: Arc<dyn RateLimitStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            name: name.into(),
            config,
            store,
            clock,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> LimiterConfig {
        self.config
    }

    /// Count a request from `identifier` and decide whether it may proceed.
    pub fn check(&self, identifier: &str) -> RateLimitDecision {
        let now = self.clock.now_ms();
        let record = self
            .store
            .hit(identifier, self.config.limit, self.config.window_ms, now);
        RateLimitDecision::from_record(&record)
    }

    pub fn sweep(&self) -> usize {
        self.store.sweep(self.clock.now_ms())
    }

    pub fn tracked(&self) -> usize {
        self.store.len()
    }
}

/// All configured limiter instances, addressed by name.
#[derive(Debug)]
pub struct RateLimiters {
    limiters: HashMap<String, RateLimiter>,
    clock: Arc<dyn Clock>,
}

impl RateLimiters {
    pub fn from_config(config: &LimitersConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &LimitersConfig, clock: Arc<dyn Clock>) -> Self {
        let limiters = config
            .iter()
            .map(|(name, limiter)| {
                (
                    name.clone(),
                    RateLimiter::new(name.clone(), *limiter, clock.clone()),
                )
            })
            .collect();
        Self { limiters, clock }
    }

    /// Check `identifier` against the named limiter.
    ///
    /// An unknown limiter is logged and allowed; configuration validation
    /// rejects routes naming unknown limiters before the gateway serves.
    pub fn check(&self, limiter_id: &str, identifier: &str) -> RateLimitDecision {
        match self.limiters.get(limiter_id) {
            Some(limiter) => limiter.check(identifier),
            None => {
                tracing::warn!(limiter = %limiter_id, "Check against unknown limiter; allowing");
                RateLimitDecision::unlimited(self.clock.now_ms())
            }
        }
    }

    pub fn get(&self, limiter_id: &str) -> Option<&RateLimiter> {
        self.limiters.get(limiter_id)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.limiters.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Sweep every limiter, returning the total number of removed records.
    pub fn sweep(&self) -> usize {
        self.limiters.values().map(RateLimiter::sweep).sum()
    }
}

/// Background task that bounds memory by sweeping expired records.
pub struct RateLimitSweeper {
    limiters: Arc<RateLimiters>,
    interval: Duration,
}

impl RateLimitSweeper {
    pub fn new(limiters: Arc<RateLimiters>, interval: Duration) -> Self {
        Self { limiters, interval }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval_secs = self.interval.as_secs(), "Rate limit sweeper starting");

        let mut ticker = time::interval(self.interval);
        // The first tick completes immediately; nothing can be expired yet.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self.limiters.sweep();
                    if removed > 0 {
                        tracing::debug!(removed, "Swept expired rate limit records");
                        metrics::record_swept(removed);
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Rate limit sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::thread;

    fn limiters(pairs: &[(&str, u32, u64)], clock: Arc<ManualClock>) -> RateLimiters {
        let config: BTreeMap<_, _> = pairs
            .iter()
            .map(|(name, limit, window)| (name.to_string(), LimiterConfig::new(*limit, *window)))
            .collect();
        RateLimiters::with_clock(&config, clock)
    }

    #[test]
    fn test_limit_then_deny() {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let limiters = limiters(&[("forms", 5, 60_000)], clock.clone());

        for expected_remaining in (0..5).rev() {
            let decision = limiters.check("forms", "client");
            assert!(decision.allowed);
            assert_eq!(decision.remaining, expected_remaining);
            assert_eq!(decision.reset_at, 1_060_000);
        }

        let denied = limiters.check("forms", "client");
        assert!(!denied.allowed);
        assert_eq!(denied.remaining, 0);
        assert_eq!(denied.reset_at, 1_060_000);
        assert_eq!(denied.retry_after_secs(clock.now_ms()), 60);
    }

    #[test]
    fn test_window_reset_starts_fresh() {
        let clock = Arc::new(ManualClock::new(0));
        let limiters = limiters(&[("auth", 2, 1_000)], clock.clone());

        for _ in 0..10 {
            limiters.check("auth", "client");
        }
        assert!(!limiters.check("auth", "client").allowed);

        clock.advance(Duration::from_millis(1_000));
        let decision = limiters.check("auth", "client");
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 1);
        assert_eq!(decision.reset_at, 2_000);
    }

    #[test]
    fn test_limiters_do_not_share_quota() {
        let clock = Arc::new(ManualClock::new(0));
        let limiters = limiters(&[("auth", 1, 60_000), ("messages", 3, 60_000)], clock);

        assert!(limiters.check("auth", "203.0.113.5").allowed);
        assert!(!limiters.check("auth", "203.0.113.5").allowed);

        let messages = limiters.check("messages", "203.0.113.5");
        assert!(messages.allowed);
        assert_eq!(messages.remaining, 2);
    }

    #[test]
    fn test_identifiers_are_independent() {
        let clock = Arc::new(ManualClock::new(0));
        let limiters = limiters(&[("auth", 1, 60_000)], clock);

        assert!(limiters.check("auth", "a").allowed);
        assert!(!limiters.check("auth", "a").allowed);
        assert!(limiters.check("auth", "b").allowed);
    }

    #[test]
    fn test_unknown_limiter_allows() {
        let clock = Arc::new(ManualClock::new(0));
        let limiters = limiters(&[], clock);
        assert!(limiters.check("nope", "client").allowed);
    }

    #[test]
    fn test_sweep_removes_only_expired() {
        let clock = Arc::new(ManualClock::new(0));
        let limiters = limiters(&[("auth", 5, 1_000)], clock.clone());

        limiters.check("auth", "old");
        clock.advance(Duration::from_millis(600));
        limiters.check("auth", "new");
        clock.advance(Duration::from_millis(500));

        assert_eq!(limiters.sweep(), 1);
        assert_eq!(limiters.get("auth").unwrap().tracked(), 1);
    }

    #[test]
    fn test_concurrent_hits_never_exceed_limit() {
        let clock = Arc::new(ManualClock::new(0));
        let limiters = Arc::new(limiters(&[("forms", 50, 60_000)], clock));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiters = limiters.clone();
                thread::spawn(move || {
                    (0..25)
                        .filter(|_| limiters.check("forms", "shared").allowed)
                        .count()
                })
            })
            .collect();

        let allowed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(allowed, 50);
    }

    #[test]
    fn test_fixed_window_scenario_with_real_clock() {
        let mut config = BTreeMap::new();
        config.insert("scenario".to_string(), LimiterConfig::new(3, 1_000));
        let limiters = RateLimiters::from_config(&config);
        let id = "203.0.113.5";

        let remaining: Vec<_> = (0..3)
            .map(|_| {
                let d = limiters.check("scenario", id);
                assert!(d.allowed);
                d.remaining
            })
            .collect();
        assert_eq!(remaining, vec![2, 1, 0]);

        let fourth = limiters.check("scenario", id);
        assert!(!fourth.allowed);
        assert_eq!(fourth.remaining, 0);

        thread::sleep(Duration::from_millis(1_100));
        let fifth = limiters.check("scenario", id);
        assert!(fifth.allowed);
        assert_eq!(fifth.remaining, 2);
    }

    #[tokio::test]
    async fn test_sweeper_stops_on_shutdown() {
        let clock = Arc::new(ManualClock::new(0));
        let limiters = Arc::new(limiters(&[("auth", 5, 1_000)], clock));
        let (tx, rx) = broadcast::channel(1);

        let handle = tokio::spawn(
            RateLimitSweeper::new(limiters, Duration::from_secs(3600)).run(rx),
        );
        tokio::task::yield_now().await;
        tx.send(()).unwrap();

        time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("sweeper did not stop")
            .unwrap();
    }
}
