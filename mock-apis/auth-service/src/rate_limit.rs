//! Per-key fixed-window request counting.
//!
//! Each API key gets one [`RateLimitEntry`], created on its first validation. The window
//! is 60 seconds long and restarts on the first request after it has expired; there is no
//! rolling history. Expired entries are dropped by a periodic sweep.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub const WINDOW_SECS: i64 = 60;

/// How long an expired entry is kept before the sweep drops it.
pub const RETENTION_SECS: i64 = 5 * 60;

pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitEntry {
    pub count: u32,
    pub reset_time: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed {
        limit: u32,
        remaining: u32,
        reset: DateTime<Utc>,
    },
    Exceeded {
        limit: u32,
        retry_after: u64,
        reset: DateTime<Utc>,
    },
}

#[derive(Debug, Default)]
pub struct RateLimiter {
    entries: Mutex<HashMap<String, RateLimitEntry>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, RateLimitEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Counts one request for `key` at `now` against a quota of `limit` per window.
    ///
    /// Requests over the limit are still counted, so a client that keeps hammering an exhausted
    /// key stays exhausted until the window resets.
    pub fn check(&self, key: &str, limit: u32, now: DateTime<Utc>) -> RateLimitDecision {
        let window = TimeDelta::seconds(WINDOW_SECS);
        let mut entries = self.entries();
        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| RateLimitEntry {
                count: 0,
                reset_time: now + window,
            });

        if now > entry.reset_time {
            entry.count = 0;
            entry.reset_time = now + window;
        }

        entry.count = entry.count.saturating_add(1);

        if entry.count > limit {
            let millis_left = (entry.reset_time - now).num_milliseconds();
            return RateLimitDecision::Exceeded {
                limit,
                retry_after: u64::try_from(millis_left).unwrap_or(0).div_ceil(1000),
                reset: entry.reset_time,
            };
        }

        RateLimitDecision::Allowed {
            limit,
            remaining: limit - entry.count,
            reset: entry.reset_time,
        }
    }

    /// Drops entries whose window ended more than [`RETENTION_SECS`] before `now`.
    /// Returns how many were removed.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let retention = TimeDelta::seconds(RETENTION_SECS);
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, entry| now <= entry.reset_time + retention);
        before - entries.len()
    }

    pub fn get(&self, key: &str) -> Option<RateLimitEntry> {
        self.entries().get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

/// Runs [`RateLimiter::sweep`] every `period` until the returned handle is aborted.
pub fn spawn_sweeper(limiter: Arc<RateLimiter>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            let removed = limiter.sweep(Utc::now());
            if removed > 0 {
                tracing::debug!(removed, "Swept expired rate limit entries");
            }
        }
    })
}
