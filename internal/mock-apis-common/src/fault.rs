//! Failure and latency injection.
//!
//! Every random decision a mock service makes (whether to fail, how long to stall, which
//! slots are free) goes through a [`FaultInjector`], which draws from a pluggable
//! [`RandomSource`]. Production binaries use the thread RNG (or a seeded RNG for
//! reproducible runs); tests pin outcomes with [`FixedRandom`] or [`ScriptedRandom`].

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{Error, ErrorDetails, RETRY_AFTER_SECS};

pub trait RandomSource: std::fmt::Debug + Send + Sync {
    /// Returns a value uniformly distributed in `[0, 1)`.
    fn next_f64(&self) -> f64;
}

/// Draws from the thread-local RNG.
#[derive(Debug, Default)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_f64(&self) -> f64 {
        rand::rng().random::<f64>()
    }
}

/// A deterministic RNG, so a failing integration run can be replayed with the same seed.
#[derive(Debug)]
pub struct SeededRandom(Mutex<StdRng>);

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self(Mutex::new(StdRng::seed_from_u64(seed)))
    }
}

impl RandomSource for SeededRandom {
    fn next_f64(&self) -> f64 {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .random::<f64>()
    }
}

/// Always returns the same value.
///
/// `FixedRandom(0.0)` makes every probabilistic branch fire, while `FixedRandom(0.99)` makes
/// none of them fire (short of a probability of 1).
#[derive(Debug, Clone, Copy)]
pub struct FixedRandom(pub f64);

impl RandomSource for FixedRandom {
    fn next_f64(&self) -> f64 {
        self.0
    }
}

/// Returns the queued values in order, then `fallback` forever.
#[derive(Debug)]
pub struct ScriptedRandom {
    values: Mutex<VecDeque<f64>>,
    fallback: f64,
}

impl ScriptedRandom {
    pub fn new(values: impl IntoIterator<Item = f64>, fallback: f64) -> Self {
        Self {
            values: Mutex::new(values.into_iter().collect()),
            fallback,
        }
    }
}

impl RandomSource for ScriptedRandom {
    fn next_f64(&self) -> f64 {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(self.fallback)
    }
}

/// An inclusive-exclusive range of simulated processing time, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencyRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl LatencyRange {
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }
}

#[derive(Clone, Debug)]
pub struct FaultInjector {
    failure_rate: f64,
    source: Arc<dyn RandomSource>,
}

impl FaultInjector {
    pub fn new(failure_rate: f64, source: Arc<dyn RandomSource>) -> Self {
        Self {
            failure_rate: failure_rate.clamp(0.0, 1.0),
            source,
        }
    }

    /// Uses the thread RNG, or a seeded RNG when `seed` is given.
    pub fn from_seed(failure_rate: f64, seed: Option<u64>) -> Self {
        let source: Arc<dyn RandomSource> = match seed {
            Some(seed) => Arc::new(SeededRandom::new(seed)),
            None => Arc::new(ThreadRandom),
        };
        Self::new(failure_rate, source)
    }

    pub fn failure_rate(&self) -> f64 {
        self.failure_rate
    }

    /// Returns `true` with the given probability.
    pub fn chance(&self, probability: f64) -> bool {
        self.source.next_f64() < probability
    }

    /// Returns `true` with probability `failure_rate`.
    pub fn should_fail(&self) -> bool {
        self.chance(self.failure_rate)
    }

    /// Fails with a `503` (and `retry_after`) with probability `failure_rate`.
    pub fn check_availability(&self) -> Result<(), Error> {
        if self.should_fail() {
            return Err(Error::new(ErrorDetails::ServiceUnavailable {
                retry_after: RETRY_AFTER_SECS,
            }));
        }
        Ok(())
    }

    /// A uniformly distributed value in `[low, high)`.
    pub fn uniform(&self, low: f64, high: f64) -> f64 {
        low + self.source.next_f64() * (high - low)
    }

    pub fn latency(&self, range: LatencyRange) -> Duration {
        let span = range.max_ms.saturating_sub(range.min_ms);
        let jitter = (self.source.next_f64() * span as f64) as u64;
        Duration::from_millis(range.min_ms + jitter.min(span))
    }

    /// Sleeps for a random duration in `range` without blocking other requests.
    pub async fn simulate_latency(&self, range: LatencyRange) {
        let delay = self.latency(range);
        tracing::debug!("Simulating {}ms of processing latency", delay.as_millis());
        tokio::time::sleep(delay).await;
    }
}
