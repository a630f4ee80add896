//! Leaky-bucket limiter.

use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace};

use super::clock::{Clock, SystemClock};
use super::limiter::{interval_millis, positive, RateLimiter, DEFAULT_INTERVAL};
use crate::error::Result;

/// A limiter modelled as a bucket that fills by one unit per admitted request
/// and drains at a constant rate.
///
/// Draining is discrete and lazy. Nothing leaks until a whole
/// `leak_interval` has passed since the last leak, and then the bucket drops
/// by `leak_per_interval` for every whole interval elapsed. The leak is
/// computed on the calling thread during `try_acquire`; there is no
/// background drain.
///
/// The level and the last leak time are updated under one lock, so the level
/// never exceeds `capacity` regardless of contention.
#[derive(Debug)]
pub struct LeakyBucketLimiter<C: Clock = SystemClock> {
    /// Maximum bucket level
    capacity: u64,
    /// Units drained per whole interval
    leak_per_interval: u64,
    /// Leak interval in milliseconds
    leak_interval_ms: u64,
    state: Mutex<BucketState>,
    clock: C,
}

#[derive(Debug, Clone, Copy)]
struct BucketState {
    /// Current fill
    level: u64,
    /// Time of the last applied leak, in ms since the epoch
    last_leak: i64,
}

impl LeakyBucketLimiter {
    /// Create a bucket that drains its full capacity every second.
    pub fn new(capacity: u64) -> Result<Self> {
        Self::with_interval(capacity, DEFAULT_INTERVAL)
    }

    /// Create a bucket that drains its full capacity every `leak_interval`.
    pub fn with_interval(capacity: u64, leak_interval: Duration) -> Result<Self> {
        Self::with_leak_rate(capacity, capacity, leak_interval)
    }

    /// Create a bucket whose drain rate is independent of its capacity.
    pub fn with_leak_rate(
        capacity: u64,
        leak_per_interval: u64,
        leak_interval: Duration,
    ) -> Result<Self> {
        Self::with_clock(capacity, leak_per_interval, leak_interval, SystemClock)
    }
}

impl<C: Clock> LeakyBucketLimiter<C> {
    /// Create a bucket reading time from `clock`.
    pub fn with_clock(
        capacity: u64,
        leak_per_interval: u64,
        leak_interval: Duration,
        clock: C,
    ) -> Result<Self> {
        let capacity = positive("capacity", capacity)?;
        let leak_per_interval = positive("leak_per_interval", leak_per_interval)?;
        let leak_interval_ms = interval_millis("leak_interval", leak_interval)?;
        let last_leak = clock.now_millis();

        debug!(
            capacity,
            leak_per_interval,
            leak_interval_ms,
            "Creating leaky bucket limiter"
        );

        Ok(Self {
            capacity,
            leak_per_interval,
            leak_interval_ms,
            state: Mutex::new(BucketState {
                level: 0,
                last_leak,
            }),
            clock,
        })
    }

    /// Get the bucket capacity.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Get the units drained per interval.
    pub fn leak_per_interval(&self) -> u64 {
        self.leak_per_interval
    }

    /// Get the leak interval.
    pub fn leak_interval(&self) -> Duration {
        Duration::from_millis(self.leak_interval_ms)
    }

    /// Get the current level, with any pending leak applied.
    pub fn level(&self) -> u64 {
        let state = self.state.lock();
        let now = self.clock.now_millis();
        state.level.saturating_sub(self.leaked_since(state.last_leak, now))
    }

    /// Get the number of requests the bucket would admit right now.
    pub fn remaining(&self) -> u64 {
        self.capacity.saturating_sub(self.level())
    }

    /// Units leaked between `last_leak` and `now`. Only whole intervals
    /// count, and a negative elapsed time leaks nothing.
    fn leaked_since(&self, last_leak: i64, now: i64) -> u64 {
        let elapsed = now.saturating_sub(last_leak);
        if elapsed <= 0 {
            return 0;
        }
        (elapsed as u64 / self.leak_interval_ms).saturating_mul(self.leak_per_interval)
    }
}

impl<C: Clock> RateLimiter for LeakyBucketLimiter<C> {
    fn try_acquire(&self) -> bool {
        let mut state = self.state.lock();
        let now = self.clock.now_millis();

        let leaked = self.leaked_since(state.last_leak, now);
        if leaked > 0 {
            let level = state.level.saturating_sub(leaked);
            debug!(leaked, from = state.level, to = level, "Leaking bucket");
            state.level = level;
            state.last_leak = now;
        }

        let admitted = state.level < self.capacity;
        if admitted {
            state.level += 1;
        } else {
            debug!(capacity = self.capacity, "Bucket full, rejecting");
        }

        trace!(
            level = state.level,
            capacity = self.capacity,
            admitted,
            "Leaky bucket decision"
        );
        admitted
    }
}
