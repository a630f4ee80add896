//! Fixed-window counter limiter.

use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace};

use super::clock::{Clock, SystemClock};
use super::limiter::{interval_millis, positive, RateLimiter, DEFAULT_INTERVAL};
use crate::error::Result;

/// A limiter that admits up to `threshold` requests per fixed-length window.
///
/// A window starts at the first call made after the previous one expired, so
/// windows are consecutive and non-overlapping but not aligned to the epoch.
/// Rejected calls still count against the current window.
///
/// The window state and the counter sit behind one lock, so the rollover
/// check, the reset and the increment happen as a single step. Concurrent
/// callers racing across a window boundary cannot reset the window twice, and
/// no window ever admits more than `threshold` requests.
#[derive(Debug)]
pub struct FixedWindowLimiter<C: Clock = SystemClock> {
    /// Maximum admissions per window
    threshold: u64,
    /// Window length in milliseconds
    window_ms: u64,
    /// Current window
    state: Mutex<WindowState>,
    clock: C,
}

#[derive(Debug, Clone, Copy)]
struct WindowState {
    /// When the current window started, in ms since the epoch
    window_start: i64,
    /// Calls seen in the current window
    count: u64,
}

impl FixedWindowLimiter {
    /// Create a limiter with the default one-second window.
    pub fn new(threshold: u64) -> Result<Self> {
        Self::with_window(threshold, DEFAULT_INTERVAL)
    }

    /// Create a limiter with a custom window length.
    pub fn with_window(threshold: u64, window: Duration) -> Result<Self> {
        Self::with_clock(threshold, window, SystemClock)
    }
}

impl<C: Clock> FixedWindowLimiter<C> {
    /// Create a limiter reading time from `clock`.
    pub fn with_clock(threshold: u64, window: Duration, clock: C) -> Result<Self> {
        let threshold = positive("threshold", threshold)?;
        let window_ms = interval_millis("window", window)?;
        let window_start = clock.now_millis();

        debug!(threshold, window_ms, "Creating fixed window limiter");

        Ok(Self {
            threshold,
            window_ms,
            state: Mutex::new(WindowState {
                window_start,
                count: 0,
            }),
            clock,
        })
    }

    /// Get the admission threshold per window.
    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    /// Get the window length.
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    /// Get the number of calls counted in the current window.
    pub fn current_count(&self) -> u64 {
        self.observe().count
    }

    /// Get the remaining admissions in the current window.
    pub fn remaining(&self) -> u64 {
        self.threshold.saturating_sub(self.observe().count)
    }

    /// Get the duration until the current window expires.
    ///
    /// Returns zero if the window has already expired and will roll over on
    /// the next call.
    pub fn duration_until_reset(&self) -> Duration {
        let now = self.clock.now_millis();
        let window_start = self.state.lock().window_start;
        let end = window_start.saturating_add(self.window_ms as i64);
        Duration::from_millis(end.saturating_sub(now).max(0) as u64)
    }

    /// Current window state as the next call would see it, without mutating.
    fn observe(&self) -> WindowState {
        let state = self.state.lock();
        let now = self.clock.now_millis();
        if self.expired(&state, now) {
            WindowState {
                window_start: now,
                count: 0,
            }
        } else {
            *state
        }
    }

    /// Whether `now` lies past the end of the window. A clock that moved
    /// backwards yields a negative elapsed time and never expires the window.
    fn expired(&self, state: &WindowState, now: i64) -> bool {
        now.saturating_sub(state.window_start) >= self.window_ms as i64
    }
}

impl<C: Clock> RateLimiter for FixedWindowLimiter<C> {
    fn try_acquire(&self) -> bool {
        let mut state = self.state.lock();
        let now = self.clock.now_millis();

        if self.expired(&state, now) {
            debug!(
                previous_count = state.count,
                elapsed_ms = now - state.window_start,
                "Window expired, resetting counter"
            );
            state.count = 0;
            state.window_start = now;
        }

        state.count = state.count.saturating_add(1);
        let admitted = state.count <= self.threshold;

        trace!(
            count = state.count,
            threshold = self.threshold,
            admitted,
            "Fixed window decision"
        );
        if !admitted && state.count - 1 == self.threshold {
            debug!(threshold = self.threshold, "Window saturated, rejecting");
        }

        admitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RatekeeperError;
    use crate::ratelimit::clock::ManualClock;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Barrier;

    const START: i64 = 1_700_000_000_000;

    fn limiter(threshold: u64) -> (FixedWindowLimiter<ManualClock>, ManualClock) {
        let clock = ManualClock::new(START);
        let limiter =
            FixedWindowLimiter::with_clock(threshold, DEFAULT_INTERVAL, clock.clone()).unwrap();
        (limiter, clock)
    }

    #[test]
    fn test_rejects_invalid_configuration() {
        assert!(matches!(
            FixedWindowLimiter::new(0),
            Err(RatekeeperError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            FixedWindowLimiter::with_window(5, Duration::ZERO),
            Err(RatekeeperError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_defaults() {
        let limiter = FixedWindowLimiter::new(10).unwrap();
        assert_eq!(limiter.threshold(), 10);
        assert_eq!(limiter.window(), Duration::from_secs(1));
        assert_eq!(limiter.current_count(), 0);
        assert_eq!(limiter.remaining(), 10);
    }

    #[test]
    fn test_admits_up_to_threshold_within_window() {
        let (limiter, clock) = limiter(5);

        for _ in 0..5 {
            assert!(limiter.try_acquire());
            clock.advance(Duration::from_millis(100));
        }

        // The 6th request in the same window should be rejected
        assert!(!limiter.try_acquire());
        assert_eq!(limiter.remaining(), 0);
    }

    #[test]
    fn test_rejections_still_count() {
        let (limiter, _clock) = limiter(2);

        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
        assert!(!limiter.try_acquire());
        assert_eq!(limiter.current_count(), 4);
    }

    #[test]
    fn test_window_resets_after_expiry() {
        let (limiter, clock) = limiter(3);

        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());

        clock.advance(Duration::from_millis(999));
        assert!(!limiter.try_acquire());

        clock.advance(Duration::from_millis(1));
        assert_eq!(limiter.remaining(), 3);
        assert!(limiter.try_acquire());
        assert_eq!(limiter.current_count(), 1);
    }

    #[test]
    fn test_new_window_starts_at_first_call_after_expiry() {
        let (limiter, clock) = limiter(1);

        assert!(limiter.try_acquire());
        clock.advance(Duration::from_millis(1500));
        assert!(limiter.try_acquire());

        // The new window began at +1500ms, so +2400ms is still inside it
        clock.advance(Duration::from_millis(900));
        assert!(!limiter.try_acquire());
        assert_eq!(limiter.duration_until_reset(), Duration::from_millis(100));

        clock.advance(Duration::from_millis(100));
        assert!(limiter.try_acquire());
    }

    #[test]
    fn test_duration_until_reset() {
        let (limiter, clock) = limiter(1);

        assert_eq!(limiter.duration_until_reset(), Duration::from_secs(1));
        clock.advance(Duration::from_millis(400));
        assert_eq!(limiter.duration_until_reset(), Duration::from_millis(600));
        clock.advance(Duration::from_secs(5));
        assert_eq!(limiter.duration_until_reset(), Duration::ZERO);
    }

    #[test]
    fn test_clock_moving_backwards_does_not_reset() {
        let (limiter, clock) = limiter(1);

        assert!(limiter.try_acquire());
        clock.rewind(Duration::from_secs(3600));
        assert!(!limiter.try_acquire());
        assert_eq!(limiter.current_count(), 2);
    }

    #[test]
    fn test_count_never_negative_after_long_idle() {
        let (limiter, clock) = limiter(2);

        assert!(limiter.try_acquire());
        clock.advance(Duration::from_secs(86_400 * 365));
        assert_eq!(limiter.current_count(), 0);
        assert_eq!(limiter.remaining(), 2);
        assert!(limiter.try_acquire());
    }

    #[test]
    fn test_concurrent_callers_never_exceed_threshold() {
        let (limiter, _clock) = limiter(50);
        let admitted = AtomicU64::new(0);

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..100 {
                        if limiter.try_acquire() {
                            admitted.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                });
            }
        });

        assert_eq!(admitted.load(Ordering::Relaxed), 50);
        assert_eq!(limiter.current_count(), 800);
    }

    #[test]
    fn test_concurrent_callers_at_window_boundary() {
        let (limiter, clock) = limiter(1);

        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
        clock.advance(Duration::from_secs(1));

        let barrier = Barrier::new(2);
        let admitted = AtomicU64::new(0);
        std::thread::scope(|s| {
            for _ in 0..2 {
                s.spawn(|| {
                    barrier.wait();
                    if limiter.try_acquire() {
                        admitted.fetch_add(1, Ordering::Relaxed);
                    }
                });
            }
        });

        // One reset, one admission in the new window
        assert_eq!(admitted.load(Ordering::Relaxed), 1);
        assert_eq!(limiter.current_count(), 2);
    }

    #[test]
    fn test_system_clock_window_rollover() {
        let limiter = FixedWindowLimiter::new(3).unwrap();

        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());

        std::thread::sleep(Duration::from_millis(1050));
        assert!(limiter.try_acquire());
    }
}
