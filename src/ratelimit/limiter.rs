//! The admission decision interface.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{RatekeeperError, Result};

use super::bucket::LeakyBucketLimiter;
use super::window::FixedWindowLimiter;

/// Window length and leak interval used when none is configured.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(1000);

/// Trait for rate limiter implementations.
///
/// `try_acquire` is safe to call from any number of threads without external
/// locking. It never sleeps or waits on I/O, and always returns a decision:
/// `true` if the caller may proceed, `false` if it must back off.
pub trait RateLimiter: Send + Sync {
    /// Decide whether one request is admitted.
    fn try_acquire(&self) -> bool;
}

impl<R: RateLimiter + ?Sized> RateLimiter for Arc<R> {
    fn try_acquire(&self) -> bool {
        (**self).try_acquire()
    }
}

impl<R: RateLimiter + ?Sized> RateLimiter for Box<R> {
    fn try_acquire(&self) -> bool {
        (**self).try_acquire()
    }
}

impl<R: RateLimiter + ?Sized> RateLimiter for &R {
    fn try_acquire(&self) -> bool {
        (**self).try_acquire()
    }
}

/// A limiter of either algorithm, selected at construction time.
///
/// This is what configuration builds; code that knows its algorithm up front
/// can use the concrete types directly.
#[derive(Debug)]
pub enum Limiter {
    /// Fixed-window counter
    FixedWindow(FixedWindowLimiter),
    /// Leaky-bucket accumulator
    LeakyBucket(LeakyBucketLimiter),
}

impl Limiter {
    /// Short name of the algorithm, as used in configuration.
    pub fn algorithm(&self) -> &'static str {
        match self {
            Limiter::FixedWindow(_) => "fixed_window",
            Limiter::LeakyBucket(_) => "leaky_bucket",
        }
    }

    /// Admissions still available before the limiter starts rejecting.
    pub fn remaining(&self) -> u64 {
        match self {
            Limiter::FixedWindow(l) => l.remaining(),
            Limiter::LeakyBucket(l) => l.remaining(),
        }
    }
}

impl RateLimiter for Limiter {
    fn try_acquire(&self) -> bool {
        match self {
            Limiter::FixedWindow(l) => l.try_acquire(),
            Limiter::LeakyBucket(l) => l.try_acquire(),
        }
    }
}

impl From<FixedWindowLimiter> for Limiter {
    fn from(limiter: FixedWindowLimiter) -> Self {
        Limiter::FixedWindow(limiter)
    }
}

impl From<LeakyBucketLimiter> for Limiter {
    fn from(limiter: LeakyBucketLimiter) -> Self {
        Limiter::LeakyBucket(limiter)
    }
}

/// Reject a zero count for the named parameter.
pub(crate) fn positive(name: &str, value: u64) -> Result<u64> {
    if value == 0 {
        return Err(RatekeeperError::InvalidConfiguration(format!(
            "{} must be positive",
            name
        )));
    }
    Ok(value)
}

/// Convert an interval to whole milliseconds, rejecting anything under 1 ms.
pub(crate) fn interval_millis(name: &str, interval: Duration) -> Result<u64> {
    let millis = u64::try_from(interval.as_millis()).map_err(|_| {
        RatekeeperError::InvalidConfiguration(format!("{} is too large", name))
    })?;
    if millis == 0 {
        return Err(RatekeeperError::InvalidConfiguration(format!(
            "{} must be at least 1ms, got {:?}",
            name, interval
        )));
    }
    // Timestamps are i64 milliseconds.
    if millis > i64::MAX as u64 {
        return Err(RatekeeperError::InvalidConfiguration(format!(
            "{} is too large",
            name
        )));
    }
    Ok(millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limiter_dispatches_to_variant() {
        let limiter = Limiter::from(FixedWindowLimiter::new(2).unwrap());
        assert_eq!(limiter.algorithm(), "fixed_window");
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
        assert_eq!(limiter.remaining(), 0);

        let limiter = Limiter::from(LeakyBucketLimiter::new(1).unwrap());
        assert_eq!(limiter.algorithm(), "leaky_bucket");
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
    }

    #[test]
    fn test_trait_object_and_shared_handles() {
        let boxed: Box<dyn RateLimiter> = Box::new(FixedWindowLimiter::new(1).unwrap());
        assert!(boxed.try_acquire());
        assert!(!boxed.try_acquire());

        let shared = Arc::new(LeakyBucketLimiter::new(1).unwrap());
        let other = Arc::clone(&shared);
        assert!(shared.try_acquire());
        assert!(!other.try_acquire());
    }

    #[test]
    fn test_positive_rejects_zero() {
        assert!(matches!(
            positive("threshold", 0),
            Err(RatekeeperError::InvalidConfiguration(_))
        ));
        assert_eq!(positive("threshold", 3).unwrap(), 3);
    }

    #[test]
    fn test_interval_millis_rejects_sub_millisecond() {
        assert!(interval_millis("window", Duration::ZERO).is_err());
        assert!(interval_millis("window", Duration::from_micros(999)).is_err());
        assert_eq!(interval_millis("window", Duration::from_secs(2)).unwrap(), 2000);
    }
}
