//! Rate limiting algorithms and their shared decision interface.

mod bucket;
pub mod clock;
mod limiter;
mod registry;
mod window;

pub use bucket::LeakyBucketLimiter;
pub use clock::{Clock, ManualClock, SystemClock};
pub use limiter::{Limiter, RateLimiter, DEFAULT_INTERVAL};
pub use registry::LimiterRegistry;
pub use window::FixedWindowLimiter;
