//! Configuration management for Ratekeeper.
//!
//! Limiters are described per protected resource in YAML:
//!
//! ```yaml
//! resources:
//!   search_api:
//!     algorithm: fixed_window
//!     threshold: 100
//!     window_ms: 1000
//!   uploads:
//!     algorithm: leaky_bucket
//!     capacity: 10
//!     leak_interval_ms: 1000
//!     leak_per_interval: 5
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{RatekeeperError, Result};
use crate::ratelimit::{FixedWindowLimiter, LeakyBucketLimiter, Limiter, LimiterRegistry};

/// Main configuration: one limiter per protected resource.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RatekeeperConfig {
    /// Map of resource name to limiter configuration
    #[serde(default)]
    pub resources: BTreeMap<String, LimiterConfig>,
}

/// Configuration for a single limiter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum LimiterConfig {
    /// Fixed-window counter
    FixedWindow {
        /// Maximum admissions per window
        threshold: u64,
        /// Window length in milliseconds
        #[serde(default = "default_interval_ms")]
        window_ms: u64,
    },
    /// Leaky-bucket accumulator
    LeakyBucket {
        /// Maximum bucket level
        capacity: u64,
        /// Leak interval in milliseconds
        #[serde(default = "default_interval_ms")]
        leak_interval_ms: u64,
        /// Units drained per interval; defaults to the capacity
        #[serde(default)]
        leak_per_interval: Option<u64>,
    },
}

fn default_interval_ms() -> u64 {
    1000
}

impl LimiterConfig {
    /// Validate the configuration and build the limiter it describes.
    pub fn build(&self) -> Result<Limiter> {
        let limiter: Limiter = match *self {
            LimiterConfig::FixedWindow {
                threshold,
                window_ms,
            } => FixedWindowLimiter::with_window(threshold, Duration::from_millis(window_ms))?
                .into(),
            LimiterConfig::LeakyBucket {
                capacity,
                leak_interval_ms,
                leak_per_interval,
            } => LeakyBucketLimiter::with_leak_rate(
                capacity,
                leak_per_interval.unwrap_or(capacity),
                Duration::from_millis(leak_interval_ms),
            )?
            .into(),
        };
        Ok(limiter)
    }
}

impl RatekeeperConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading rate limiter configuration");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| {
            RatekeeperError::Config(format!("Failed to parse rate limiter config: {}", e))
        })
    }

    /// Get the limiter configuration for a resource.
    pub fn resource(&self, name: &str) -> Result<&LimiterConfig> {
        self.resources
            .get(name)
            .ok_or_else(|| RatekeeperError::UnknownResource(name.to_string()))
    }

    /// Build a registry holding one limiter per configured resource.
    pub fn build_registry(&self) -> Result<LimiterRegistry> {
        let registry = LimiterRegistry::new();
        for (name, config) in &self.resources {
            let limiter = config.build().map_err(|e| match e {
                RatekeeperError::InvalidConfiguration(msg) => {
                    RatekeeperError::InvalidConfiguration(format!("resource {}: {}", name, msg))
                }
                other => other,
            })?;
            registry.register(name.clone(), limiter);
        }
        info!(resources = registry.len(), "Rate limiters initialized");
        Ok(registry)
    }
}
