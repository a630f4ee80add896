//! Per-resource limiter registry.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace};

use super::limiter::{Limiter, RateLimiter};

/// Independent limiters indexed by the name of the resource they protect.
///
/// Each resource owns its own limiter; calls against one never consume
/// capacity from another. This struct is thread-safe and can be shared
/// across tasks.
#[derive(Debug, Default)]
pub struct LimiterRegistry {
    limiters: RwLock<HashMap<String, Arc<Limiter>>>,
}

impl LimiterRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a limiter for a resource, replacing any existing one.
    ///
    /// Returns the replaced limiter, if there was one.
    pub fn register(&self, resource: impl Into<String>, limiter: Limiter) -> Option<Arc<Limiter>> {
        let resource = resource.into();
        debug!(
            resource = %resource,
            algorithm = limiter.algorithm(),
            "Registering rate limiter"
        );
        self.limiters.write().insert(resource, Arc::new(limiter))
    }

    /// Get the limiter for a resource.
    pub fn get(&self, resource: &str) -> Option<Arc<Limiter>> {
        self.limiters.read().get(resource).cloned()
    }

    /// Decide whether one request to `resource` is admitted.
    ///
    /// Returns `None` if no limiter is registered for the resource.
    pub fn try_acquire(&self, resource: &str) -> Option<bool> {
        // Clone the handle so the decision runs without holding the map lock.
        let limiter = self.get(resource)?;
        let admitted = limiter.try_acquire();
        trace!(resource = %resource, admitted, "Registry decision");
        Some(admitted)
    }

    /// Remove the limiter for a resource.
    pub fn remove(&self, resource: &str) -> Option<Arc<Limiter>> {
        let removed = self.limiters.write().remove(resource);
        if removed.is_some() {
            debug!(resource = %resource, "Removed rate limiter");
        }
        removed
    }

    /// Get the registered resource names, sorted.
    pub fn resources(&self) -> Vec<String> {
        let mut names: Vec<String> = self.limiters.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Get the number of registered limiters.
    pub fn len(&self) -> usize {
        self.limiters.read().len()
    }

    /// Whether no limiters are registered.
    pub fn is_empty(&self) -> bool {
        self.limiters.read().is_empty()
    }
}
