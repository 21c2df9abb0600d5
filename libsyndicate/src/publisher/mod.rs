//! Publish capability abstraction
//!
//! Each platform kind maps to one registered [`Publisher`]. The registry
//! replaces type-string branching in the dispatch path: lookups are by
//! [`PlatformKind`] tag and unrecognized tags fall back to a best-effort
//! no-op publisher, so an unknown platform never blocks a post.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::config::PublishingConfig;
use crate::error::Result;
use crate::types::{PlatformKind, Post};

pub mod mock;
pub mod simulated;

pub use mock::MockPublisher;
pub use simulated::SimulatedPublisher;

/// A platform-specific publish capability.
///
/// The call may take unbounded time and may fail; the dispatch layer treats
/// any error as a transient publish failure and applies the retry policy.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, post: &Post) -> Result<()>;

    /// Lowercase capability name, for logs.
    fn name(&self) -> &str;
}

/// Registry mapping platform kinds to publish capabilities.
pub struct PublisherRegistry {
    publishers: HashMap<PlatformKind, Arc<dyn Publisher>>,
    fallback: Arc<dyn Publisher>,
}

impl PublisherRegistry {
    /// An empty registry; every kind resolves to the best-effort fallback.
    pub fn new() -> Self {
        Self {
            publishers: HashMap::new(),
            fallback: Arc::new(BestEffortPublisher),
        }
    }

    /// Registry with simulated publishers for every constrained kind, the
    /// production wiring of the daemon.
    pub fn simulated(config: &PublishingConfig) -> Self {
        let mut registry = Self::new();
        for kind in [
            PlatformKind::Twitter,
            PlatformKind::LinkedIn,
            PlatformKind::Instagram,
        ] {
            registry.register(kind, Arc::new(SimulatedPublisher::new(kind, config.latency_ms)));
        }
        registry
    }

    pub fn register(&mut self, kind: PlatformKind, publisher: Arc<dyn Publisher>) {
        self.publishers.insert(kind, publisher);
    }

    /// Resolve the capability for a kind, falling back to best-effort for
    /// anything unregistered.
    pub fn get(&self, kind: PlatformKind) -> Arc<dyn Publisher> {
        self.publishers
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.fallback))
    }
}

impl Default for PublisherRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// No-op success for platform kinds nobody registered a capability for.
pub struct BestEffortPublisher;

#[async_trait]
impl Publisher for BestEffortPublisher {
    async fn publish(&self, post: &Post) -> Result<()> {
        debug!(post_id = %post.id, "no capability registered, best-effort no-op publish");
        Ok(())
    }

    fn name(&self) -> &str {
        "best-effort"
    }
}
