//! Simulated publish capability
//!
//! Real platform API integration is out of scope; publishing is modeled as
//! a bounded sleep standing in for the network call.

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::sleep;
use tracing::info;

use crate::error::Result;
use crate::publisher::Publisher;
use crate::types::{PlatformKind, Post};

pub struct SimulatedPublisher {
    name: String,
    latency: Duration,
}

impl SimulatedPublisher {
    pub fn new(kind: PlatformKind, latency_ms: u64) -> Self {
        Self {
            name: kind.label().to_lowercase(),
            latency: Duration::from_millis(latency_ms),
        }
    }
}

#[async_trait]
impl Publisher for SimulatedPublisher {
    async fn publish(&self, post: &Post) -> Result<()> {
        if !self.latency.is_zero() {
            sleep(self.latency).await;
        }
        info!(post_id = %post.id, platform = %self.name, "simulated publish");
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
