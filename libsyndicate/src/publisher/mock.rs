//! Mock publisher for testing
//!
//! Configurable capability that can script successes, failures, and delays.
//! Available in all builds (not just cfg(test)) so integration tests can
//! drive the full dispatch path without network access.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use crate::error::{DispatchError, Result};
use crate::publisher::Publisher;
use crate::types::Post;

#[derive(Debug, Clone)]
pub struct MockBehavior {
    pub name: String,
    /// Fail this many leading calls before succeeding. `usize::MAX` means
    /// always fail.
    pub fail_first: usize,
    pub error: String,
    pub delay: Duration,
}

impl Default for MockBehavior {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            fail_first: 0,
            error: "Mock publishing failed".to_string(),
            delay: Duration::from_millis(0),
        }
    }
}

pub struct MockPublisher {
    behavior: MockBehavior,
    calls: Arc<Mutex<usize>>,
    published: Arc<Mutex<Vec<String>>>,
}

impl MockPublisher {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            calls: Arc::new(Mutex::new(0)),
            published: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A publisher that always succeeds.
    pub fn succeeding(name: &str) -> Self {
        Self::new(MockBehavior {
            name: name.to_string(),
            ..Default::default()
        })
    }

    /// A publisher that always fails with the given error.
    pub fn failing(name: &str, error: &str) -> Self {
        Self::new(MockBehavior {
            name: name.to_string(),
            fail_first: usize::MAX,
            error: error.to_string(),
            ..Default::default()
        })
    }

    /// A publisher that fails its first `n` calls and then succeeds.
    pub fn failing_times(name: &str, n: usize, error: &str) -> Self {
        Self::new(MockBehavior {
            name: name.to_string(),
            fail_first: n,
            error: error.to_string(),
            ..Default::default()
        })
    }

    pub fn with_delay(name: &str, delay: Duration) -> Self {
        Self::new(MockBehavior {
            name: name.to_string(),
            delay,
            ..Default::default()
        })
    }

    /// Number of publish calls made so far.
    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }

    /// Post ids that were published successfully, in order.
    pub fn published(&self) -> Vec<String> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl Publisher for MockPublisher {
    async fn publish(&self, post: &Post) -> Result<()> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            *calls
        };

        if !self.behavior.delay.is_zero() {
            sleep(self.behavior.delay).await;
        }

        if call <= self.behavior.fail_first {
            return Err(DispatchError::PublishFailed(self.behavior.error.clone()).into());
        }

        self.published.lock().unwrap().push(post.id.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        &self.behavior.name
    }
}
