//! Terminal-failure notification sink
//!
//! An extension point, not a delivery channel: the daemon wires in the
//! logging sink, deployments can plug in mail or chat. Sink errors must
//! never mask the dispatch failure that triggered them, so the interface is
//! fire-and-forget and infallible from the caller's point of view.

use std::sync::Mutex;
use tracing::error;

/// Context handed to the sink when a dispatch unit fails terminally.
#[derive(Debug, Clone)]
pub struct DispatchFailure {
    pub post_id: String,
    pub platform_id: String,
    pub attempts: u32,
    pub error: String,
}

pub trait NotificationSink: Send + Sync {
    fn notify(&self, failure: &DispatchFailure);
}

/// Default sink: an error-level log line.
pub struct LogNotifier;

impl NotificationSink for LogNotifier {
    fn notify(&self, failure: &DispatchFailure) {
        error!(
            post_id = %failure.post_id,
            platform_id = %failure.platform_id,
            attempts = failure.attempts,
            error = %failure.error,
            "dispatch failed terminally"
        );
    }
}

/// Test sink that records every notification.
#[derive(Default)]
pub struct CollectingSink {
    failures: Mutex<Vec<DispatchFailure>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failures(&self) -> Vec<DispatchFailure> {
        self.failures.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.failures.lock().unwrap().len()
    }
}

impl NotificationSink for CollectingSink {
    fn notify(&self, failure: &DispatchFailure) {
        self.failures.lock().unwrap().push(failure.clone());
    }
}
