//! Syndicate - scheduled multi-platform post publishing
//!
//! This library provides the scheduled-publishing core: due-post selection,
//! per-(post, platform) dispatch with retry and backoff, the per-platform
//! content-constraint gate, the daily scheduling cap, and the durable
//! publishing worker pool.

pub mod config;
pub mod constraints;
pub mod dispatch;
pub mod error;
pub mod limit;
pub mod logging;
pub mod notify;
pub mod publisher;
pub mod selector;
pub mod service;
pub mod store;
pub mod types;
pub mod worker;

// Re-export commonly used types
pub use config::Config;
pub use dispatch::Dispatcher;
pub use error::{DispatchError, Result, SyndicateError, ValidationError};
pub use limit::ScheduleLimiter;
pub use notify::{LogNotifier, NotificationSink};
pub use publisher::{Publisher, PublisherRegistry};
pub use store::Store;
pub use types::{PivotStatus, Platform, PlatformKind, Post, PostPlatform, PostStatus};
pub use worker::WorkerPool;
