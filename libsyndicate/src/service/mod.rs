//! Service layer
//!
//! Store-facing business operations shared by the binaries: post admission
//! with validation and pivot sync, and platform administration. The
//! scheduling core (selector, dispatch, worker pool) lives in its own
//! modules; these services cover how posts and platforms get into the
//! system in the first place.

pub mod platforms;
pub mod posts;

pub use platforms::PlatformService;
pub use posts::{PostDraft, PostService};
