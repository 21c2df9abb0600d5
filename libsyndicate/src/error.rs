//! Error types for Syndicate

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SyndicateError>;

#[derive(Error, Debug)]
pub enum SyndicateError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl SyndicateError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            SyndicateError::InvalidInput(_) => 3,
            SyndicateError::Validation(_) => 3,
            SyndicateError::Config(_) => 2,
            SyndicateError::Store(_) => 2,
            SyndicateError::Dispatch(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database operation failed: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Synchronous admission failures. These abort the originating request
/// before any rows are written and are never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Content exceeds the {limit} characters limit for {platform}.")]
    ContentTooLong {
        platform: &'static str,
        limit: usize,
        length: usize,
    },

    #[error("Scheduled date is required for scheduled posts.")]
    MissingScheduleTime,

    #[error("You have reached the daily limit of {0} scheduled posts.")]
    DailyLimitExceeded(u32),

    #[error("{0}")]
    InvalidPost(String),
}

/// Failures inside a dispatch attempt. Only `PublishFailed` is transient;
/// everything else terminates the unit on first occurrence.
#[derive(Error, Debug, Clone)]
pub enum DispatchError {
    #[error("Post not found: {0}")]
    PostNotFound(String),

    #[error("Platform not found: {0}")]
    PlatformNotFound(String),

    #[error("Post {post_id} is not associated with platform {platform_id}")]
    NotAssociated { post_id: String, platform_id: String },

    #[error("Content rejected: {0}")]
    ContentRejected(String),

    #[error("Publishing failed: {0}")]
    PublishFailed(String),
}

impl DispatchError {
    /// Whether the retry layer should re-attempt after this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, DispatchError::PublishFailed(_))
    }
}
