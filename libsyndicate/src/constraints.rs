//! Per-platform content constraints
//!
//! The constraint gate runs twice in a post's life: once when the post is
//! created or updated (the whole request is rejected on the first violation)
//! and again inside every dispatch attempt, so content edited after
//! scheduling is caught before it reaches a platform.

use crate::error::ValidationError;
use crate::types::PlatformKind;

const TWITTER_CHAR_LIMIT: usize = 280;
const LINKEDIN_CHAR_LIMIT: usize = 1300;
const INSTAGRAM_CHAR_LIMIT: usize = 2200;

/// Maximum content length in characters for a platform kind, `None` when
/// the kind is unconstrained.
pub fn character_limit(kind: PlatformKind) -> Option<usize> {
    match kind {
        PlatformKind::Twitter => Some(TWITTER_CHAR_LIMIT),
        PlatformKind::LinkedIn => Some(LINKEDIN_CHAR_LIMIT),
        PlatformKind::Instagram => Some(INSTAGRAM_CHAR_LIMIT),
        PlatformKind::Other => None,
    }
}

/// Validate content against a platform kind's length policy.
///
/// Lengths are counted in characters, not bytes, so multi-byte text is
/// measured the way platforms measure it.
pub fn validate(kind: PlatformKind, content: &str) -> Result<(), ValidationError> {
    let Some(limit) = character_limit(kind) else {
        return Ok(());
    };

    let length = content.chars().count();
    if length > limit {
        return Err(ValidationError::ContentTooLong {
            platform: kind.label(),
            limit,
            length,
        });
    }

    Ok(())
}
