//! Core types for Syndicate

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A post that can be scheduled and published to multiple platforms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub content: String,
    pub image_url: Option<String>,
    /// Unix timestamp (UTC). Required and non-null iff status is Scheduled.
    pub scheduled_at: Option<i64>,
    pub status: PostStatus,
    pub user_id: i64,
    pub created_at: i64,
}

impl Post {
    pub fn new(title: String, content: String, user_id: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title,
            content,
            image_url: None,
            scheduled_at: None,
            status: PostStatus::Draft,
            user_id,
            created_at: chrono::Utc::now().timestamp(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    Scheduled,
    Published,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Scheduled => "scheduled",
            Self::Published => "published",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "scheduled" => Some(Self::Scheduled),
            "published" => Some(Self::Published),
            _ => None,
        }
    }
}

impl std::fmt::Display for PostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A publishing destination. The `kind` tag is stored as entered; content
/// constraints and publisher routing go through [`PlatformKind`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Platform {
    pub id: String,
    /// Display name, globally unique.
    pub name: String,
    /// Raw platform-type tag (e.g. "twitter"). Unrecognized tags are
    /// dispatched best-effort with no content constraint.
    pub kind: String,
}

impl Platform {
    pub fn new(name: String, kind: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            kind,
        }
    }

    pub fn kind(&self) -> PlatformKind {
        PlatformKind::from_tag(&self.kind)
    }
}

/// The fixed set of platform types with known publishing rules.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PlatformKind {
    Twitter,
    LinkedIn,
    Instagram,
    /// Anything else. No content constraint, best-effort dispatch.
    Other,
}

impl PlatformKind {
    /// Parse a raw type tag. Never fails; unknown tags map to `Other`.
    pub fn from_tag(tag: &str) -> Self {
        match tag.to_lowercase().as_str() {
            "twitter" => Self::Twitter,
            "linkedin" => Self::LinkedIn,
            "instagram" => Self::Instagram,
            _ => Self::Other,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Twitter => "Twitter",
            Self::LinkedIn => "LinkedIn",
            Self::Instagram => "Instagram",
            Self::Other => "Other",
        }
    }
}

impl std::fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// The association row between a post and a platform, carrying the
/// per-platform publication status. One row per associated pair; each row
/// progresses independently of its siblings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostPlatform {
    pub post_id: String,
    pub platform_id: String,
    pub status: PivotStatus,
    /// Reason recorded on the latest failed transition, if any.
    pub detail: Option<String>,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PivotStatus {
    Pending,
    Published,
    Failed,
}

impl PivotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Published => "published",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "published" => Some(Self::Published),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for PivotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A post together with its eagerly-loaded platforms, as returned by the
/// due-post selection query.
#[derive(Debug, Clone)]
pub struct PostWithPlatforms {
    pub post: Post,
    pub platforms: Vec<Platform>,
}

/// One durable queue entry for a (post, platform) pair. Attempt count and
/// next-due time are plain data persisted with the entry; the worker pool
/// drives the retry schedule off them.
#[derive(Debug, Clone)]
pub struct DispatchEntry {
    pub id: i64,
    pub post_id: String,
    pub platform_id: String,
    /// Completed attempts so far.
    pub attempts: u32,
    pub next_attempt_at: i64,
    pub state: EntryState,
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Queued,
    Running,
}

impl EntryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(Self::Queued),
            "running" => Some(Self::Running),
            _ => None,
        }
    }
}
