//! Post admission and lifecycle
//!
//! Validates incoming posts (field rules, per-platform content constraints
//! in submission order, the daily scheduling cap) and owns the pivot sync
//! semantics. Synchronous failures here abort the request before any rows
//! are written.

use std::sync::Arc;
use tracing::info;

use crate::constraints;
use crate::error::{Result, SyndicateError, ValidationError};
use crate::limit::ScheduleLimiter;
use crate::store::{PostFilter, Store};
use crate::types::{PivotStatus, Platform, Post, PostStatus};

const MAX_TITLE_LENGTH: usize = 255;

/// Incoming post fields, for both create and update.
#[derive(Debug, Clone)]
pub struct PostDraft {
    pub title: String,
    pub content: String,
    pub image_url: Option<String>,
    pub scheduled_at: Option<i64>,
    pub status: PostStatus,
    /// Platform ids, in submission order. At least one is required.
    pub platforms: Vec<String>,
}

pub struct PostService {
    store: Arc<Store>,
    limiter: Arc<ScheduleLimiter>,
}

impl PostService {
    pub fn new(store: Arc<Store>, limiter: Arc<ScheduleLimiter>) -> Self {
        Self { store, limiter }
    }

    /// Create a post with its platform set.
    ///
    /// Scheduled posts are admitted under the per-(user, day) lock so the
    /// daily cap holds even for concurrent submissions.
    pub async fn create(&self, user_id: i64, draft: PostDraft) -> Result<Post> {
        validate_draft(&draft)?;
        self.gate_content(&draft).await?;

        let now = chrono::Utc::now().timestamp();
        let mut post = Post::new(draft.title.clone(), draft.content.clone(), user_id);
        post.image_url = draft.image_url.clone();
        post.scheduled_at = draft.scheduled_at;
        post.status = draft.status;
        post.created_at = now;

        if draft.status == PostStatus::Scheduled {
            let scheduled_at = draft
                .scheduled_at
                .ok_or(ValidationError::MissingScheduleTime)?;
            let _slot = self.limiter.admission_lock(user_id, scheduled_at).await;
            self.limiter
                .check(&self.store, user_id, draft.status, draft.scheduled_at)
                .await?;
            self.persist_with_platforms(&post, &draft, now).await?;
        } else {
            self.persist_with_platforms(&post, &draft, now).await?;
        }

        info!(post_id = %post.id, user_id, status = %post.status, "post created");
        Ok(post)
    }

    /// Update a post the user owns, re-running validation and re-syncing the
    /// platform set (retained pairs reset to the computed pivot status).
    pub async fn update(&self, user_id: i64, post_id: &str, draft: PostDraft) -> Result<Post> {
        let mut post = self.owned_post(user_id, post_id).await?;

        validate_draft(&draft)?;
        self.gate_content(&draft).await?;
        if draft.status == PostStatus::Scheduled && draft.scheduled_at.is_none() {
            return Err(ValidationError::MissingScheduleTime.into());
        }

        post.title = draft.title.clone();
        post.content = draft.content.clone();
        post.image_url = draft.image_url.clone();
        post.scheduled_at = draft.scheduled_at;
        post.status = draft.status;

        let now = chrono::Utc::now().timestamp();
        self.store.update_post(&post).await?;
        self.store
            .sync_platforms(&post.id, &draft.platforms, draft.status, now)
            .await?;

        Ok(post)
    }

    /// Detach all pivots then remove the post.
    pub async fn delete(&self, user_id: i64, post_id: &str) -> Result<()> {
        let post = self.owned_post(user_id, post_id).await?;
        self.store.delete_post(&post.id).await?;
        info!(post_id = %post.id, user_id, "post deleted");
        Ok(())
    }

    /// The user-triggered immediate publish of a scheduled post: status
    /// flips to published and the schedule time is stamped with now.
    pub async fn publish_now(&self, user_id: i64, post_id: &str, now: i64) -> Result<Post> {
        let post = self
            .store
            .find_post_for_user(post_id, user_id)
            .await?
            .filter(|p| p.status == PostStatus::Scheduled)
            .ok_or_else(|| {
                SyndicateError::InvalidInput("Post not found or not scheduled".to_string())
            })?;

        self.store.mark_post_published(&post.id, now).await?;
        let published = self
            .store
            .get_post(&post.id)
            .await?
            .ok_or_else(|| SyndicateError::InvalidInput(format!("Post not found: {}", post_id)))?;
        Ok(published)
    }

    /// Manual re-publish: reset the pair's pivot (or all of the post's
    /// pivots) to pending and enqueue a fresh dispatch entry with a zeroed
    /// attempt count. Returns how many pairs were requeued.
    pub async fn republish(
        &self,
        user_id: i64,
        post_id: &str,
        platform_id: Option<&str>,
        now: i64,
    ) -> Result<usize> {
        let post = self.owned_post(user_id, post_id).await?;

        let pivots = match platform_id {
            Some(platform_id) => {
                let pivot = self
                    .store
                    .get_pivot(&post.id, platform_id)
                    .await?
                    .ok_or_else(|| {
                        SyndicateError::InvalidInput(format!(
                            "Post {} is not associated with platform {}",
                            post.id, platform_id
                        ))
                    })?;
                vec![pivot]
            }
            None => self.store.pivots_for_post(&post.id).await?,
        };

        if pivots.is_empty() {
            return Err(SyndicateError::InvalidInput(format!(
                "No platforms associated with post {}",
                post.id
            )));
        }

        for pivot in &pivots {
            self.store
                .set_pivot_status(&pivot.post_id, &pivot.platform_id, PivotStatus::Pending, None, now)
                .await?;
            self.store
                .requeue(&pivot.post_id, &pivot.platform_id, now)
                .await?;
        }

        info!(post_id = %post.id, pairs = pivots.len(), "manual re-publish requeued");
        Ok(pivots.len())
    }

    pub async fn list(&self, user_id: i64, filter: &PostFilter) -> Result<Vec<Post>> {
        self.store.list_posts_for_user(user_id, filter).await
    }

    async fn owned_post(&self, user_id: i64, post_id: &str) -> Result<Post> {
        self.store
            .find_post_for_user(post_id, user_id)
            .await?
            .ok_or_else(|| SyndicateError::InvalidInput(format!("Post not found: {}", post_id)))
    }

    async fn persist_with_platforms(&self, post: &Post, draft: &PostDraft, now: i64) -> Result<()> {
        self.store.create_post(post).await?;
        self.store
            .sync_platforms(&post.id, &draft.platforms, draft.status, now)
            .await?;
        Ok(())
    }

    /// Load the selected platforms and run the constraint gate in
    /// submission order; the first violation rejects the whole request.
    async fn gate_content(&self, draft: &PostDraft) -> Result<Vec<Platform>> {
        let platforms = self.store.platforms_by_ids(&draft.platforms).await?;

        if platforms.len() != draft.platforms.len() {
            let missing = draft
                .platforms
                .iter()
                .find(|id| !platforms.iter().any(|p| &p.id == *id))
                .cloned()
                .unwrap_or_default();
            return Err(SyndicateError::InvalidInput(format!(
                "Platform not found: {}",
                missing
            )));
        }

        for platform in &platforms {
            constraints::validate(platform.kind(), &draft.content)?;
        }

        Ok(platforms)
    }
}

fn validate_draft(draft: &PostDraft) -> Result<()> {
    if draft.title.trim().is_empty() {
        return Err(ValidationError::InvalidPost("Title is required.".to_string()).into());
    }
    if draft.title.chars().count() > MAX_TITLE_LENGTH {
        return Err(ValidationError::InvalidPost(format!(
            "Title must be at most {} characters.",
            MAX_TITLE_LENGTH
        ))
        .into());
    }
    if draft.content.trim().is_empty() {
        return Err(ValidationError::InvalidPost("Content is required.".to_string()).into());
    }
    if draft.platforms.is_empty() {
        return Err(
            ValidationError::InvalidPost("At least one platform is required.".to_string()).into(),
        );
    }
    Ok(())
}
