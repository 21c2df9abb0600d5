//! Per-(post, platform) dispatch unit
//!
//! One attempt runs the whole sequence from fresh reads: load post and
//! platform, verify the association, re-check content constraints, invoke
//! the publish capability, commit the pivot status. Attempts tolerate data
//! having changed since the pair was enqueued; every status write is keyed
//! by (post_id, platform_id) and safe to re-issue.

use std::sync::Arc;
use tracing::{info, warn};

use crate::constraints;
use crate::error::{DispatchError, SyndicateError};
use crate::notify::{DispatchFailure, NotificationSink};
use crate::publisher::PublisherRegistry;
use crate::store::Store;
use crate::types::{PivotStatus, PostStatus};

pub struct Dispatcher {
    store: Arc<Store>,
    registry: Arc<PublisherRegistry>,
    sink: Arc<dyn NotificationSink>,
}

impl Dispatcher {
    pub fn new(
        store: Arc<Store>,
        registry: Arc<PublisherRegistry>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            store,
            registry,
            sink,
        }
    }

    /// Run one dispatch attempt for a pair.
    ///
    /// `Ok` means the pivot was committed published. A transient error
    /// (`is_transient`) should be retried by the caller; anything else is
    /// terminal on first occurrence.
    pub async fn attempt(
        &self,
        post_id: &str,
        platform_id: &str,
        attempt: u32,
        now: i64,
    ) -> Result<(), DispatchError> {
        info!(post_id, platform_id, attempt, "dispatching");

        let post = self
            .store
            .get_post(post_id)
            .await
            .map_err(as_transient)?
            .ok_or_else(|| DispatchError::PostNotFound(post_id.to_string()))?;

        let platform = self
            .store
            .get_platform(platform_id)
            .await
            .map_err(as_transient)?
            .ok_or_else(|| DispatchError::PlatformNotFound(platform_id.to_string()))?;

        // The pair's association row must exist; a missing row is a data
        // integrity error, not a retryable fault
        self.store
            .get_pivot(post_id, platform_id)
            .await
            .map_err(as_transient)?
            .ok_or_else(|| DispatchError::NotAssociated {
                post_id: post_id.to_string(),
                platform_id: platform_id.to_string(),
            })?;

        // Re-run the constraint gate against current content; the post may
        // have been edited since it was scheduled
        if let Err(violation) = constraints::validate(platform.kind(), &post.content) {
            let reason = violation.to_string();
            self.store
                .set_pivot_status(
                    post_id,
                    platform_id,
                    PivotStatus::Failed,
                    Some(&reason),
                    now,
                )
                .await
                .map_err(as_transient)?;
            warn!(post_id, platform_id, attempt, %reason, "content rejected at dispatch time");
            return Err(DispatchError::ContentRejected(reason));
        }

        let publisher = self.registry.get(platform.kind());
        match publisher.publish(&post).await {
            Ok(()) => {
                self.store
                    .set_pivot_status(post_id, platform_id, PivotStatus::Published, None, now)
                    .await
                    .map_err(as_transient)?;
                info!(post_id, platform_id, attempt, platform = %platform.name, "published");
                self.roll_up(post_id, now).await;
                Ok(())
            }
            Err(e) => {
                let reason = e.to_string();
                self.store
                    .set_pivot_status(
                        post_id,
                        platform_id,
                        PivotStatus::Failed,
                        Some(&reason),
                        now,
                    )
                    .await
                    .map_err(as_transient)?;
                warn!(post_id, platform_id, attempt, error = %reason, "publish attempt failed");
                Err(DispatchError::PublishFailed(reason))
            }
        }
    }

    /// Terminal failure hook: runs exactly once per pair that ends failed,
    /// whether by retry exhaustion or a permanent error. Reloads fresh data,
    /// makes sure the pivot reads failed, and notifies the sink.
    pub async fn on_terminal_failure(
        &self,
        post_id: &str,
        platform_id: &str,
        attempts: u32,
        error: &DispatchError,
        now: i64,
    ) {
        let post = self.store.get_post(post_id).await.ok().flatten();
        let platform = self.store.get_platform(platform_id).await.ok().flatten();

        if post.is_some() && platform.is_some() {
            match self.store.get_pivot(post_id, platform_id).await {
                Ok(Some(pivot)) if pivot.status != PivotStatus::Failed => {
                    if let Err(e) = self
                        .store
                        .set_pivot_status(
                            post_id,
                            platform_id,
                            PivotStatus::Failed,
                            Some(&error.to_string()),
                            now,
                        )
                        .await
                    {
                        warn!(post_id, platform_id, error = %e, "could not record terminal failure");
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(post_id, platform_id, error = %e, "could not load pivot for terminal failure");
                }
            }
        }

        self.sink.notify(&DispatchFailure {
            post_id: post_id.to_string(),
            platform_id: platform_id.to_string(),
            attempts,
            error: error.to_string(),
        });

        self.roll_up(post_id, now).await;
    }

    /// Once no pivot of the post remains pending, flip the post from
    /// scheduled to published when at least one platform succeeded. With
    /// every pivot failed the post stays scheduled and the failures stay
    /// visible on the pivots.
    async fn roll_up(&self, post_id: &str, _now: i64) {
        let pivots = match self.store.pivots_for_post(post_id).await {
            Ok(pivots) => pivots,
            Err(e) => {
                warn!(post_id, error = %e, "could not load pivots for roll-up");
                return;
            }
        };

        if pivots.is_empty() || pivots.iter().any(|p| p.status == PivotStatus::Pending) {
            return;
        }
        if !pivots.iter().any(|p| p.status == PivotStatus::Published) {
            return;
        }

        let post = match self.store.get_post(post_id).await {
            Ok(Some(post)) => post,
            Ok(None) => return,
            Err(e) => {
                warn!(post_id, error = %e, "could not load post for roll-up");
                return;
            }
        };

        if post.status == PostStatus::Scheduled {
            if let Err(e) = self
                .store
                .set_post_status(post_id, PostStatus::Published)
                .await
            {
                warn!(post_id, error = %e, "could not roll up post status");
            } else {
                info!(post_id, "all platform dispatches settled, post published");
            }
        }
    }
}

/// Store failures inside an attempt are treated as transient so the retry
/// layer re-runs the attempt rather than losing the pair.
fn as_transient(e: SyndicateError) -> DispatchError {
    DispatchError::PublishFailed(e.to_string())
}
