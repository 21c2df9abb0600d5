//! Due-post selection sweep
//!
//! Finds scheduled posts whose time has arrived (or, in relaxed mode, every
//! scheduled post) and enqueues one dispatch entry per (post, platform)
//! pair. The sweep never mutates post status and never fails as a whole
//! because one post could not be processed.

use tracing::{error, info, warn};

use crate::error::Result;
use crate::store::Store;

/// What one sweep did, for logs and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Scheduled posts the selection query returned.
    pub selected: usize,
    /// Dispatch entries newly enqueued.
    pub enqueued: usize,
    /// Pairs that already had a live queue entry.
    pub already_queued: usize,
    /// Posts skipped because they have no associated platforms.
    pub skipped_without_platforms: usize,
}

pub async fn sweep(store: &Store, enforce_time_filter: bool, now: i64) -> Result<SweepReport> {
    let due = store.select_due(now, enforce_time_filter).await?;

    let mut report = SweepReport {
        selected: due.len(),
        ..Default::default()
    };

    if due.is_empty() {
        return Ok(report);
    }

    info!(count = due.len(), "found scheduled post(s) due for publishing");

    for item in due {
        if item.platforms.is_empty() {
            warn!(post_id = %item.post.id, "no platforms associated, skipping");
            report.skipped_without_platforms += 1;
            continue;
        }

        for platform in &item.platforms {
            match store.enqueue(&item.post.id, &platform.id, now).await {
                Ok(true) => {
                    info!(post_id = %item.post.id, platform_id = %platform.id, "dispatch enqueued");
                    report.enqueued += 1;
                }
                Ok(false) => report.already_queued += 1,
                Err(e) => {
                    // One pair failing to enqueue must not abort the sweep
                    error!(post_id = %item.post.id, platform_id = %platform.id, error = %e, "enqueue failed");
                }
            }
        }
    }

    Ok(report)
}
