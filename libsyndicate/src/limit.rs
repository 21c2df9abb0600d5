//! Per-user daily scheduling cap
//!
//! Caps how many posts a user may have in scheduled state on one UTC
//! calendar day. A plain count-then-compare leaves a window where two
//! concurrent submissions near the cap both pass, so the limiter also hands
//! out a per-(user, day) admission lock; callers hold it across the check
//! and the insert and the cap holds strictly.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, NaiveDate};
use tokio::sync::OwnedMutexGuard;

use crate::error::{Result, ValidationError};
use crate::store::Store;
use crate::types::PostStatus;

pub struct ScheduleLimiter {
    daily_limit: u32,
    day_locks: Mutex<HashMap<(i64, NaiveDate), Arc<tokio::sync::Mutex<()>>>>,
}

impl ScheduleLimiter {
    pub fn new(daily_limit: u32) -> Self {
        Self {
            daily_limit,
            day_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn daily_limit(&self) -> u32 {
        self.daily_limit
    }

    /// The UTC calendar date a schedule timestamp falls on.
    pub fn schedule_date(scheduled_at: i64) -> NaiveDate {
        DateTime::from_timestamp(scheduled_at, 0)
            .unwrap_or_default()
            .date_naive()
    }

    /// Acquire the admission lock for a user's day. Hold the guard across
    /// `check` and the post insert to serialize concurrent submissions.
    pub async fn admission_lock(
        &self,
        user_id: i64,
        scheduled_at: i64,
    ) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.day_locks.lock().unwrap();
            // Drop idle locks so the map stays bounded
            locks.retain(|_, l| Arc::strong_count(l) > 1);
            locks
                .entry((user_id, Self::schedule_date(scheduled_at)))
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Admission check. A no-op for anything other than scheduled posts;
    /// scheduled posts need a schedule time and a free slot on that day.
    pub async fn check(
        &self,
        store: &Store,
        user_id: i64,
        status: PostStatus,
        scheduled_at: Option<i64>,
    ) -> Result<()> {
        if status != PostStatus::Scheduled {
            return Ok(());
        }

        let Some(scheduled_at) = scheduled_at else {
            return Err(ValidationError::MissingScheduleTime.into());
        };

        let date = Self::schedule_date(scheduled_at);
        let count = store.count_scheduled_on_date(user_id, date).await?;

        if count >= i64::from(self.daily_limit) {
            return Err(ValidationError::DailyLimitExceeded(self.daily_limit).into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyndicateError;
    use crate::types::Post;
    use tempfile::TempDir;

    async fn setup() -> (TempDir, Store) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let store = Store::new(db_path.to_str().unwrap()).await.unwrap();
        (temp_dir, store)
    }

    fn day_start(y: i32, m: u32, d: u32) -> i64 {
        chrono::NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_time(chrono::NaiveTime::MIN)
            .and_utc()
            .timestamp()
    }

    async fn insert_scheduled(store: &Store, user_id: i64, scheduled_at: i64) {
        let mut post = Post::new("T".to_string(), "x".to_string(), user_id);
        post.status = PostStatus::Scheduled;
        post.scheduled_at = Some(scheduled_at);
        store.create_post(&post).await.unwrap();
    }

    #[test]
    fn test_schedule_date_is_utc_day() {
        let ts = day_start(2025, 6, 1) + 3600;
        assert_eq!(
            ScheduleLimiter::schedule_date(ts),
            chrono::NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
        );

        // Last second of the day still belongs to it
        let late = day_start(2025, 6, 1) + 86_399;
        assert_eq!(
            ScheduleLimiter::schedule_date(late),
            chrono::NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
        );
    }

    #[tokio::test]
    async fn test_non_scheduled_statuses_are_not_limited() {
        let (_tmp, store) = setup().await;
        let limiter = ScheduleLimiter::new(0);

        assert!(limiter
            .check(&store, 1, PostStatus::Draft, None)
            .await
            .is_ok());
        assert!(limiter
            .check(&store, 1, PostStatus::Published, None)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_scheduled_without_time_is_rejected() {
        let (_tmp, store) = setup().await;
        let limiter = ScheduleLimiter::new(5);

        let err = limiter
            .check(&store, 1, PostStatus::Scheduled, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SyndicateError::Validation(ValidationError::MissingScheduleTime)
        ));
    }

    #[tokio::test]
    async fn test_sixth_post_on_a_full_day_is_rejected() {
        let (_tmp, store) = setup().await;
        let limiter = ScheduleLimiter::new(5);
        let day = day_start(2025, 6, 1);

        for i in 0..5 {
            insert_scheduled(&store, 1, day + i * 600).await;
        }

        let err = limiter
            .check(&store, 1, PostStatus::Scheduled, Some(day + 7200))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SyndicateError::Validation(ValidationError::DailyLimitExceeded(5))
        ));
    }

    #[tokio::test]
    async fn test_other_days_and_users_have_their_own_budget() {
        let (_tmp, store) = setup().await;
        let limiter = ScheduleLimiter::new(5);
        let day = day_start(2025, 6, 1);

        for i in 0..5 {
            insert_scheduled(&store, 1, day + i * 600).await;
        }

        // Next day is fine
        assert!(limiter
            .check(&store, 1, PostStatus::Scheduled, Some(day + 86_400))
            .await
            .is_ok());
        // Another user on the full day is fine
        assert!(limiter
            .check(&store, 2, PostStatus::Scheduled, Some(day + 100))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_under_limit_is_admitted() {
        let (_tmp, store) = setup().await;
        let limiter = ScheduleLimiter::new(5);
        let day = day_start(2025, 6, 1);

        for i in 0..4 {
            insert_scheduled(&store, 1, day + i * 600).await;
        }

        assert!(limiter
            .check(&store, 1, PostStatus::Scheduled, Some(day + 7200))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_admissions_never_exceed_the_cap() {
        let (_tmp, store) = setup().await;
        let store = Arc::new(store);
        let limiter = Arc::new(ScheduleLimiter::new(5));
        let day = day_start(2025, 6, 1);

        // 20 concurrent submissions race for 5 slots
        let mut handles = Vec::new();
        for i in 0..20 {
            let store = Arc::clone(&store);
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move {
                let at = day + i * 60;
                let _slot = limiter.admission_lock(1, at).await;
                match limiter
                    .check(&store, 1, PostStatus::Scheduled, Some(at))
                    .await
                {
                    Ok(()) => {
                        insert_scheduled(&store, 1, at).await;
                        true
                    }
                    Err(_) => false,
                }
            }));
        }

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }

        assert_eq!(admitted, 5);
        let date = chrono::NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        assert_eq!(store.count_scheduled_on_date(1, date).await.unwrap(), 5);
    }
}
