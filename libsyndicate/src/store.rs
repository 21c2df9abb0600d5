//! SQLite-backed association store
//!
//! Holds posts, platforms, the per-(post, platform) publication pivot, the
//! per-user platform enablement flags, and the durable dispatch queue. The
//! scheduling core only ever talks to this type; everything is a direct
//! parameterized query, no ORM layer.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Result, StoreError};
use crate::types::{
    DispatchEntry, EntryState, PivotStatus, Platform, Post, PostPlatform, PostStatus,
    PostWithPlatforms,
};

/// Filters for listing a user's posts.
#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    pub status: Option<PostStatus>,
    /// Inclusive lower bound on created_at.
    pub created_from: Option<i64>,
    /// Inclusive upper bound on created_at.
    pub created_to: Option<i64>,
}

/// One pivot row joined with display fields, for queue inspection tooling.
#[derive(Debug, Clone)]
pub struct PivotOverview {
    pub post_id: String,
    pub post_title: String,
    pub platform_id: String,
    pub platform_name: String,
    pub status: PivotStatus,
    pub detail: Option<String>,
    pub updated_at: i64,
}

/// Pivot counts by status: (pending, published, failed).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PivotCounts {
    pub pending: i64,
    pub published: i64,
    pub failed: i64,
}

#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if necessary) the database at `db_path` and run
    /// migrations.
    pub async fn new(db_path: &str) -> Result<Self> {
        let expanded_path = shellexpand::tilde(db_path).to_string();
        let path = Path::new(&expanded_path);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(StoreError::IoError)?;
            }
        }

        // Forward slashes keep the SQLite URL valid on Windows too
        let db_url = format!("sqlite://{}", expanded_path.replace('\\', "/"));

        let options = SqliteConnectOptions::from_str(&db_url)
            .map_err(StoreError::SqlxError)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .map_err(StoreError::SqlxError)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(StoreError::MigrationError)?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ------------------------------------------------------------------
    // Posts
    // ------------------------------------------------------------------

    pub async fn create_post(&self, post: &Post) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO posts (id, title, content, image_url, scheduled_at, status, user_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&post.id)
        .bind(&post.title)
        .bind(&post.content)
        .bind(&post.image_url)
        .bind(post.scheduled_at)
        .bind(post.status.as_str())
        .bind(post.user_id)
        .bind(post.created_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(())
    }

    /// Overwrite the mutable fields of a post.
    pub async fn update_post(&self, post: &Post) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE posts
            SET title = ?, content = ?, image_url = ?, scheduled_at = ?, status = ?
            WHERE id = ?
            "#,
        )
        .bind(&post.title)
        .bind(&post.content)
        .bind(&post.image_url)
        .bind(post.scheduled_at)
        .bind(post.status.as_str())
        .bind(&post.id)
        .execute(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(())
    }

    pub async fn set_post_status(&self, post_id: &str, status: PostStatus) -> Result<()> {
        sqlx::query("UPDATE posts SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(post_id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::SqlxError)?;

        Ok(())
    }

    /// The user-triggered immediate publish: status becomes published and the
    /// schedule time is stamped with now.
    pub async fn mark_post_published(&self, post_id: &str, now: i64) -> Result<()> {
        sqlx::query("UPDATE posts SET status = 'published', scheduled_at = ? WHERE id = ?")
            .bind(now)
            .bind(post_id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::SqlxError)?;

        Ok(())
    }

    /// Detach all pivots and queue entries, then remove the post.
    pub async fn delete_post(&self, post_id: &str) -> Result<()> {
        self.delete_queue_for_post(post_id).await?;

        // Pivot rows cascade from the post row
        sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(post_id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::SqlxError)?;

        Ok(())
    }

    pub async fn get_post(&self, post_id: &str) -> Result<Option<Post>> {
        let row = sqlx::query(
            r#"
            SELECT id, title, content, image_url, scheduled_at, status, user_id, created_at
            FROM posts WHERE id = ?
            "#,
        )
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(row.map(post_from_row))
    }

    pub async fn find_post_for_user(&self, post_id: &str, user_id: i64) -> Result<Option<Post>> {
        let row = sqlx::query(
            r#"
            SELECT id, title, content, image_url, scheduled_at, status, user_id, created_at
            FROM posts WHERE id = ? AND user_id = ?
            "#,
        )
        .bind(post_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(row.map(post_from_row))
    }

    pub async fn list_posts_for_user(
        &self,
        user_id: i64,
        filter: &PostFilter,
    ) -> Result<Vec<Post>> {
        let mut where_clauses = vec!["user_id = ?"];

        if filter.status.is_some() {
            where_clauses.push("status = ?");
        }
        if filter.created_from.is_some() {
            where_clauses.push("created_at >= ?");
        }
        if filter.created_to.is_some() {
            where_clauses.push("created_at <= ?");
        }

        let query_str = format!(
            r#"
            SELECT id, title, content, image_url, scheduled_at, status, user_id, created_at
            FROM posts
            WHERE {}
            ORDER BY created_at DESC
            "#,
            where_clauses.join(" AND ")
        );

        let mut query = sqlx::query(&query_str).bind(user_id);
        if let Some(status) = filter.status {
            query = query.bind(status.as_str());
        }
        if let Some(from) = filter.created_from {
            query = query.bind(from);
        }
        if let Some(to) = filter.created_to {
            query = query.bind(to);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::SqlxError)?;

        Ok(rows.into_iter().map(post_from_row).collect())
    }

    /// Count a user's scheduled posts whose scheduled time falls on the given
    /// UTC calendar date.
    pub async fn count_scheduled_on_date(
        &self,
        user_id: i64,
        date: chrono::NaiveDate,
    ) -> Result<i64> {
        let day_start = date.and_time(chrono::NaiveTime::MIN).and_utc().timestamp();
        let day_end = day_start + 86_400;

        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS n FROM posts
            WHERE user_id = ?
              AND status = 'scheduled'
              AND scheduled_at >= ? AND scheduled_at < ?
            "#,
        )
        .bind(user_id)
        .bind(day_start)
        .bind(day_end)
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(row.get::<i64, _>("n"))
    }

    /// Scheduled posts due for dispatch, with platforms eager-loaded in one
    /// extra round trip (never one query per post).
    ///
    /// With `enforce_time_filter` false the sweep is unconditional: every
    /// scheduled post is selected regardless of its scheduled time.
    pub async fn select_due(
        &self,
        now: i64,
        enforce_time_filter: bool,
    ) -> Result<Vec<PostWithPlatforms>> {
        let query = if enforce_time_filter {
            sqlx::query(
                r#"
                SELECT id, title, content, image_url, scheduled_at, status, user_id, created_at
                FROM posts
                WHERE status = 'scheduled' AND scheduled_at IS NOT NULL AND scheduled_at <= ?
                ORDER BY scheduled_at, created_at
                "#,
            )
            .bind(now)
        } else {
            sqlx::query(
                r#"
                SELECT id, title, content, image_url, scheduled_at, status, user_id, created_at
                FROM posts
                WHERE status = 'scheduled'
                ORDER BY scheduled_at, created_at
                "#,
            )
        };

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::SqlxError)?;

        let posts: Vec<Post> = rows.into_iter().map(post_from_row).collect();
        if posts.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<&str> = posts.iter().map(|p| p.id.as_str()).collect();
        let query_str = format!(
            r#"
            SELECT pp.post_id AS post_id, pl.id AS id, pl.name AS name, pl.kind AS kind
            FROM post_platforms pp
            JOIN platforms pl ON pl.id = pp.platform_id
            WHERE pp.post_id IN ({})
            "#,
            placeholders(ids.len())
        );

        let mut query = sqlx::query(&query_str);
        for id in &ids {
            query = query.bind(*id);
        }

        let platform_rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::SqlxError)?;

        let mut by_post: std::collections::HashMap<String, Vec<Platform>> =
            std::collections::HashMap::new();
        for row in platform_rows {
            let post_id: String = row.get("post_id");
            by_post.entry(post_id).or_default().push(Platform {
                id: row.get("id"),
                name: row.get("name"),
                kind: row.get("kind"),
            });
        }

        Ok(posts
            .into_iter()
            .map(|post| {
                let platforms = by_post.remove(&post.id).unwrap_or_default();
                PostWithPlatforms { post, platforms }
            })
            .collect())
    }

    // ------------------------------------------------------------------
    // Platforms
    // ------------------------------------------------------------------

    pub async fn create_platform(&self, platform: &Platform) -> Result<()> {
        sqlx::query("INSERT INTO platforms (id, name, kind) VALUES (?, ?, ?)")
            .bind(&platform.id)
            .bind(&platform.name)
            .bind(&platform.kind)
            .execute(&self.pool)
            .await
            .map_err(StoreError::SqlxError)?;

        Ok(())
    }

    pub async fn get_platform(&self, platform_id: &str) -> Result<Option<Platform>> {
        let row = sqlx::query("SELECT id, name, kind FROM platforms WHERE id = ?")
            .bind(platform_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::SqlxError)?;

        Ok(row.map(platform_from_row))
    }

    pub async fn find_platform_by_name(&self, name: &str) -> Result<Option<Platform>> {
        let row = sqlx::query("SELECT id, name, kind FROM platforms WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::SqlxError)?;

        Ok(row.map(platform_from_row))
    }

    pub async fn update_platform(&self, platform: &Platform) -> Result<()> {
        sqlx::query("UPDATE platforms SET name = ?, kind = ? WHERE id = ?")
            .bind(&platform.name)
            .bind(&platform.kind)
            .bind(&platform.id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::SqlxError)?;

        Ok(())
    }

    /// Returns false when the platform did not exist.
    pub async fn delete_platform(&self, platform_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM platforms WHERE id = ?")
            .bind(platform_id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::SqlxError)?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn list_platforms(&self) -> Result<Vec<Platform>> {
        let rows = sqlx::query("SELECT id, name, kind FROM platforms ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::SqlxError)?;

        Ok(rows.into_iter().map(platform_from_row).collect())
    }

    /// Load platforms by id, preserving the submission order of `ids`.
    /// Missing ids are simply absent from the result.
    pub async fn platforms_by_ids(&self, ids: &[String]) -> Result<Vec<Platform>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let query_str = format!(
            "SELECT id, name, kind FROM platforms WHERE id IN ({})",
            placeholders(ids.len())
        );

        let mut query = sqlx::query(&query_str);
        for id in ids {
            query = query.bind(id);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::SqlxError)?;

        let mut by_id: std::collections::HashMap<String, Platform> = rows
            .into_iter()
            .map(platform_from_row)
            .map(|p| (p.id.clone(), p))
            .collect();

        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    // ------------------------------------------------------------------
    // User-platform enablement
    // ------------------------------------------------------------------

    /// Toggle a platform for a user. Enabling inserts the flag row when
    /// missing; disabling only flips an existing row.
    pub async fn set_user_platform(
        &self,
        user_id: i64,
        platform_id: &str,
        enabled: bool,
    ) -> Result<()> {
        if enabled {
            sqlx::query(
                r#"
                INSERT INTO platform_users (user_id, platform_id, enabled)
                VALUES (?, ?, 1)
                ON CONFLICT(user_id, platform_id) DO UPDATE SET enabled = 1
                "#,
            )
            .bind(user_id)
            .bind(platform_id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::SqlxError)?;
        } else {
            sqlx::query(
                "UPDATE platform_users SET enabled = 0 WHERE user_id = ? AND platform_id = ?",
            )
            .bind(user_id)
            .bind(platform_id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::SqlxError)?;
        }

        Ok(())
    }

    /// All platforms annotated with the user's enablement flag (false when
    /// the user never enabled the platform).
    pub async fn list_platforms_with_user_flag(
        &self,
        user_id: i64,
    ) -> Result<Vec<(Platform, bool)>> {
        let rows = sqlx::query(
            r#"
            SELECT pl.id AS id, pl.name AS name, pl.kind AS kind,
                   COALESCE(pu.enabled, 0) AS enabled
            FROM platforms pl
            LEFT JOIN platform_users pu
                   ON pu.platform_id = pl.id AND pu.user_id = ?
            ORDER BY pl.name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let enabled = row.get::<i64, _>("enabled") != 0;
                (platform_from_row(row), enabled)
            })
            .collect())
    }

    // ------------------------------------------------------------------
    // Pivots
    // ------------------------------------------------------------------

    /// Replace a post's platform set. Selected pairs are upserted with a
    /// status computed from the post status (pending for draft/scheduled,
    /// published for published posts); unselected pairs are removed together
    /// with any queued dispatch entries.
    pub async fn sync_platforms(
        &self,
        post_id: &str,
        platform_ids: &[String],
        post_status: PostStatus,
        now: i64,
    ) -> Result<()> {
        let pivot_status = match post_status {
            PostStatus::Draft | PostStatus::Scheduled => PivotStatus::Pending,
            PostStatus::Published => PivotStatus::Published,
        };

        // Remove pairs no longer selected
        let delete_str = if platform_ids.is_empty() {
            "DELETE FROM post_platforms WHERE post_id = ?".to_string()
        } else {
            format!(
                "DELETE FROM post_platforms WHERE post_id = ? AND platform_id NOT IN ({})",
                placeholders(platform_ids.len())
            )
        };
        let mut delete = sqlx::query(&delete_str).bind(post_id);
        for id in platform_ids {
            delete = delete.bind(id);
        }
        delete
            .execute(&self.pool)
            .await
            .map_err(StoreError::SqlxError)?;

        let queue_delete_str = if platform_ids.is_empty() {
            "DELETE FROM dispatch_queue WHERE post_id = ?".to_string()
        } else {
            format!(
                "DELETE FROM dispatch_queue WHERE post_id = ? AND platform_id NOT IN ({})",
                placeholders(platform_ids.len())
            )
        };
        let mut queue_delete = sqlx::query(&queue_delete_str).bind(post_id);
        for id in platform_ids {
            queue_delete = queue_delete.bind(id);
        }
        queue_delete
            .execute(&self.pool)
            .await
            .map_err(StoreError::SqlxError)?;

        // Upsert the selected pairs, resetting status on every sync
        for platform_id in platform_ids {
            sqlx::query(
                r#"
                INSERT INTO post_platforms (post_id, platform_id, status, detail, updated_at)
                VALUES (?, ?, ?, NULL, ?)
                ON CONFLICT(post_id, platform_id)
                DO UPDATE SET status = excluded.status, detail = NULL, updated_at = excluded.updated_at
                "#,
            )
            .bind(post_id)
            .bind(platform_id)
            .bind(pivot_status.as_str())
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(StoreError::SqlxError)?;
        }

        Ok(())
    }

    /// Point lookup of the single association row for a pair.
    pub async fn get_pivot(
        &self,
        post_id: &str,
        platform_id: &str,
    ) -> Result<Option<PostPlatform>> {
        let row = sqlx::query(
            r#"
            SELECT post_id, platform_id, status, detail, updated_at
            FROM post_platforms
            WHERE post_id = ? AND platform_id = ?
            "#,
        )
        .bind(post_id)
        .bind(platform_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(row.map(pivot_from_row))
    }

    pub async fn pivots_for_post(&self, post_id: &str) -> Result<Vec<PostPlatform>> {
        let rows = sqlx::query(
            r#"
            SELECT post_id, platform_id, status, detail, updated_at
            FROM post_platforms
            WHERE post_id = ?
            "#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(rows.into_iter().map(pivot_from_row).collect())
    }

    /// Write a pair's publication status. Keyed by (post_id, platform_id)
    /// and safe to re-issue: writing the same status twice is a no-op from an
    /// observable standpoint.
    pub async fn set_pivot_status(
        &self,
        post_id: &str,
        platform_id: &str,
        status: PivotStatus,
        detail: Option<&str>,
        now: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE post_platforms
            SET status = ?, detail = ?, updated_at = ?
            WHERE post_id = ? AND platform_id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(detail)
        .bind(now)
        .bind(post_id)
        .bind(platform_id)
        .execute(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(())
    }

    pub async fn pivot_overview(
        &self,
        status: Option<PivotStatus>,
    ) -> Result<Vec<PivotOverview>> {
        let query_str = format!(
            r#"
            SELECT pp.post_id AS post_id, p.title AS post_title,
                   pp.platform_id AS platform_id, pl.name AS platform_name,
                   pp.status AS status, pp.detail AS detail, pp.updated_at AS updated_at
            FROM post_platforms pp
            JOIN posts p ON p.id = pp.post_id
            JOIN platforms pl ON pl.id = pp.platform_id
            {}
            ORDER BY pp.updated_at DESC
            "#,
            if status.is_some() {
                "WHERE pp.status = ?"
            } else {
                ""
            }
        );

        let mut query = sqlx::query(&query_str);
        if let Some(status) = status {
            query = query.bind(status.as_str());
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::SqlxError)?;

        Ok(rows
            .into_iter()
            .map(|row| PivotOverview {
                post_id: row.get("post_id"),
                post_title: row.get("post_title"),
                platform_id: row.get("platform_id"),
                platform_name: row.get("platform_name"),
                status: PivotStatus::parse(&row.get::<String, _>("status"))
                    .unwrap_or(PivotStatus::Pending),
                detail: row.get("detail"),
                updated_at: row.get("updated_at"),
            })
            .collect())
    }

    pub async fn pivot_status_counts(&self) -> Result<PivotCounts> {
        let rows = sqlx::query(
            "SELECT status, COUNT(*) AS n FROM post_platforms GROUP BY status",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        let mut counts = PivotCounts::default();
        for row in rows {
            let n = row.get::<i64, _>("n");
            match PivotStatus::parse(&row.get::<String, _>("status")) {
                Some(PivotStatus::Pending) => counts.pending = n,
                Some(PivotStatus::Published) => counts.published = n,
                Some(PivotStatus::Failed) => counts.failed = n,
                None => {}
            }
        }

        Ok(counts)
    }

    // ------------------------------------------------------------------
    // Dispatch queue
    // ------------------------------------------------------------------

    /// Enqueue a pair for dispatch. Returns false when the pair already has
    /// a live entry; the existing entry (and its attempt count) wins.
    pub async fn enqueue(&self, post_id: &str, platform_id: &str, now: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO dispatch_queue (post_id, platform_id, attempts, next_attempt_at, state, created_at)
            VALUES (?, ?, 0, ?, 'queued', ?)
            ON CONFLICT(post_id, platform_id) DO NOTHING
            "#,
        )
        .bind(post_id)
        .bind(platform_id)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(result.rows_affected() > 0)
    }

    /// Enqueue a pair with a fresh attempt context, resetting any existing
    /// entry. Used by manual re-publish.
    pub async fn requeue(&self, post_id: &str, platform_id: &str, now: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO dispatch_queue (post_id, platform_id, attempts, next_attempt_at, state, created_at)
            VALUES (?, ?, 0, ?, 'queued', ?)
            ON CONFLICT(post_id, platform_id)
            DO UPDATE SET attempts = 0, next_attempt_at = excluded.next_attempt_at, state = 'queued'
            "#,
        )
        .bind(post_id)
        .bind(platform_id)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(())
    }

    /// Atomically claim the next due entry, moving it to `running`. Workers
    /// race on this update; SQLite serializes the writes so each entry is
    /// claimed exactly once.
    pub async fn claim_due(&self, now: i64) -> Result<Option<DispatchEntry>> {
        let row = sqlx::query(
            r#"
            UPDATE dispatch_queue
            SET state = 'running'
            WHERE id = (
                SELECT id FROM dispatch_queue
                WHERE state = 'queued' AND next_attempt_at <= ?
                ORDER BY next_attempt_at, id
                LIMIT 1
            )
            RETURNING id, post_id, platform_id, attempts, next_attempt_at, state, created_at
            "#,
        )
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(row.map(entry_from_row))
    }

    /// Return an entry to the queue with its new attempt count and due time.
    pub async fn reschedule_entry(
        &self,
        entry_id: i64,
        attempts: u32,
        next_attempt_at: i64,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE dispatch_queue SET state = 'queued', attempts = ?, next_attempt_at = ? WHERE id = ?",
        )
        .bind(attempts)
        .bind(next_attempt_at)
        .bind(entry_id)
        .execute(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(())
    }

    /// Remove a finished entry (terminal state reached).
    pub async fn finish_entry(&self, entry_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM dispatch_queue WHERE id = ?")
            .bind(entry_id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::SqlxError)?;

        Ok(())
    }

    /// Return entries stranded in `running` (a previous process crashed
    /// mid-attempt) to the queue. Re-running an attempt is safe; status
    /// writes are idempotent.
    pub async fn recover_running(&self) -> Result<u64> {
        let result = sqlx::query("UPDATE dispatch_queue SET state = 'queued' WHERE state = 'running'")
            .execute(&self.pool)
            .await
            .map_err(StoreError::SqlxError)?;

        Ok(result.rows_affected())
    }

    /// Current queue depth as (queued, running).
    pub async fn queue_counts(&self) -> Result<(i64, i64)> {
        let rows = sqlx::query("SELECT state, COUNT(*) AS n FROM dispatch_queue GROUP BY state")
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::SqlxError)?;

        let mut queued = 0;
        let mut running = 0;
        for row in rows {
            let n = row.get::<i64, _>("n");
            match EntryState::parse(&row.get::<String, _>("state")) {
                Some(EntryState::Queued) => queued = n,
                Some(EntryState::Running) => running = n,
                None => {}
            }
        }

        Ok((queued, running))
    }

    pub async fn delete_queue_for_post(&self, post_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM dispatch_queue WHERE post_id = ?")
            .bind(post_id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::SqlxError)?;

        Ok(())
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn post_from_row(row: sqlx::sqlite::SqliteRow) -> Post {
    Post {
        id: row.get("id"),
        title: row.get("title"),
        content: row.get("content"),
        image_url: row.get("image_url"),
        scheduled_at: row.get("scheduled_at"),
        status: PostStatus::parse(&row.get::<String, _>("status")).unwrap_or(PostStatus::Draft),
        user_id: row.get("user_id"),
        created_at: row.get("created_at"),
    }
}

fn platform_from_row(row: sqlx::sqlite::SqliteRow) -> Platform {
    Platform {
        id: row.get("id"),
        name: row.get("name"),
        kind: row.get("kind"),
    }
}

fn pivot_from_row(row: sqlx::sqlite::SqliteRow) -> PostPlatform {
    PostPlatform {
        post_id: row.get("post_id"),
        platform_id: row.get("platform_id"),
        status: PivotStatus::parse(&row.get::<String, _>("status")).unwrap_or(PivotStatus::Pending),
        detail: row.get("detail"),
        updated_at: row.get("updated_at"),
    }
}

fn entry_from_row(row: sqlx::sqlite::SqliteRow) -> DispatchEntry {
    DispatchEntry {
        id: row.get("id"),
        post_id: row.get("post_id"),
        platform_id: row.get("platform_id"),
        attempts: row.get::<i64, _>("attempts") as u32,
        next_attempt_at: row.get("next_attempt_at"),
        state: EntryState::parse(&row.get::<String, _>("state")).unwrap_or(EntryState::Queued),
        created_at: row.get("created_at"),
    }
}
