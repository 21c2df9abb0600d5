//! Integration tests for the synd-publish daemon

use assert_cmd::Command;
use libsyndicate::store::PostFilter;
use libsyndicate::types::{PivotStatus, Platform, Post, PostStatus};
use libsyndicate::Store;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Setup test environment with config and database
async fn setup_test_env() -> (TempDir, String, String) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    let db_path = temp_dir.path().join("test.db");

    // Instant publishes and no backoff so --once runs settle immediately
    let config_content = format!(
        r#"
[database]
path = "{}"

[scheduling]
daily_limit = 5
max_attempts = 3
backoff_seconds = [0, 0]
enforce_time_filter = true
poll_interval = 1

[publishing]
workers = 2
latency_ms = 0
"#,
        db_path.display().to_string().replace('\\', "/")
    );

    fs::write(&config_path, config_content).unwrap();

    // Initialize database
    let _store = Store::new(db_path.to_str().unwrap()).await.unwrap();

    (
        temp_dir,
        config_path.to_str().unwrap().to_string(),
        db_path.to_str().unwrap().to_string(),
    )
}

/// Create a scheduled post that is due, associated with the given platforms
async fn create_due_post(db_path: &str, content: &str, platforms: &[&Platform]) -> String {
    let store = Store::new(db_path).await.unwrap();
    let now = chrono::Utc::now().timestamp();

    let mut post = Post::new("Scheduled post".to_string(), content.to_string(), 1);
    post.status = PostStatus::Scheduled;
    post.scheduled_at = Some(now - 10);

    store.create_post(&post).await.unwrap();
    let ids: Vec<String> = platforms.iter().map(|p| p.id.clone()).collect();
    store
        .sync_platforms(&post.id, &ids, PostStatus::Scheduled, now)
        .await
        .unwrap();

    post.id
}

async fn create_platform(db_path: &str, name: &str, kind: &str) -> Platform {
    let store = Store::new(db_path).await.unwrap();
    let platform = Platform::new(name.to_string(), kind.to_string());
    store.create_platform(&platform).await.unwrap();
    platform
}

// BASIC FUNCTIONALITY TESTS

#[tokio::test]
async fn test_daemon_starts_with_config() {
    let (_temp_dir, config_path, _db_path) = setup_test_env().await;

    let mut cmd = Command::cargo_bin("synd-publish").unwrap();

    cmd.env("SYNDICATE_CONFIG", &config_path)
        .arg("--once")
        .assert()
        .success();
}

#[tokio::test]
async fn test_daemon_requires_valid_config() {
    let temp_dir = TempDir::new().unwrap();
    let invalid_config = temp_dir.path().join("invalid.toml");

    fs::write(&invalid_config, "invalid toml content [[[").unwrap();

    let mut cmd = Command::cargo_bin("synd-publish").unwrap();

    cmd.env("SYNDICATE_CONFIG", invalid_config.to_str().unwrap())
        .arg("--once")
        .assert()
        .failure();
}

#[tokio::test]
async fn test_once_flag_exits_immediately() {
    let (_temp_dir, config_path, _db_path) = setup_test_env().await;

    let mut cmd = Command::cargo_bin("synd-publish").unwrap();

    cmd.env("SYNDICATE_CONFIG", &config_path)
        .arg("--once")
        .assert()
        .success()
        .stderr(predicate::str::contains("synd-publish daemon starting"))
        .stderr(predicate::str::contains("processed posts once, exiting"));
}

#[tokio::test]
async fn test_verbose_logging() {
    let (_temp_dir, config_path, _db_path) = setup_test_env().await;

    let mut cmd = Command::cargo_bin("synd-publish").unwrap();

    cmd.env("SYNDICATE_CONFIG", &config_path)
        .arg("--once")
        .arg("--verbose")
        .assert()
        .success();
}

// POST PROCESSING TESTS

#[tokio::test]
async fn test_processes_due_post_to_published() {
    let (_temp_dir, config_path, db_path) = setup_test_env().await;

    let twitter = create_platform(&db_path, "Twitter", "twitter").await;
    let post_id = create_due_post(&db_path, "short and sweet", &[&twitter]).await;

    let mut cmd = Command::cargo_bin("synd-publish").unwrap();
    cmd.env("SYNDICATE_CONFIG", &config_path)
        .arg("--once")
        .assert()
        .success()
        .stderr(predicate::str::contains(
            "found scheduled post(s) due for publishing",
        ));

    let store = Store::new(&db_path).await.unwrap();
    let pivot = store.get_pivot(&post_id, &twitter.id).await.unwrap().unwrap();
    assert_eq!(pivot.status, PivotStatus::Published);

    // All pivots settled successfully, so the post rolled up
    let post = store.get_post(&post_id).await.unwrap().unwrap();
    assert_eq!(post.status, PostStatus::Published);

    // Queue is empty afterwards
    assert_eq!(store.queue_counts().await.unwrap(), (0, 0));
}

#[tokio::test]
async fn test_future_posts_are_left_alone() {
    let (_temp_dir, config_path, db_path) = setup_test_env().await;

    let twitter = create_platform(&db_path, "Twitter", "twitter").await;
    let store = Store::new(&db_path).await.unwrap();
    let now = chrono::Utc::now().timestamp();

    let mut post = Post::new("Later".to_string(), "content".to_string(), 1);
    post.status = PostStatus::Scheduled;
    post.scheduled_at = Some(now + 3600);
    store.create_post(&post).await.unwrap();
    store
        .sync_platforms(&post.id, &[twitter.id.clone()], PostStatus::Scheduled, now)
        .await
        .unwrap();

    let mut cmd = Command::cargo_bin("synd-publish").unwrap();
    cmd.env("SYNDICATE_CONFIG", &config_path)
        .arg("--once")
        .assert()
        .success();

    let pivot = store.get_pivot(&post.id, &twitter.id).await.unwrap().unwrap();
    assert_eq!(pivot.status, PivotStatus::Pending);
}

#[tokio::test]
async fn test_post_without_platforms_is_skipped_with_warning() {
    let (_temp_dir, config_path, db_path) = setup_test_env().await;

    create_due_post(&db_path, "orphan", &[]).await;

    let mut cmd = Command::cargo_bin("synd-publish").unwrap();
    cmd.env("SYNDICATE_CONFIG", &config_path)
        .arg("--once")
        .assert()
        .success()
        .stderr(predicate::str::contains("no platforms associated"));
}

// END-TO-END SCENARIO
//
// A 300-character post on twitter + linkedin: the twitter pair is rejected
// permanently at the constraint gate (300 > 280, no retries), the linkedin
// pair publishes on the first attempt (300 < 1300).

#[tokio::test]
async fn test_content_split_across_platforms() {
    let (_temp_dir, config_path, db_path) = setup_test_env().await;

    let twitter = create_platform(&db_path, "Twitter", "twitter").await;
    let linkedin = create_platform(&db_path, "LinkedIn", "linkedin").await;
    let post_id = create_due_post(&db_path, &"a".repeat(300), &[&twitter, &linkedin]).await;

    let mut cmd = Command::cargo_bin("synd-publish").unwrap();
    cmd.env("SYNDICATE_CONFIG", &config_path)
        .arg("--once")
        .assert()
        .success();

    let store = Store::new(&db_path).await.unwrap();

    let twitter_pivot = store.get_pivot(&post_id, &twitter.id).await.unwrap().unwrap();
    assert_eq!(twitter_pivot.status, PivotStatus::Failed);
    let detail = twitter_pivot.detail.unwrap();
    assert!(detail.contains("280"));
    assert!(detail.contains("Twitter"));

    let linkedin_pivot = store
        .get_pivot(&post_id, &linkedin.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(linkedin_pivot.status, PivotStatus::Published);

    // Partial success still rolls the post up to published
    let post = store.get_post(&post_id).await.unwrap().unwrap();
    assert_eq!(post.status, PostStatus::Published);
}

#[tokio::test]
async fn test_unknown_platform_kind_publishes_best_effort() {
    let (_temp_dir, config_path, db_path) = setup_test_env().await;

    let wiki = create_platform(&db_path, "Intranet Wiki", "wiki").await;
    let post_id = create_due_post(&db_path, &"a".repeat(5000), &[&wiki]).await;

    let mut cmd = Command::cargo_bin("synd-publish").unwrap();
    cmd.env("SYNDICATE_CONFIG", &config_path)
        .arg("--once")
        .assert()
        .success();

    // No constraint, no registered capability: best-effort success
    let store = Store::new(&db_path).await.unwrap();
    let pivot = store.get_pivot(&post_id, &wiki.id).await.unwrap().unwrap();
    assert_eq!(pivot.status, PivotStatus::Published);
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    let (_temp_dir, config_path, db_path) = setup_test_env().await;

    let twitter = create_platform(&db_path, "Twitter", "twitter").await;
    let post_id = create_due_post(&db_path, "hello", &[&twitter]).await;

    for _ in 0..2 {
        let mut cmd = Command::cargo_bin("synd-publish").unwrap();
        cmd.env("SYNDICATE_CONFIG", &config_path)
            .arg("--once")
            .assert()
            .success();
    }

    let store = Store::new(&db_path).await.unwrap();
    let pivot = store.get_pivot(&post_id, &twitter.id).await.unwrap().unwrap();
    assert_eq!(pivot.status, PivotStatus::Published);

    // The published post left the scheduled pool, so there is exactly one
    // post and it is published
    let posts = store
        .list_posts_for_user(1, &PostFilter::default())
        .await
        .unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].status, PostStatus::Published);
}
