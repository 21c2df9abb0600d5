//! synd-queue - Inspect the publishing queue
//!
//! Unix-style tool for looking at per-platform publication state and
//! re-publishing pairs that ended up failed.

use clap::{Parser, Subcommand};
use libsyndicate::limit::ScheduleLimiter;
use libsyndicate::service::PostService;
use libsyndicate::store::PivotOverview;
use libsyndicate::types::PivotStatus;
use libsyndicate::{Config, Result, Store, SyndicateError};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "synd-queue")]
#[command(version)]
#[command(about = "Inspect the publishing queue")]
#[command(long_about = "\
synd-queue - Inspect the publishing queue

DESCRIPTION:
    synd-queue shows the per-(post, platform) publication state kept by
    syndicate and lets an operator re-publish pairs that ended up failed.

COMMANDS:
    list        List per-platform publication state
    stats       Show queue and pivot statistics
    retry       Re-publish a post's platform pairs with a fresh attempt
                context (pivots reset to pending, attempt counts zeroed)

USAGE EXAMPLES:
    # Show every pair
    synd-queue list

    # Show only failures, as JSON
    synd-queue list --status failed --format json

    # Queue statistics
    synd-queue stats

    # Re-publish every pair of a post
    synd-queue retry --user 1 <POST_ID>

    # Re-publish one pair
    synd-queue retry --user 1 <POST_ID> --platform <PLATFORM_ID>

CONFIGURATION:
    Configuration file: ~/.config/syndicate/config.toml
    Override with SYNDICATE_CONFIG.

EXIT CODES:
    0 - Success
    1 - Operation failed
    2 - Database or configuration error
    3 - Invalid input
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List per-platform publication state
    List {
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Filter by pivot status: pending, published, or failed
        #[arg(short, long)]
        status: Option<String>,
    },

    /// Show queue and pivot statistics
    Stats {
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Re-publish a post's platform pairs
    Retry {
        /// Post ID to re-publish
        post_id: String,

        /// Only this platform pair
        #[arg(short, long)]
        platform: Option<String>,

        /// Owning user id
        #[arg(short, long)]
        user: i64,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("debug")
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter("error")
            .with_writer(std::io::stderr)
            .init();
    }

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let store = Arc::new(Store::new(&config.database.path).await?);

    match cli.command {
        Commands::List { format, status } => {
            cmd_list(&store, &format, status.as_deref()).await?;
        }
        Commands::Stats { format } => {
            cmd_stats(&store, &format).await?;
        }
        Commands::Retry {
            post_id,
            platform,
            user,
        } => {
            cmd_retry(&store, &config, user, &post_id, platform.as_deref()).await?;
        }
    }

    Ok(())
}

fn parse_format(format: &str) -> Result<()> {
    if format != "text" && format != "json" {
        return Err(SyndicateError::InvalidInput(format!(
            "Invalid format '{}'. Must be 'text' or 'json'",
            format
        )));
    }
    Ok(())
}

fn parse_status(status: &str) -> Result<PivotStatus> {
    PivotStatus::parse(status).ok_or_else(|| {
        SyndicateError::InvalidInput(format!(
            "Invalid status '{}'. Must be 'pending', 'published', or 'failed'",
            status
        ))
    })
}

/// List pivot state
async fn cmd_list(store: &Store, format: &str, status: Option<&str>) -> Result<()> {
    parse_format(format)?;
    let status = status.map(parse_status).transpose()?;

    let rows = store.pivot_overview(status).await?;

    if format == "json" {
        output_list_json(&rows);
    } else {
        output_list_text(&rows);
    }

    Ok(())
}

fn output_list_json(rows: &[PivotOverview]) {
    let json: Vec<serde_json::Value> = rows
        .iter()
        .map(|row| {
            serde_json::json!({
                "post_id": row.post_id,
                "title": row.post_title,
                "platform_id": row.platform_id,
                "platform": row.platform_name,
                "status": row.status.as_str(),
                "detail": row.detail,
                "updated_at": row.updated_at,
            })
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&json).unwrap());
}

fn output_list_text(rows: &[PivotOverview]) {
    if rows.is_empty() {
        return;
    }

    for row in rows {
        let title = truncate(&row.post_title, 40);
        match &row.detail {
            Some(detail) => println!(
                "{} | {} | {} | {} | {}",
                row.post_id, title, row.platform_name, row.status, detail
            ),
            None => println!(
                "{} | {} | {} | {}",
                row.post_id, title, row.platform_name, row.status
            ),
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

/// Show statistics
async fn cmd_stats(store: &Store, format: &str) -> Result<()> {
    parse_format(format)?;

    let counts = store.pivot_status_counts().await?;
    let (queued, running) = store.queue_counts().await?;

    if format == "json" {
        let json = serde_json::json!({
            "pivots": {
                "pending": counts.pending,
                "published": counts.published,
                "failed": counts.failed,
            },
            "queue": {
                "queued": queued,
                "running": running,
            },
        });
        println!("{}", serde_json::to_string_pretty(&json).unwrap());
    } else {
        println!("Pivots:");
        println!("  pending:   {}", counts.pending);
        println!("  published: {}", counts.published);
        println!("  failed:    {}", counts.failed);
        println!("Queue:");
        println!("  queued:    {}", queued);
        println!("  running:   {}", running);
    }

    Ok(())
}

/// Re-publish pairs with a fresh attempt context
async fn cmd_retry(
    store: &Arc<Store>,
    config: &Config,
    user_id: i64,
    post_id: &str,
    platform_id: Option<&str>,
) -> Result<()> {
    let service = PostService::new(
        Arc::clone(store),
        Arc::new(ScheduleLimiter::new(config.scheduling.daily_limit)),
    );

    let now = chrono::Utc::now().timestamp();
    let requeued = service
        .republish(user_id, post_id, platform_id, now)
        .await?;

    println!("Requeued {} pair(s) for post {}", requeued, post_id);
    println!("They will be picked up by the next synd-publish run.");

    Ok(())
}
