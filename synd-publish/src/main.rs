//! synd-publish - Background daemon for scheduled post publishing
//!
//! Periodically sweeps the store for scheduled posts that are due, enqueues
//! one dispatch entry per (post, platform) pair, and runs the publishing
//! worker pool that drives each pair to published or failed.

use clap::Parser;
use libsyndicate::dispatch::Dispatcher;
use libsyndicate::notify::LogNotifier;
use libsyndicate::publisher::PublisherRegistry;
use libsyndicate::worker::WorkerPool;
use libsyndicate::{selector, Config, Result, Store};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "synd-publish")]
#[command(version)]
#[command(about = "Background daemon for scheduled post publishing")]
#[command(long_about = "\
synd-publish - Background daemon for scheduled post publishing

DESCRIPTION:
    synd-publish is a long-running daemon that publishes scheduled posts.

    On every sweep it selects scheduled posts that are due, enqueues one
    dispatch unit per (post, platform) pair, and lets the worker pool run
    the units to a terminal state. Failed attempts are retried on a fixed
    backoff schedule; the queue is durable, so a restart never drops a
    pair that was already enqueued.

USAGE:
    # Run in foreground (logs to stderr)
    synd-publish

    # Run with custom sweep interval
    synd-publish --poll-interval 30

    # Sweep once, drain the due queue, and exit
    synd-publish --once

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (running attempts finish)

CONFIGURATION:
    Configuration file: ~/.config/syndicate/config.toml
    Override with SYNDICATE_CONFIG.

    [database]
    path = \"~/.local/share/syndicate/syndicate.db\"

    [scheduling]
    daily_limit = 5          # scheduled posts per user per day
    max_attempts = 3         # dispatch attempts per pair
    backoff_seconds = [30, 60, 120]
    enforce_time_filter = true
    poll_interval = 60       # seconds between sweeps

    [publishing]
    workers = 4              # worker pool size
    latency_ms = 1000        # simulated publish latency

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error
    2 - Configuration or database error
")]
struct Cli {
    /// Sweep interval in seconds (overrides config)
    #[arg(long, value_name = "SECONDS")]
    #[arg(help = "How often to sweep for due posts (default: from config)")]
    poll_interval: Option<u64>,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    #[arg(help = "Enable verbose logging (useful for debugging)")]
    verbose: bool,

    /// Sweep once, drain due entries, and exit (for testing)
    #[arg(long)]
    #[arg(help = "Sweep once, process due entries, and exit")]
    once: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let store = Arc::new(Store::new(&config.database.path).await?);

    info!("synd-publish daemon starting");

    let registry = Arc::new(PublisherRegistry::simulated(&config.publishing));
    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&store),
        registry,
        Arc::new(LogNotifier),
    ));

    let mut pool = WorkerPool::new(
        Arc::clone(&store),
        dispatcher,
        &config.scheduling,
        config.publishing.workers,
    );
    pool.start().await?;

    let enforce_time_filter = config.scheduling.enforce_time_filter;

    if cli.once {
        let now = chrono::Utc::now().timestamp();
        let report = selector::sweep(&store, enforce_time_filter, now).await?;
        let handled = pool.drain().await?;
        info!(
            selected = report.selected,
            enqueued = report.enqueued,
            handled, "synd-publish: processed posts once, exiting"
        );
        pool.shutdown().await;
        return Ok(());
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    setup_signal_handlers(shutdown.clone())?;

    let poll_interval = cli.poll_interval.unwrap_or(config.scheduling.poll_interval);
    info!("Poll interval: {}s", poll_interval);

    loop {
        if shutdown.load(Ordering::Relaxed) {
            info!("Shutdown requested, stopping daemon loop");
            break;
        }

        let now = chrono::Utc::now().timestamp();
        match selector::sweep(&store, enforce_time_filter, now).await {
            Ok(report) => {
                if report.enqueued > 0 {
                    pool.wake();
                }
            }
            Err(e) => error!("Sweep failed: {}", e),
        }

        // Sleep until next sweep, checking for shutdown every second
        for _ in 0..poll_interval {
            if shutdown.load(Ordering::Relaxed) {
                break;
            }
            sleep(Duration::from_secs(1)).await;
        }
    }

    pool.shutdown().await;
    info!("synd-publish daemon stopped");
    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Set up signal handlers for graceful shutdown
#[cfg(unix)]
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM]).map_err(|e| {
        libsyndicate::SyndicateError::InvalidInput(format!("Signal setup failed: {}", e))
    })?;

    std::thread::spawn(move || {
        for sig in signals.forever() {
            match sig {
                SIGTERM | SIGINT => {
                    info!("Received shutdown signal, stopping gracefully...");
                    shutdown.store(true, Ordering::Relaxed);
                    break;
                }
                _ => {}
            }
        }
    });

    Ok(())
}

#[cfg(not(unix))]
fn setup_signal_handlers(_shutdown: Arc<AtomicBool>) -> Result<()> {
    Ok(())
}
