//! Publishing worker pool
//!
//! N workers pull dispatch entries from the durable queue and run one
//! attempt each. A failed transient attempt is handed back to the queue
//! with its backoff delay, so the worker is free immediately instead of
//! sleeping through the wait. Within a pair attempts stay strictly
//! sequential (the queue holds at most one live entry per pair); across
//! pairs there is no ordering at all.
//!
//! Cancellation is not supported mid-attempt: a claimed entry runs to
//! completion even while the pool is shutting down.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

use crate::config::SchedulingConfig;
use crate::dispatch::Dispatcher;
use crate::error::Result;
use crate::store::Store;
use crate::types::DispatchEntry;

/// How long an idle worker waits before re-polling the queue when nothing
/// wakes it explicitly.
const IDLE_POLL: Duration = Duration::from_secs(1);

pub struct WorkerPool {
    store: Arc<Store>,
    dispatcher: Arc<Dispatcher>,
    max_attempts: u32,
    backoff_seconds: Arc<Vec<i64>>,
    workers: usize,
    wake: Arc<Notify>,
    shutdown: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(
        store: Arc<Store>,
        dispatcher: Arc<Dispatcher>,
        scheduling: &SchedulingConfig,
        workers: usize,
    ) -> Self {
        Self {
            store,
            dispatcher,
            max_attempts: scheduling.max_attempts.max(1),
            backoff_seconds: Arc::new(scheduling.backoff_seconds.clone()),
            workers: workers.max(1),
            wake: Arc::new(Notify::new()),
            shutdown: Arc::new(AtomicBool::new(false)),
            handles: Vec::new(),
        }
    }

    /// Recover entries a crashed process left behind and spawn the workers.
    pub async fn start(&mut self) -> Result<()> {
        let recovered = self.store.recover_running().await?;
        if recovered > 0 {
            info!(recovered, "returned stuck dispatch entries to the queue");
        }

        for worker_id in 0..self.workers {
            let store = Arc::clone(&self.store);
            let dispatcher = Arc::clone(&self.dispatcher);
            let backoff = Arc::clone(&self.backoff_seconds);
            let wake = Arc::clone(&self.wake);
            let shutdown = Arc::clone(&self.shutdown);
            let max_attempts = self.max_attempts;

            self.handles.push(tokio::spawn(async move {
                info!(worker_id, "publishing worker started");

                loop {
                    if shutdown.load(Ordering::Relaxed) {
                        break;
                    }

                    let now = chrono::Utc::now().timestamp();
                    match store.claim_due(now).await {
                        Ok(Some(entry)) => {
                            if let Err(e) =
                                process_entry(&store, &dispatcher, entry, now, max_attempts, &backoff)
                                    .await
                            {
                                error!(worker_id, error = %e, "dispatch bookkeeping failed");
                            }
                        }
                        Ok(None) => {
                            tokio::select! {
                                _ = wake.notified() => {}
                                _ = sleep(IDLE_POLL) => {}
                            }
                        }
                        Err(e) => {
                            error!(worker_id, error = %e, "queue claim failed");
                            sleep(IDLE_POLL).await;
                        }
                    }
                }

                info!(worker_id, "publishing worker stopped");
            }));
        }

        Ok(())
    }

    /// Nudge idle workers after a sweep enqueued new entries.
    pub fn wake(&self) {
        self.wake.notify_waiters();
    }

    /// Stop the pool. Running attempts finish; queued entries stay durable
    /// for the next start.
    pub async fn shutdown(mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        self.wake.notify_waiters();
        futures::future::join_all(self.handles.drain(..)).await;
    }

    /// Process everything currently due and return how many entries were
    /// handled. Entries rescheduled into the future (backoff) are left for
    /// later. Used by one-shot runs and tests.
    pub async fn drain(&self) -> Result<usize> {
        let mut handled = 0;
        loop {
            let now = chrono::Utc::now().timestamp();
            match self.store.claim_due(now).await? {
                Some(entry) => {
                    process_entry(
                        &self.store,
                        &self.dispatcher,
                        entry,
                        now,
                        self.max_attempts,
                        &self.backoff_seconds,
                    )
                    .await?;
                    handled += 1;
                }
                None => return Ok(handled),
            }
        }
    }
}

/// Delay before the next attempt once `completed_attempts` have failed.
/// Attempts past the end of the schedule reuse the last delay.
fn backoff_delay(backoff: &[i64], completed_attempts: u32) -> i64 {
    if backoff.is_empty() {
        return 0;
    }
    let index = (completed_attempts.max(1) as usize - 1).min(backoff.len() - 1);
    backoff[index]
}

/// Drive one claimed entry through a dispatch attempt and commit the
/// outcome back to the queue.
async fn process_entry(
    store: &Store,
    dispatcher: &Dispatcher,
    entry: DispatchEntry,
    now: i64,
    max_attempts: u32,
    backoff: &[i64],
) -> Result<()> {
    let attempt = entry.attempts + 1;

    match dispatcher
        .attempt(&entry.post_id, &entry.platform_id, attempt, now)
        .await
    {
        Ok(()) => store.finish_entry(entry.id).await,
        Err(e) if e.is_transient() && attempt < max_attempts => {
            let delay = backoff_delay(backoff, attempt);
            warn!(
                post_id = %entry.post_id,
                platform_id = %entry.platform_id,
                attempt,
                max_attempts,
                delay,
                error = %e,
                "attempt failed, retry scheduled"
            );
            store
                .reschedule_entry(entry.id, attempt, now + delay)
                .await
        }
        Err(e) => {
            dispatcher
                .on_terminal_failure(&entry.post_id, &entry.platform_id, attempt, &e, now)
                .await;
            store.finish_entry(entry.id).await
        }
    }
}
