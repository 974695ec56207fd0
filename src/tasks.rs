//! Delayed and pooled task plumbing.
//!
//! Two shapes cover every background job the bot runs: `OneShot` for the
//! playback finished-callback and the vote deadline, and `WorkerPool` for
//! everything fired per event (join checks, command execution, provider
//! lookups). Both take boxed futures so callers can close over whatever
//! state they need.

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// A single delayed task slot.
///
/// Arming replaces and aborts whatever was armed before, so at most one
/// instance is pending at any time.
#[derive(Default)]
pub struct OneShot {
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl OneShot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `job` to run after `delay`, aborting any pending run.
    pub fn arm(&self, delay: Duration, job: BoxFuture<'static, ()>) {
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            job.await;
        });
        if let Some(old) = self.handle.lock().replace(task) {
            old.abort();
        }
    }

    /// Abort the pending run, if any.
    pub fn cancel(&self) {
        if let Some(old) = self.handle.lock().take() {
            old.abort();
        }
    }
}

struct Job {
    epoch: u64,
    run: BoxFuture<'static, ()>,
}

/// Bounded worker pool fed through an mpsc queue.
///
/// Jobs carry the connection epoch they were submitted under; workers
/// skip jobs from earlier epochs, so a reconnect invalidates everything
/// still queued without draining the channel.
pub struct WorkerPool {
    queue: mpsc::Sender<Job>,
    epoch: Arc<AtomicU64>,
}

impl WorkerPool {
    /// Spawn `workers` tasks sharing one queue of `capacity` jobs.
    pub fn new(workers: usize, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel::<Job>(capacity);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let epoch = Arc::new(AtomicU64::new(0));

        for id in 0..workers {
            let rx = Arc::clone(&rx);
            let epoch = Arc::clone(&epoch);
            tokio::spawn(async move {
                loop {
                    // The receiver lock is only held while waiting; it is
                    // released before the job itself runs.
                    let job = { rx.lock().await.recv().await };
                    let Some(job) = job else {
                        break;
                    };
                    if job.epoch != epoch.load(Ordering::Acquire) {
                        debug!(worker = id, "skipping job from a previous connection");
                        continue;
                    }
                    job.run.await;
                }
                debug!(worker = id, "worker exiting");
            });
        }

        Self { queue: tx, epoch }
    }

    /// Queue a job under the current epoch. A full queue drops the job
    /// with a warning rather than blocking the caller.
    pub fn submit(&self, job: BoxFuture<'static, ()>) {
        let job = Job {
            epoch: self.epoch.load(Ordering::Acquire),
            run: job,
        };
        match self.queue.try_send(job) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => warn!("worker queue full, dropping job"),
            Err(TrySendError::Closed(_)) => warn!("worker queue closed, dropping job"),
        }
    }

    /// Invalidate every queued job. Called when a connection ends.
    pub fn bump_epoch(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
    }

    /// The current epoch, for callbacks armed outside the pool that want
    /// the same invalidation on reconnect.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }
}
