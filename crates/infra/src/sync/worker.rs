//! Sync worker pool draining the job queue.
//!
//! Workers dequeue jobs and run the engine; the per-calendar lock inside the
//! engine serializes concurrent jobs for the same calendar. Lifecycle follows
//! the start/stop pattern used by the schedulers: explicit cancellation,
//! tracked join handles, bounded stop.

use std::sync::Arc;
use std::time::Duration;

use hourmark_domain::HourmarkError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::engine::SyncEngine;
use super::queue::SyncQueue;

/// Pool of workers executing queued sync jobs
pub struct SyncWorkerPool {
    queue: Arc<SyncQueue>,
    engine: Arc<SyncEngine>,
    worker_count: usize,
    cancellation: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl SyncWorkerPool {
    /// Create a pool with the given worker count.
    pub fn new(queue: Arc<SyncQueue>, engine: Arc<SyncEngine>, worker_count: usize) -> Self {
        Self {
            queue,
            engine,
            worker_count: worker_count.max(1),
            cancellation: CancellationToken::new(),
            handles: Vec::new(),
        }
    }

    /// Start the workers.
    ///
    /// # Errors
    /// Returns an error if the pool is already running.
    #[instrument(skip(self))]
    pub fn start(&mut self) -> Result<(), String> {
        if self.is_running() {
            return Err("Worker pool already running".to_string());
        }

        info!(workers = self.worker_count, "starting sync worker pool");
        self.cancellation = CancellationToken::new();

        for worker_id in 0..self.worker_count {
            let queue = Arc::clone(&self.queue);
            let engine = Arc::clone(&self.engine);
            let cancel = self.cancellation.clone();
            self.handles.push(tokio::spawn(async move {
                Self::worker_loop(worker_id, queue, engine, cancel).await;
            }));
        }
        Ok(())
    }

    /// Stop the workers, waiting up to five seconds each.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> Result<(), String> {
        if !self.is_running() {
            return Err("Worker pool not running".to_string());
        }

        info!("stopping sync worker pool");
        self.cancellation.cancel();

        for handle in self.handles.drain(..) {
            match tokio::time::timeout(Duration::from_secs(5), handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "sync worker panicked"),
                Err(_) => warn!("sync worker did not stop within timeout"),
            }
        }
        Ok(())
    }

    /// Whether any worker task is still alive.
    pub fn is_running(&self) -> bool {
        self.handles.iter().any(|h| !h.is_finished())
    }

    async fn worker_loop(
        worker_id: usize,
        queue: Arc<SyncQueue>,
        engine: Arc<SyncEngine>,
        cancel: CancellationToken,
    ) {
        debug!(worker_id, "sync worker started");
        while let Some(job) = queue.dequeue(&cancel).await {
            match engine.sync_calendar(&job.user_id, &job.calendar_id, &cancel).await {
                Ok(report) => {
                    debug!(
                        worker_id,
                        calendar_id = %job.calendar_id,
                        seq = job.seq,
                        inserted = report.inserted,
                        updated = report.updated,
                        "sync job completed"
                    );
                }
                Err(HourmarkError::Cancelled) => break,
                Err(e) => {
                    // One failing calendar never blocks the others; failure
                    // accounting happened inside the engine
                    error!(
                        worker_id,
                        calendar_id = %job.calendar_id,
                        error = %e,
                        "sync job failed"
                    );
                }
            }
        }
        debug!(worker_id, "sync worker stopped");
    }
}

impl Drop for SyncWorkerPool {
    fn drop(&mut self) {
        if !self.cancellation.is_cancelled() && self.is_running() {
            warn!("SyncWorkerPool dropped while running; cancelling");
            self.cancellation.cancel();
        }
    }
}
