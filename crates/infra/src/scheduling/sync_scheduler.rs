//! Periodic sync scheduler.
//!
//! On every tick, enqueues an incremental sync job for each active calendar
//! and runs one window-expansion step per calendar whose mirror is narrower
//! than the configured target. Join handles are tracked, cancellation is
//! explicit, and repository calls are wrapped in timeouts.

use std::sync::Arc;
use std::time::Duration;

use hourmark_core::sync::ports::CalendarRepository;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::error::{SchedulerError, SchedulerResult};
use crate::sync::engine::SyncEngine;
use crate::sync::queue::SyncQueue;

/// Type alias for task handle to avoid complexity warnings
type TaskHandle = Arc<Mutex<Option<JoinHandle<()>>>>;

/// Configuration for the sync scheduler
#[derive(Debug, Clone)]
pub struct SyncSchedulerConfig {
    /// Interval between scheduled sync passes
    pub interval: Duration,
    /// Timeout for listing calendars from the repository
    pub repo_timeout: Duration,
    /// Timeout for one window-expansion step
    pub expansion_timeout: Duration,
    /// Join timeout when stopping
    pub join_timeout: Duration,
}

impl Default for SyncSchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(900), // 15 minutes
            repo_timeout: Duration::from_secs(30),
            expansion_timeout: Duration::from_secs(120),
            join_timeout: Duration::from_secs(5),
        }
    }
}

/// Periodic sync scheduler with explicit lifecycle management
pub struct SyncScheduler {
    calendars: Arc<dyn CalendarRepository>,
    queue: Arc<SyncQueue>,
    engine: Arc<SyncEngine>,
    config: SyncSchedulerConfig,
    cancellation_token: CancellationToken,
    task_handle: TaskHandle,
}

impl SyncScheduler {
    /// Create a new sync scheduler
    pub fn new(
        calendars: Arc<dyn CalendarRepository>,
        queue: Arc<SyncQueue>,
        engine: Arc<SyncEngine>,
        config: SyncSchedulerConfig,
    ) -> Self {
        Self {
            calendars,
            queue,
            engine,
            config,
            cancellation_token: CancellationToken::new(),
            task_handle: Arc::new(Mutex::new(None)),
        }
    }

    /// Start the scheduler.
    ///
    /// # Errors
    /// Returns [`SchedulerError::AlreadyRunning`] if already started.
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        info!("Starting sync scheduler");

        // Fresh token so the scheduler can restart after stop
        self.cancellation_token = CancellationToken::new();

        let calendars = Arc::clone(&self.calendars);
        let queue = Arc::clone(&self.queue);
        let engine = Arc::clone(&self.engine);
        let config = self.config.clone();
        let cancel = self.cancellation_token.clone();

        let handle = tokio::spawn(async move {
            Self::tick_loop(calendars, queue, engine, config, cancel).await;
        });

        *self.task_handle.lock().await = Some(handle);
        info!("Sync scheduler started");
        Ok(())
    }

    /// Stop the scheduler gracefully.
    ///
    /// # Errors
    /// Returns [`SchedulerError::NotRunning`] if not started.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }

        info!("Stopping sync scheduler");
        self.cancellation_token.cancel();

        if let Some(handle) = self.task_handle.lock().await.take() {
            tokio::time::timeout(self.config.join_timeout, handle)
                .await
                .map_err(|_| SchedulerError::Timeout {
                    seconds: self.config.join_timeout.as_secs(),
                })?
                .map_err(|e| SchedulerError::TaskJoinFailed(e.to_string()))?;
        }

        info!("Sync scheduler stopped");
        Ok(())
    }

    /// Check if scheduler is running.
    pub fn is_running(&self) -> bool {
        self.task_handle
            .try_lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|h| !h.is_finished()))
            .unwrap_or(false)
    }

    async fn tick_loop(
        calendars: Arc<dyn CalendarRepository>,
        queue: Arc<SyncQueue>,
        engine: Arc<SyncEngine>,
        config: SyncSchedulerConfig,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!("Sync scheduler loop cancelled");
                    break;
                }
                () = tokio::time::sleep(config.interval) => {
                    if let Err(e) = Self::tick(&calendars, &queue, &engine, &config, &cancel).await {
                        error!(error = %e, "Sync scheduler tick failed");
                    }
                }
            }
        }
    }

    async fn tick(
        calendars: &Arc<dyn CalendarRepository>,
        queue: &Arc<SyncQueue>,
        engine: &Arc<SyncEngine>,
        config: &SyncSchedulerConfig,
        cancel: &CancellationToken,
    ) -> SchedulerResult<()> {
        let active = tokio::time::timeout(config.repo_timeout, calendars.list_active_calendars())
            .await
            .map_err(|_| SchedulerError::Timeout { seconds: config.repo_timeout.as_secs() })?
            .map_err(|e| SchedulerError::Repository {
                operation: "list_active_calendars".to_string(),
                message: e.to_string(),
            })?;

        if active.is_empty() {
            debug!("No active calendars to sync");
            return Ok(());
        }

        debug!(count = active.len(), "scheduling sync for active calendars");

        for calendar in active {
            queue.enqueue(&calendar.user_id, &calendar.id);

            // One expansion step per tick keeps provider load bounded
            let expansion = tokio::time::timeout(
                config.expansion_timeout,
                engine.expand_window(&calendar.user_id, &calendar.id, cancel),
            )
            .await;
            match expansion {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    warn!(calendar_id = %calendar.id, error = %e, "window expansion failed");
                }
                Err(_) => {
                    warn!(calendar_id = %calendar.id, "window expansion timed out");
                }
            }

            if let Err(e) = engine.cleanup_calendar(&calendar.user_id, &calendar.id).await {
                warn!(calendar_id = %calendar.id, error = %e, "event retention cleanup failed");
            }
        }
        Ok(())
    }
}

/// Ensure scheduler is stopped when dropped
impl Drop for SyncScheduler {
    fn drop(&mut self) {
        if !self.cancellation_token.is_cancelled() {
            warn!("SyncScheduler dropped while running; cancelling");
            self.cancellation_token.cancel();
        }
    }
}
