//! Application context: dependency wiring and lifecycle ownership.

use std::sync::Arc;

use hourmark_core::classification::ports::{EventRepository, ProjectRepository, RuleRepository};
use hourmark_core::sync::ports::{CalendarProvider, CalendarRepository};
use hourmark_core::timesheet::ports::TimeEntryRepository;
use hourmark_core::{ClassificationService, TimesheetService};
use hourmark_domain::{Config, Result};
use hourmark_infra::database::{
    SqliteCalendarRepository, SqliteEventRepository, SqliteProjectRepository,
    SqliteRuleRepository, SqliteTimeEntryRepository,
};
use hourmark_infra::scheduling::{SyncScheduler, SyncSchedulerConfig};
use hourmark_infra::{DbManager, HttpCalendarProvider, SyncEngine, SyncQueue, SyncWorkerPool};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Shared application state for the hosting layer
pub struct AppContext {
    pub config: Config,
    pub db: Arc<DbManager>,
    pub calendars: Arc<dyn CalendarRepository>,
    pub classification: Arc<ClassificationService>,
    pub timesheet: Arc<TimesheetService>,
    pub sync_engine: Arc<SyncEngine>,
    pub sync_queue: Arc<SyncQueue>,
    shutdown: CancellationToken,
}

impl AppContext {
    /// Build the full dependency graph from configuration.
    ///
    /// Runs migrations before anything touches the database.
    pub fn new(config: Config) -> Result<Self> {
        let db = Arc::new(DbManager::new(&config.database.path, config.database.pool_size)?);
        db.run_migrations()?;

        let pool = Arc::clone(db.pool());
        let projects: Arc<dyn ProjectRepository> =
            Arc::new(SqliteProjectRepository::new(Arc::clone(&pool)));
        let rules: Arc<dyn RuleRepository> =
            Arc::new(SqliteRuleRepository::new(Arc::clone(&pool)));
        let events: Arc<dyn EventRepository> =
            Arc::new(SqliteEventRepository::new(Arc::clone(&pool)));
        let entries: Arc<dyn TimeEntryRepository> =
            Arc::new(SqliteTimeEntryRepository::new(Arc::clone(&pool)));
        let calendars: Arc<dyn CalendarRepository> =
            Arc::new(SqliteCalendarRepository::new(Arc::clone(&pool)));

        let classification = Arc::new(ClassificationService::new(
            Arc::clone(&projects),
            Arc::clone(&rules),
            Arc::clone(&events),
            Arc::clone(&entries),
            Arc::clone(&calendars),
            config.classification,
        ));

        let timesheet = Arc::new(TimesheetService::new(
            Arc::clone(&events),
            Arc::clone(&entries),
            config.rounding,
        ));

        let provider: Arc<dyn CalendarProvider> =
            Arc::new(HttpCalendarProvider::new(config.provider.clone())?);

        let sync_engine = Arc::new(SyncEngine::new(
            Arc::clone(&calendars),
            Arc::clone(&events),
            Arc::clone(&entries),
            provider,
            Arc::clone(&classification),
            config.sync.clone(),
        ));

        let sync_queue = Arc::new(SyncQueue::new());

        info!("application context initialised");

        Ok(Self {
            config,
            db,
            calendars,
            classification,
            timesheet,
            sync_engine,
            sync_queue,
            shutdown: CancellationToken::new(),
        })
    }

    /// Cancellation token observed by long-running commands.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Signal every in-flight operation to stop.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Build the background workers for this context. The caller owns their
    /// lifecycle (start/stop).
    pub fn background_workers(&self) -> (SyncScheduler, SyncWorkerPool) {
        let scheduler = SyncScheduler::new(
            Arc::clone(&self.calendars),
            Arc::clone(&self.sync_queue),
            Arc::clone(&self.sync_engine),
            SyncSchedulerConfig {
                interval: std::time::Duration::from_secs(self.config.sync.interval_seconds),
                ..SyncSchedulerConfig::default()
            },
        );
        let workers = SyncWorkerPool::new(
            Arc::clone(&self.sync_queue),
            Arc::clone(&self.sync_engine),
            self.config.sync.worker_count,
        );
        (scheduler, workers)
    }
}
