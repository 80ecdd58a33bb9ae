//! Calendar sync engine.
//!
//! Orchestrates initial sync, incremental sync, background window expansion,
//! and full resync per calendar. Every mutation path runs under the
//! per-calendar lock; reconciliation is idempotent on
//! `(calendar_id, provider_event_id)` so at-least-once job delivery is safe.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use hourmark_core::classification::ports::EventRepository;
use hourmark_core::sync::ports::{CalendarProvider, CalendarRepository};
use hourmark_core::timesheet::ports::TimeEntryRepository;
use hourmark_core::ClassificationService;
use hourmark_domain::{
    Attendee, Calendar, CalendarEvent, ClassificationStatus, DateRange, HourmarkError,
    ProviderEvent, Result, SyncConfig, SyncReport, SyncState, SyncStatusInfo,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::locks::CalendarLocks;
use crate::provider::platform::detect_meeting_platform;

const MAX_FETCH_ATTEMPTS: u32 = 3;

/// Per-calendar sync orchestrator
pub struct SyncEngine {
    calendars: Arc<dyn CalendarRepository>,
    events: Arc<dyn EventRepository>,
    entries: Arc<dyn TimeEntryRepository>,
    provider: Arc<dyn CalendarProvider>,
    classifier: Arc<ClassificationService>,
    locks: CalendarLocks,
    config: SyncConfig,
}

impl SyncEngine {
    /// Create a new sync engine
    pub fn new(
        calendars: Arc<dyn CalendarRepository>,
        events: Arc<dyn EventRepository>,
        entries: Arc<dyn TimeEntryRepository>,
        provider: Arc<dyn CalendarProvider>,
        classifier: Arc<ClassificationService>,
        config: SyncConfig,
    ) -> Self {
        Self {
            calendars,
            events,
            entries,
            provider,
            classifier,
            locks: CalendarLocks::new(),
            config,
        }
    }

    /// Run one sync pass for a calendar: initial on first contact,
    /// incremental afterwards, full resync when the provider demands it.
    ///
    /// Holds the per-calendar lock for the duration; at most one sync runs
    /// per calendar.
    #[instrument(skip(self, cancel), fields(user_id, calendar_id))]
    pub async fn sync_calendar(
        &self,
        user_id: &str,
        calendar_id: &str,
        cancel: &CancellationToken,
    ) -> Result<SyncReport> {
        let _guard = self.locks.acquire(calendar_id).await;

        let mut calendar = self
            .calendars
            .get_calendar(user_id, calendar_id)
            .await?
            .ok_or_else(|| HourmarkError::NotFound(format!("calendar {calendar_id}")))?;

        if !calendar.is_active {
            return Err(HourmarkError::Conflict(format!(
                "calendar {calendar_id} is suspended after repeated sync failures"
            )));
        }

        match self.run_sync(&mut calendar, cancel).await {
            Ok(report) => {
                calendar.sync_failure_count = 0;
                calendar.last_sync_at = Some(Utc::now());
                self.calendars.save_calendar(&calendar).await?;
                info!(
                    calendar_id,
                    inserted = report.inserted,
                    updated = report.updated,
                    orphaned = report.orphaned,
                    full_resync = report.full_resync,
                    "calendar sync completed"
                );
                Ok(report)
            }
            Err(e) => self.record_failure(calendar, e).await,
        }
    }

    /// Grow the mirrored window towards the configured target, one step per
    /// call, fetching only the non-overlapping ranges adjacent to the
    /// current watermarks.
    #[instrument(skip(self, cancel), fields(user_id, calendar_id))]
    pub async fn expand_window(
        &self,
        user_id: &str,
        calendar_id: &str,
        cancel: &CancellationToken,
    ) -> Result<SyncReport> {
        let _guard = self.locks.acquire(calendar_id).await;

        let mut calendar = self
            .calendars
            .get_calendar(user_id, calendar_id)
            .await?
            .ok_or_else(|| HourmarkError::NotFound(format!("calendar {calendar_id}")))?;

        let (Some(oldest), Some(newest)) = (calendar.oldest_synced, calendar.newest_synced) else {
            // Never synced: nothing to expand, the first sync pass will seed
            // the window
            return Ok(SyncReport::default());
        };
        if !calendar.is_active {
            return Ok(SyncReport::default());
        }

        let now = Utc::now();
        let target_oldest = now - chrono::Duration::days(self.config.target_past_days);
        let target_newest = now + chrono::Duration::days(self.config.target_future_days);
        let step = chrono::Duration::days(self.config.expansion_step_days);

        let mut report = SyncReport::default();

        if oldest > target_oldest {
            let new_oldest = std::cmp::max(oldest - step, target_oldest);
            let range = DateRange::new(new_oldest, oldest);
            let fetched = self.fetch_window(&calendar, range, cancel).await?;
            self.reconcile_events(&calendar, fetched.events, &mut report, cancel).await?;
            calendar.oldest_synced = Some(new_oldest);
        }

        if newest < target_newest {
            let new_newest = std::cmp::min(newest + step, target_newest);
            let range = DateRange::new(newest, new_newest);
            let fetched = self.fetch_window(&calendar, range, cancel).await?;
            self.reconcile_events(&calendar, fetched.events, &mut report, cancel).await?;
            calendar.newest_synced = Some(new_newest);
        }

        self.calendars.save_calendar(&calendar).await?;
        debug!(calendar_id, inserted = report.inserted, "window expansion step completed");
        Ok(report)
    }

    /// Drop mirrored events that fell out of the sync window, keeping any
    /// still referenced by materialized time entries.
    #[instrument(skip(self), fields(user_id, calendar_id))]
    pub async fn cleanup_calendar(&self, user_id: &str, calendar_id: &str) -> Result<usize> {
        let _guard = self.locks.acquire(calendar_id).await;

        let calendar = self
            .calendars
            .get_calendar(user_id, calendar_id)
            .await?
            .ok_or_else(|| HourmarkError::NotFound(format!("calendar {calendar_id}")))?;

        let Some(oldest) = calendar.oldest_synced else {
            return Ok(0);
        };
        let deleted = self.events.delete_unreferenced_before(calendar_id, oldest).await?;
        if deleted > 0 {
            info!(calendar_id, deleted, "cleaned up events outside sync window");
        }
        Ok(deleted)
    }

    async fn run_sync(
        &self,
        calendar: &mut Calendar,
        cancel: &CancellationToken,
    ) -> Result<SyncReport> {
        if cancel.is_cancelled() {
            return Err(HourmarkError::Cancelled);
        }

        if !calendar.has_synced() {
            return self.initial_sync(calendar, cancel).await;
        }

        match calendar.sync_token.clone() {
            Some(token) => self.incremental_sync(calendar, &token, cancel).await,
            // No usable delta token: re-fetch the whole window
            None => self.full_resync(calendar, cancel).await,
        }
    }

    async fn initial_sync(
        &self,
        calendar: &mut Calendar,
        cancel: &CancellationToken,
    ) -> Result<SyncReport> {
        let now = Utc::now();
        let range = DateRange::new(
            now - chrono::Duration::days(self.config.initial_lookback_days),
            now + chrono::Duration::days(self.config.initial_lookahead_days),
        );

        info!(calendar_id = %calendar.id, "running initial sync");
        let fetched = self.fetch_window(calendar, range, cancel).await?;

        let mut report = SyncReport::default();
        self.reconcile_events(calendar, fetched.events, &mut report, cancel).await?;

        calendar.oldest_synced = Some(range.start);
        calendar.newest_synced = Some(range.end);
        calendar.sync_token = fetched.next_sync_token;
        Ok(report)
    }

    async fn incremental_sync(
        &self,
        calendar: &mut Calendar,
        sync_token: &str,
        cancel: &CancellationToken,
    ) -> Result<SyncReport> {
        let result = self.fetch_incremental(calendar, sync_token, cancel).await?;

        if result.full_resync_required {
            // Provider expired the token; not a failure, just start over
            info!(calendar_id = %calendar.id, "delta token expired; running full resync");
            return self.full_resync(calendar, cancel).await;
        }

        let mut report = SyncReport::default();
        self.reconcile_events(calendar, result.events, &mut report, cancel).await?;

        if let Some(token) = result.next_sync_token {
            calendar.sync_token = Some(token);
        } else {
            debug!(
                calendar_id = %calendar.id,
                "provider returned no delta token; keeping existing token"
            );
        }
        Ok(report)
    }

    /// Re-fetch the whole mirrored window, replace the delta token, and
    /// orphan local events the provider no longer reports. Existing
    /// classifications survive because reconciliation never touches
    /// classification fields on update.
    async fn full_resync(
        &self,
        calendar: &mut Calendar,
        cancel: &CancellationToken,
    ) -> Result<SyncReport> {
        let now = Utc::now();
        let range = match (calendar.oldest_synced, calendar.newest_synced) {
            (Some(oldest), Some(newest)) => DateRange::new(oldest, newest),
            _ => DateRange::new(
                now - chrono::Duration::days(self.config.initial_lookback_days),
                now + chrono::Duration::days(self.config.initial_lookahead_days),
            ),
        };

        let fetched = self.fetch_window(calendar, range, cancel).await?;

        let mut report = SyncReport { full_resync: true, ..SyncReport::default() };

        let provider_ids: std::collections::HashSet<&str> =
            fetched.events.iter().map(|e| e.provider_event_id.as_str()).collect();

        self.reconcile_events(calendar, fetched.events.clone(), &mut report, cancel).await?;

        // Events in the window the provider stopped reporting are orphans
        let local = self.events.list_calendar_events_in_range(&calendar.id, range).await?;
        for mut event in local {
            if event.is_orphaned || provider_ids.contains(event.provider_event_id.as_str()) {
                continue;
            }
            event.is_orphaned = true;
            self.events.save_event(&event).await?;
            self.entries.mark_stale_for_event(&event.id).await?;
            report.orphaned += 1;
        }

        calendar.oldest_synced = Some(range.start);
        calendar.newest_synced = Some(range.end);
        calendar.sync_token = fetched.next_sync_token;
        Ok(report)
    }

    /// Apply one batch of provider events to the local mirror.
    async fn reconcile_events(
        &self,
        calendar: &Calendar,
        provider_events: Vec<ProviderEvent>,
        report: &mut SyncReport,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut to_classify = Vec::new();

        for provider_event in provider_events {
            if cancel.is_cancelled() {
                return Err(HourmarkError::Cancelled);
            }

            let existing = self
                .events
                .find_by_provider_id(&calendar.id, &provider_event.provider_event_id)
                .await?;

            if provider_event.is_deleted {
                if let Some(mut event) = existing {
                    if !event.is_orphaned {
                        event.is_orphaned = true;
                        self.events.save_event(&event).await?;
                        self.entries.mark_stale_for_event(&event.id).await?;
                        report.orphaned += 1;
                    }
                }
                continue;
            }

            match existing {
                None => {
                    let event = new_event(calendar, provider_event);
                    self.events.save_event(&event).await?;
                    to_classify.push(event.id);
                    report.inserted += 1;
                }
                Some(mut event) => {
                    let change = update_event(&mut event, &provider_event);
                    if change.any() {
                        self.events.save_event(&event).await?;
                        self.entries.mark_stale_for_event(&event.id).await?;
                        report.updated += 1;
                    }
                    if change.material && !event.is_manually_classified() {
                        to_classify.push(event.id);
                    }
                }
            }
        }

        report.reclassified +=
            self.classifier.classify_events(&calendar.user_id, &to_classify).await?;
        Ok(())
    }

    async fn record_failure(
        &self,
        mut calendar: Calendar,
        err: HourmarkError,
    ) -> Result<SyncReport> {
        match &err {
            HourmarkError::Provider { transient, .. } => {
                calendar.sync_failure_count += 1;
                let suspend =
                    !transient || calendar.sync_failure_count >= self.config.max_failures;
                if suspend {
                    calendar.is_active = false;
                    warn!(
                        calendar_id = %calendar.id,
                        failures = calendar.sync_failure_count,
                        "suspending calendar after provider failures"
                    );
                }
                self.calendars.save_calendar(&calendar).await?;
                Err(err)
            }
            _ => Err(err),
        }
    }

    async fn fetch_window(
        &self,
        calendar: &Calendar,
        range: DateRange,
        cancel: &CancellationToken,
    ) -> Result<hourmark_domain::FetchResult> {
        let mut attempt = 0;
        loop {
            match self.provider.fetch_events(calendar, range).await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_transient() && attempt + 1 < MAX_FETCH_ATTEMPTS => {
                    attempt += 1;
                    self.backoff_sleep(attempt, cancel).await?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_incremental(
        &self,
        calendar: &Calendar,
        sync_token: &str,
        cancel: &CancellationToken,
    ) -> Result<hourmark_domain::IncrementalFetchResult> {
        let mut attempt = 0;
        loop {
            match self.provider.fetch_incremental(calendar, sync_token).await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_transient() && attempt + 1 < MAX_FETCH_ATTEMPTS => {
                    attempt += 1;
                    self.backoff_sleep(attempt, cancel).await?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn backoff_sleep(&self, attempt: u32, cancel: &CancellationToken) -> Result<()> {
        let delay = Duration::from_millis(calculate_backoff(attempt));
        warn!(attempt, delay_ms = delay.as_millis() as u64, "transient provider error; backing off");
        tokio::select! {
            () = cancel.cancelled() => Err(HourmarkError::Cancelled),
            () = tokio::time::sleep(delay) => Ok(()),
        }
    }
}

/// Build the status surface for one calendar.
pub fn status_for(calendar: &Calendar, pending_jobs: usize) -> SyncStatusInfo {
    let state = if !calendar.is_active {
        SyncState::Suspended
    } else if calendar.has_synced() {
        SyncState::Idle
    } else {
        SyncState::NeverSynced
    };
    SyncStatusInfo {
        calendar_id: calendar.id.clone(),
        state,
        last_sync_at: calendar.last_sync_at,
        oldest_synced: calendar.oldest_synced,
        newest_synced: calendar.newest_synced,
        failure_count: calendar.sync_failure_count,
        pending_jobs,
    }
}

/// Calculate exponential backoff delay in milliseconds with ±25% jitter.
pub fn calculate_backoff(attempt: u32) -> u64 {
    let base_delay = 1000u64;
    let max_delay = 32000u64;

    let delay = base_delay.saturating_mul(2u64.saturating_pow(attempt.min(5)));
    let capped_delay = delay.min(max_delay);

    use rand::Rng;
    let jitter_range = capped_delay / 4;
    let mut rng = rand::thread_rng();
    let jitter = rng.gen_range(0..=jitter_range * 2) as i64 - jitter_range as i64;

    (capped_delay as i64 + jitter).max(0) as u64
}

struct EventChange {
    any_field: bool,
    material: bool,
}

impl EventChange {
    fn any(&self) -> bool {
        self.any_field
    }
}

fn new_event(calendar: &Calendar, pe: ProviderEvent) -> CalendarEvent {
    let meeting_platform =
        detect_meeting_platform(pe.meeting_link.as_deref(), pe.description.as_deref());
    CalendarEvent {
        id: hourmark_domain::new_entity_id(),
        calendar_id: calendar.id.clone(),
        user_id: calendar.user_id.clone(),
        provider_event_id: pe.provider_event_id,
        title: pe.title,
        description: pe.description,
        start: pe.start,
        end: pe.end,
        is_all_day: pe.is_all_day,
        attendees: convert_attendees(&pe.attendees),
        response_status: pe.response_status,
        transparency: pe.transparency,
        is_recurring: pe.is_recurring,
        recurrence_key: pe.recurrence_key,
        meeting_link: pe.meeting_link,
        meeting_platform,
        classification_status: ClassificationStatus::Pending,
        project_id: None,
        classification_source: None,
        confidence: None,
        is_skipped: false,
        is_orphaned: false,
        votes: Vec::new(),
        updated_at: Utc::now(),
    }
}

/// Update the non-classification fields of an existing event from its
/// provider form. Returns what kind of change happened; material changes
/// (title, description, attendees) warrant re-classification.
fn update_event(event: &mut CalendarEvent, pe: &ProviderEvent) -> EventChange {
    let attendees = convert_attendees(&pe.attendees);
    let meeting_platform =
        detect_meeting_platform(pe.meeting_link.as_deref(), pe.description.as_deref());

    let material = event.title != pe.title
        || event.description != pe.description
        || event.attendees != attendees;

    let any_field = material
        || event.start != pe.start
        || event.end != pe.end
        || event.is_all_day != pe.is_all_day
        || event.response_status != pe.response_status
        || event.transparency != pe.transparency
        || event.is_recurring != pe.is_recurring
        || event.recurrence_key != pe.recurrence_key
        || event.meeting_link != pe.meeting_link
        || event.meeting_platform != meeting_platform
        || event.is_orphaned;

    event.title = pe.title.clone();
    event.description = pe.description.clone();
    event.start = pe.start;
    event.end = pe.end;
    event.is_all_day = pe.is_all_day;
    event.attendees = attendees;
    event.response_status = pe.response_status;
    event.transparency = pe.transparency;
    event.is_recurring = pe.is_recurring;
    event.recurrence_key = pe.recurrence_key.clone();
    event.meeting_link = pe.meeting_link.clone();
    event.meeting_platform = meeting_platform;
    // A provider that reports the event again un-orphans it
    event.is_orphaned = false;
    if any_field {
        event.updated_at = Utc::now();
    }

    EventChange { any_field, material }
}

fn convert_attendees(provider: &[hourmark_domain::ProviderAttendee]) -> Vec<Attendee> {
    provider
        .iter()
        .map(|a| Attendee {
            email: a.email.clone(),
            display_name: a.display_name.clone(),
            response_status: a.response_status,
        })
        .collect()
}
