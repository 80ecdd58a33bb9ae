//! Timesheet service - time entry read/edit lifecycle
//!
//! Entries are ephemeral (computed on read) until the user edits them. On
//! edit the computed values at that instant are frozen into the snapshot
//! fields; recomputation afterwards preserves the user's values and flags
//! divergence via `is_stale`. Invoice-locked entries are immutable.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, Utc};
use hourmark_domain::{
    ComputedTimeEntry, DateRange, HourmarkError, Result, RoundingConfig, TimeEntry, TimeEntryPatch,
};
use tracing::{debug, instrument};

use super::ports::TimeEntryRepository;
use crate::analyzer;
use crate::classification::ports::EventRepository;

/// Service for listing and editing per-project daily time entries
pub struct TimesheetService {
    events: Arc<dyn EventRepository>,
    entries: Arc<dyn TimeEntryRepository>,
    rounding: RoundingConfig,
}

impl TimesheetService {
    /// Create a new timesheet service
    pub fn new(
        events: Arc<dyn EventRepository>,
        entries: Arc<dyn TimeEntryRepository>,
        rounding: RoundingConfig,
    ) -> Self {
        Self { events, entries, rounding }
    }

    /// List entries for a date range, ephemeral ones included.
    ///
    /// Materialized entries are reconciled against fresh computation:
    /// computed fields refresh, user edits survive, and divergence from the
    /// materialization snapshot sets `is_stale`. Locked entries are returned
    /// as stored.
    #[instrument(skip(self), fields(user_id, %from, %to))]
    pub async fn list_time_entries(
        &self,
        user_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<TimeEntry>> {
        if from > to {
            return Err(HourmarkError::InvalidInput(format!(
                "invalid date range: {from} > {to}"
            )));
        }

        let computed = self.compute_range(user_id, from, to).await?;
        let persisted = self.entries.list_entries(user_id, from, to).await?;

        let mut persisted_by_key: HashMap<(String, NaiveDate), TimeEntry> = persisted
            .into_iter()
            .map(|e| ((e.project_id.clone(), e.date), e))
            .collect();

        let now = Utc::now();
        let mut result = Vec::new();

        for fresh in computed {
            let key = (fresh.project_id.clone(), fresh.date);
            if let Some(existing) = persisted_by_key.remove(&key) {
                result.push(self.refresh_materialized(existing, &fresh).await?);
            } else {
                result.push(TimeEntry::ephemeral(user_id, fresh, now));
            }
        }

        // Materialized entries whose events vanished still surface, with
        // zero computed hours
        for (_, existing) in persisted_by_key {
            let empty = empty_computation(&existing);
            result.push(self.refresh_materialized(existing, &empty).await?);
        }

        result.sort_by(|a, b| (a.date, &a.project_id).cmp(&(b.date, &b.project_id)));
        Ok(result)
    }

    /// Apply a user edit, materializing the entry if it is still ephemeral.
    #[instrument(skip(self, patch), fields(user_id, entry_id))]
    pub async fn update_time_entry(
        &self,
        user_id: &str,
        entry_id: &str,
        patch: TimeEntryPatch,
    ) -> Result<TimeEntry> {
        if patch.is_empty() {
            return Err(HourmarkError::InvalidInput("empty time entry patch".into()));
        }

        if let Some(mut entry) = self.entries.get_entry(user_id, entry_id).await? {
            if entry.is_locked() {
                return Err(HourmarkError::Locked(entry.id.clone()));
            }
            apply_patch(&mut entry, patch);
            entry.updated_at = Utc::now();
            self.entries.save_entry(&entry).await?;
            return Ok(entry);
        }

        // An id we never persisted: materialize the ephemeral entry it names
        let Some((project_id, date)) = TimeEntry::parse_ephemeral_id(entry_id) else {
            return Err(HourmarkError::NotFound(format!("time entry {entry_id}")));
        };

        // The unique (user, project, date) row may already exist under its
        // real id if another caller materialized first
        if let Some(mut entry) = self.entries.find_entry(user_id, &project_id, date).await? {
            if entry.is_locked() {
                return Err(HourmarkError::Locked(entry.id.clone()));
            }
            apply_patch(&mut entry, patch);
            entry.updated_at = Utc::now();
            self.entries.save_entry(&entry).await?;
            return Ok(entry);
        }

        let computed = self
            .compute_single(user_id, &project_id, date)
            .await?
            .ok_or_else(|| HourmarkError::NotFound(format!("time entry {entry_id}")))?;

        let mut entry = materialize(user_id, computed, Utc::now());
        apply_patch(&mut entry, patch);
        self.entries.save_entry(&entry).await?;
        debug!(entry_id = %entry.id, project_id = %entry.project_id, "materialized time entry");
        Ok(entry)
    }

    /// Drop user edits and return the entry to its computed values.
    #[instrument(skip(self), fields(user_id, entry_id))]
    pub async fn revert_time_entry(&self, user_id: &str, entry_id: &str) -> Result<TimeEntry> {
        let mut entry = self
            .entries
            .get_entry(user_id, entry_id)
            .await?
            .ok_or_else(|| HourmarkError::NotFound(format!("time entry {entry_id}")))?;

        if entry.is_locked() {
            return Err(HourmarkError::Locked(entry.id.clone()));
        }

        if let Some(fresh) = self.compute_single(user_id, &entry.project_id, entry.date).await? {
            write_computed(&mut entry, &fresh);
        } else {
            let empty = empty_computation(&entry);
            write_computed(&mut entry, &empty);
        }

        entry.user_hours = None;
        entry.user_title = None;
        entry.has_user_edits = false;
        entry.snapshot_computed_hours = None;
        entry.snapshot_computed_title = None;
        entry.is_stale = false;
        entry.updated_at = Utc::now();

        self.entries.save_entry(&entry).await?;
        Ok(entry)
    }

    /// Recompute one materialized entry and persist refreshed computed
    /// values plus the stale flag. User fields are never touched; locked
    /// entries are returned untouched.
    async fn refresh_materialized(
        &self,
        mut entry: TimeEntry,
        fresh: &ComputedTimeEntry,
    ) -> Result<TimeEntry> {
        if entry.is_locked() {
            return Ok(entry);
        }

        let changed = hours_differ(entry.computed_hours, fresh.hours)
            || entry.computed_title != fresh.title
            || entry.contributing_event_ids != fresh.contributing_event_ids;

        write_computed(&mut entry, fresh);

        let stale = entry.has_user_edits
            && (entry
                .snapshot_computed_hours
                .map_or(false, |snap| hours_differ(snap, fresh.hours))
                || entry
                    .snapshot_computed_title
                    .as_deref()
                    .map_or(false, |snap| snap != fresh.title));

        let stale_changed = entry.is_stale != stale;
        entry.is_stale = stale;

        if changed || stale_changed {
            entry.updated_at = Utc::now();
            self.entries.save_entry(&entry).await?;
        }
        Ok(entry)
    }

    async fn compute_range(
        &self,
        user_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ComputedTimeEntry>> {
        let range = DateRange::new(
            from.and_time(NaiveTime::MIN).and_utc(),
            to.succ_opt()
                .unwrap_or(to)
                .and_time(NaiveTime::MIN)
                .and_utc(),
        );
        let events = self.events.list_events_in_range(user_id, range).await?;

        // Events count towards their start date, including those crossing
        // midnight
        let mut by_date: HashMap<NaiveDate, Vec<hourmark_domain::CalendarEvent>> = HashMap::new();
        for event in events {
            by_date.entry(event.start.date_naive()).or_default().push(event);
        }

        let mut computed = Vec::new();
        let mut dates: Vec<NaiveDate> = by_date.keys().copied().collect();
        dates.sort_unstable();
        for date in dates {
            if let Some(day_events) = by_date.get(&date) {
                computed.extend(analyzer::analyze(date, day_events, &self.rounding));
            }
        }
        Ok(computed)
    }

    async fn compute_single(
        &self,
        user_id: &str,
        project_id: &str,
        date: NaiveDate,
    ) -> Result<Option<ComputedTimeEntry>> {
        let computed = self.compute_range(user_id, date, date).await?;
        Ok(computed.into_iter().find(|c| c.project_id == project_id))
    }
}

fn hours_differ(a: f64, b: f64) -> bool {
    (a - b).abs() > 1e-9
}

fn apply_patch(entry: &mut TimeEntry, patch: TimeEntryPatch) {
    // First edit freezes the computed values of that instant
    if !entry.has_user_edits {
        entry.snapshot_computed_hours = Some(entry.computed_hours);
        entry.snapshot_computed_title = Some(entry.computed_title.clone());
    }
    if let Some(hours) = patch.hours {
        entry.user_hours = Some(hours);
    }
    if let Some(title) = patch.title {
        entry.user_title = Some(title);
    }
    entry.has_user_edits = entry.user_hours.is_some() || entry.user_title.is_some();
}

fn write_computed(entry: &mut TimeEntry, fresh: &ComputedTimeEntry) {
    entry.computed_hours = fresh.hours;
    entry.computed_title = fresh.title.clone();
    entry.computed_description = fresh.description.clone();
    entry.contributing_event_ids = fresh.contributing_event_ids.clone();
    entry.calculation_details = fresh.details.clone();
}

fn materialize(
    user_id: &str,
    computed: ComputedTimeEntry,
    now: chrono::DateTime<Utc>,
) -> TimeEntry {
    let mut entry = TimeEntry::ephemeral(user_id, computed, now);
    entry.id = hourmark_domain::new_entity_id();
    entry.is_ephemeral = false;
    entry
}

fn empty_computation(entry: &TimeEntry) -> ComputedTimeEntry {
    ComputedTimeEntry {
        project_id: entry.project_id.clone(),
        date: entry.date,
        hours: 0.0,
        title: String::new(),
        description: String::new(),
        contributing_event_ids: Vec::new(),
        details: hourmark_domain::CalculationDetails::default(),
    }
}
