//! Sync engine types: provider payloads, jobs, and status reporting

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::event::ResponseStatus;

/// A half-open UTC datetime range used for provider fetches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    #[must_use]
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts < self.end
    }
}

/// Attendee as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderAttendee {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub response_status: ResponseStatus,
}

/// One event as returned by the calendar provider adapter
///
/// `is_deleted` is the tombstone flag delivered by incremental feeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderEvent {
    pub provider_event_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub is_all_day: bool,
    #[serde(default)]
    pub attendees: Vec<ProviderAttendee>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organizer_email: Option<String>,
    #[serde(default)]
    pub response_status: ResponseStatus,
    pub transparency: super::event::Transparency,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
    pub is_recurring: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurrence_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meeting_link: Option<String>,
    pub is_deleted: bool,
}

/// Result of a full-range `FetchEvents` call
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub events: Vec<ProviderEvent>,
    pub next_sync_token: Option<String>,
}

/// Result of a `FetchIncremental` call
#[derive(Debug, Clone)]
pub struct IncrementalFetchResult {
    pub events: Vec<ProviderEvent>,
    pub next_sync_token: Option<String>,
    /// The provider invalidated our delta token; a full window re-fetch is
    /// required. This is not a failure.
    pub full_resync_required: bool,
}

/// An enqueued sync request
///
/// `seq` is monotonic per queue; a pending job for the same calendar with a
/// lower sequence is coalesced away.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncJob {
    pub id: String,
    pub user_id: String,
    pub calendar_id: String,
    pub seq: u64,
}

/// Outcome counters for one sync pass over a calendar
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub inserted: usize,
    pub updated: usize,
    pub orphaned: usize,
    pub reclassified: usize,
    pub full_resync: bool,
}

/// Coarse sync state for status reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    NeverSynced,
    Idle,
    Suspended,
}

/// Status surface for `SyncStatus(user, calendarId)`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncStatusInfo {
    pub calendar_id: String,
    pub state: SyncState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sync_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest_synced: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newest_synced: Option<DateTime<Utc>>,
    pub failure_count: u32,
    pub pending_jobs: usize,
}
