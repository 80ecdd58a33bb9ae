//! Time entries: computed aggregates and their materialized form

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A half-open wall-clock interval `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn minutes(&self) -> i64 {
        (self.end - self.start).num_minutes().max(0)
    }
}

/// One contributing event as recorded in the audit trail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditedEvent {
    pub id: String,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub raw_minutes: i64,
    pub is_all_day: bool,
}

/// Which direction rounding moved the union minutes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundingApplied {
    None,
    Up,
    Down,
}

impl RoundingApplied {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Up => "up",
            Self::Down => "down",
        }
    }
}

/// Full audit trail for one computed time entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalculationDetails {
    pub events: Vec<AuditedEvent>,
    pub time_ranges: Vec<TimeRange>,
    pub union_minutes: i64,
    pub rounding_applied: String,
    pub final_minutes: i64,
}

/// The analyzer's output for one project on one date
///
/// Pure data; carries no persistence identity. The hosting layer either
/// returns it as an ephemeral entry or freezes it into a [`TimeEntry`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputedTimeEntry {
    pub project_id: String,
    pub date: NaiveDate,
    pub hours: f64,
    pub title: String,
    pub description: String,
    pub contributing_event_ids: Vec<String>,
    pub details: CalculationDetails,
}

/// A per-user, per-project, per-date time entry
///
/// Ephemeral until the user edits it (or an invoice references it); at that
/// point the computed values are frozen into the `snapshot_*` fields and the
/// user's values live in `user_*`. `invoice_id` set means the entry is
/// locked and recomputation results are discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeEntry {
    pub id: String,
    pub user_id: String,
    pub project_id: String,
    pub date: NaiveDate,
    pub computed_hours: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_hours: Option<f64>,
    pub computed_title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_title: Option<String>,
    pub computed_description: String,
    pub has_user_edits: bool,
    pub contributing_event_ids: Vec<String>,
    pub calculation_details: CalculationDetails,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_computed_hours: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_computed_title: Option<String>,
    /// Set when recomputation after materialization produced values that
    /// differ from the frozen snapshot; reconciliation is the user's call.
    pub is_stale: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_id: Option<String>,
    /// True while the entry only exists as a computed read result
    #[serde(default)]
    pub is_ephemeral: bool,
    pub updated_at: DateTime<Utc>,
}

impl TimeEntry {
    /// Synthetic id used for ephemeral entries returned from read queries.
    ///
    /// Stable for a given `(project, date)` so the hosting layer can address
    /// an entry it has never persisted; materialization swaps it for a real
    /// entity id.
    pub fn ephemeral_id(project_id: &str, date: NaiveDate) -> String {
        format!("ephemeral:{project_id}:{date}")
    }

    /// Parse an ephemeral id back into `(project_id, date)`.
    pub fn parse_ephemeral_id(id: &str) -> Option<(String, NaiveDate)> {
        let rest = id.strip_prefix("ephemeral:")?;
        let (project_id, date) = rest.rsplit_once(':')?;
        let date = date.parse().ok()?;
        Some((project_id.to_string(), date))
    }

    /// Build an ephemeral entry from a computed aggregate.
    #[must_use]
    pub fn ephemeral(user_id: &str, computed: ComputedTimeEntry, now: DateTime<Utc>) -> Self {
        Self {
            id: Self::ephemeral_id(&computed.project_id, computed.date),
            user_id: user_id.to_string(),
            project_id: computed.project_id,
            date: computed.date,
            computed_hours: computed.hours,
            user_hours: None,
            computed_title: computed.title,
            user_title: None,
            computed_description: computed.description,
            has_user_edits: false,
            contributing_event_ids: computed.contributing_event_ids,
            calculation_details: computed.details,
            snapshot_computed_hours: None,
            snapshot_computed_title: None,
            is_stale: false,
            invoice_id: None,
            is_ephemeral: true,
            updated_at: now,
        }
    }

    /// Hours the user should be billed: their override when present.
    pub fn effective_hours(&self) -> f64 {
        self.user_hours.unwrap_or(self.computed_hours)
    }

    /// Title shown to the user: their override when present.
    pub fn effective_title(&self) -> &str {
        self.user_title.as_deref().unwrap_or(&self.computed_title)
    }

    pub fn is_locked(&self) -> bool {
        self.invoice_id.is_some()
    }
}

/// User-editable fields of a time entry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimeEntryPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hours: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl TimeEntryPatch {
    pub fn is_empty(&self) -> bool {
        self.hours.is_none() && self.title.is_none()
    }
}
