//! Calendar event aggregate and its classification state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Classification lifecycle of an event
///
/// `NeedsReview` carries a project assignment whose confidence landed between
/// the configured floor and ceiling; `Skipped` means the event does not count
/// towards time entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationStatus {
    Pending,
    Classified,
    NeedsReview,
    Skipped,
}

impl ClassificationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Classified => "classified",
            Self::NeedsReview => "needs_review",
            Self::Skipped => "skipped",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "classified" => Some(Self::Classified),
            "needs_review" => Some(Self::NeedsReview),
            "skipped" => Some(Self::Skipped),
            _ => None,
        }
    }
}

/// Where a classification decision came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationSource {
    Rule,
    Fingerprint,
    Manual,
    Llm,
}

impl ClassificationSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rule => "rule",
            Self::Fingerprint => "fingerprint",
            Self::Manual => "manual",
            Self::Llm => "llm",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "rule" => Some(Self::Rule),
            "fingerprint" => Some(Self::Fingerprint),
            "manual" => Some(Self::Manual),
            "llm" => Some(Self::Llm),
            _ => None,
        }
    }
}

/// RSVP state, for the event owner or a single attendee
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Accepted,
    Declined,
    Tentative,
    #[default]
    NeedsAction,
}

impl ResponseStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Declined => "declined",
            Self::Tentative => "tentative",
            Self::NeedsAction => "needs_action",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "accepted" => Self::Accepted,
            "declined" => Self::Declined,
            "tentative" => Self::Tentative,
            _ => Self::NeedsAction,
        }
    }
}

/// Whether the event blocks the owner's availability
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transparency {
    #[default]
    Opaque,
    Transparent,
}

impl Transparency {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Opaque => "opaque",
            Self::Transparent => "transparent",
        }
    }

    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("transparent") {
            Self::Transparent
        } else {
            Self::Opaque
        }
    }
}

/// A meeting participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attendee {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub response_status: ResponseStatus,
}

impl Attendee {
    /// Lowercased domain part of the attendee email, if present.
    pub fn domain(&self) -> Option<String> {
        self.email.rsplit_once('@').map(|(_, d)| d.to_ascii_lowercase())
    }
}

/// What a matched rule voted for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum VoteTarget {
    Project(String),
    Attended,
    NotAttended,
}

/// A single matched rule's contribution to an event's classification score
///
/// Stored as structured audit data so the UI can render "why did this match".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub rule_id: String,
    pub source: ClassificationSource,
    pub target: VoteTarget,
    pub weight: f64,
}

/// A calendar event mirrored from the provider
///
/// Exactly one event exists per `(calendar_id, provider_event_id)`. If
/// `classification_status` is `Classified` or `NeedsReview` then `project_id`
/// is set; `is_skipped` implies status `Skipped`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub calendar_id: String,
    pub user_id: String,
    pub provider_event_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub is_all_day: bool,
    #[serde(default)]
    pub attendees: Vec<Attendee>,
    #[serde(default)]
    pub response_status: ResponseStatus,
    #[serde(default)]
    pub transparency: Transparency,
    pub is_recurring: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurrence_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meeting_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meeting_platform: Option<String>,
    pub classification_status: ClassificationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification_source: Option<ClassificationSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    pub is_skipped: bool,
    /// Set when the provider no longer reports the event; the row is kept
    /// for audit but excluded from time entry computation.
    pub is_orphaned: bool,
    #[serde(default)]
    pub votes: Vec<Vote>,
    pub updated_at: DateTime<Utc>,
}

impl CalendarEvent {
    /// Event duration in whole minutes (zero for all-day events).
    pub fn duration_minutes(&self) -> i64 {
        if self.is_all_day {
            0
        } else {
            (self.end - self.start).num_minutes().max(0)
        }
    }

    /// Whether the event currently carries a project assignment.
    pub fn is_assigned(&self) -> bool {
        self.project_id.is_some()
            && matches!(
                self.classification_status,
                ClassificationStatus::Classified | ClassificationStatus::NeedsReview
            )
    }

    /// Whether the event was classified by the user directly.
    pub fn is_manually_classified(&self) -> bool {
        self.classification_source == Some(ClassificationSource::Manual)
    }
}
