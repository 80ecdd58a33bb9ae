//! Domain types and models

pub mod calendar;
pub mod event;
pub mod project;
pub mod rule;
pub mod sync;
pub mod time_entry;

pub use calendar::Calendar;
pub use event::{
    Attendee, CalendarEvent, ClassificationSource, ClassificationStatus, ResponseStatus,
    Transparency, Vote, VoteTarget,
};
pub use project::{Project, ProjectFingerprint};
pub use rule::{ClassificationRule, RuleTarget};
pub use sync::{
    DateRange, FetchResult, IncrementalFetchResult, ProviderAttendee, ProviderEvent, SyncJob,
    SyncReport, SyncState, SyncStatusInfo,
};
pub use time_entry::{
    AuditedEvent, CalculationDetails, ComputedTimeEntry, RoundingApplied, TimeEntry,
    TimeEntryPatch, TimeRange,
};

/// Generate a fresh entity id (UUIDv7, time-ordered)
pub fn new_entity_id() -> String {
    uuid::Uuid::now_v7().to_string()
}
