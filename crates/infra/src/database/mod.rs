//! SQLite persistence layer
//!
//! One repository per aggregate, each implementing its `hourmark-core` port.
//! Structured values (attendees, votes, fingerprints, calculation details)
//! are stored as JSON text columns; timestamps as Unix epoch seconds and
//! dates as ISO-8601 text.

pub mod calendar_repository;
pub mod event_repository;
pub mod manager;
pub mod project_repository;
pub mod rule_repository;
pub mod time_entry_repository;

use chrono::{DateTime, Utc};

pub use calendar_repository::SqliteCalendarRepository;
pub use event_repository::SqliteEventRepository;
pub use project_repository::SqliteProjectRepository;
pub use rule_repository::SqliteRuleRepository;
pub use time_entry_repository::SqliteTimeEntryRepository;

pub(crate) fn ts_to_datetime(ts: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(ts, 0).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

pub(crate) fn opt_ts_to_datetime(ts: Option<i64>) -> Option<DateTime<Utc>> {
    ts.map(ts_to_datetime)
}
