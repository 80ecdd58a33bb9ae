//! Transport-agnostic command functions
//!
//! Each function takes the [`crate::AppContext`] plus an already-resolved
//! user id. Authentication and routing belong to whatever hosts this crate.

pub mod classification;
pub mod health;
pub mod sync;
pub mod time_entries;

use chrono::{Duration, Utc};
use hourmark_domain::DateRange;

/// Default evaluation window when a command receives no explicit range:
/// four weeks back, one week ahead.
pub(crate) fn default_range() -> DateRange {
    let now = Utc::now();
    DateRange::new(now - Duration::days(28), now + Duration::days(7))
}
