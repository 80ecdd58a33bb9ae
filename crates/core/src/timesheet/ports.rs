//! Port interfaces for time entry persistence

use async_trait::async_trait;
use chrono::NaiveDate;
use hourmark_domain::{Result, TimeEntry};

/// Repository for materialized time entries
///
/// Ephemeral entries are never persisted; only rows that went through
/// materialization (user edit or invoice reference) live here. At most one
/// row exists per `(user_id, project_id, date)`.
#[async_trait]
pub trait TimeEntryRepository: Send + Sync {
    /// Materialized entries whose date falls in `[from, to]`.
    async fn list_entries(
        &self,
        user_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<TimeEntry>>;

    async fn get_entry(&self, user_id: &str, entry_id: &str) -> Result<Option<TimeEntry>>;

    async fn find_entry(
        &self,
        user_id: &str,
        project_id: &str,
        date: NaiveDate,
    ) -> Result<Option<TimeEntry>>;

    /// Insert or update a materialized entry.
    ///
    /// # Errors
    /// Returns `Conflict` when inserting a second entry for the same
    /// `(user, project, date)` triple.
    async fn save_entry(&self, entry: &TimeEntry) -> Result<()>;

    /// Returns true when an entry was actually deleted.
    async fn delete_entry(&self, user_id: &str, entry_id: &str) -> Result<bool>;

    /// Flag every materialized entry referencing `event_id` as stale so the
    /// next read recomputes it. Returns the number of entries touched.
    async fn mark_stale_for_event(&self, event_id: &str) -> Result<usize>;
}
