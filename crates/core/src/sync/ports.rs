//! Port interfaces for calendar sync
//!
//! The provider adapter is consumed by contract only: `fetch_events` for
//! full-range fetches and `fetch_incremental` for delta-token fetches.

use async_trait::async_trait;
use hourmark_domain::{Calendar, DateRange, FetchResult, IncrementalFetchResult, Result};

/// External calendar provider adapter
#[async_trait]
pub trait CalendarProvider: Send + Sync {
    /// Fetch all events inside `range` for the given calendar.
    async fn fetch_events(&self, calendar: &Calendar, range: DateRange) -> Result<FetchResult>;

    /// Fetch changes since `sync_token`.
    ///
    /// A provider that has expired the token reports
    /// `full_resync_required = true` instead of failing.
    async fn fetch_incremental(
        &self,
        calendar: &Calendar,
        sync_token: &str,
    ) -> Result<IncrementalFetchResult>;
}

/// Repository for connected calendars and their sync bookkeeping
#[async_trait]
pub trait CalendarRepository: Send + Sync {
    async fn list_calendars(&self, user_id: &str) -> Result<Vec<Calendar>>;

    /// Active calendars across all users, for the background scheduler.
    async fn list_active_calendars(&self) -> Result<Vec<Calendar>>;

    async fn get_calendar(&self, user_id: &str, calendar_id: &str) -> Result<Option<Calendar>>;

    async fn save_calendar(&self, calendar: &Calendar) -> Result<()>;
}
