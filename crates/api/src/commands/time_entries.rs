//! Time entry commands

use chrono::NaiveDate;
use hourmark_domain::{Result, TimeEntry, TimeEntryPatch};
use tracing::instrument;

use crate::context::AppContext;

/// List entries for a date range; ephemeral entries included.
#[instrument(skip(ctx))]
pub async fn list_time_entries(
    ctx: &AppContext,
    user_id: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<TimeEntry>> {
    ctx.timesheet.list_time_entries(user_id, from, to).await
}

/// Apply a user edit; materializes the entry if still ephemeral.
#[instrument(skip(ctx, patch))]
pub async fn update_time_entry(
    ctx: &AppContext,
    user_id: &str,
    entry_id: &str,
    patch: TimeEntryPatch,
) -> Result<TimeEntry> {
    ctx.timesheet.update_time_entry(user_id, entry_id, patch).await
}

/// Drop user edits and return the entry to computed values.
#[instrument(skip(ctx))]
pub async fn revert_time_entry(
    ctx: &AppContext,
    user_id: &str,
    entry_id: &str,
) -> Result<TimeEntry> {
    ctx.timesheet.revert_time_entry(user_id, entry_id).await
}
