//! Sync commands

use hourmark_domain::{HourmarkError, Result, SyncStatusInfo};
use hourmark_infra::sync::engine::status_for;
use tracing::instrument;

use crate::context::AppContext;

/// Enqueue an on-demand sync for one calendar. Returns the job id; repeated
/// requests while a job is pending coalesce into it.
#[instrument(skip(ctx))]
pub async fn request_sync(ctx: &AppContext, user_id: &str, calendar_id: &str) -> Result<String> {
    let calendar = ctx
        .calendars
        .get_calendar(user_id, calendar_id)
        .await?
        .ok_or_else(|| HourmarkError::NotFound(format!("calendar {calendar_id}")))?;

    if !calendar.is_active {
        return Err(HourmarkError::Conflict(format!(
            "calendar {calendar_id} is suspended; reactivate it before syncing"
        )));
    }

    let job = ctx.sync_queue.enqueue(user_id, calendar_id);
    Ok(job.id)
}

/// Report sync state, watermarks, and failure count for one calendar.
#[instrument(skip(ctx))]
pub async fn sync_status(
    ctx: &AppContext,
    user_id: &str,
    calendar_id: &str,
) -> Result<SyncStatusInfo> {
    let calendar = ctx
        .calendars
        .get_calendar(user_id, calendar_id)
        .await?
        .ok_or_else(|| HourmarkError::NotFound(format!("calendar {calendar_id}")))?;

    Ok(status_for(&calendar, ctx.sync_queue.user_depth(user_id)))
}
