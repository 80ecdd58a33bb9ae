//! SQLite implementation of the CalendarRepository port.

use async_trait::async_trait;
use chrono::Utc;
use hourmark_core::sync::ports::CalendarRepository;
use hourmark_domain::{Calendar, Result};
use rusqlite::{params, Row};
use tracing::instrument;

use super::manager::{optional, DbPool};
use super::opt_ts_to_datetime;
use crate::errors::InfraError;

/// SQLite implementation of [`CalendarRepository`]
pub struct SqliteCalendarRepository {
    pool: DbPool,
}

impl SqliteCalendarRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const COLUMNS: &str = "id, user_id, provider_calendar_id, display_name, sync_token,
    oldest_synced, newest_synced, sync_failure_count, last_sync_at, is_active";

fn row_to_calendar(row: &Row<'_>) -> rusqlite::Result<Calendar> {
    Ok(Calendar {
        id: row.get(0)?,
        user_id: row.get(1)?,
        provider_calendar_id: row.get(2)?,
        display_name: row.get(3)?,
        sync_token: row.get(4)?,
        oldest_synced: opt_ts_to_datetime(row.get(5)?),
        newest_synced: opt_ts_to_datetime(row.get(6)?),
        sync_failure_count: row.get(7)?,
        last_sync_at: opt_ts_to_datetime(row.get(8)?),
        is_active: row.get(9)?,
    })
}

#[async_trait]
impl CalendarRepository for SqliteCalendarRepository {
    #[instrument(skip(self))]
    async fn list_calendars(&self, user_id: &str) -> Result<Vec<Calendar>> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        let mut stmt = conn
            .prepare(&format!("SELECT {COLUMNS} FROM calendars WHERE user_id = ?1 ORDER BY id"))
            .map_err(InfraError::from)?;
        let rows = stmt
            .query_map(params![user_id], row_to_calendar)
            .map_err(InfraError::from)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(InfraError::from)?;
        Ok(rows)
    }

    #[instrument(skip(self))]
    async fn list_active_calendars(&self) -> Result<Vec<Calendar>> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        let mut stmt = conn
            .prepare(&format!("SELECT {COLUMNS} FROM calendars WHERE is_active = 1 ORDER BY id"))
            .map_err(InfraError::from)?;
        let rows = stmt
            .query_map([], row_to_calendar)
            .map_err(InfraError::from)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(InfraError::from)?;
        Ok(rows)
    }

    #[instrument(skip(self))]
    async fn get_calendar(&self, user_id: &str, calendar_id: &str) -> Result<Option<Calendar>> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        optional(conn.query_row(
            &format!("SELECT {COLUMNS} FROM calendars WHERE user_id = ?1 AND id = ?2"),
            params![user_id, calendar_id],
            row_to_calendar,
        ))
    }

    #[instrument(skip(self, calendar), fields(calendar_id = %calendar.id))]
    async fn save_calendar(&self, calendar: &Calendar) -> Result<()> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        let now = Utc::now().timestamp();

        conn.execute(
            "INSERT INTO calendars (
                id, user_id, provider_calendar_id, display_name, sync_token,
                oldest_synced, newest_synced, sync_failure_count, last_sync_at,
                is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)
            ON CONFLICT(id) DO UPDATE SET
                display_name = excluded.display_name,
                sync_token = excluded.sync_token,
                oldest_synced = excluded.oldest_synced,
                newest_synced = excluded.newest_synced,
                sync_failure_count = excluded.sync_failure_count,
                last_sync_at = excluded.last_sync_at,
                is_active = excluded.is_active,
                updated_at = excluded.updated_at",
            params![
                calendar.id,
                calendar.user_id,
                calendar.provider_calendar_id,
                calendar.display_name,
                calendar.sync_token,
                calendar.oldest_synced.map(|t| t.timestamp()),
                calendar.newest_synced.map(|t| t.timestamp()),
                calendar.sync_failure_count,
                calendar.last_sync_at.map(|t| t.timestamp()),
                calendar.is_active,
                now,
            ],
        )
        .map_err(InfraError::from)?;
        Ok(())
    }
}
