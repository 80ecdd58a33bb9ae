//! SQLite implementation of the TimeEntryRepository port.
//!
//! Only materialized entries live here; the unique
//! `(user_id, project_id, entry_date)` constraint enforces the one-entry-
//! per-project-per-day invariant at the storage layer.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use hourmark_core::timesheet::ports::TimeEntryRepository;
use hourmark_domain::{CalculationDetails, Result, TimeEntry};
use rusqlite::{params, Row};
use tracing::{debug, instrument};

use super::manager::{optional, DbPool};
use super::ts_to_datetime;
use crate::errors::InfraError;

/// SQLite implementation of [`TimeEntryRepository`]
pub struct SqliteTimeEntryRepository {
    pool: DbPool,
}

impl SqliteTimeEntryRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const COLUMNS: &str = "id, user_id, project_id, entry_date, computed_hours, user_hours,
    computed_title, user_title, computed_description, has_user_edits,
    contributing_event_ids, calculation_details, snapshot_computed_hours,
    snapshot_computed_title, is_stale, invoice_id, updated_at";

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<TimeEntry> {
    let date_text: String = row.get(3)?;
    let event_ids_json: String = row.get(10)?;
    let details_json: String = row.get(11)?;

    Ok(TimeEntry {
        id: row.get(0)?,
        user_id: row.get(1)?,
        project_id: row.get(2)?,
        date: date_text.parse().unwrap_or(NaiveDate::MIN),
        computed_hours: row.get(4)?,
        user_hours: row.get(5)?,
        computed_title: row.get(6)?,
        user_title: row.get(7)?,
        computed_description: row.get(8)?,
        has_user_edits: row.get(9)?,
        contributing_event_ids: serde_json::from_str(&event_ids_json).unwrap_or_default(),
        calculation_details: serde_json::from_str(&details_json)
            .unwrap_or_else(|_| CalculationDetails::default()),
        snapshot_computed_hours: row.get(12)?,
        snapshot_computed_title: row.get(13)?,
        is_stale: row.get(14)?,
        invoice_id: row.get(15)?,
        is_ephemeral: false,
        updated_at: ts_to_datetime(row.get(16)?),
    })
}

#[async_trait]
impl TimeEntryRepository for SqliteTimeEntryRepository {
    #[instrument(skip(self))]
    async fn list_entries(
        &self,
        user_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<TimeEntry>> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {COLUMNS} FROM time_entries
                 WHERE user_id = ?1 AND entry_date >= ?2 AND entry_date <= ?3
                 ORDER BY entry_date ASC, project_id ASC"
            ))
            .map_err(InfraError::from)?;
        let rows = stmt
            .query_map(params![user_id, from.to_string(), to.to_string()], row_to_entry)
            .map_err(InfraError::from)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(InfraError::from)?;
        Ok(rows)
    }

    #[instrument(skip(self))]
    async fn get_entry(&self, user_id: &str, entry_id: &str) -> Result<Option<TimeEntry>> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        optional(conn.query_row(
            &format!("SELECT {COLUMNS} FROM time_entries WHERE user_id = ?1 AND id = ?2"),
            params![user_id, entry_id],
            row_to_entry,
        ))
    }

    #[instrument(skip(self))]
    async fn find_entry(
        &self,
        user_id: &str,
        project_id: &str,
        date: NaiveDate,
    ) -> Result<Option<TimeEntry>> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        optional(conn.query_row(
            &format!(
                "SELECT {COLUMNS} FROM time_entries
                 WHERE user_id = ?1 AND project_id = ?2 AND entry_date = ?3"
            ),
            params![user_id, project_id, date.to_string()],
            row_to_entry,
        ))
    }

    #[instrument(skip(self, entry), fields(entry_id = %entry.id))]
    async fn save_entry(&self, entry: &TimeEntry) -> Result<()> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        let event_ids =
            serde_json::to_string(&entry.contributing_event_ids).map_err(InfraError::from)?;
        let details =
            serde_json::to_string(&entry.calculation_details).map_err(InfraError::from)?;
        let now = Utc::now().timestamp();

        conn.execute(
            "INSERT INTO time_entries (
                id, user_id, project_id, entry_date, computed_hours, user_hours,
                computed_title, user_title, computed_description, has_user_edits,
                contributing_event_ids, calculation_details, snapshot_computed_hours,
                snapshot_computed_title, is_stale, invoice_id, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            ON CONFLICT(id) DO UPDATE SET
                computed_hours = excluded.computed_hours,
                user_hours = excluded.user_hours,
                computed_title = excluded.computed_title,
                user_title = excluded.user_title,
                computed_description = excluded.computed_description,
                has_user_edits = excluded.has_user_edits,
                contributing_event_ids = excluded.contributing_event_ids,
                calculation_details = excluded.calculation_details,
                snapshot_computed_hours = excluded.snapshot_computed_hours,
                snapshot_computed_title = excluded.snapshot_computed_title,
                is_stale = excluded.is_stale,
                invoice_id = excluded.invoice_id,
                updated_at = excluded.updated_at",
            params![
                entry.id,
                entry.user_id,
                entry.project_id,
                entry.date.to_string(),
                entry.computed_hours,
                entry.user_hours,
                entry.computed_title,
                entry.user_title,
                entry.computed_description,
                entry.has_user_edits,
                event_ids,
                details,
                entry.snapshot_computed_hours,
                entry.snapshot_computed_title,
                entry.is_stale,
                entry.invoice_id,
                now,
            ],
        )
        .map_err(InfraError::from)?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_entry(&self, user_id: &str, entry_id: &str) -> Result<bool> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        let deleted = conn
            .execute(
                "DELETE FROM time_entries WHERE user_id = ?1 AND id = ?2",
                params![user_id, entry_id],
            )
            .map_err(InfraError::from)?;
        Ok(deleted > 0)
    }

    #[instrument(skip(self))]
    async fn mark_stale_for_event(&self, event_id: &str) -> Result<usize> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        // Locked entries are immutable; everything else referencing the
        // event must recompute on next read
        let touched = conn
            .execute(
                "UPDATE time_entries
                 SET is_stale = 1,
                     updated_at = CAST(strftime('%s','now') AS INTEGER)
                 WHERE invoice_id IS NULL
                   AND contributing_event_ids LIKE '%\"' || ?1 || '\"%'",
                params![event_id],
            )
            .map_err(InfraError::from)?;
        if touched > 0 {
            debug!(event_id, touched, "marked time entries stale");
        }
        Ok(touched)
    }
}
