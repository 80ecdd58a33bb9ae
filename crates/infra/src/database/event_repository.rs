//! SQLite implementation of the EventRepository port.
//!
//! The `(calendar_id, provider_event_id)` unique constraint makes sync
//! reconciliation idempotent: re-applying the same provider payload UPSERTs
//! into the same rows.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hourmark_core::classification::ports::EventRepository;
use hourmark_domain::{
    Attendee, CalendarEvent, ClassificationSource, ClassificationStatus, DateRange,
    ResponseStatus, Result, Transparency, Vote,
};
use rusqlite::{params, Row};
use tracing::{debug, instrument};

use super::manager::{optional, DbPool};
use super::ts_to_datetime;
use crate::errors::InfraError;

/// SQLite implementation of [`EventRepository`]
pub struct SqliteEventRepository {
    pool: DbPool,
}

impl SqliteEventRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const COLUMNS: &str = "id, calendar_id, user_id, provider_event_id, title, description,
    start_ts, end_ts, is_all_day, attendees, response_status, transparency,
    is_recurring, recurrence_key, meeting_link, meeting_platform,
    classification_status, project_id, classification_source, confidence,
    is_skipped, is_orphaned, votes, updated_at";

fn row_to_event(row: &Row<'_>) -> rusqlite::Result<CalendarEvent> {
    let attendees_json: String = row.get(9)?;
    let attendees: Vec<Attendee> = serde_json::from_str(&attendees_json).unwrap_or_default();
    let response: String = row.get(10)?;
    let transparency: String = row.get(11)?;
    let status: String = row.get(16)?;
    let source: Option<String> = row.get(18)?;
    let votes_json: String = row.get(22)?;
    let votes: Vec<Vote> = serde_json::from_str(&votes_json).unwrap_or_default();

    Ok(CalendarEvent {
        id: row.get(0)?,
        calendar_id: row.get(1)?,
        user_id: row.get(2)?,
        provider_event_id: row.get(3)?,
        title: row.get(4)?,
        description: row.get(5)?,
        start: ts_to_datetime(row.get(6)?),
        end: ts_to_datetime(row.get(7)?),
        is_all_day: row.get(8)?,
        attendees,
        response_status: ResponseStatus::parse(&response),
        transparency: Transparency::parse(&transparency),
        is_recurring: row.get(12)?,
        recurrence_key: row.get(13)?,
        meeting_link: row.get(14)?,
        meeting_platform: row.get(15)?,
        classification_status: ClassificationStatus::parse(&status)
            .unwrap_or(ClassificationStatus::Pending),
        project_id: row.get(17)?,
        classification_source: source.as_deref().and_then(ClassificationSource::parse),
        confidence: row.get(19)?,
        is_skipped: row.get(20)?,
        is_orphaned: row.get(21)?,
        votes,
        updated_at: ts_to_datetime(row.get(23)?),
    })
}

#[async_trait]
impl EventRepository for SqliteEventRepository {
    #[instrument(skip(self))]
    async fn get_event(&self, user_id: &str, event_id: &str) -> Result<Option<CalendarEvent>> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        optional(conn.query_row(
            &format!("SELECT {COLUMNS} FROM calendar_events WHERE user_id = ?1 AND id = ?2"),
            params![user_id, event_id],
            row_to_event,
        ))
    }

    #[instrument(skip(self))]
    async fn find_by_provider_id(
        &self,
        calendar_id: &str,
        provider_event_id: &str,
    ) -> Result<Option<CalendarEvent>> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        optional(conn.query_row(
            &format!(
                "SELECT {COLUMNS} FROM calendar_events
                 WHERE calendar_id = ?1 AND provider_event_id = ?2"
            ),
            params![calendar_id, provider_event_id],
            row_to_event,
        ))
    }

    #[instrument(skip(self))]
    async fn list_events_in_range(
        &self,
        user_id: &str,
        range: DateRange,
    ) -> Result<Vec<CalendarEvent>> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {COLUMNS} FROM calendar_events
                 WHERE user_id = ?1 AND start_ts >= ?2 AND start_ts < ?3
                 ORDER BY start_ts ASC, id ASC"
            ))
            .map_err(InfraError::from)?;
        let rows = stmt
            .query_map(
                params![user_id, range.start.timestamp(), range.end.timestamp()],
                row_to_event,
            )
            .map_err(InfraError::from)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(InfraError::from)?;
        Ok(rows)
    }

    #[instrument(skip(self))]
    async fn list_calendar_events_in_range(
        &self,
        calendar_id: &str,
        range: DateRange,
    ) -> Result<Vec<CalendarEvent>> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {COLUMNS} FROM calendar_events
                 WHERE calendar_id = ?1 AND start_ts >= ?2 AND start_ts < ?3
                 ORDER BY start_ts ASC, id ASC"
            ))
            .map_err(InfraError::from)?;
        let rows = stmt
            .query_map(
                params![calendar_id, range.start.timestamp(), range.end.timestamp()],
                row_to_event,
            )
            .map_err(InfraError::from)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(InfraError::from)?;
        Ok(rows)
    }

    #[instrument(skip(self, event), fields(event_id = %event.id))]
    async fn save_event(&self, event: &CalendarEvent) -> Result<()> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        let attendees = serde_json::to_string(&event.attendees).map_err(InfraError::from)?;
        let votes = serde_json::to_string(&event.votes).map_err(InfraError::from)?;
        let now = Utc::now().timestamp();

        conn.execute(
            "INSERT INTO calendar_events (
                id, calendar_id, user_id, provider_event_id, title, description,
                start_ts, end_ts, is_all_day, attendees, response_status, transparency,
                is_recurring, recurrence_key, meeting_link, meeting_platform,
                classification_status, project_id, classification_source, confidence,
                is_skipped, is_orphaned, votes, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                      ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24)
            ON CONFLICT(calendar_id, provider_event_id) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                start_ts = excluded.start_ts,
                end_ts = excluded.end_ts,
                is_all_day = excluded.is_all_day,
                attendees = excluded.attendees,
                response_status = excluded.response_status,
                transparency = excluded.transparency,
                is_recurring = excluded.is_recurring,
                recurrence_key = excluded.recurrence_key,
                meeting_link = excluded.meeting_link,
                meeting_platform = excluded.meeting_platform,
                classification_status = excluded.classification_status,
                project_id = excluded.project_id,
                classification_source = excluded.classification_source,
                confidence = excluded.confidence,
                is_skipped = excluded.is_skipped,
                is_orphaned = excluded.is_orphaned,
                votes = excluded.votes,
                updated_at = excluded.updated_at",
            params![
                event.id,
                event.calendar_id,
                event.user_id,
                event.provider_event_id,
                event.title,
                event.description,
                event.start.timestamp(),
                event.end.timestamp(),
                event.is_all_day,
                attendees,
                event.response_status.as_str(),
                event.transparency.as_str(),
                event.is_recurring,
                event.recurrence_key,
                event.meeting_link,
                event.meeting_platform,
                event.classification_status.as_str(),
                event.project_id,
                event.classification_source.map(ClassificationSource::as_str),
                event.confidence,
                event.is_skipped,
                event.is_orphaned,
                votes,
                now,
            ],
        )
        .map_err(InfraError::from)?;

        debug!(
            provider_event_id = %event.provider_event_id,
            calendar_id = %event.calendar_id,
            "inserted/updated calendar event"
        );
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_unreferenced_before(
        &self,
        calendar_id: &str,
        before: DateTime<Utc>,
    ) -> Result<usize> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        // Events referenced by materialized entries are kept for the audit
        // trail
        let deleted = conn
            .execute(
                "DELETE FROM calendar_events
                 WHERE calendar_id = ?1
                   AND start_ts < ?2
                   AND NOT EXISTS (
                       SELECT 1 FROM time_entries t
                       WHERE t.contributing_event_ids LIKE '%\"' || calendar_events.id || '\"%'
                   )",
                params![calendar_id, before.timestamp()],
            )
            .map_err(InfraError::from)?;
        Ok(deleted)
    }
}
