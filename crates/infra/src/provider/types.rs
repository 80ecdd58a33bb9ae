//! Wire DTOs for the provider REST API and their domain conversions.

use chrono::{DateTime, NaiveDate, Utc};
use hourmark_domain::{
    HourmarkError, ProviderAttendee, ProviderEvent, ResponseStatus, Result, Transparency,
};
use serde::Deserialize;

use super::platform::detect_meeting_platform;

/// One page of an events listing
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsPageDto {
    #[serde(default)]
    pub items: Vec<EventDto>,
    pub next_page_token: Option<String>,
    pub next_sync_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDto {
    pub id: String,
    /// "confirmed" | "tentative" | "cancelled"; cancelled rows are delete
    /// tombstones in incremental feeds
    pub status: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub start: Option<EventTimeDto>,
    pub end: Option<EventTimeDto>,
    #[serde(default)]
    pub attendees: Vec<AttendeeDto>,
    pub organizer: Option<OrganizerDto>,
    pub transparency: Option<String>,
    pub visibility: Option<String>,
    pub recurring_event_id: Option<String>,
    #[serde(default)]
    pub recurrence: Vec<String>,
    pub hangout_link: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTimeDto {
    /// All-day form: `YYYY-MM-DD`
    pub date: Option<String>,
    /// Timed form: RFC 3339
    pub date_time: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendeeDto {
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub response_status: Option<String>,
    #[serde(rename = "self", default)]
    pub is_self: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizerDto {
    pub email: Option<String>,
}

impl EventDto {
    /// Convert a wire event into the provider-neutral domain form.
    pub fn into_provider_event(self) -> Result<ProviderEvent> {
        let is_deleted = self.status.as_deref() == Some("cancelled");

        // Tombstones often carry no times; anchor them at the epoch
        let (start, is_all_day) = match &self.start {
            Some(time) => parse_event_time(time, "start")?,
            None if is_deleted => (DateTime::<Utc>::UNIX_EPOCH, false),
            None => {
                return Err(HourmarkError::InvalidInput(format!(
                    "event {} missing start time",
                    self.id
                )))
            }
        };
        let end = match &self.end {
            Some(time) => parse_event_time(time, "end")?.0,
            None => start,
        };

        let attendees: Vec<ProviderAttendee> = self
            .attendees
            .iter()
            .filter_map(|a| {
                a.email.as_ref().map(|email| ProviderAttendee {
                    email: email.clone(),
                    display_name: a.display_name.clone(),
                    response_status: a
                        .response_status
                        .as_deref()
                        .map(normalize_response)
                        .unwrap_or_default(),
                })
            })
            .collect();

        // The owner's own RSVP is flagged with `self` on the wire
        let response_status = self
            .attendees
            .iter()
            .find(|a| a.is_self)
            .and_then(|a| a.response_status.as_deref())
            .map(normalize_response)
            .unwrap_or_default();

        let is_recurring = self.recurring_event_id.is_some() || !self.recurrence.is_empty();

        Ok(ProviderEvent {
            provider_event_id: self.id,
            title: self.summary.unwrap_or_else(|| "Untitled Event".to_string()),
            description: self.description,
            start,
            end,
            is_all_day,
            attendees,
            organizer_email: self.organizer.and_then(|o| o.email),
            response_status,
            transparency: self
                .transparency
                .as_deref()
                .map(Transparency::parse)
                .unwrap_or_default(),
            visibility: self.visibility,
            is_recurring,
            recurrence_key: self.recurring_event_id,
            meeting_link: self.hangout_link,
            is_deleted,
        })
    }
}

fn normalize_response(wire: &str) -> ResponseStatus {
    match wire {
        "accepted" => ResponseStatus::Accepted,
        "declined" => ResponseStatus::Declined,
        "tentative" => ResponseStatus::Tentative,
        _ => ResponseStatus::NeedsAction,
    }
}

/// Parse either the all-day (`date`) or timed (`dateTime`) form.
/// Returns `(timestamp, is_all_day)`.
fn parse_event_time(time: &EventTimeDto, field: &str) -> Result<(DateTime<Utc>, bool)> {
    if let Some(date_time) = time.date_time.as_deref() {
        let parsed = DateTime::parse_from_rfc3339(date_time).map_err(|e| {
            HourmarkError::InvalidInput(format!("invalid {field} timestamp '{date_time}': {e}"))
        })?;
        return Ok((parsed.with_timezone(&Utc), false));
    }
    if let Some(date) = time.date.as_deref() {
        let parsed = NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|e| {
            HourmarkError::InvalidInput(format!("invalid all-day {field} date '{date}': {e}"))
        })?;
        let midnight = parsed.and_hms_opt(0, 0, 0).ok_or_else(|| {
            HourmarkError::InvalidInput(format!("invalid all-day {field} date '{date}'"))
        })?;
        return Ok((midnight.and_utc(), true));
    }
    Err(HourmarkError::InvalidInput(format!("{field} carries neither date nor dateTime")))
}

/// Derive the meeting platform for a converted event.
pub fn platform_for(event: &ProviderEvent) -> Option<String> {
    detect_meeting_platform(event.meeting_link.as_deref(), event.description.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timed(dt: &str) -> EventTimeDto {
        EventTimeDto { date: None, date_time: Some(dt.to_string()) }
    }

    #[test]
    fn timed_event_parses_to_utc() {
        let dto = EventDto {
            id: "e1".into(),
            status: Some("confirmed".into()),
            summary: Some("Standup".into()),
            description: None,
            start: Some(timed("2026-01-15T09:00:00+01:00")),
            end: Some(timed("2026-01-15T09:30:00+01:00")),
            attendees: vec![],
            organizer: None,
            transparency: None,
            visibility: None,
            recurring_event_id: None,
            recurrence: vec![],
            hangout_link: None,
        };

        let event = dto.into_provider_event().unwrap();
        assert_eq!(event.start.to_rfc3339(), "2026-01-15T08:00:00+00:00");
        assert!(!event.is_all_day);
        assert!(!event.is_deleted);
    }

    #[test]
    fn all_day_event_uses_date_form() {
        let dto = EventDto {
            id: "e1".into(),
            status: None,
            summary: Some("Conference".into()),
            description: None,
            start: Some(EventTimeDto { date: Some("2026-01-15".into()), date_time: None }),
            end: Some(EventTimeDto { date: Some("2026-01-16".into()), date_time: None }),
            attendees: vec![],
            organizer: None,
            transparency: None,
            visibility: None,
            recurring_event_id: None,
            recurrence: vec![],
            hangout_link: None,
        };

        let event = dto.into_provider_event().unwrap();
        assert!(event.is_all_day);
    }

    #[test]
    fn cancelled_event_is_tombstone() {
        let dto = EventDto {
            id: "e1".into(),
            status: Some("cancelled".into()),
            summary: None,
            description: None,
            start: None,
            end: None,
            attendees: vec![],
            organizer: None,
            transparency: None,
            visibility: None,
            recurring_event_id: None,
            recurrence: vec![],
            hangout_link: None,
        };

        let event = dto.into_provider_event().unwrap();
        assert!(event.is_deleted);
    }

    #[test]
    fn self_attendee_sets_event_response() {
        let dto = EventDto {
            id: "e1".into(),
            status: None,
            summary: Some("Sync".into()),
            description: None,
            start: Some(timed("2026-01-15T09:00:00Z")),
            end: Some(timed("2026-01-15T10:00:00Z")),
            attendees: vec![
                AttendeeDto {
                    email: Some("alice@acme.com".into()),
                    display_name: None,
                    response_status: Some("accepted".into()),
                    is_self: false,
                },
                AttendeeDto {
                    email: Some("me@example.com".into()),
                    display_name: None,
                    response_status: Some("declined".into()),
                    is_self: true,
                },
            ],
            organizer: None,
            transparency: None,
            visibility: None,
            recurring_event_id: None,
            recurrence: vec![],
            hangout_link: None,
        };

        let event = dto.into_provider_event().unwrap();
        assert_eq!(event.response_status, ResponseStatus::Declined);
        assert_eq!(event.attendees.len(), 2);
    }
}
