//! Entity builders shared by the flow tests.

use chrono::{DateTime, TimeZone, Utc};
use hourmark_domain::{
    Calendar, CalendarEvent, ClassificationRule, ClassificationStatus, ClassificationSource,
    Attendee, Project, ProjectFingerprint, ResponseStatus, RuleTarget, Transparency,
};

pub const USER: &str = "user-1";
pub const CALENDAR: &str = "cal-1";

pub fn ts(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, day, hour, minute, 0).unwrap()
}

pub fn calendar() -> Calendar {
    let mut cal = Calendar::new(USER, "primary", "Work");
    cal.id = CALENDAR.into();
    cal
}

pub fn project(id: &str, name: &str) -> Project {
    let mut project = Project::new(USER, name);
    project.id = id.into();
    project
}

pub fn project_with_domain(id: &str, name: &str, domain: &str) -> Project {
    let mut project = project(id, name);
    project.fingerprint = ProjectFingerprint {
        domains: vec![domain.into()],
        emails: vec![],
        keywords: vec![],
    };
    project
}

pub fn rule(id: &str, query: &str, project_id: &str, weight: f64) -> ClassificationRule {
    let mut rule = ClassificationRule::new(USER, query, RuleTarget::Project(project_id.into()), weight);
    rule.id = id.into();
    rule
}

pub fn attendee(email: &str) -> Attendee {
    Attendee { email: email.into(), display_name: None, response_status: ResponseStatus::Accepted }
}

pub fn event(id: &str, title: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> CalendarEvent {
    CalendarEvent {
        id: id.into(),
        calendar_id: CALENDAR.into(),
        user_id: USER.into(),
        provider_event_id: format!("prov-{id}"),
        title: title.into(),
        description: None,
        start,
        end,
        is_all_day: false,
        attendees: vec![],
        response_status: ResponseStatus::Accepted,
        transparency: Transparency::Opaque,
        is_recurring: false,
        recurrence_key: None,
        meeting_link: None,
        meeting_platform: None,
        classification_status: ClassificationStatus::Pending,
        project_id: None,
        classification_source: None,
        confidence: None,
        is_skipped: false,
        is_orphaned: false,
        votes: vec![],
        updated_at: start,
    }
}

pub fn classified_event(
    id: &str,
    title: &str,
    project_id: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> CalendarEvent {
    let mut event = event(id, title, start, end);
    event.classification_status = ClassificationStatus::Classified;
    event.project_id = Some(project_id.into());
    event.classification_source = Some(ClassificationSource::Rule);
    event.confidence = Some(1.0);
    event
}
