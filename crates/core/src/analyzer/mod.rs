//! Time-entry analyzer
//!
//! Pure function from `(date, classified events, rounding config)` to one
//! computed time entry per project. Hours come from the union of the events'
//! wall-clock intervals, not their sum: a 9:00-9:30 event and a 9:15-10:00
//! event together occupy one hour, and billing reflects that.
//!
//! No I/O, no storage; idempotent by construction.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use hourmark_domain::{
    AuditedEvent, CalculationDetails, CalendarEvent, ComputedTimeEntry, RoundingApplied,
    RoundingConfig, TimeRange,
};

const TITLE_MAX_CHARS: usize = 50;

/// Aggregate classified events for one date into per-project entries.
///
/// Events must already carry a project assignment; skipped and orphaned
/// events are dropped. All-day events contribute zero minutes but appear in
/// the audit trail. Output is ordered by project id.
pub fn analyze(
    date: NaiveDate,
    events: &[CalendarEvent],
    rounding: &RoundingConfig,
) -> Vec<ComputedTimeEntry> {
    let mut by_project: BTreeMap<&str, Vec<&CalendarEvent>> = BTreeMap::new();
    for event in events {
        if event.is_skipped || event.is_orphaned {
            continue;
        }
        let Some(project_id) = event.project_id.as_deref() else {
            continue;
        };
        if !event.is_assigned() {
            continue;
        }
        by_project.entry(project_id).or_default().push(event);
    }

    by_project
        .into_iter()
        .map(|(project_id, mut group)| {
            group.sort_by_key(|e| (e.start, e.end, e.id.clone()));
            aggregate_project(project_id, date, &group, rounding)
        })
        .collect()
}

fn aggregate_project(
    project_id: &str,
    date: NaiveDate,
    events: &[&CalendarEvent],
    rounding: &RoundingConfig,
) -> ComputedTimeEntry {
    let audited: Vec<AuditedEvent> = events
        .iter()
        .map(|e| AuditedEvent {
            id: e.id.clone(),
            title: e.title.clone(),
            start: e.start,
            end: e.end,
            raw_minutes: e.duration_minutes(),
            is_all_day: e.is_all_day,
        })
        .collect();

    let timed: Vec<&CalendarEvent> = events.iter().copied().filter(|e| !e.is_all_day).collect();
    let time_ranges = union_ranges(&timed);
    let union_minutes: i64 = time_ranges.iter().map(TimeRange::minutes).sum();

    let (final_minutes, applied) = apply_rounding(union_minutes, rounding);

    let titles: Vec<&str> = events.iter().map(|e| e.title.as_str()).collect();

    ComputedTimeEntry {
        project_id: project_id.to_string(),
        date,
        hours: final_minutes as f64 / 60.0,
        title: compose_title(&titles),
        description: compose_description(&titles),
        contributing_event_ids: events.iter().map(|e| e.id.clone()).collect(),
        details: CalculationDetails {
            events: audited,
            time_ranges,
            union_minutes,
            rounding_applied: applied.as_str().to_string(),
            final_minutes,
        },
    }
}

/// Merge overlapping or touching intervals into disjoint ranges.
///
/// Input must be sorted by start; `current.end >= next.start` extends the
/// current range.
fn union_ranges(sorted: &[&CalendarEvent]) -> Vec<TimeRange> {
    let mut merged: Vec<TimeRange> = Vec::new();
    for event in sorted {
        if event.end <= event.start {
            continue;
        }
        match merged.last_mut() {
            Some(current) if current.end >= event.start => {
                if event.end > current.end {
                    current.end = event.end;
                }
            }
            _ => merged.push(TimeRange { start: event.start, end: event.end }),
        }
    }
    merged
}

/// Apply billing rounding to union minutes.
///
/// `r = minutes mod granularity`; no change when `r == 0`, round down when
/// `r < threshold`, round up otherwise. A non-positive granularity disables
/// rounding.
pub fn apply_rounding(minutes: i64, config: &RoundingConfig) -> (i64, RoundingApplied) {
    if config.granularity_minutes <= 0 {
        return (minutes, RoundingApplied::None);
    }
    let remainder = minutes % config.granularity_minutes;
    if remainder == 0 {
        (minutes, RoundingApplied::None)
    } else if remainder < config.threshold_minutes {
        (minutes - remainder, RoundingApplied::Down)
    } else {
        (minutes + config.granularity_minutes - remainder, RoundingApplied::Up)
    }
}

/// First event's title, truncated, with a `+N more` suffix when further
/// distinct titles exist.
fn compose_title(titles: &[&str]) -> String {
    let Some(first) = titles.first() else {
        return String::new();
    };

    let mut title: String = first.chars().take(TITLE_MAX_CHARS).collect();
    if first.chars().count() > TITLE_MAX_CHARS {
        title.push('…');
    }

    let extra = distinct_titles(titles).len().saturating_sub(1);
    if extra > 0 {
        title.push_str(&format!(" +{extra} more"));
    }
    title
}

/// Deduplicated, comma-joined event titles.
fn compose_description(titles: &[&str]) -> String {
    distinct_titles(titles).join(", ")
}

fn distinct_titles<'a>(titles: &[&'a str]) -> Vec<&'a str> {
    let mut seen = Vec::new();
    for title in titles {
        if !seen.contains(title) {
            seen.push(title);
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use hourmark_domain::{
        ClassificationSource, ClassificationStatus, ResponseStatus, Transparency,
    };

    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 15).unwrap()
    }

    fn event(id: &str, project: &str, title: &str, start_hm: (u32, u32), end_hm: (u32, u32)) -> CalendarEvent {
        CalendarEvent {
            id: id.into(),
            calendar_id: "cal-1".into(),
            user_id: "user-1".into(),
            provider_event_id: format!("prov-{id}"),
            title: title.into(),
            description: None,
            start: Utc.with_ymd_and_hms(2026, 1, 15, start_hm.0, start_hm.1, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2026, 1, 15, end_hm.0, end_hm.1, 0).unwrap(),
            is_all_day: false,
            attendees: vec![],
            response_status: ResponseStatus::Accepted,
            transparency: Transparency::Opaque,
            is_recurring: false,
            recurrence_key: None,
            meeting_link: None,
            meeting_platform: None,
            classification_status: ClassificationStatus::Classified,
            project_id: Some(project.into()),
            classification_source: Some(ClassificationSource::Rule),
            confidence: Some(1.0),
            is_skipped: false,
            is_orphaned: false,
            votes: vec![],
            updated_at: Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap(),
        }
    }

    fn default_rounding() -> RoundingConfig {
        RoundingConfig { granularity_minutes: 15, threshold_minutes: 1 }
    }

    #[test]
    fn overlapping_events_bill_union_not_sum() {
        // 09:00-09:30 and 09:15-10:00 sum to 1.25h but occupy 1.0h
        let events = vec![
            event("a", "p1", "Standup", (9, 0), (9, 30)),
            event("b", "p1", "Planning", (9, 15), (10, 0)),
        ];

        let entries = analyze(date(), &events, &default_rounding());
        assert_eq!(entries.len(), 1);

        let entry = &entries[0];
        assert!((entry.hours - 1.0).abs() < f64::EPSILON);
        assert_eq!(entry.details.union_minutes, 60);
        assert_eq!(entry.details.rounding_applied, "none");
        assert_eq!(entry.details.time_ranges.len(), 1);
        assert_eq!(
            entry.details.time_ranges[0],
            TimeRange {
                start: Utc.with_ymd_and_hms(2026, 1, 15, 9, 0, 0).unwrap(),
                end: Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
            }
        );
    }

    #[test]
    fn touching_intervals_merge() {
        let events = vec![
            event("a", "p1", "Call", (9, 0), (9, 30)),
            event("b", "p1", "Debrief", (9, 30), (10, 0)),
        ];
        let entries = analyze(date(), &events, &default_rounding());
        assert_eq!(entries[0].details.time_ranges.len(), 1);
        assert_eq!(entries[0].details.union_minutes, 60);
    }

    #[test]
    fn disjoint_intervals_stay_separate() {
        let events = vec![
            event("a", "p1", "Call", (9, 0), (9, 30)),
            event("b", "p1", "Review", (11, 0), (11, 45)),
        ];
        let entries = analyze(date(), &events, &default_rounding());
        assert_eq!(entries[0].details.time_ranges.len(), 2);
        assert_eq!(entries[0].details.union_minutes, 75);
        assert!((entries[0].hours - 1.25).abs() < f64::EPSILON);
    }

    #[test]
    fn partitions_by_project() {
        let events = vec![
            event("a", "p1", "Call", (9, 0), (10, 0)),
            event("b", "p2", "Review", (10, 0), (11, 0)),
        ];
        let entries = analyze(date(), &events, &default_rounding());
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].project_id, "p1");
        assert_eq!(entries[1].project_id, "p2");
    }

    #[test]
    fn skipped_events_are_dropped_entirely() {
        let mut skipped = event("a", "p1", "Declined", (9, 0), (10, 0));
        skipped.is_skipped = true;
        skipped.classification_status = ClassificationStatus::Skipped;

        let entries = analyze(date(), &[skipped], &default_rounding());
        assert!(entries.is_empty());
    }

    #[test]
    fn orphaned_events_are_dropped() {
        let mut orphaned = event("a", "p1", "Gone", (9, 0), (10, 0));
        orphaned.is_orphaned = true;

        let entries = analyze(date(), &[orphaned], &default_rounding());
        assert!(entries.is_empty());
    }

    #[test]
    fn all_day_event_contributes_zero_minutes_but_audits() {
        let mut all_day = event("a", "p1", "Conference", (0, 0), (0, 0));
        all_day.is_all_day = true;

        let entries = analyze(date(), &[all_day], &default_rounding());
        assert_eq!(entries.len(), 1);

        let entry = &entries[0];
        assert!(entry.hours.abs() < f64::EPSILON);
        assert!(entry.details.time_ranges.is_empty());
        assert_eq!(entry.details.events.len(), 1);
        assert!(entry.details.events[0].is_all_day);
        assert_eq!(entry.details.events[0].raw_minutes, 0);
    }

    #[test]
    fn unclassified_events_are_ignored() {
        let mut pending = event("a", "p1", "Maybe", (9, 0), (10, 0));
        pending.classification_status = ClassificationStatus::Pending;
        pending.project_id = None;

        let entries = analyze(date(), &[pending], &default_rounding());
        assert!(entries.is_empty());
    }

    #[test]
    fn needs_review_events_still_aggregate() {
        let mut review = event("a", "p1", "Probably", (9, 0), (10, 0));
        review.classification_status = ClassificationStatus::NeedsReview;

        let entries = analyze(date(), &[review], &default_rounding());
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn empty_input_yields_empty_result() {
        let entries = analyze(date(), &[], &default_rounding());
        assert!(entries.is_empty());
    }

    #[test]
    fn rounding_boundaries() {
        let config = default_rounding();
        assert_eq!(apply_rounding(1, &config), (15, RoundingApplied::Up));
        assert_eq!(apply_rounding(14, &config), (15, RoundingApplied::Up));
        assert_eq!(apply_rounding(15, &config), (15, RoundingApplied::None));
        assert_eq!(apply_rounding(16, &config), (30, RoundingApplied::Up));
        assert_eq!(apply_rounding(0, &config), (0, RoundingApplied::None));
    }

    #[test]
    fn rounding_down_below_threshold() {
        let config = RoundingConfig { granularity_minutes: 15, threshold_minutes: 8 };
        assert_eq!(apply_rounding(62, &config), (60, RoundingApplied::Down));
        assert_eq!(apply_rounding(68, &config), (75, RoundingApplied::Up));
    }

    #[test]
    fn zero_granularity_disables_rounding() {
        let config = RoundingConfig { granularity_minutes: 0, threshold_minutes: 1 };
        assert_eq!(apply_rounding(37, &config), (37, RoundingApplied::None));
    }

    #[test]
    fn title_truncates_and_counts_extras() {
        let long = "A very long meeting title that certainly exceeds the fifty character budget";
        let events = vec![
            event("a", "p1", long, (9, 0), (9, 30)),
            event("b", "p1", "Second", (10, 0), (10, 30)),
            event("c", "p1", "Third", (11, 0), (11, 30)),
            event("d", "p1", "Second", (12, 0), (12, 30)),
        ];

        let entries = analyze(date(), &events, &default_rounding());
        let title = &entries[0].title;
        assert!(title.starts_with("A very long meeting title"));
        assert!(title.contains('…'));
        // "Second" appears twice but counts once
        assert!(title.ends_with("+2 more"), "got {title:?}");
    }

    #[test]
    fn description_is_deduplicated_join() {
        let events = vec![
            event("a", "p1", "Standup", (9, 0), (9, 15)),
            event("b", "p1", "Standup", (9, 30), (9, 45)),
            event("c", "p1", "Review", (10, 0), (10, 30)),
        ];
        let entries = analyze(date(), &events, &default_rounding());
        assert_eq!(entries[0].description, "Standup, Review");
    }
}
