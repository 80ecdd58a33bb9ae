//! Query evaluator
//!
//! Evaluates a parsed [`Query`] against an event plus its surrounding
//! context. Every property accessor is total: missing data evaluates to
//! false, and unknown properties evaluate to false rather than erroring.

use chrono::{Datelike, NaiveTime, Timelike, Weekday};
use hourmark_domain::{
    CalendarEvent, ClassificationConfig, ClassificationStatus, Project,
};

use super::ast::{Condition, Query};

/// Everything a condition may look at while evaluating one event
///
/// `project` is the event's currently assigned project (for the extended
/// `project`/`client` search properties); `thresholds` supplies the
/// confidence bands for `confidence:high|medium|low`.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub event: &'a CalendarEvent,
    pub calendar_name: &'a str,
    pub project: Option<&'a Project>,
    pub thresholds: ClassificationConfig,
}

impl<'a> EvalContext<'a> {
    #[must_use]
    pub fn new(event: &'a CalendarEvent, calendar_name: &'a str) -> Self {
        Self { event, calendar_name, project: None, thresholds: ClassificationConfig::default() }
    }

    #[must_use]
    pub fn with_project(mut self, project: Option<&'a Project>) -> Self {
        self.project = project;
        self
    }

    #[must_use]
    pub fn with_thresholds(mut self, thresholds: ClassificationConfig) -> Self {
        self.thresholds = thresholds;
        self
    }
}

/// Evaluate a query against an event context.
pub fn evaluate(query: &Query, ctx: &EvalContext<'_>) -> bool {
    match query {
        Query::Condition(c) => {
            let matched = eval_condition(c, ctx);
            if c.negated {
                !matched
            } else {
                matched
            }
        }
        Query::And(parts) => parts.iter().all(|p| evaluate(p, ctx)),
        Query::Or(parts) => parts.iter().any(|p| evaluate(p, ctx)),
    }
}

fn eval_condition(c: &Condition, ctx: &EvalContext<'_>) -> bool {
    let event = ctx.event;
    let value = c.value.as_str();

    match c.prop.as_str() {
        "title" => word_match(&event.title, value),
        "description" => event.description.as_deref().is_some_and(|d| word_match(d, value)),
        "text" => {
            word_match(&event.title, value)
                || event.description.as_deref().is_some_and(|d| word_match(d, value))
        }
        "attendees" => event.attendees.iter().any(|a| {
            contains_ci(&a.email, value)
                || a.display_name.as_deref().is_some_and(|n| contains_ci(n, value))
        }),
        "email" => event.attendees.iter().any(|a| a.email.eq_ignore_ascii_case(value)),
        "domain" => {
            let wanted = value.to_ascii_lowercase();
            event.attendees.iter().any(|a| a.domain().as_deref() == Some(wanted.as_str()))
        }
        "response" => event.response_status.as_str().eq_ignore_ascii_case(value),
        "transparency" => event.transparency.as_str().eq_ignore_ascii_case(value),
        "recurring" => bool_value(value).is_some_and(|b| event.is_recurring == b),
        "has-attendees" => bool_value(value).is_some_and(|b| !event.attendees.is_empty() == b),
        "is-all-day" => bool_value(value).is_some_and(|b| event.is_all_day == b),
        "day-of-week" => day_matches(event.start.weekday(), value),
        "time-of-day" => time_matches(event.start.time(), value),
        "calendar" => word_match(ctx.calendar_name, value),
        // Extended properties, meaningful when evaluating classified events
        "project" => ctx.project.is_some_and(|p| {
            word_match(&p.name, value)
                || p.short_code.as_deref().is_some_and(|s| s.eq_ignore_ascii_case(value))
        }),
        "client" => ctx
            .project
            .and_then(|p| p.client_name.as_deref())
            .is_some_and(|client| word_match(client, value)),
        "confidence" => confidence_matches(event.confidence, value, ctx.thresholds),
        "status" => status_matches(event.classification_status, value),
        _ => false,
    }
}

/// Word-boundary containment for single-word values; case-insensitive
/// substring match for multi-word values.
///
/// A single-word value matches only when the occurrence is surrounded by
/// non-alphanumeric characters (or the string boundary), so "AC" does not
/// match inside "Jack".
fn word_match(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    if needle.chars().any(char::is_whitespace) {
        return contains_ci(haystack, needle);
    }

    let hay = haystack.to_lowercase();
    let ned = needle.to_lowercase();
    let mut from = 0;
    while let Some(offset) = hay[from..].find(&ned) {
        let at = from + offset;
        let before_ok = hay[..at].chars().next_back().map_or(true, |ch| !ch.is_alphanumeric());
        let after_ok =
            hay[at + ned.len()..].chars().next().map_or(true, |ch| !ch.is_alphanumeric());
        if before_ok && after_ok {
            return true;
        }
        // Step forward one character and keep scanning
        from = at + hay[at..].chars().next().map_or(1, char::len_utf8);
    }
    false
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn bool_value(value: &str) -> Option<bool> {
    if value.eq_ignore_ascii_case("yes") || value.eq_ignore_ascii_case("true") {
        Some(true)
    } else if value.eq_ignore_ascii_case("no") || value.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

fn day_matches(weekday: Weekday, value: &str) -> bool {
    let (full, abbrev) = match weekday {
        Weekday::Mon => ("monday", "mon"),
        Weekday::Tue => ("tuesday", "tue"),
        Weekday::Wed => ("wednesday", "wed"),
        Weekday::Thu => ("thursday", "thu"),
        Weekday::Fri => ("friday", "fri"),
        Weekday::Sat => ("saturday", "sat"),
        Weekday::Sun => ("sunday", "sun"),
    };
    value.eq_ignore_ascii_case(full) || value.eq_ignore_ascii_case(abbrev)
}

/// Accepts `HH:MM`, `>HH:MM`, `>=HH:MM`, `<HH:MM`, `<=HH:MM`.
fn time_matches(time: NaiveTime, value: &str) -> bool {
    let (op, rest) = if let Some(rest) = value.strip_prefix(">=") {
        (">=", rest)
    } else if let Some(rest) = value.strip_prefix("<=") {
        ("<=", rest)
    } else if let Some(rest) = value.strip_prefix('>') {
        (">", rest)
    } else if let Some(rest) = value.strip_prefix('<') {
        ("<", rest)
    } else {
        ("=", value)
    };

    let Ok(target) = NaiveTime::parse_from_str(rest, "%H:%M") else {
        return false;
    };

    let minutes = i64::from(time.hour()) * 60 + i64::from(time.minute());
    let target_minutes = i64::from(target.hour()) * 60 + i64::from(target.minute());

    match op {
        ">" => minutes > target_minutes,
        ">=" => minutes >= target_minutes,
        "<" => minutes < target_minutes,
        "<=" => minutes <= target_minutes,
        _ => minutes == target_minutes,
    }
}

fn confidence_matches(
    confidence: Option<f64>,
    value: &str,
    thresholds: ClassificationConfig,
) -> bool {
    let Some(c) = confidence else {
        return false;
    };
    match value.to_ascii_lowercase().as_str() {
        "high" => c >= thresholds.ceiling,
        "medium" => c >= thresholds.floor && c < thresholds.ceiling,
        "low" => c < thresholds.floor,
        _ => false,
    }
}

fn status_matches(status: ClassificationStatus, value: &str) -> bool {
    match value.to_ascii_lowercase().as_str() {
        "pending" => status == ClassificationStatus::Pending,
        // Review-flagged events still carry a project, so they count as
        // classified for search purposes
        "classified" => {
            matches!(status, ClassificationStatus::Classified | ClassificationStatus::NeedsReview)
        }
        "needs_review" | "needs-review" => status == ClassificationStatus::NeedsReview,
        "skipped" => status == ClassificationStatus::Skipped,
        _ => false,
    }
}
