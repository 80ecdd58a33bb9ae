//! Port interfaces for classification
//!
//! These traits define the boundaries between core business logic
//! and infrastructure implementations. Every query is scoped to a
//! single user; repositories must never leak rows across tenants.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hourmark_domain::{CalendarEvent, ClassificationRule, DateRange, Project, Result};

/// Repository for projects and their fingerprints
#[async_trait]
pub trait ProjectRepository: Send + Sync {
    /// List all projects for a user (archived included; callers filter).
    async fn list_projects(&self, user_id: &str) -> Result<Vec<Project>>;

    /// Fetch a single project.
    async fn get_project(&self, user_id: &str, project_id: &str) -> Result<Option<Project>>;

    /// Insert or update a project.
    ///
    /// # Errors
    /// Returns `Conflict` when the short code collides with another project
    /// of the same user.
    async fn save_project(&self, project: &Project) -> Result<()>;
}

/// Repository for user-authored classification rules
#[async_trait]
pub trait RuleRepository: Send + Sync {
    async fn list_rules(&self, user_id: &str) -> Result<Vec<ClassificationRule>>;

    /// Only enabled rules, the set the engine evaluates.
    async fn list_enabled_rules(&self, user_id: &str) -> Result<Vec<ClassificationRule>>;

    async fn get_rule(&self, user_id: &str, rule_id: &str) -> Result<Option<ClassificationRule>>;

    async fn save_rule(&self, rule: &ClassificationRule) -> Result<()>;

    /// Returns true when a rule was actually deleted.
    async fn delete_rule(&self, user_id: &str, rule_id: &str) -> Result<bool>;
}

/// Repository for mirrored calendar events
#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn get_event(&self, user_id: &str, event_id: &str) -> Result<Option<CalendarEvent>>;

    /// Natural-key lookup used by sync reconciliation.
    async fn find_by_provider_id(
        &self,
        calendar_id: &str,
        provider_event_id: &str,
    ) -> Result<Option<CalendarEvent>>;

    /// Events whose start falls inside `range`, ordered by start ascending.
    async fn list_events_in_range(
        &self,
        user_id: &str,
        range: DateRange,
    ) -> Result<Vec<CalendarEvent>>;

    /// Same, but scoped to one calendar (used by full resync sweeps).
    async fn list_calendar_events_in_range(
        &self,
        calendar_id: &str,
        range: DateRange,
    ) -> Result<Vec<CalendarEvent>>;

    /// Insert or update; idempotent on `(calendar_id, provider_event_id)`.
    async fn save_event(&self, event: &CalendarEvent) -> Result<()>;

    /// Delete events that start before `before` and are not referenced by
    /// any materialized time entry. Returns the number deleted.
    async fn delete_unreferenced_before(
        &self,
        calendar_id: &str,
        before: DateTime<Utc>,
    ) -> Result<usize>;
}
