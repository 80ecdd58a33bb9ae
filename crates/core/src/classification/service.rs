//! Classification service - orchestration over the repository ports
//!
//! Wraps the pure [`ClassificationEngine`] with rule loading, fingerprint
//! synthesis, persistence, preview, and per-event operations. Rule
//! application is snapshot-consistent within one call: every event sees the
//! same compiled rule set.

use std::collections::HashMap;
use std::sync::Arc;

use hourmark_domain::{
    CalendarEvent, ClassificationConfig, ClassificationRule, ClassificationSource,
    ClassificationStatus, DateRange, HourmarkError, Result, RuleTarget, Vote,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use super::cache::QueryCache;
use super::engine::{compile_rules, fingerprint_rules, ClassificationEngine, CompiledRule};
use super::ports::{EventRepository, ProjectRepository, RuleRepository};
use crate::query::eval::EvalContext;
use crate::query::parser;
use crate::sync::ports::CalendarRepository;
use crate::timesheet::ports::TimeEntryRepository;

/// Summary of one event's change during an apply pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifiedEventSummary {
    pub event_id: String,
    pub project_id: String,
    pub confidence: f64,
    pub needs_review: bool,
    pub source: ClassificationSource,
}

/// Result of `apply_rules`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplyReport {
    pub classified: Vec<ClassifiedEventSummary>,
    pub skipped_count: usize,
    pub pending_count: usize,
    pub manual_preserved: usize,
    pub dry_run: bool,
}

/// A candidate that already belongs to a different project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewConflict {
    pub event_id: String,
    pub current_project_id: String,
    /// Conflicts with manual classifications deserve a louder warning
    pub is_manual: bool,
}

/// Result of `preview_rule`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RulePreview {
    pub matches: Vec<String>,
    pub conflicts: Vec<PreviewConflict>,
    pub candidate_count: usize,
}

/// Result of `explain_classification`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Explanation {
    pub event_id: String,
    pub status: ClassificationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<ClassificationSource>,
    pub votes: Vec<Vote>,
}

/// Classification orchestration service
pub struct ClassificationService {
    projects: Arc<dyn ProjectRepository>,
    rules: Arc<dyn RuleRepository>,
    events: Arc<dyn EventRepository>,
    entries: Arc<dyn TimeEntryRepository>,
    calendars: Arc<dyn CalendarRepository>,
    engine: ClassificationEngine,
    cache: QueryCache,
}

impl ClassificationService {
    /// Create a new classification service
    pub fn new(
        projects: Arc<dyn ProjectRepository>,
        rules: Arc<dyn RuleRepository>,
        events: Arc<dyn EventRepository>,
        entries: Arc<dyn TimeEntryRepository>,
        calendars: Arc<dyn CalendarRepository>,
        config: ClassificationConfig,
    ) -> Self {
        Self {
            projects,
            rules,
            events,
            entries,
            calendars,
            engine: ClassificationEngine::new(config),
            cache: QueryCache::default(),
        }
    }

    /// Run full classification over a date range.
    ///
    /// Manual classifications are preserved unless `override_manual` is set.
    /// With `dry_run` nothing is persisted; the report shows what would
    /// change. Cancellation stops before the next event; work already
    /// persisted stays.
    #[instrument(skip(self, cancel), fields(user_id, dry_run, override_manual))]
    pub async fn apply_rules(
        &self,
        user_id: &str,
        range: DateRange,
        dry_run: bool,
        override_manual: bool,
        cancel: &CancellationToken,
    ) -> Result<ApplyReport> {
        let compiled = self.load_compiled_rules(user_id).await?;
        let calendar_names = self.calendar_names(user_id).await?;
        let events = self.events.list_events_in_range(user_id, range).await?;

        info!(
            user_id,
            rules = compiled.len(),
            events = events.len(),
            dry_run,
            "applying classification rules"
        );

        let mut report = ApplyReport { dry_run, ..ApplyReport::default() };

        for mut event in events {
            if cancel.is_cancelled() {
                return Err(HourmarkError::Cancelled);
            }

            if event.is_manually_classified() && !override_manual {
                report.manual_preserved += 1;
                continue;
            }

            let calendar_name =
                calendar_names.get(&event.calendar_id).map_or("", String::as_str);
            let ctx = EvalContext::new(&event, calendar_name)
                .with_thresholds(self.engine.config());
            let outcome = self.engine.classify(&ctx, &compiled);

            let changed = apply_outcome_to_event(&mut event, &outcome);

            match event.classification_status {
                ClassificationStatus::Skipped => report.skipped_count += 1,
                ClassificationStatus::Pending => report.pending_count += 1,
                _ => {
                    if let Some(decision) = &outcome.decision {
                        report.classified.push(ClassifiedEventSummary {
                            event_id: event.id.clone(),
                            project_id: decision.project_id.clone(),
                            confidence: decision.confidence,
                            needs_review: decision.needs_review,
                            source: decision.source,
                        });
                    }
                }
            }

            if !dry_run && changed {
                self.events.save_event(&event).await?;
                self.entries.mark_stale_for_event(&event.id).await?;
            }
        }

        Ok(report)
    }

    /// Classify a specific set of events (used by sync reconciliation).
    #[instrument(skip(self, event_ids), fields(user_id, count = event_ids.len()))]
    pub async fn classify_events(&self, user_id: &str, event_ids: &[String]) -> Result<usize> {
        if event_ids.is_empty() {
            return Ok(0);
        }

        let compiled = self.load_compiled_rules(user_id).await?;
        let calendar_names = self.calendar_names(user_id).await?;
        let mut changed_count = 0;

        for event_id in event_ids {
            let Some(mut event) = self.events.get_event(user_id, event_id).await? else {
                continue;
            };
            if event.is_manually_classified() {
                continue;
            }

            let calendar_name =
                calendar_names.get(&event.calendar_id).map_or("", String::as_str);
            let ctx = EvalContext::new(&event, calendar_name)
                .with_thresholds(self.engine.config());
            let outcome = self.engine.classify(&ctx, &compiled);

            if apply_outcome_to_event(&mut event, &outcome) {
                self.events.save_event(&event).await?;
                self.entries.mark_stale_for_event(&event.id).await?;
                changed_count += 1;
            }
        }

        debug!(user_id, changed_count, "classified events after sync");
        Ok(changed_count)
    }

    /// Evaluate a prospective rule against candidate events without
    /// persisting anything.
    #[instrument(skip(self, query), fields(user_id))]
    pub async fn preview_rule(
        &self,
        user_id: &str,
        query: &str,
        target: Option<&RuleTarget>,
        range: DateRange,
    ) -> Result<RulePreview> {
        // Parse errors surface to the user here, position included
        let parsed = parser::parse(query)?;
        let calendar_names = self.calendar_names(user_id).await?;
        let candidates = self.events.list_events_in_range(user_id, range).await?;

        let mut preview = RulePreview { candidate_count: candidates.len(), ..RulePreview::default() };

        for event in &candidates {
            let calendar_name =
                calendar_names.get(&event.calendar_id).map_or("", String::as_str);
            let ctx = EvalContext::new(event, calendar_name)
                .with_thresholds(self.engine.config());
            if !crate::query::eval::evaluate(&parsed, &ctx) {
                continue;
            }
            preview.matches.push(event.id.clone());

            if let (Some(RuleTarget::Project(target_project)), Some(current)) =
                (target, event.project_id.as_deref())
            {
                if current != target_project && event.is_assigned() {
                    preview.conflicts.push(PreviewConflict {
                        event_id: event.id.clone(),
                        current_project_id: current.to_string(),
                        is_manual: event.is_manually_classified(),
                    });
                }
            }
        }

        Ok(preview)
    }

    /// Manually classify one event to a project.
    #[instrument(skip(self), fields(user_id, event_id, project_id))]
    pub async fn classify_event(
        &self,
        user_id: &str,
        event_id: &str,
        project_id: &str,
    ) -> Result<CalendarEvent> {
        let project = self
            .projects
            .get_project(user_id, project_id)
            .await?
            .ok_or_else(|| HourmarkError::NotFound(format!("project {project_id}")))?;

        let mut event = self
            .events
            .get_event(user_id, event_id)
            .await?
            .ok_or_else(|| HourmarkError::NotFound(format!("event {event_id}")))?;

        event.project_id = Some(project.id);
        event.classification_source = Some(ClassificationSource::Manual);
        event.classification_status = if event.is_skipped {
            ClassificationStatus::Skipped
        } else {
            ClassificationStatus::Classified
        };
        event.confidence = Some(1.0);

        self.events.save_event(&event).await?;
        self.entries.mark_stale_for_event(&event.id).await?;
        Ok(event)
    }

    /// Mark or unmark an event as skipped (not attended).
    ///
    /// Unskipping returns the event to `Pending`; any project assignment is
    /// retained on the row as a suggestion for the next pass.
    #[instrument(skip(self), fields(user_id, event_id, skip))]
    pub async fn skip_event(
        &self,
        user_id: &str,
        event_id: &str,
        skip: bool,
    ) -> Result<CalendarEvent> {
        let mut event = self
            .events
            .get_event(user_id, event_id)
            .await?
            .ok_or_else(|| HourmarkError::NotFound(format!("event {event_id}")))?;

        if event.is_skipped == skip {
            return Ok(event);
        }

        event.is_skipped = skip;
        event.classification_status =
            if skip { ClassificationStatus::Skipped } else { ClassificationStatus::Pending };

        self.events.save_event(&event).await?;
        self.entries.mark_stale_for_event(&event.id).await?;
        Ok(event)
    }

    /// Explain why an event carries its current classification.
    #[instrument(skip(self), fields(user_id, event_id))]
    pub async fn explain_classification(
        &self,
        user_id: &str,
        event_id: &str,
    ) -> Result<Explanation> {
        let event = self
            .events
            .get_event(user_id, event_id)
            .await?
            .ok_or_else(|| HourmarkError::NotFound(format!("event {event_id}")))?;

        let project_name = match event.project_id.as_deref() {
            Some(project_id) => self
                .projects
                .get_project(user_id, project_id)
                .await?
                .map(|p| p.name),
            None => None,
        };

        Ok(Explanation {
            event_id: event.id,
            status: event.classification_status,
            project_id: event.project_id,
            project_name,
            confidence: event.confidence,
            source: event.classification_source,
            votes: event.votes,
        })
    }

    /// Create a rule, validating the query and weight.
    #[instrument(skip(self, query), fields(user_id))]
    pub async fn create_rule(
        &self,
        user_id: &str,
        query: &str,
        target: RuleTarget,
        weight: f64,
        priority: i32,
    ) -> Result<ClassificationRule> {
        validate_rule(query, weight)?;
        let mut rule = ClassificationRule::new(user_id, query, target, weight);
        rule.priority = priority;
        self.rules.save_rule(&rule).await?;
        Ok(rule)
    }

    /// Update an existing rule, re-validating the query.
    #[instrument(skip(self, rule), fields(user_id, rule_id = %rule.id))]
    pub async fn update_rule(
        &self,
        user_id: &str,
        rule: ClassificationRule,
    ) -> Result<ClassificationRule> {
        self.rules
            .get_rule(user_id, &rule.id)
            .await?
            .ok_or_else(|| HourmarkError::NotFound(format!("rule {}", rule.id)))?;
        validate_rule(&rule.query, rule.weight)?;
        self.rules.save_rule(&rule).await?;
        Ok(rule)
    }

    /// Delete a rule.
    #[instrument(skip(self), fields(user_id, rule_id))]
    pub async fn delete_rule(&self, user_id: &str, rule_id: &str) -> Result<()> {
        if self.rules.delete_rule(user_id, rule_id).await? {
            Ok(())
        } else {
            Err(HourmarkError::NotFound(format!("rule {rule_id}")))
        }
    }

    /// List rules for a user.
    pub async fn list_rules(&self, user_id: &str) -> Result<Vec<ClassificationRule>> {
        self.rules.list_rules(user_id).await
    }

    async fn load_compiled_rules(&self, user_id: &str) -> Result<Vec<CompiledRule>> {
        let explicit = self.rules.list_enabled_rules(user_id).await?;
        let projects = self.projects.list_projects(user_id).await?;
        let mut compiled = compile_rules(&explicit, &self.cache);
        compiled.extend(fingerprint_rules(&projects));
        Ok(compiled)
    }

    async fn calendar_names(&self, user_id: &str) -> Result<HashMap<String, String>> {
        let calendars = self.calendars.list_calendars(user_id).await?;
        Ok(calendars.into_iter().map(|c| (c.id, c.display_name)).collect())
    }
}

fn validate_rule(query: &str, weight: f64) -> Result<()> {
    parser::parse(query)?;
    if weight <= 0.0 {
        return Err(HourmarkError::InvalidInput(format!(
            "rule weight must be positive, got {weight}"
        )));
    }
    Ok(())
}

/// Write an engine outcome onto the event entity. Returns whether any
/// classification-relevant field changed.
fn apply_outcome_to_event(
    event: &mut CalendarEvent,
    outcome: &super::engine::ClassificationOutcome,
) -> bool {
    let before = (
        event.classification_status,
        event.project_id.clone(),
        event.classification_source,
        event.confidence,
        event.is_skipped,
    );

    // Project assignment and skip are orthogonal; skip wins for status
    event.is_skipped = !outcome.attendance.attended;

    if let Some(decision) = &outcome.decision {
        event.project_id = Some(decision.project_id.clone());
        event.classification_source = Some(decision.source);
        event.confidence = Some(decision.confidence);
        event.classification_status = if event.is_skipped {
            ClassificationStatus::Skipped
        } else if decision.needs_review || outcome.attendance.needs_review {
            ClassificationStatus::NeedsReview
        } else {
            ClassificationStatus::Classified
        };
    } else {
        // No winner above the floor: stays pending (or skipped), with votes
        // kept for diagnostics
        event.project_id = None;
        event.classification_source = None;
        event.confidence = None;
        event.classification_status = if event.is_skipped {
            ClassificationStatus::Skipped
        } else {
            ClassificationStatus::Pending
        };
    }

    let votes_changed = event.votes != outcome.votes;
    event.votes = outcome.votes.clone();

    let after = (
        event.classification_status,
        event.project_id.clone(),
        event.classification_source,
        event.confidence,
        event.is_skipped,
    );
    before != after || votes_changed
}
