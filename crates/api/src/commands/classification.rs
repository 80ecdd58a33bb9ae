//! Classification commands

use hourmark_core::classification::service::{ApplyReport, Explanation, RulePreview};
use hourmark_domain::{CalendarEvent, ClassificationRule, DateRange, Result, RuleTarget};
use tracing::instrument;

use super::default_range;
use crate::context::AppContext;

/// Evaluate a prospective rule against recent events without persisting.
#[instrument(skip(ctx, query))]
pub async fn preview_rule(
    ctx: &AppContext,
    user_id: &str,
    query: &str,
    target: Option<RuleTarget>,
    range: Option<DateRange>,
) -> Result<RulePreview> {
    ctx.classification
        .preview_rule(user_id, query, target.as_ref(), range.unwrap_or_else(default_range))
        .await
}

/// Run classification over a date range.
#[instrument(skip(ctx))]
pub async fn apply_rules(
    ctx: &AppContext,
    user_id: &str,
    range: Option<DateRange>,
    dry_run: bool,
    override_manual: bool,
) -> Result<ApplyReport> {
    ctx.classification
        .apply_rules(
            user_id,
            range.unwrap_or_else(default_range),
            dry_run,
            override_manual,
            &ctx.shutdown_token(),
        )
        .await
}

/// Manually classify one event.
#[instrument(skip(ctx))]
pub async fn classify_event(
    ctx: &AppContext,
    user_id: &str,
    event_id: &str,
    project_id: &str,
) -> Result<CalendarEvent> {
    ctx.classification.classify_event(user_id, event_id, project_id).await
}

/// Mark or unmark an event as skipped.
#[instrument(skip(ctx))]
pub async fn skip_event(
    ctx: &AppContext,
    user_id: &str,
    event_id: &str,
    skip: bool,
) -> Result<CalendarEvent> {
    ctx.classification.skip_event(user_id, event_id, skip).await
}

/// Explain an event's current classification: project, confidence, votes.
#[instrument(skip(ctx))]
pub async fn explain_classification(
    ctx: &AppContext,
    user_id: &str,
    event_id: &str,
) -> Result<Explanation> {
    ctx.classification.explain_classification(user_id, event_id).await
}

/// Create a rule after validating its query.
#[instrument(skip(ctx, query))]
pub async fn create_rule(
    ctx: &AppContext,
    user_id: &str,
    query: &str,
    target: RuleTarget,
    weight: f64,
    priority: i32,
) -> Result<ClassificationRule> {
    ctx.classification.create_rule(user_id, query, target, weight, priority).await
}

/// Update a rule, re-validating its query.
#[instrument(skip(ctx, rule), fields(rule_id = %rule.id))]
pub async fn update_rule(
    ctx: &AppContext,
    user_id: &str,
    rule: ClassificationRule,
) -> Result<ClassificationRule> {
    ctx.classification.update_rule(user_id, rule).await
}

/// Delete a rule.
#[instrument(skip(ctx))]
pub async fn delete_rule(ctx: &AppContext, user_id: &str, rule_id: &str) -> Result<()> {
    ctx.classification.delete_rule(user_id, rule_id).await
}

/// List a user's rules.
#[instrument(skip(ctx))]
pub async fn list_rules(ctx: &AppContext, user_id: &str) -> Result<Vec<ClassificationRule>> {
    ctx.classification.list_rules(user_id).await
}
