//! Scoring engine: weighted voting, thresholds, and attendance
//!
//! Classification is a pure function of `(event, rules, projects, config)`:
//! the same inputs always produce the same outputs regardless of call order.
//! Ties between targets break deterministically by ascending target id.

use std::collections::BTreeMap;
use std::sync::Arc;

use hourmark_domain::{
    ClassificationConfig, ClassificationRule, ClassificationSource, Project, RuleTarget, Vote,
    VoteTarget,
};
use tracing::warn;

use super::cache::QueryCache;
use crate::query::ast::{Condition, Query};
use crate::query::eval::{evaluate, EvalContext};

/// A rule ready for evaluation: parsed query plus vote metadata
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub rule_id: String,
    pub source: ClassificationSource,
    pub target: RuleTarget,
    pub weight: f64,
    pub priority: i32,
    pub query: Arc<Query>,
}

/// Compile persisted rules, skipping (and logging) any whose query fails to
/// parse. A single bad rule never aborts the batch.
pub fn compile_rules(rules: &[ClassificationRule], cache: &QueryCache) -> Vec<CompiledRule> {
    let mut compiled = Vec::with_capacity(rules.len());
    for rule in rules {
        if !rule.is_enabled {
            continue;
        }
        match cache.get_or_parse(&rule.id, &rule.query) {
            Ok(query) => compiled.push(CompiledRule {
                rule_id: rule.id.clone(),
                source: ClassificationSource::Rule,
                target: rule.target.clone(),
                weight: rule.weight,
                priority: rule.priority,
                query,
            }),
            Err(e) => {
                warn!(rule_id = %rule.id, error = %e, "rule query failed to parse; skipping rule");
            }
        }
    }
    // Stable order for reproducible vote lists
    compiled.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.rule_id.cmp(&b.rule_id)));
    compiled
}

/// Synthesize weight-1.0 rules from project fingerprints.
///
/// Each domain becomes `domain:<d>`, each email `email:<e>`, each keyword
/// `title:<k>`, all targeting the owning project with source `fingerprint`.
pub fn fingerprint_rules(projects: &[Project]) -> Vec<CompiledRule> {
    let mut rules = Vec::new();
    for project in projects.iter().filter(|p| !p.is_archived) {
        let mut push = |facet: &str, value: &str, prop: &str| {
            rules.push(CompiledRule {
                rule_id: format!("fingerprint:{}:{}:{}", project.id, facet, value),
                source: ClassificationSource::Fingerprint,
                target: RuleTarget::Project(project.id.clone()),
                weight: 1.0,
                priority: 0,
                query: Arc::new(Query::Condition(Condition::new(prop, value))),
            });
        };
        for domain in &project.fingerprint.domains {
            push("domain", domain, "domain");
        }
        for email in &project.fingerprint.emails {
            push("email", email, "email");
        }
        for keyword in &project.fingerprint.keywords {
            push("keyword", keyword, "title");
        }
    }
    rules
}

/// Winning project assignment for one event
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectDecision {
    pub project_id: String,
    pub confidence: f64,
    pub needs_review: bool,
    pub source: ClassificationSource,
}

/// Outcome of the orthogonal attendance pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttendanceDecision {
    pub attended: bool,
    pub confidence: f64,
    pub needs_review: bool,
}

/// Full engine output for one event
#[derive(Debug, Clone)]
pub struct ClassificationOutcome {
    pub event_id: String,
    /// `None` means the event stays pending (no vote reached the floor);
    /// votes are still recorded for diagnostics.
    pub decision: Option<ProjectDecision>,
    pub attendance: AttendanceDecision,
    pub votes: Vec<Vote>,
}

/// Weight-scored voting evaluator
#[derive(Debug, Clone, Copy)]
pub struct ClassificationEngine {
    config: ClassificationConfig,
}

impl ClassificationEngine {
    #[must_use]
    pub fn new(config: ClassificationConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> ClassificationConfig {
        self.config
    }

    /// Run both passes (project + attendance) for one event.
    ///
    /// `rules` may mix project-targeted and attendance-targeted rules; the
    /// two tallies are kept separate.
    pub fn classify(&self, ctx: &EvalContext<'_>, rules: &[CompiledRule]) -> ClassificationOutcome {
        let mut votes = Vec::new();
        for rule in rules {
            if evaluate(&rule.query, ctx) {
                let target = match &rule.target {
                    RuleTarget::Project(id) => VoteTarget::Project(id.clone()),
                    RuleTarget::Attended => VoteTarget::Attended,
                    RuleTarget::NotAttended => VoteTarget::NotAttended,
                };
                votes.push(Vote {
                    rule_id: rule.rule_id.clone(),
                    source: rule.source,
                    target,
                    weight: rule.weight,
                });
            }
        }

        let decision = self.decide_project(&votes);
        let attendance = self.decide_attendance(&votes);

        ClassificationOutcome { event_id: ctx.event.id.clone(), decision, attendance, votes }
    }

    fn decide_project(&self, votes: &[Vote]) -> Option<ProjectDecision> {
        // BTreeMap keeps targets in ascending id order, which is also the
        // deterministic tie-break
        let mut scores: BTreeMap<&str, f64> = BTreeMap::new();
        let mut total = 0.0;
        for vote in votes {
            if let VoteTarget::Project(id) = &vote.target {
                *scores.entry(id.as_str()).or_insert(0.0) += vote.weight;
                total += vote.weight;
            }
        }
        if total <= 0.0 {
            return None;
        }

        let (winner, winner_score) = scores
            .iter()
            .fold(None::<(&str, f64)>, |best, (&id, &score)| match best {
                Some((_, best_score)) if score <= best_score => best,
                _ => Some((id, score)),
            })?;

        let confidence = (winner_score / total).clamp(0.0, 1.0);
        if confidence < self.config.floor {
            return None;
        }

        // Attribute to fingerprint only when its weight strictly exceeds the
        // explicit-rule weight for the winning target
        let mut fingerprint_weight = 0.0;
        let mut rule_weight = 0.0;
        for vote in votes {
            if vote.target == VoteTarget::Project(winner.to_string()) {
                match vote.source {
                    ClassificationSource::Fingerprint => fingerprint_weight += vote.weight,
                    _ => rule_weight += vote.weight,
                }
            }
        }
        let source = if fingerprint_weight > rule_weight {
            ClassificationSource::Fingerprint
        } else {
            ClassificationSource::Rule
        };

        Some(ProjectDecision {
            project_id: winner.to_string(),
            confidence,
            needs_review: confidence < self.config.ceiling,
            source,
        })
    }

    fn decide_attendance(&self, votes: &[Vote]) -> AttendanceDecision {
        let mut attended = 0.0;
        let mut not_attended = 0.0;
        for vote in votes {
            match vote.target {
                VoteTarget::Attended => attended += vote.weight,
                VoteTarget::NotAttended => not_attended += vote.weight,
                VoteTarget::Project(_) => {}
            }
        }

        let total = attended + not_attended;
        if total <= 0.0 {
            // No attendance rule matched: attended by default
            return AttendanceDecision { attended: true, confidence: 1.0, needs_review: false };
        }

        let winner_attended = attended >= not_attended;
        let winner_score = if winner_attended { attended } else { not_attended };
        let confidence = (winner_score / total).clamp(0.0, 1.0);

        if confidence < self.config.floor {
            // Too close to call: default to attended, flag for review
            return AttendanceDecision { attended: true, confidence, needs_review: true };
        }

        AttendanceDecision { attended: winner_attended, confidence, needs_review: false }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use hourmark_domain::{
        Attendee, CalendarEvent, ClassificationStatus, ProjectFingerprint, ResponseStatus,
        Transparency,
    };

    use super::*;

    fn event_with(title: &str, attendees: Vec<Attendee>) -> CalendarEvent {
        CalendarEvent {
            id: "evt-1".into(),
            calendar_id: "cal-1".into(),
            user_id: "user-1".into(),
            provider_event_id: "prov-1".into(),
            title: title.into(),
            description: None,
            start: Utc.with_ymd_and_hms(2026, 1, 14, 9, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2026, 1, 14, 10, 0, 0).unwrap(),
            is_all_day: false,
            attendees,
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
            updated_at: Utc.with_ymd_and_hms(2026, 1, 14, 10, 0, 0).unwrap(),
        }
    }

    fn explicit_rule(id: &str, query: &str, project: &str, weight: f64) -> ClassificationRule {
        ClassificationRule {
            id: id.into(),
            user_id: "user-1".into(),
            query: query.into(),
            target: RuleTarget::Project(project.into()),
            weight,
            is_enabled: true,
            priority: 0,
        }
    }

    fn engine() -> ClassificationEngine {
        ClassificationEngine::new(ClassificationConfig { floor: 0.5, ceiling: 0.8 })
    }

    fn classify(
        event: &CalendarEvent,
        rules: &[ClassificationRule],
        projects: &[Project],
    ) -> ClassificationOutcome {
        let cache = QueryCache::default();
        let mut compiled = compile_rules(rules, &cache);
        compiled.extend(fingerprint_rules(projects));
        engine().classify(&EvalContext::new(event, "Work"), &compiled)
    }

    #[test]
    fn word_boundary_keeps_event_pending() {
        // Rule `title:AC` must not match "Jack / Michael - Immigration
        // discussion", so no votes are cast and the event stays pending
        let event = event_with("Jack / Michael - Immigration discussion", vec![]);
        let rules = [explicit_rule("r1", "title:AC", "acme", 1.0)];

        let outcome = classify(&event, &rules, &[]);
        assert!(outcome.decision.is_none());
        assert!(outcome.votes.is_empty());
    }

    #[test]
    fn fingerprint_and_explicit_rule_agree() {
        // Fingerprint domain vote (w=1) + explicit email vote (w=2) on the
        // same project: confidence 1.0, no review, source = rule
        let attendees = vec![
            Attendee {
                email: "alice@acme.com".into(),
                display_name: None,
                response_status: ResponseStatus::Accepted,
            },
            Attendee {
                email: "bob@acme.com".into(),
                display_name: None,
                response_status: ResponseStatus::Accepted,
            },
        ];
        let event = event_with("Sync", attendees);

        let mut project = Project::new("user-1", "Acme");
        project.id = "proj-acme".into();
        project.fingerprint =
            ProjectFingerprint { domains: vec!["acme.com".into()], emails: vec![], keywords: vec![] };

        let rules = [explicit_rule("r1", "email:bob@acme.com", "proj-acme", 2.0)];
        let outcome = classify(&event, &rules, &[project]);

        let decision = outcome.decision.expect("event should be classified");
        assert_eq!(decision.project_id, "proj-acme");
        assert!((decision.confidence - 1.0).abs() < f64::EPSILON);
        assert!(!decision.needs_review);
        assert_eq!(decision.source, ClassificationSource::Rule);
        assert_eq!(outcome.votes.len(), 2);
    }

    #[test]
    fn conflicting_rules_force_review() {
        // Two rules match with weights 1 and 2: winner P2 at 2/3, which sits
        // between floor and ceiling
        let event = event_with("Weekly Sync", vec![]);
        let rules = [
            explicit_rule("r1", "title:sync", "p1", 1.0),
            explicit_rule("r2", "title:sync", "p2", 2.0),
        ];

        let outcome = classify(&event, &rules, &[]);
        let decision = outcome.decision.expect("winner above floor");
        assert_eq!(decision.project_id, "p2");
        assert!((decision.confidence - 2.0 / 3.0).abs() < 1e-9);
        assert!(decision.needs_review);
    }

    #[test]
    fn tie_breaks_by_ascending_target_id() {
        let event = event_with("Weekly Sync", vec![]);
        let rules = [
            explicit_rule("r1", "title:sync", "p-b", 1.0),
            explicit_rule("r2", "title:sync", "p-a", 1.0),
        ];

        let outcome = classify(&event, &rules, &[]);
        let decision = outcome.decision.expect("tied at 0.5, at the floor");
        assert_eq!(decision.project_id, "p-a");
        assert!((decision.confidence - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn below_floor_stays_pending_but_records_votes() {
        let event = event_with("Weekly Sync", vec![]);
        let rules = [
            explicit_rule("r1", "title:sync", "p1", 1.0),
            explicit_rule("r2", "title:weekly", "p2", 1.0),
            explicit_rule("r3", "title:sync", "p3", 1.0),
        ];

        let outcome = classify(&event, &rules, &[]);
        // Best score is 1/3 < floor
        assert!(outcome.decision.is_none());
        assert_eq!(outcome.votes.len(), 3);
    }

    #[test]
    fn fingerprint_source_attribution_when_heavier() {
        let event = event_with("Acme planning", vec![]);
        let mut project = Project::new("user-1", "Acme");
        project.id = "proj-acme".into();
        project.fingerprint = ProjectFingerprint {
            domains: vec![],
            emails: vec![],
            keywords: vec!["acme".into(), "planning".into()],
        };

        let rules = [explicit_rule("r1", "title:acme", "proj-acme", 0.5)];
        let outcome = classify(&event, &rules, &[project]);

        let decision = outcome.decision.expect("classified");
        // Fingerprint weight 2.0 beats explicit 0.5
        assert_eq!(decision.source, ClassificationSource::Fingerprint);
    }

    #[test]
    fn unparseable_rule_is_skipped_not_fatal() {
        let event = event_with("Weekly Sync", vec![]);
        let rules = [
            explicit_rule("bad", "title:\"broken", "p1", 5.0),
            explicit_rule("good", "title:sync", "p2", 1.0),
        ];

        let outcome = classify(&event, &rules, &[]);
        let decision = outcome.decision.expect("good rule still classifies");
        assert_eq!(decision.project_id, "p2");
        assert_eq!(outcome.votes.len(), 1);
    }

    #[test]
    fn disabled_rules_do_not_vote() {
        let event = event_with("Weekly Sync", vec![]);
        let mut rule = explicit_rule("r1", "title:sync", "p1", 1.0);
        rule.is_enabled = false;

        let outcome = classify(&event, &[rule], &[]);
        assert!(outcome.decision.is_none());
        assert!(outcome.votes.is_empty());
    }

    #[test]
    fn attendance_defaults_to_attended() {
        let event = event_with("Weekly Sync", vec![]);
        let outcome = classify(&event, &[], &[]);
        assert!(outcome.attendance.attended);
        assert!(!outcome.attendance.needs_review);
    }

    #[test]
    fn attendance_skip_rule_wins() {
        let event = event_with("Focus block", vec![]);
        let rules = [ClassificationRule {
            id: "dna-1".into(),
            user_id: "user-1".into(),
            query: "response:declined OR title:focus".into(),
            target: RuleTarget::NotAttended,
            weight: 1.0,
            is_enabled: true,
            priority: 0,
        }];

        let outcome = classify(&event, &rules, &[]);
        assert!(!outcome.attendance.attended);
        assert!((outcome.attendance.confidence - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn attendance_below_floor_defaults_attended_with_review() {
        // attended 1.0 vs dna 2.0 with floor 0.7: winner confidence 2/3 is
        // below the floor, so the engine defaults to attended and flags it
        let event = event_with("Focus block", vec![]);
        let engine = ClassificationEngine::new(ClassificationConfig { floor: 0.7, ceiling: 0.9 });
        let cache = QueryCache::default();
        let rules = [
            ClassificationRule {
                id: "a-1".into(),
                user_id: "user-1".into(),
                query: "title:focus".into(),
                target: RuleTarget::Attended,
                weight: 1.0,
                is_enabled: true,
                priority: 0,
            },
            ClassificationRule {
                id: "dna-1".into(),
                user_id: "user-1".into(),
                query: "title:focus".into(),
                target: RuleTarget::NotAttended,
                weight: 2.0,
                is_enabled: true,
                priority: 0,
            },
        ];
        let compiled = compile_rules(&rules, &cache);
        let outcome = engine.classify(&EvalContext::new(&event, "Work"), &compiled);

        assert!(outcome.attendance.attended);
        assert!(outcome.attendance.needs_review);
    }

    #[test]
    fn same_inputs_same_outputs() {
        let event = event_with("Weekly Sync", vec![]);
        let rules = [
            explicit_rule("r1", "title:sync", "p1", 1.0),
            explicit_rule("r2", "title:weekly", "p2", 2.0),
        ];
        let first = classify(&event, &rules, &[]);
        let second = classify(&event, &rules, &[]);
        assert_eq!(first.decision, second.decision);
        assert_eq!(first.votes, second.votes);
    }
}
