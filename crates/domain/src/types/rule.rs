//! Classification rules

use serde::{Deserialize, Serialize};

/// What a rule assigns when it matches
///
/// `NotAttended` ("did not attend") and `Attended` rules participate in the
/// separate attendance pass; `Project` rules vote in the project pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum RuleTarget {
    Project(String),
    Attended,
    NotAttended,
}

impl RuleTarget {
    pub fn is_attendance(&self) -> bool {
        matches!(self, Self::Attended | Self::NotAttended)
    }
}

/// A user-authored query rule with a target and a weight
///
/// The query string is the stable serialization: it is persisted verbatim and
/// parsed on each application pass (with an AST cache in front). The query
/// must parse at creation time; rules whose stored query no longer parses are
/// skipped during evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationRule {
    pub id: String,
    pub user_id: String,
    pub query: String,
    pub target: RuleTarget,
    /// Vote weight, strictly positive
    pub weight: f64,
    pub is_enabled: bool,
    pub priority: i32,
}

impl ClassificationRule {
    /// Create an enabled rule with default priority.
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        query: impl Into<String>,
        target: RuleTarget,
        weight: f64,
    ) -> Self {
        Self {
            id: super::new_entity_id(),
            user_id: user_id.into(),
            query: query.into(),
            target,
            weight,
            is_enabled: true,
            priority: 0,
        }
    }
}
