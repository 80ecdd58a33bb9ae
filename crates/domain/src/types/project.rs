//! Project aggregate

use serde::{Deserialize, Serialize};

/// Implicit match patterns for a project
///
/// Each entry is synthesized into a weight-1.0 classification rule at apply
/// time: domains become `domain:` queries, emails `email:` queries, and
/// keywords `title:` queries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectFingerprint {
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(default)]
    pub emails: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl ProjectFingerprint {
    pub fn is_empty(&self) -> bool {
        self.domains.is_empty() && self.emails.is_empty() && self.keywords.is_empty()
    }
}

/// A billable (or internal) project owned by a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub user_id: String,
    pub name: String,
    /// Short code, unique per user when present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub is_billable: bool,
    pub track_hours: bool,
    pub is_archived: bool,
    #[serde(default)]
    pub fingerprint: ProjectFingerprint,
}

impl Project {
    /// Create a new active project with empty fingerprint.
    #[must_use]
    pub fn new(user_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: super::new_entity_id(),
            user_id: user_id.into(),
            name: name.into(),
            short_code: None,
            client_name: None,
            color: None,
            is_billable: true,
            track_hours: true,
            is_archived: false,
            fingerprint: ProjectFingerprint::default(),
        }
    }
}
