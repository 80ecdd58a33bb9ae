//! Calendar aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A connected provider calendar and its sync bookkeeping
///
/// `oldest_synced`/`newest_synced` delimit the locally mirrored window; the
/// invariant `oldest_synced <= newest_synced` holds whenever both are set.
/// `sync_token` is the provider-issued delta token and is cleared on full
/// resync.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Calendar {
    pub id: String,
    pub user_id: String,
    pub provider_calendar_id: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest_synced: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newest_synced: Option<DateTime<Utc>>,
    pub sync_failure_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sync_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl Calendar {
    /// Create a newly connected, never-synced calendar.
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        provider_calendar_id: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            id: super::new_entity_id(),
            user_id: user_id.into(),
            provider_calendar_id: provider_calendar_id.into(),
            display_name: display_name.into(),
            sync_token: None,
            oldest_synced: None,
            newest_synced: None,
            sync_failure_count: 0,
            last_sync_at: None,
            is_active: true,
        }
    }

    /// A calendar with no watermarks has never completed an initial sync.
    pub fn has_synced(&self) -> bool {
        self.oldest_synced.is_some() && self.newest_synced.is_some()
    }
}
