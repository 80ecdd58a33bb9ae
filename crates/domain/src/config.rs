//! Application configuration structures
//!
//! All tunables live here so deployments can override them via the loader in
//! the infra crate. Classification thresholds and rounding are configuration,
//! not constants.

use serde::{Deserialize, Serialize};

/// Top-level application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub classification: ClassificationConfig,
    #[serde(default)]
    pub rounding: RoundingConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
}

/// Calendar provider REST endpoint settings
///
/// Credential acquisition (OAuth) is out of scope; the token is supplied by
/// the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bearer_token: Option<String>,
    /// Page size requested from the provider
    pub page_size: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.googleapis.com/calendar/v3".to_string(),
            bearer_token: None,
            page_size: 250,
        }
    }
}

/// Database settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database file path
    pub path: String,
    /// Connection pool size
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: "hourmark.db".to_string(), pool_size: 4 }
    }
}

/// Calendar sync engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Whether background sync is enabled
    pub enabled: bool,
    /// Interval between scheduled incremental sync passes, in seconds
    pub interval_seconds: u64,
    /// Initial sync window: how far back from today to fetch
    pub initial_lookback_days: i64,
    /// Initial sync window: how far ahead of today to fetch
    pub initial_lookahead_days: i64,
    /// Target window the background expander grows towards (past side)
    pub target_past_days: i64,
    /// Target window the background expander grows towards (future side)
    pub target_future_days: i64,
    /// How many days each expansion step adds to the window
    pub expansion_step_days: i64,
    /// Consecutive failures before a calendar is suspended
    pub max_failures: u32,
    /// Number of concurrent sync workers draining the job queue
    pub worker_count: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: 900, // 15 minutes
            initial_lookback_days: 28,
            initial_lookahead_days: 7,
            target_past_days: 90,
            target_future_days: 14,
            expansion_step_days: 14,
            max_failures: 5,
            worker_count: 2,
        }
    }
}

/// Classification confidence thresholds
///
/// `floor` is the minimum confidence for a project assignment at all;
/// between `floor` and `ceiling` the assignment is flagged for review.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ClassificationConfig {
    pub floor: f64,
    pub ceiling: f64,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self { floor: 0.5, ceiling: 0.8 }
    }
}

/// Billing rounding applied to union-of-intervals minutes
///
/// `granularity_minutes <= 0` disables rounding entirely.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RoundingConfig {
    pub granularity_minutes: i64,
    pub threshold_minutes: i64,
}

impl Default for RoundingConfig {
    fn default() -> Self {
        // Round any nonzero remainder up to the next 15 minutes
        Self { granularity_minutes: 15, threshold_minutes: 1 }
    }
}
