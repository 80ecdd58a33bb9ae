//! # Hourmark API
//!
//! Hosting layer: wires repositories, services, and background workers into
//! an [`AppContext`] and exposes the core operations as transport-agnostic
//! command functions. A routing layer (HTTP, CLI, anything that can resolve
//! a caller to a user id) calls straight into `commands::*`.

pub mod commands;
pub mod context;

pub use commands::classification::{
    apply_rules, classify_event, create_rule, delete_rule, explain_classification, list_rules,
    preview_rule, skip_event, update_rule,
};
pub use commands::health::{health, HealthReport};
pub use commands::sync::{request_sync, sync_status};
pub use commands::time_entries::{list_time_entries, revert_time_entry, update_time_entry};
pub use context::AppContext;
