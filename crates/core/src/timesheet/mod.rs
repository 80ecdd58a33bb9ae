//! Time entry orchestration
//!
//! Read-side merging of ephemeral (computed) and materialized entries, user
//! edit materialization, and revert. The heavy lifting is in
//! [`crate::analyzer`]; this module owns persistence semantics.

pub mod ports;
pub mod service;

pub use ports::TimeEntryRepository;
pub use service::TimesheetService;
