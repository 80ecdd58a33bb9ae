//! Sync ports
//!
//! The sync engine itself lives in the infra crate (it drives I/O); core
//! only defines the provider and calendar repository contracts.

pub mod ports;

pub use ports::{CalendarProvider, CalendarRepository};
