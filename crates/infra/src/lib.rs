//! # Hourmark Infra
//!
//! Infrastructure layer: SQLite persistence, the calendar provider HTTP
//! adapter, the sync engine with its job queue and schedulers, and the
//! configuration loader.
//!
//! Everything here implements a port defined in `hourmark-core`; nothing in
//! this crate contains business rules of its own.

pub mod config;
pub mod database;
pub mod errors;
pub mod provider;
pub mod scheduling;
pub mod sync;

pub use database::manager::DbManager;
pub use database::{
    SqliteCalendarRepository, SqliteEventRepository, SqliteProjectRepository,
    SqliteRuleRepository, SqliteTimeEntryRepository,
};
pub use errors::InfraError;
pub use provider::client::HttpCalendarProvider;
pub use sync::engine::SyncEngine;
pub use sync::locks::CalendarLocks;
pub use sync::queue::SyncQueue;
pub use sync::worker::SyncWorkerPool;
