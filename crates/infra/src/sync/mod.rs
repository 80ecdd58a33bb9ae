//! Incremental calendar sync engine
//!
//! Watermarked, job-queued fetching with delta tokens, full-resync fallback,
//! per-calendar locking, and failure backoff. Reconciliation is idempotent
//! on `(calendar_id, provider_event_id)`.

pub mod engine;
pub mod locks;
pub mod queue;
pub mod worker;

pub use engine::{calculate_backoff, SyncEngine};
pub use locks::CalendarLocks;
pub use queue::SyncQueue;
pub use worker::SyncWorkerPool;
