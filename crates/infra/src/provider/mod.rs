//! Calendar provider adapter
//!
//! A Google-Calendar-style REST client implementing the core
//! [`hourmark_core::CalendarProvider`] port: full-range fetches with
//! pagination, delta-token incremental fetches, and `410 GONE` surfaced as a
//! full-resync signal rather than a failure.

pub mod client;
pub mod platform;
pub mod types;

pub use client::HttpCalendarProvider;
pub use platform::detect_meeting_platform;
