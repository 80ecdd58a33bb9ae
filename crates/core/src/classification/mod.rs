//! Classification engine
//!
//! Assigns calendar events to projects via weight-scored voting across
//! explicit rules and fingerprint-generated rules, and separately decides
//! attendance. The engine itself is pure; [`service::ClassificationService`]
//! orchestrates it over the repository ports.

pub mod cache;
pub mod engine;
pub mod ports;
pub mod service;

pub use cache::QueryCache;
pub use engine::ClassificationEngine;
pub use service::ClassificationService;
