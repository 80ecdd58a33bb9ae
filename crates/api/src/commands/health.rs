//! Health command

use serde::Serialize;

use crate::context::AppContext;

/// Liveness surface for the hosting layer
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub database_ok: bool,
    pub queue_depth: usize,
}

/// Check database connectivity and report queue depth.
pub fn health(ctx: &AppContext) -> HealthReport {
    HealthReport {
        database_ok: ctx.db.health_check().is_ok(),
        queue_depth: ctx.sync_queue.depth(),
    }
}
