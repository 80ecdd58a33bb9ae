//! Per-calendar lock table.
//!
//! A keyed mutex map guaranteeing at most one concurrent sync per calendar
//! in-process. Locks are created lazily and never removed; the number of
//! calendars per deployment is small.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Keyed async mutex table
#[derive(Default)]
pub struct CalendarLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl CalendarLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the exclusive lock for one calendar, waiting if a sync is
    /// already running.
    pub async fn acquire(&self, calendar_id: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(calendar_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn same_calendar_serializes() {
        let locks = Arc::new(CalendarLocks::new());

        let guard = locks.acquire("cal-1").await;

        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.acquire("cal-1").await;
            })
        };

        // The second acquire must block while the first guard lives
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn different_calendars_run_concurrently() {
        let locks = CalendarLocks::new();
        let _first = locks.acquire("cal-1").await;
        // Must not deadlock
        let _second =
            tokio::time::timeout(Duration::from_millis(100), locks.acquire("cal-2")).await.unwrap();
    }
}
