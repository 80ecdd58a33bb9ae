//! In-memory sync job queue.
//!
//! Per-user FIFO ordering with round-robin fairness across users. Jobs carry
//! a monotonic sequence; a request for a calendar that already has a pending
//! job coalesces into the existing one. At-least-once delivery is fine
//! because reconciliation is idempotent.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use hourmark_domain::{new_entity_id, SyncJob};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Default)]
struct QueueState {
    /// Pending jobs per user, FIFO
    queues: HashMap<String, VecDeque<SyncJob>>,
    /// Round-robin order across users with pending work
    user_order: VecDeque<String>,
}

/// Shared in-memory job queue
#[derive(Default)]
pub struct SyncQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    seq: AtomicU64,
}

impl SyncQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a sync request for a calendar.
    ///
    /// If a job for the same calendar is already pending, that job is
    /// returned instead of queuing a duplicate.
    pub fn enqueue(&self, user_id: &str, calendar_id: &str) -> SyncJob {
        let mut state = self.state.lock();

        if let Some(queue) = state.queues.get(user_id) {
            if let Some(existing) = queue.iter().find(|j| j.calendar_id == calendar_id) {
                debug!(user_id, calendar_id, seq = existing.seq, "coalesced sync request");
                return existing.clone();
            }
        }

        let job = SyncJob {
            id: new_entity_id(),
            user_id: user_id.to_string(),
            calendar_id: calendar_id.to_string(),
            seq: self.seq.fetch_add(1, Ordering::SeqCst),
        };

        let queue = state.queues.entry(user_id.to_string()).or_default();
        queue.push_back(job.clone());
        if !state.user_order.iter().any(|u| u == user_id) {
            state.user_order.push_back(user_id.to_string());
        }
        drop(state);

        self.notify.notify_one();
        job
    }

    /// Dequeue the next job, waiting until one arrives or `cancel` fires.
    pub async fn dequeue(&self, cancel: &CancellationToken) -> Option<SyncJob> {
        loop {
            if let Some(job) = self.pop_next() {
                return Some(job);
            }
            tokio::select! {
                () = cancel.cancelled() => return None,
                () = self.notify.notified() => {}
            }
        }
    }

    fn pop_next(&self) -> Option<SyncJob> {
        let mut state = self.state.lock();
        let user = state.user_order.pop_front()?;
        let job = state.queues.get_mut(&user).and_then(VecDeque::pop_front);

        let has_more = state.queues.get(&user).is_some_and(|q| !q.is_empty());
        if has_more {
            state.user_order.push_back(user.clone());
        } else {
            state.queues.remove(&user);
        }
        // Wake another waiter if work remains
        if job.is_some() && !state.user_order.is_empty() {
            self.notify.notify_one();
        }
        job
    }

    /// Total pending jobs.
    pub fn depth(&self) -> usize {
        self.state.lock().queues.values().map(VecDeque::len).sum()
    }

    /// Pending jobs for one user.
    pub fn user_depth(&self, user_id: &str) -> usize {
        self.state.lock().queues.get(user_id).map_or(0, VecDeque::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_user_fifo_order() {
        let queue = SyncQueue::new();
        queue.enqueue("u1", "cal-a");
        queue.enqueue("u1", "cal-b");

        let first = queue.pop_next().unwrap();
        let second = queue.pop_next().unwrap();
        assert_eq!(first.calendar_id, "cal-a");
        assert_eq!(second.calendar_id, "cal-b");
        assert!(first.seq < second.seq);
    }

    #[test]
    fn duplicate_calendar_coalesces() {
        let queue = SyncQueue::new();
        let first = queue.enqueue("u1", "cal-a");
        let second = queue.enqueue("u1", "cal-a");

        assert_eq!(first.id, second.id);
        assert_eq!(queue.depth(), 1);
    }

    #[test]
    fn round_robin_across_users() {
        let queue = SyncQueue::new();
        queue.enqueue("u1", "cal-a");
        queue.enqueue("u1", "cal-b");
        queue.enqueue("u2", "cal-c");

        let order: Vec<String> =
            std::iter::from_fn(|| queue.pop_next()).map(|j| j.user_id).collect();
        assert_eq!(order, ["u1", "u2", "u1"]);
    }

    #[tokio::test]
    async fn dequeue_returns_none_on_cancel() {
        let queue = SyncQueue::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(queue.dequeue(&cancel).await.is_none());
    }

    #[tokio::test]
    async fn dequeue_wakes_on_enqueue() {
        let queue = std::sync::Arc::new(SyncQueue::new());
        let cancel = CancellationToken::new();

        let waiter = {
            let queue = std::sync::Arc::clone(&queue);
            let cancel = cancel.clone();
            tokio::spawn(async move { queue.dequeue(&cancel).await })
        };

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        queue.enqueue("u1", "cal-a");

        let job = tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(job.calendar_id, "cal-a");
    }
}
