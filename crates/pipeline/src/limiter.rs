use std::{collections::VecDeque, time::Duration};

use tokio::time::Instant;

/// Sliding-window rate limiter.
///
/// Tracks the timestamps of recent actions and admits a new action only
/// while fewer than `capacity` actions fall inside the trailing window.
/// Not thread-safe on its own; the pipeline serializes access behind its
/// shared gate.
pub struct SlidingWindowLimiter {
    records: VecDeque<Instant>,
    capacity: usize,
    window: Duration,
}

impl SlidingWindowLimiter {
    /// `capacity` must be ≥ 1 — validated by [`crate::MonitorConfig`]
    /// before the limiter is constructed.
    #[must_use]
    pub fn new(capacity: usize, window: Duration) -> Self {
        Self {
            records: VecDeque::new(),
            capacity,
            window,
        }
    }

    /// Pure query: true iff another action is admissible right now.
    ///
    /// Counts only records inside `[now - window, now]`, so expired entries
    /// never block a legitimate action even before they are pruned.
    #[must_use]
    pub fn can_perform_action(&self) -> bool {
        let now = Instant::now();
        let recent = self
            .records
            .iter()
            .filter(|t| now.duration_since(**t) < self.window)
            .count();
        recent < self.capacity
    }

    /// Record one successful action at the current time.
    ///
    /// Call only after an admitted action actually happened, never
    /// speculatively.
    pub fn record_action(&mut self) {
        let now = Instant::now();
        self.prune(now);
        self.records.push_back(now);
    }

    /// Number of actions still inside the trailing window.
    #[must_use]
    pub fn recent_action_count(&self) -> usize {
        let now = Instant::now();
        self.records
            .iter()
            .filter(|t| now.duration_since(**t) < self.window)
            .count()
    }

    /// Drop records older than the window. Records are appended in
    /// chronological order, so expired entries sit at the front.
    fn prune(&mut self, now: Instant) {
        while let Some(oldest) = self.records.front() {
            if now.duration_since(*oldest) >= self.window {
                self.records.pop_front();
            } else {
                break;
            }
        }
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(3600);

    #[tokio::test(start_paused = true)]
    async fn admits_until_capacity_reached() {
        let mut limiter = SlidingWindowLimiter::new(2, WINDOW);
        assert!(limiter.can_perform_action());
        limiter.record_action();
        assert!(limiter.can_perform_action());
        limiter.record_action();
        assert!(!limiter.can_perform_action());
    }

    #[tokio::test(start_paused = true)]
    async fn expired_records_free_slots() {
        let mut limiter = SlidingWindowLimiter::new(1, WINDOW);
        limiter.record_action();
        assert!(!limiter.can_perform_action());

        tokio::time::advance(WINDOW + Duration::from_secs(1)).await;
        assert!(limiter.can_perform_action());
    }

    #[tokio::test(start_paused = true)]
    async fn record_at_window_edge_is_expired() {
        let mut limiter = SlidingWindowLimiter::new(1, WINDOW);
        limiter.record_action();

        // A record exactly one window old no longer counts.
        tokio::time::advance(WINDOW).await;
        assert!(limiter.can_perform_action());
    }

    #[tokio::test(start_paused = true)]
    async fn query_does_not_mutate() {
        let mut limiter = SlidingWindowLimiter::new(1, WINDOW);
        limiter.record_action();
        tokio::time::advance(WINDOW * 2).await;

        // Stale record still stored, but the query ignores it.
        for _ in 0..3 {
            assert!(limiter.can_perform_action());
        }
        assert_eq!(limiter.records.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn prune_runs_before_append() {
        let mut limiter = SlidingWindowLimiter::new(2, WINDOW);
        limiter.record_action();
        limiter.record_action();

        tokio::time::advance(WINDOW + Duration::from_secs(1)).await;
        limiter.record_action();

        // Both expired records were dropped when the new one was appended.
        assert_eq!(limiter.records.len(), 1);
        assert_eq!(limiter.recent_action_count(), 1);
        assert!(limiter.can_perform_action());
    }

    #[tokio::test(start_paused = true)]
    async fn partial_expiry_admits_again() {
        let mut limiter = SlidingWindowLimiter::new(2, WINDOW);
        limiter.record_action();
        tokio::time::advance(Duration::from_secs(1800)).await;
        limiter.record_action();
        assert!(!limiter.can_perform_action());

        // First record expires, second is still inside the window.
        tokio::time::advance(Duration::from_secs(1801)).await;
        assert!(limiter.can_perform_action());
        assert_eq!(limiter.recent_action_count(), 1);
    }
}
