//! Phase barrier
//!
//! A countable rendezvous between the control loop and pool workers: the
//! control loop registers one party per submitted task, every task arrives
//! exactly once when it finishes, and `wait_idle` blocks until the
//! outstanding count reaches zero. This is what keeps link discoveries from
//! phase N out of the worker pool until phase N+1 begins.

use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Notify;

/// Counter-based barrier for per-phase task coordination
pub struct PhaseBarrier {
    outstanding: AtomicUsize,
    notify: Notify,
}

impl PhaseBarrier {
    pub fn new() -> Self {
        Self {
            outstanding: AtomicUsize::new(0),
            notify: Notify::new(),
        }
    }

    /// Registers one task with the current phase
    pub fn register(&self) {
        self.outstanding.fetch_add(1, Ordering::SeqCst);
    }

    /// Marks one registered task as finished
    ///
    /// Every registered task must arrive exactly once, error paths
    /// included, or `wait_idle` never returns.
    pub fn arrive(&self) {
        let previous = self.outstanding.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(previous > 0, "arrive without matching register");
        if previous == 1 {
            // notify_one stores a permit when nobody is waiting yet
            self.notify.notify_one();
        }
    }

    /// Waits until every registered task has arrived
    pub async fn wait_idle(&self) {
        loop {
            if self.outstanding.load(Ordering::SeqCst) == 0 {
                return;
            }
            self.notify.notified().await;
        }
    }

    /// Current number of registered-but-unfinished tasks
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }
}

impl Default for PhaseBarrier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_wait_with_no_tasks_returns_immediately() {
        let barrier = PhaseBarrier::new();
        barrier.wait_idle().await;
    }

    #[tokio::test]
    async fn test_wait_blocks_until_arrive() {
        let barrier = Arc::new(PhaseBarrier::new());
        barrier.register();
        barrier.register();

        let waiter = {
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move {
                barrier.wait_idle().await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        barrier.arrive();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        barrier.arrive();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("barrier never released")
            .unwrap();
    }

    #[tokio::test]
    async fn test_many_concurrent_arrivals() {
        let barrier = Arc::new(PhaseBarrier::new());
        for _ in 0..100 {
            barrier.register();
        }

        for _ in 0..100 {
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                barrier.arrive();
            });
        }

        tokio::time::timeout(Duration::from_secs(2), barrier.wait_idle())
            .await
            .expect("barrier never released");
        assert_eq!(barrier.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_reusable_across_phases() {
        let barrier = PhaseBarrier::new();

        barrier.register();
        barrier.arrive();
        barrier.wait_idle().await;

        barrier.register();
        assert_eq!(barrier.outstanding(), 1);
        barrier.arrive();
        barrier.wait_idle().await;
    }
}
