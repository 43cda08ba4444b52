//! Bounded worker pool for per-record dispatch
//!
//! Every submitted task is spawned immediately and waits for one of `max_workers`
//! semaphore permits before running, so the queue is unbounded while concurrency is
//! capped. [`DispatchWorkerPool::shutdown`] stops accepting work and waits for every
//! accepted task, queued or running, to finish.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

#[derive(Debug)]
pub struct DispatchWorkerPool {
    semaphore: Arc<Semaphore>,
    tracker: TaskTracker,
    accepting: AtomicBool,
    max_workers: usize,
}

impl DispatchWorkerPool {
    /// Pool running at most `max_workers` tasks at once (minimum 1)
    pub fn new(max_workers: usize) -> Self {
        let max_workers = max_workers.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_workers)),
            tracker: TaskTracker::new(),
            accepting: AtomicBool::new(true),
            max_workers,
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Queue a task; returns false once the pool is shutting down
    pub fn submit<F>(&self, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if !self.accepting.load(Ordering::Acquire) {
            return false;
        }
        let semaphore = self.semaphore.clone();
        self.tracker.spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    warn!("Dispatch semaphore closed, dropping task");
                    return;
                }
            };
            task.await;
        });
        true
    }

    /// Tasks accepted and not yet finished
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Stop accepting tasks and wait for accepted ones up to `deadline`
    ///
    /// Returns true when every task finished in time.
    pub async fn shutdown(&self, deadline: Duration) -> bool {
        self.accepting.store(false, Ordering::Release);
        self.tracker.close();
        let pending = self.tracker.len();
        debug!(pending = pending, "Draining dispatch worker pool");

        match tokio::time::timeout(deadline, self.tracker.wait()).await {
            Ok(()) => true,
            Err(_) => {
                warn!(
                    pending = self.tracker.len(),
                    deadline_ms = deadline.as_millis() as u64,
                    "Dispatch worker pool did not drain before the deadline"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    #[tokio::test]
    async fn test_concurrency_is_capped() {
        let pool = DispatchWorkerPool::new(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        for _ in 0..8 {
            let running = running.clone();
            let peak = peak.clone();
            assert!(pool.submit(async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                running.fetch_sub(1, Ordering::SeqCst);
            }));
        }

        assert!(pool.shutdown(Duration::from_secs(5)).await);
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(pool.in_flight(), 0);
    }

    #[test]
    fn test_zero_workers_means_one() {
        assert_eq!(DispatchWorkerPool::new(0).max_workers(), 1);
    }

    #[test]
    fn test_idle_pool_shuts_down_immediately() {
        let pool = DispatchWorkerPool::new(4);
        assert!(tokio_test::block_on(pool.shutdown(Duration::from_millis(10))));
        assert!(!pool.submit(async {}));
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_blocked_task() {
        let pool = DispatchWorkerPool::new(1);
        let release = Arc::new(Notify::new());
        let done = Arc::new(AtomicBool::new(false));
        {
            let release = release.clone();
            let done = done.clone();
            pool.submit(async move {
                release.notified().await;
                done.store(true, Ordering::SeqCst);
            });
        }

        assert!(!pool.shutdown(Duration::from_millis(50)).await);
        assert!(!pool.submit(async {}));

        release.notify_one();
        assert!(pool.shutdown(Duration::from_secs(5)).await);
        assert!(done.load(Ordering::SeqCst));
    }
}
