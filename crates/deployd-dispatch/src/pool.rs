//! Bounded worker pool shared by environment actors
//!
//! Actors decide eligibility inline and hand the run-and-record step to the
//! pool. A submitter waits for a free permit before its job is spawned, so a
//! saturated pool slows the submitting actor down instead of queueing
//! without bound, and jobs start in the order each actor submitted them.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

use crate::error::{DispatchError, Result};

/// Fixed-size pool of concurrently running action jobs
#[derive(Debug, Clone)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    tracker: TaskTracker,
    workers: usize,
}

impl WorkerPool {
    /// Create a pool running at most `workers` jobs at once
    pub fn new(workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(DispatchError::InvalidConfiguration(
                "worker pool needs at least one worker".to_string(),
            ));
        }
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(workers)),
            tracker: TaskTracker::new(),
            workers,
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Jobs currently running or waiting to be reaped
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Wait for a free worker, then run `job` on it
    ///
    /// Fails only when the pool has been shut down.
    pub async fn submit<F>(&self, job: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| DispatchError::ExecutionFailed("worker pool is shut down".to_string()))?;

        self.tracker.spawn(async move {
            let _permit = permit;
            job.await;
        });
        debug!(in_flight = self.tracker.len(), "Submitted job to worker pool");
        Ok(())
    }

    /// Stop accepting jobs and wait for every submitted job to finish
    pub async fn shutdown(&self) {
        info!(in_flight = self.tracker.len(), "Draining worker pool");
        self.tracker.close();
        self.tracker.wait().await;
        self.semaphore.close();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_zero_workers_rejected() {
        assert!(WorkerPool::new(0).is_err());
    }

    #[tokio::test]
    async fn test_never_exceeds_worker_count() {
        let pool = WorkerPool::new(2).unwrap();
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        for _ in 0..8 {
            let running = running.clone();
            let peak = peak.clone();
            pool.submit(async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                running.fetch_sub(1, Ordering::SeqCst);
            })
            .await
            .unwrap();
        }

        pool.shutdown().await;
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(running.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_in_flight_jobs() {
        let pool = WorkerPool::new(4).unwrap();
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..4 {
            let done = done.clone();
            pool.submit(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                done.fetch_add(1, Ordering::SeqCst);
            })
            .await
            .unwrap();
        }

        pool.shutdown().await;
        assert_eq!(done.load(Ordering::SeqCst), 4);
        assert_eq!(pool.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_fails() {
        let pool = WorkerPool::new(1).unwrap();
        pool.shutdown().await;
        assert!(pool.submit(async {}).await.is_err());
    }
}
