// Copyright 2025 the ftn-prober contributors.
//
// This software is licensed to you under The General Public License (GPL), version 3. Unless
// required by applicable law or agreed to in writing, software distributed under the GPL Licence
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either
// express or implied. Please review the Licence for the specific language governing permissions
// and limitations.

//! Bounded worker pool: `W` worker tasks over a queue of capacity `2·W`.
//!
//! `start` and `stop` are both idempotent; `stop` closes the queue and
//! waits for workers to drain in-flight jobs. Panicking jobs are a
//! programmer error and are not caught.

use crate::{Error, Result};
use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};
use tokio::sync::{mpsc, Mutex};

/// Jobs are boxed futures; a submitted `None` is accepted and ignored.
pub type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

pub struct WorkerPool {
    workers: usize,
    queue_capacity: usize,
    sender: Mutex<Option<mpsc::Sender<Option<Job>>>>,
    handles: Mutex<Vec<tokio::task::JoinHandle<()>>>,
    active: Arc<AtomicUsize>,
    queued: Arc<AtomicUsize>,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            workers,
            queue_capacity: workers * 2,
            sender: Mutex::new(None),
            handles: Mutex::new(Vec::new()),
            active: Arc::new(AtomicUsize::new(0)),
            queued: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Spawn the workers. A no-op when already running.
    pub async fn start(&self) {
        let mut sender = self.sender.lock().await;
        if sender.is_some() {
            debug!("Worker pool already running, start is a no-op");
            return;
        }

        let (tx, rx) = mpsc::channel::<Option<Job>>(self.queue_capacity);
        let rx = Arc::new(Mutex::new(rx));
        let mut handles = self.handles.lock().await;

        for worker_id in 0..self.workers {
            let rx = Arc::clone(&rx);
            let active = Arc::clone(&self.active);
            let queued = Arc::clone(&self.queued);

            handles.push(tokio::spawn(async move {
                loop {
                    // Hold the receiver lock only while dequeueing.
                    let job = { rx.lock().await.recv().await };
                    let Some(job) = job else {
                        trace!("Worker {worker_id} observed queue closure, exiting");
                        break;
                    };
                    let _ = queued.fetch_sub(1, Ordering::SeqCst);

                    let Some(job) = job else {
                        continue;
                    };
                    let _ = active.fetch_add(1, Ordering::SeqCst);
                    job.await;
                    let _ = active.fetch_sub(1, Ordering::SeqCst);
                }
            }));
        }

        *sender = Some(tx);
        info!("Worker pool started with {} workers", self.workers);
    }

    /// Submit one job without blocking. [`Error::QueueFull`] when the
    /// queue is at capacity, [`Error::PoolStopped`] after `stop`.
    pub async fn submit(&self, job: Option<Job>) -> Result<()> {
        let sender = self.sender.lock().await;
        let Some(sender) = sender.as_ref() else {
            return Err(Error::PoolStopped);
        };

        let _ = self.queued.fetch_add(1, Ordering::SeqCst);
        match sender.try_send(job) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                let _ = self.queued.fetch_sub(1, Ordering::SeqCst);
                Err(Error::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                let _ = self.queued.fetch_sub(1, Ordering::SeqCst);
                Err(Error::PoolStopped)
            }
        }
    }

    /// Close the queue and wait for in-flight jobs to drain. A no-op when
    /// already stopped.
    pub async fn stop(&self) {
        let sender = { self.sender.lock().await.take() };
        if sender.is_none() {
            debug!("Worker pool already stopped, stop is a no-op");
            return;
        }
        drop(sender);

        let handles: Vec<_> = self.handles.lock().await.drain(..).collect();
        for handle in handles {
            if let Err(err) = handle.await {
                error!("Worker task ended abnormally: {err}");
            }
        }
        info!("Worker pool stopped");
    }

    /// Jobs currently executing.
    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Jobs submitted but not yet picked up.
    pub fn queue_size(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    pub fn worker_count(&self) -> usize {
        self.workers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::Semaphore;

    fn job_from(future: impl Future<Output = ()> + Send + 'static) -> Option<Job> {
        Some(Box::pin(future))
    }

    #[tokio::test]
    async fn jobs_run_and_counters_return_to_zero() {
        let pool = WorkerPool::new(2);
        pool.start().await;

        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..4 {
            let counter = Arc::clone(&counter);
            pool.submit(job_from(async move {
                let _ = counter.fetch_add(1, Ordering::SeqCst);
            }))
            .await
            .expect("submit");
        }

        pool.stop().await;
        assert_eq!(counter.load(Ordering::SeqCst), 4);
        assert_eq!(pool.active_count(), 0);
        assert_eq!(pool.queue_size(), 0);
    }

    #[tokio::test]
    async fn active_count_never_exceeds_worker_count() {
        let pool = WorkerPool::new(2);
        pool.start().await;

        // Jobs block on a semaphore so all workers are busy at once.
        let gate = Arc::new(Semaphore::new(0));
        for _ in 0..4 {
            let gate = Arc::clone(&gate);
            pool.submit(job_from(async move {
                let _permit = gate.acquire().await.expect("gate");
            }))
            .await
            .expect("submit");
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(pool.active_count() <= 2);
        assert!(pool.queue_size() <= pool.queue_capacity());

        gate.add_permits(4);
        pool.stop().await;
        assert_eq!(pool.active_count(), 0);
    }

    #[tokio::test]
    async fn queue_overflow_is_rejected_not_blocked() {
        let pool = WorkerPool::new(1);
        pool.start().await;

        let gate = Arc::new(Semaphore::new(0));
        let mut rejected = 0;
        // 1 in-flight + 2 queued fit; the rest must be rejected.
        for _ in 0..10 {
            let gate = Arc::clone(&gate);
            let result = pool
                .submit(job_from(async move {
                    let _permit = gate.acquire().await.expect("gate");
                }))
                .await;
            if matches!(result, Err(Error::QueueFull)) {
                rejected += 1;
            }
        }
        assert!(rejected >= 7, "expected most submissions rejected, got {rejected}");

        gate.add_permits(10);
        pool.stop().await;
    }

    #[tokio::test]
    async fn nil_jobs_are_accepted_and_ignored() {
        let pool = WorkerPool::new(1);
        pool.start().await;
        pool.submit(None).await.expect("nil job accepted");
        pool.stop().await;
        assert_eq!(pool.queue_size(), 0);
    }

    #[tokio::test]
    async fn start_and_stop_are_idempotent() {
        let pool = WorkerPool::new(1);
        pool.start().await;
        pool.start().await;

        let ran = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ran);
        pool.submit(job_from(async move {
            let _ = counter.fetch_add(1, Ordering::SeqCst);
        }))
        .await
        .expect("submit");

        pool.stop().await;
        pool.stop().await;
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn submit_after_stop_is_rejected() {
        let pool = WorkerPool::new(1);
        pool.start().await;
        pool.stop().await;

        let result = pool.submit(job_from(async {})).await;
        assert!(matches!(result, Err(Error::PoolStopped)));
    }

    #[tokio::test]
    async fn stop_waits_for_in_flight_jobs() {
        let pool = WorkerPool::new(1);
        pool.start().await;

        let done = Arc::new(AtomicUsize::new(0));
        let flag = Arc::clone(&done);
        pool.submit(job_from(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            let _ = flag.fetch_add(1, Ordering::SeqCst);
        }))
        .await
        .expect("submit");

        pool.stop().await;
        assert_eq!(done.load(Ordering::SeqCst), 1, "stop must drain the job");
    }
}
