// Copyright 2025 the ftn-prober contributors.
//
// This software is licensed to you under The General Public License (GPL), version 3. Unless
// required by applicable law or agreed to in writing, software distributed under the GPL Licence
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either
// express or implied. Please review the Licence for the specific language governing permissions
// and limitations.

//! Result batcher: a pass-through in front of the storage adapter's write
//! batch so per-result submissions never pay per-row I/O.
//!
//! The buffer mutex is held only long enough to swap the rows out; the
//! actual store call runs outside it, serialised by a separate flush lock.
//! A failed flush puts the rows back at the front of the buffer.

use crate::{Result, Shutdown};
use ftn_model::TestResult;
use ftn_storage::ResultStore;
use std::{
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{
    sync::Mutex,
    time::{interval, timeout, Instant, MissedTickBehavior},
};

/// Bound on the final flush performed during shutdown.
const FINAL_FLUSH_TIMEOUT: Duration = Duration::from_secs(10);

pub struct ResultBatcher {
    store: Arc<dyn ResultStore>,
    batch_size: usize,
    flush_interval: Duration,
    buffer: Mutex<Vec<TestResult>>,
    flush_lock: Mutex<()>,
    last_flush: Mutex<Instant>,
    consecutive_failures: AtomicU32,
}

impl ResultBatcher {
    pub fn new(store: Arc<dyn ResultStore>, batch_size: usize, flush_interval: Duration) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
            flush_interval,
            buffer: Mutex::new(Vec::new()),
            flush_lock: Mutex::new(()),
            last_flush: Mutex::new(Instant::now()),
            consecutive_failures: AtomicU32::new(0),
        }
    }

    /// Enqueue one result; flushes when the batch fills or has aged out.
    pub async fn submit(&self, result: TestResult) -> Result<()> {
        let should_flush = {
            let mut buffer = self.buffer.lock().await;
            buffer.push(result);
            buffer.len() >= self.batch_size
        };

        if should_flush || self.last_flush.lock().await.elapsed() >= self.flush_interval {
            self.flush().await?;
        }
        Ok(())
    }

    /// Flush the buffer through the adapter. Serialised; concurrent calls
    /// queue up behind the flush lock.
    pub async fn flush(&self) -> Result<()> {
        let _guard = self.flush_lock.lock().await;

        let batch = {
            let mut buffer = self.buffer.lock().await;
            if buffer.is_empty() {
                *self.last_flush.lock().await = Instant::now();
                return Ok(());
            }
            std::mem::take(&mut *buffer)
        };

        let count = batch.len();
        match self.store.store_test_results(batch.clone()).await {
            Ok(()) => {
                self.consecutive_failures.store(0, Ordering::SeqCst);
                *self.last_flush.lock().await = Instant::now();
                debug!("Batcher flushed {count} results");
                Ok(())
            }
            Err(err) => {
                // Put the rows back in front of anything submitted since.
                let mut buffer = self.buffer.lock().await;
                let newer = std::mem::replace(&mut *buffer, batch);
                buffer.extend(newer);
                let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
                warn!("Batcher flush of {count} results failed (streak {failures}): {err}");
                Err(err.into())
            }
        }
    }

    /// Flush failures since the last success, for the scheduler's
    /// self-pause check.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::SeqCst)
    }

    pub async fn buffered(&self) -> usize {
        self.buffer.lock().await.len()
    }

    /// Timer-driven flushing; on shutdown performs one final, bounded
    /// flush so nothing lingers in memory.
    pub fn spawn_periodic_flush(
        self: Arc<Self>,
        mut shutdown: Shutdown,
    ) -> tokio::task::JoinHandle<()> {
        let batcher = self;
        tokio::spawn(async move {
            let mut ticker = interval(batcher.flush_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(err) = batcher.flush().await {
                            error!("Periodic batcher flush failed: {err}");
                        }
                    }
                    _ = shutdown.wait() => {
                        match timeout(FINAL_FLUSH_TIMEOUT, batcher.flush()).await {
                            Ok(Ok(())) => info!("Final batcher flush complete"),
                            Ok(Err(err)) => error!("Final batcher flush failed: {err}"),
                            Err(_) => error!("Final batcher flush timed out"),
                        }
                        break;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shutdown_channel;
    use ftn_model::NodeAddress;
    use ftn_storage::InMemoryStore;

    fn result() -> TestResult {
        TestResult::new(NodeAddress::new(2, 450, 1024), "host.example.com", 0)
    }

    #[tokio::test]
    async fn flushes_once_batch_size_is_reached() {
        let store = Arc::new(InMemoryStore::new(1000));
        let batcher = ResultBatcher::new(
            Arc::clone(&store) as Arc<dyn ResultStore>,
            3,
            Duration::from_secs(3600),
        );

        batcher.submit(result()).await.expect("submit");
        batcher.submit(result()).await.expect("submit");
        assert_eq!(store.written_count().await, 0);

        batcher.submit(result()).await.expect("submit");
        assert_eq!(store.written_count().await, 3);
        assert_eq!(batcher.buffered().await, 0);
    }

    #[tokio::test]
    async fn failed_flush_retains_rows_and_counts_the_streak() {
        let store = Arc::new(InMemoryStore::new(1000));
        let batcher = ResultBatcher::new(
            Arc::clone(&store) as Arc<dyn ResultStore>,
            1,
            Duration::from_secs(3600),
        );

        store.set_fail_flushes(true);
        batcher.submit(result()).await.expect_err("flush must fail");
        assert_eq!(batcher.buffered().await, 1);
        assert_eq!(batcher.consecutive_failures(), 1);

        batcher.submit(result()).await.expect_err("still failing");
        assert_eq!(batcher.buffered().await, 2);
        assert_eq!(batcher.consecutive_failures(), 2);

        store.set_fail_flushes(false);
        batcher.flush().await.expect("retry succeeds");
        assert_eq!(store.written_count().await, 2);
        assert_eq!(batcher.consecutive_failures(), 0);
        assert_eq!(batcher.buffered().await, 0);
    }

    #[tokio::test]
    async fn rows_submitted_equal_rows_written_plus_buffered() {
        let store = Arc::new(InMemoryStore::new(1000));
        let batcher = ResultBatcher::new(
            Arc::clone(&store) as Arc<dyn ResultStore>,
            4,
            Duration::from_secs(3600),
        );

        for _ in 0..10 {
            batcher.submit(result()).await.expect("submit");
        }
        assert_eq!(
            store.written_count().await + batcher.buffered().await,
            10,
            "no loss, no double-write"
        );
    }

    #[tokio::test]
    async fn shutdown_triggers_a_final_flush() {
        let store = Arc::new(InMemoryStore::new(1000));
        let batcher = Arc::new(ResultBatcher::new(
            Arc::clone(&store) as Arc<dyn ResultStore>,
            100,
            Duration::from_secs(3600),
        ));

        batcher.submit(result()).await.expect("submit");
        assert_eq!(store.written_count().await, 0);

        let (handle, shutdown) = shutdown_channel();
        let task = batcher.spawn_periodic_flush(shutdown);
        handle.trigger();
        task.await.expect("task");

        assert_eq!(store.written_count().await, 1);
    }
}
