// Copyright 2025 the ftn-prober contributors.
//
// This software is licensed to you under The General Public License (GPL), version 3. Unless
// required by applicable law or agreed to in writing, software distributed under the GPL Licence
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either
// express or implied. Please review the Licence for the specific language governing permissions
// and limitations.

//! The supervisor loop.
//!
//! Each cycle pulls the candidate list from the catalog, filters nodes
//! still in backoff or in flight, sorts by priority (ties broken by the
//! oldest last test) and feeds the worker pool until the per-cycle cap or
//! the queue bound stops it. Worker outcomes come back over a channel and
//! drive the per-node state machine; nothing but this task writes the
//! state map.

use crate::{
    pool::Job, state::node_priority, EngineConfig, Error, NodeTestState, ProbePipeline, Result,
    ResultBatcher, Shutdown, TestLifecycle, WorkerPool,
};
use chrono::{DateTime, Utc};
use ftn_model::{Node, NodeAddress};
use ftn_storage::{CatalogStore, ResultStore};
use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use tokio::sync::{mpsc, Mutex, RwLock};

/// Upper bound on candidates pulled per cycle.
const CANDIDATE_LIMIT: usize = 100_000;

/// Messages workers post back to the supervisor.
#[derive(Debug)]
enum WorkerEvent {
    Started(NodeAddress),
    Finished {
        address: NodeAddress,
        time: DateTime<Utc>,
        success: bool,
    },
}

pub struct Scheduler {
    catalog: Arc<dyn CatalogStore>,
    results: Arc<dyn ResultStore>,
    pipeline: Arc<ProbePipeline>,
    batcher: Arc<ResultBatcher>,
    pool: Arc<WorkerPool>,
    config: RwLock<Arc<EngineConfig>>,
    states: Mutex<HashMap<NodeAddress, NodeTestState>>,
    paused: AtomicBool,
    event_tx: mpsc::UnboundedSender<WorkerEvent>,
    event_rx: Mutex<mpsc::UnboundedReceiver<WorkerEvent>>,
}

impl Scheduler {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        results: Arc<dyn ResultStore>,
        pipeline: Arc<ProbePipeline>,
        batcher: Arc<ResultBatcher>,
        pool: Arc<WorkerPool>,
        config: Arc<EngineConfig>,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Self {
            catalog,
            results,
            pipeline,
            batcher,
            pool,
            config: RwLock::new(config),
            states: Mutex::new(HashMap::new()),
            paused: AtomicBool::new(false),
            event_tx,
            event_rx: Mutex::new(event_rx),
        }
    }

    async fn current_config(&self) -> Arc<EngineConfig> {
        Arc::clone(&*self.config.read().await)
    }

    /// Swap in new scheduling options. Applies from the next cycle;
    /// worker count and probe timeouts need a restart.
    pub async fn reload_config(&self, config: EngineConfig) {
        *self.config.write().await = Arc::new(config);
        info!("Scheduler configuration reloaded");
    }

    /// Rebuild the per-node state map from recent history: the newest row
    /// sets the last-test time, the leading failures (up to `K` rows)
    /// form the streak, and the backoff clock resumes from there.
    pub async fn rebuild_state(&self) -> Result<()> {
        let config = self.current_config().await;
        let outcomes = self
            .results
            .recent_outcomes(config.history_window_days)
            .await?;

        let mut states: HashMap<NodeAddress, NodeTestState> = HashMap::new();
        let mut rows_seen: HashMap<NodeAddress, usize> = HashMap::new();
        let mut streak_broken: HashSet<NodeAddress> = HashSet::new();

        for outcome in outcomes {
            let seen = rows_seen.entry(outcome.address).or_insert(0);
            let state = states.entry(outcome.address).or_default();

            if *seen == 0 {
                state.last_test = Some(outcome.time);
            }
            if *seen < config.history_depth && !streak_broken.contains(&outcome.address) {
                if outcome.is_operational {
                    let _ = streak_broken.insert(outcome.address);
                } else {
                    state.consecutive_failures += 1;
                }
            }
            *seen += 1;
        }

        for state in states.values_mut() {
            if let Some(last) = state.last_test {
                let delay = crate::backoff_delay(
                    state.consecutive_failures,
                    config.base_interval,
                    config.backoff_max_level,
                );
                state.next_attempt_after = Some(
                    last + chrono::Duration::from_std(delay).unwrap_or_else(|_| {
                        chrono::Duration::zero()
                    }),
                );
            }
        }

        info!("Rebuilt scheduler state for {} nodes", states.len());
        *self.states.lock().await = states;
        Ok(())
    }

    /// Cooperative pause: no new submissions, in-flight work continues.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
        info!("Scheduler paused");
    }

    /// Resume does not replay skipped cycles.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        info!("Scheduler resumed");
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Pool observability for the `workers` hook.
    pub fn worker_stats(&self) -> (usize, usize, usize) {
        (
            self.pool.worker_count(),
            self.pool.active_count(),
            self.pool.queue_size(),
        )
    }

    /// The supervisor loop. Owns pool start and stop; nothing else may
    /// stop the pool.
    pub async fn run(&self, mut shutdown: Shutdown) -> Result<()> {
        self.pool.start().await;
        if let Err(err) = self.rebuild_state().await {
            warn!("Scheduler state rebuild failed, starting cold: {err}");
        }

        loop {
            if shutdown.is_triggered() {
                break;
            }

            self.drain_events().await;

            let config = self.current_config().await;
            if self.batcher.consecutive_failures() >= config.storage_failure_pause_threshold
                && !self.is_paused()
            {
                error!(
                    "Storage has failed {} consecutive flushes, pausing the scheduler",
                    self.batcher.consecutive_failures()
                );
                self.pause();
            }

            if !self.is_paused() {
                match self.run_cycle().await {
                    Ok(submitted) if submitted > 0 => {
                        debug!("Scheduler cycle submitted {submitted} node tests");
                    }
                    Ok(_) => {}
                    Err(err) => warn!("Scheduler cycle failed: {err}"),
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(config.poll_interval) => {}
                _ = shutdown.wait() => break,
            }
        }

        info!("Scheduler halting: draining worker pool");
        self.pool.stop().await;
        self.drain_events().await;
        Ok(())
    }

    /// Apply queued worker events to the state map.
    pub async fn drain_events(&self) {
        let config = self.current_config().await;
        let mut rx = self.event_rx.lock().await;
        let mut states = self.states.lock().await;
        while let Ok(event) = rx.try_recv() {
            match event {
                WorkerEvent::Started(address) => {
                    states.entry(address).or_default().lifecycle = TestLifecycle::InFlight;
                }
                WorkerEvent::Finished {
                    address,
                    time,
                    success,
                } => {
                    states.entry(address).or_default().record_outcome(
                        time,
                        success,
                        config.base_interval,
                        config.backoff_max_level,
                    );
                }
            }
        }
    }

    /// One scheduling iteration; returns how many tests were submitted.
    pub async fn run_cycle(&self) -> Result<usize> {
        let config = self.current_config().await;
        let candidates = self.catalog.nodes_with_internet(CANDIDATE_LIMIT).await?;
        if candidates.is_empty() {
            return Ok(0);
        }

        let now = Utc::now();
        let mut eligible: Vec<(i32, Option<DateTime<Utc>>, Node)> = {
            let states = self.states.lock().await;
            candidates
                .into_iter()
                .filter(|node| {
                    states
                        .get(&node.address)
                        .map(|state| state.eligible(now))
                        .unwrap_or(true)
                })
                .map(|node| {
                    let priority = node_priority(&node, config.priority_boost);
                    let last_test = states.get(&node.address).and_then(|s| s.last_test);
                    (priority, last_test, node)
                })
                .collect()
        };

        // Highest priority first; ties go to the longest-untested node.
        eligible.sort_by(|a, b| {
            b.0.cmp(&a.0).then_with(|| match (a.1, b.1) {
                (None, None) => std::cmp::Ordering::Equal,
                (None, Some(_)) => std::cmp::Ordering::Less,
                (Some(_), None) => std::cmp::Ordering::Greater,
                (Some(x), Some(y)) => x.cmp(&y),
            })
        });

        let mut submitted = 0;
        for (priority, _, node) in eligible {
            if submitted >= config.per_cycle_cap {
                break;
            }

            let address = node.address;
            let job = self.make_job(node);
            match self.pool.submit(Some(job)).await {
                Ok(()) => {
                    let mut states = self.states.lock().await;
                    let state = states.entry(address).or_default();
                    state.lifecycle = TestLifecycle::Queued;
                    state.priority = priority;
                    submitted += 1;
                }
                Err(Error::QueueFull) => {
                    trace!("Worker queue full, ending cycle after {submitted} submissions");
                    break;
                }
                Err(Error::PoolStopped) => {
                    warn!("Worker pool stopped mid-cycle");
                    break;
                }
                Err(other) => return Err(other),
            }
        }

        Ok(submitted)
    }

    fn make_job(&self, node: Node) -> Job {
        let pipeline = Arc::clone(&self.pipeline);
        let batcher = Arc::clone(&self.batcher);
        let events = self.event_tx.clone();

        Box::pin(async move {
            let address = node.address;
            let _ = events.send(WorkerEvent::Started(address));

            let results = pipeline.test_node(&node).await;
            let success = results.iter().any(|r| r.is_operational);

            for result in results {
                // Flush failures are the batcher's to retry; the outcome
                // still reaches the state machine.
                if let Err(err) = batcher.submit(result).await {
                    debug!("Batcher rejected a result for {address}: {err}");
                }
            }

            let _ = events.send(WorkerEvent::Finished {
                address,
                time: Utc::now(),
                success,
            });
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ftn_lookup::StaticResolver;
    use ftn_model::{InternetEndpoint, InternetProtocol};
    use ftn_probes::default_registry;
    use ftn_storage::InMemoryStore;
    use std::time::Duration;

    fn node(zone: u16, net: u16, num: u16, host: Option<&str>) -> Node {
        let mut node = Node {
            address: NodeAddress::new(zone, net, num),
            system_name: format!("Node {num}"),
            ..Default::default()
        };
        let endpoints = match host {
            Some(host) => vec![InternetEndpoint::address_only(host)],
            None => vec![],
        };
        let _ = node.internet.protocols.insert(InternetProtocol::Binkp, endpoints);
        node
    }

    struct Fixture {
        store: Arc<InMemoryStore>,
        scheduler: Scheduler,
    }

    async fn fixture(config: EngineConfig, nodes: Vec<Node>) -> Fixture {
        // Every hostname resolves to nothing, so probes short-circuit fast.
        fixture_with_resolver(config, nodes, Arc::new(StaticResolver::new())).await
    }

    async fn fixture_with_resolver(
        config: EngineConfig,
        nodes: Vec<Node>,
        resolver: Arc<dyn ftn_lookup::Resolver>,
    ) -> Fixture {
        let store = Arc::new(InMemoryStore::new(1));
        let snapshot = ftn_model::NodelistSnapshot {
            date: chrono::NaiveDate::from_ymd_opt(2023, 5, 5).expect("date"),
            day_of_year: 125,
            crc: None,
            format: ftn_model::NodelistFormat::F2020,
            source_path: "/tmp/nodelist".into(),
            nodes,
        };
        store.insert_catalog(&snapshot).await.expect("catalog");

        let config = Arc::new(config);
        let pipeline = Arc::new(ProbePipeline::new(
            resolver,
            None,
            default_registry(),
            Arc::clone(&config),
        ));
        let batcher = Arc::new(ResultBatcher::new(
            Arc::clone(&store) as Arc<dyn ResultStore>,
            1,
            Duration::from_secs(3600),
        ));
        let pool = Arc::new(WorkerPool::new(config.worker_count));
        pool.start().await;

        let scheduler = Scheduler::new(
            Arc::clone(&store) as Arc<dyn CatalogStore>,
            Arc::clone(&store) as Arc<dyn ResultStore>,
            pipeline,
            batcher,
            pool,
            config,
        );
        Fixture { store, scheduler }
    }

    async fn wait_for_written(store: &InMemoryStore, count: usize) {
        for _ in 0..200 {
            if store.written_count().await >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "timed out waiting for {count} written results, have {}",
            store.written_count().await
        );
    }

    #[tokio::test]
    async fn cycle_tests_candidates_and_records_failures() {
        let fixture = fixture(
            EngineConfig {
                worker_count: 4,
                ..Default::default()
            },
            vec![node(2, 450, 1, Some("a.example.com")), node(2, 450, 2, Some("b.example.com"))],
        )
        .await;

        let submitted = fixture.scheduler.run_cycle().await.expect("cycle");
        assert_eq!(submitted, 2);

        wait_for_written(&fixture.store, 2).await;
        fixture.scheduler.drain_events().await;

        let states = fixture.scheduler.states.lock().await;
        let state = states
            .get(&NodeAddress::new(2, 450, 1))
            .expect("state exists");
        assert_eq!(state.consecutive_failures, 1, "DNS failure counts");
        assert_eq!(state.lifecycle, TestLifecycle::Cooldown);
        assert!(state.next_attempt_after.is_some());
    }

    #[tokio::test]
    async fn nodes_in_cooldown_are_not_resubmitted() {
        let fixture = fixture(
            EngineConfig {
                worker_count: 2,
                ..Default::default()
            },
            vec![node(2, 450, 1, Some("a.example.com"))],
        )
        .await;

        let first = fixture.scheduler.run_cycle().await.expect("cycle");
        assert_eq!(first, 1);
        wait_for_written(&fixture.store, 1).await;
        fixture.scheduler.drain_events().await;

        // Backoff pushed next_attempt_after into the future.
        let second = fixture.scheduler.run_cycle().await.expect("cycle");
        assert_eq!(second, 0);
    }

    #[tokio::test]
    async fn per_cycle_cap_limits_submissions() {
        let nodes = (1..=10)
            .map(|i| node(2, 450, i, Some("host.example.com")))
            .collect();
        let fixture = fixture(
            EngineConfig {
                worker_count: 16,
                per_cycle_cap: 3,
                ..Default::default()
            },
            nodes,
        )
        .await;

        let submitted = fixture.scheduler.run_cycle().await.expect("cycle");
        assert_eq!(submitted, 3);
    }

    /// Resolver that holds every job long enough for the queue to fill.
    struct SlowResolver(Duration);

    #[async_trait::async_trait]
    impl ftn_lookup::Resolver for SlowResolver {
        async fn resolve(&self, hostname: &str) -> ftn_model::DnsOutcome {
            tokio::time::sleep(self.0).await;
            ftn_model::DnsOutcome {
                ipv4: Vec::new(),
                ipv6: Vec::new(),
                error: Some(format!("no such host: {hostname}")),
            }
        }
    }

    #[tokio::test]
    async fn queue_bound_ends_the_cycle_early() {
        let nodes = (1..=50)
            .map(|i| node(2, 450, i, Some("host.example.com")))
            .collect();
        let fixture = fixture_with_resolver(
            EngineConfig {
                worker_count: 1,
                per_cycle_cap: 50,
                ..Default::default()
            },
            nodes,
            Arc::new(SlowResolver(Duration::from_millis(300))),
        )
        .await;

        let submitted = fixture.scheduler.run_cycle().await.expect("cycle");
        // 1 worker: at most a couple in flight plus a queue of two.
        assert!(
            submitted <= 4,
            "submitted {submitted}, expected the queue bound to stop the cycle"
        );
        wait_for_written(&fixture.store, submitted).await;
    }

    #[tokio::test]
    async fn higher_priority_nodes_submit_first() {
        // Node without hostname scores lower than one with.
        let rich = node(2, 450, 1, Some("rich.example.com"));
        let poor = node(2, 450, 2, None);
        let fixture = fixture(
            EngineConfig {
                worker_count: 4,
                per_cycle_cap: 1,
                ..Default::default()
            },
            vec![poor, rich],
        )
        .await;

        let submitted = fixture.scheduler.run_cycle().await.expect("cycle");
        assert_eq!(submitted, 1);

        wait_for_written(&fixture.store, 1).await;
        let written = fixture.store.latest_test_results(10).await.expect("results");
        assert_eq!(
            written[0].address,
            NodeAddress::new(2, 450, 1),
            "the hostname-bearing node must win the single slot"
        );
    }

    #[tokio::test]
    async fn reload_config_applies_to_the_next_cycle() {
        let nodes = (1..=5)
            .map(|i| node(2, 450, i, Some("host.example.com")))
            .collect();
        let fixture = fixture(
            EngineConfig {
                worker_count: 8,
                per_cycle_cap: 5,
                ..Default::default()
            },
            nodes,
        )
        .await;

        fixture
            .scheduler
            .reload_config(EngineConfig {
                worker_count: 8,
                per_cycle_cap: 1,
                ..Default::default()
            })
            .await;

        let submitted = fixture.scheduler.run_cycle().await.expect("cycle");
        assert_eq!(submitted, 1, "the reloaded cap must apply");
    }

    #[tokio::test]
    async fn paused_scheduler_is_observable() {
        let fixture = fixture(EngineConfig::default(), vec![]).await;
        assert!(!fixture.scheduler.is_paused());
        fixture.scheduler.pause();
        assert!(fixture.scheduler.is_paused());
        fixture.scheduler.resume();
        assert!(!fixture.scheduler.is_paused());
    }

    #[tokio::test]
    async fn rebuild_state_restores_failure_streaks() {
        let fixture = fixture(EngineConfig::default(), vec![]).await;
        let address = NodeAddress::new(2, 450, 99);

        // History, oldest to newest: ok, fail, fail.
        let mut results = Vec::new();
        for (minutes_ago, operational) in [(30i64, true), (20, false), (10, false)] {
            let mut result = ftn_model::TestResult::new(address, "x.example.com", 0);
            result.time = Utc::now() - chrono::Duration::minutes(minutes_ago);
            result.is_operational = operational;
            results.push(result);
        }
        fixture
            .store
            .store_test_results(results)
            .await
            .expect("seed history");

        fixture.scheduler.rebuild_state().await.expect("rebuild");
        let states = fixture.scheduler.states.lock().await;
        let state = states.get(&address).expect("state");
        assert_eq!(state.consecutive_failures, 2);
        assert!(state.last_test.is_some());
        assert!(state.next_attempt_after.is_some());
    }
}
