// Copyright 2025 the ftn-prober contributors.
//
// This software is licensed to you under The General Public License (GPL), version 3. Unless
// required by applicable law or agreed to in writing, software distributed under the GPL Licence
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either
// express or implied. Please review the Licence for the specific language governing permissions
// and limitations.

//! Runtime configuration for the testing engine.

use ftn_model::InternetProtocol;
use serde::Deserialize;
use std::{
    collections::{BTreeMap, BTreeSet},
    time::Duration,
};

/// Engine options; all fields have serde defaults so a partial TOML table
/// is enough.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Number of worker tasks (`W`); the pool queue holds `2·W` jobs.
    pub worker_count: usize,
    /// At most this many nodes are submitted per scheduler cycle.
    pub per_cycle_cap: usize,
    /// Base re-test interval; backoff multiplies it by `2^level`.
    #[serde(with = "duration_secs")]
    pub base_interval: Duration,
    /// Scheduler poll sleep between cycles.
    #[serde(with = "duration_secs")]
    pub poll_interval: Duration,
    /// Backoff level cap.
    pub backoff_max_level: u32,
    /// Priority boost unit.
    pub priority_boost: i32,
    /// Protocols the engine is allowed to probe. Empty means all.
    pub enabled_protocols: BTreeSet<String>,
    /// Default per-protocol handshake timeout.
    #[serde(with = "duration_secs")]
    pub probe_timeout: Duration,
    /// Per-protocol timeout overrides, keyed by tag (`IBN`, `ITN`, ...).
    #[serde(with = "duration_secs_map")]
    pub probe_timeout_overrides: BTreeMap<String, Duration>,
    /// Test every advertised hostname instead of only the primary one.
    pub test_all_hostnames: bool,
    /// Respect `INO4` by skipping IPv4 probes.
    pub honor_ino4: bool,
    /// Respect `INO6` by skipping IPv6 probes.
    pub honor_ino6: bool,
    /// Days of history consulted when rebuilding scheduler state.
    pub history_window_days: u32,
    /// History rows per node considered for the failure streak (`K`).
    pub history_depth: usize,
    /// Batcher flush threshold (rows).
    pub batch_size: usize,
    /// Batcher flush interval.
    #[serde(with = "duration_secs")]
    pub flush_interval: Duration,
    /// Consecutive batcher flush failures before the scheduler pauses
    /// itself.
    pub storage_failure_pause_threshold: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_count: 8,
            per_cycle_cap: 64,
            base_interval: Duration::from_secs(60 * 60),
            poll_interval: Duration::from_secs(30),
            backoff_max_level: 6,
            priority_boost: 10,
            enabled_protocols: BTreeSet::new(),
            probe_timeout: Duration::from_secs(30),
            probe_timeout_overrides: BTreeMap::new(),
            test_all_hostnames: true,
            honor_ino4: true,
            honor_ino6: true,
            history_window_days: 7,
            history_depth: 10,
            batch_size: 100,
            flush_interval: Duration::from_secs(30),
            storage_failure_pause_threshold: 5,
        }
    }
}

impl EngineConfig {
    /// Whether a protocol is enabled by the per-protocol enable list.
    pub fn protocol_enabled(&self, protocol: InternetProtocol) -> bool {
        self.enabled_protocols.is_empty() || self.enabled_protocols.contains(protocol.tag())
    }

    /// Timeout for one protocol: the override if present, else the default.
    pub fn timeout_for(&self, protocol: InternetProtocol) -> Duration {
        self.probe_timeout_overrides
            .get(protocol.tag())
            .copied()
            .unwrap_or(self.probe_timeout)
    }

    /// The pool queue bound (`2·W`).
    pub fn queue_capacity(&self) -> usize {
        self.worker_count.max(1) * 2
    }
}

/// Durations configured as integer seconds, the TOML-friendly shape.
mod duration_secs {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let seconds = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(seconds))
    }
}

mod duration_secs_map {
    use serde::{Deserialize, Deserializer};
    use std::{collections::BTreeMap, time::Duration};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BTreeMap<String, Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let map = BTreeMap::<String, u64>::deserialize(deserializer)?;
        Ok(map
            .into_iter()
            .map(|(k, v)| (k, Duration::from_secs(v)))
            .collect())
    }
}
