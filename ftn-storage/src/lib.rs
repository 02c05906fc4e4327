// Copyright 2025 the ftn-prober contributors.
//
// This software is licensed to you under The General Public License (GPL), version 3. Unless
// required by applicable law or agreed to in writing, software distributed under the GPL Licence
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either
// express or implied. Please review the Licence for the specific language governing permissions
// and limitations.

//! Storage adapter: the node catalog and the test-result history live in
//! ClickHouse. Writes batch up to a size or age threshold; a failed flush
//! keeps the buffer so the next trigger retries. The engine talks to the
//! [`CatalogStore`]/[`ResultStore`] traits, so tests run against the
//! in-memory implementation.

#[macro_use]
extern crate tracing;

pub mod adapter;
pub mod error;
pub mod memory;
pub mod row;
pub mod schema;

pub use adapter::{ClickHouseStore, StoreConfig};
pub use error::{Error, Result};
pub use memory::InMemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use ftn_model::{Node, NodeAddress, NodelistSnapshot, TestResult};

/// One node's most recent observed state, projected over the last week.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeStatus {
    pub address: NodeAddress,
    pub last_tested: DateTime<Utc>,
    pub is_operational: bool,
    pub binkp_success: bool,
    pub ifcico_success: bool,
    pub telnet_success: bool,
    pub country: String,
    pub isp: String,
}

/// A reduced history row for scheduler state rebuilding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutcomeRow {
    pub address: NodeAddress,
    pub time: DateTime<Utc>,
    pub is_operational: bool,
}

/// Catalog surface: parsed nodelists in, candidate node lists out.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// The most recent ingested nodelist date, if any.
    async fn latest_snapshot_date(&self) -> Result<Option<NaiveDate>>;

    /// Whether a snapshot with this date and CRC is already ingested.
    async fn has_snapshot(&self, date: NaiveDate, crc: Option<u32>) -> Result<bool>;

    /// Append a parsed snapshot. Idempotent per
    /// `(nodelist_date, zone, net, node, conflict_sequence)`.
    async fn insert_catalog(&self, snapshot: &NodelistSnapshot) -> Result<()>;

    /// Latest-snapshot nodes with at least one internet protocol.
    async fn nodes_with_internet(&self, limit: usize) -> Result<Vec<Node>>;

    async fn nodes_by_zone(&self, zone: u16) -> Result<Vec<Node>>;

    /// Latest-snapshot nodes advertising one protocol tag, e.g. `IBN`.
    async fn nodes_by_protocol(&self, tag: &str, limit: usize) -> Result<Vec<Node>>;

    /// One node from the latest snapshot.
    async fn node(&self, address: NodeAddress) -> Result<Option<Node>>;
}

/// Result surface: batched writes plus the read projections the scheduler
/// and CLI hooks need.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Enqueue one result; flushes when the batch fills or ages out.
    async fn store_test_result(&self, result: TestResult) -> Result<()>;

    /// Enqueue many results and flush immediately to bound loss.
    async fn store_test_results(&self, results: Vec<TestResult>) -> Result<()>;

    /// Write the buffer out. On failure the buffer is retained and the
    /// error surfaces to the caller; the next trigger retries.
    async fn flush(&self) -> Result<()>;

    async fn latest_test_results(&self, limit: usize) -> Result<Vec<TestResult>>;

    async fn node_history(&self, address: NodeAddress, limit: usize) -> Result<Vec<TestResult>>;

    /// Per-node argmax-by-time projection over the last seven days.
    async fn current_status(&self) -> Result<Vec<NodeStatus>>;

    /// Reduced rows for the last `days`, newest first, for rebuilding
    /// scheduler state on startup.
    async fn recent_outcomes(&self, days: u32) -> Result<Vec<OutcomeRow>>;

    /// Flush and release.
    async fn close(&self) -> Result<()>;
}
