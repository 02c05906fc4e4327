// Copyright 2025 the ftn-prober contributors.
//
// This software is licensed to you under The General Public License (GPL), version 3. Unless
// required by applicable law or agreed to in writing, software distributed under the GPL Licence
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either
// express or implied. Please review the Licence for the specific language governing permissions
// and limitations.

//! In-memory store implementing both storage traits, for engine tests and
//! one-shot commands that run without a database.

use crate::{
    CatalogStore, Error, NodeStatus, OutcomeRow, Result, ResultStore,
};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use ftn_model::{InternetProtocol, Node, NodeAddress, NodelistSnapshot, TestResult};
use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicBool, Ordering},
};
use tokio::sync::{Mutex, RwLock};

/// Catalog rows keyed the same way the ClickHouse table is sorted.
type CatalogKey = (NaiveDate, u16, u16, u16, u32);

#[derive(Default)]
pub struct InMemoryStore {
    batch_size: usize,
    catalog: RwLock<BTreeMap<CatalogKey, Node>>,
    snapshot_meta: RwLock<Vec<(NaiveDate, u32)>>,
    buffer: Mutex<Vec<TestResult>>,
    written: RwLock<Vec<TestResult>>,
    fail_flushes: AtomicBool,
}

impl InMemoryStore {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            ..Default::default()
        }
    }

    /// Make every flush fail until reset; buffered rows must survive.
    pub fn set_fail_flushes(&self, fail: bool) {
        self.fail_flushes.store(fail, Ordering::SeqCst);
    }

    pub async fn written_count(&self) -> usize {
        self.written.read().await.len()
    }

    pub async fn buffered_count(&self) -> usize {
        self.buffer.lock().await.len()
    }

    async fn flush_inner(&self) -> Result<()> {
        let mut buffer = self.buffer.lock().await;
        if self.fail_flushes.load(Ordering::SeqCst) {
            return Err(Error::Unavailable("flushes disabled".to_string()));
        }
        if buffer.is_empty() {
            return Ok(());
        }
        self.written.write().await.append(&mut buffer);
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn latest_snapshot_date(&self) -> Result<Option<NaiveDate>> {
        Ok(self.catalog.read().await.keys().map(|k| k.0).max())
    }

    async fn has_snapshot(&self, date: NaiveDate, crc: Option<u32>) -> Result<bool> {
        Ok(self
            .snapshot_meta
            .read()
            .await
            .contains(&(date, crc.unwrap_or(0))))
    }

    async fn insert_catalog(&self, snapshot: &NodelistSnapshot) -> Result<()> {
        let mut catalog = self.catalog.write().await;
        for node in &snapshot.nodes {
            let key = (
                snapshot.date,
                node.address.zone,
                node.address.net,
                node.address.node,
                node.conflict_sequence,
            );
            // Same-key rows replace, like the ReplacingMergeTree does.
            let _ = catalog.insert(key, node.clone());
        }
        self.snapshot_meta
            .write()
            .await
            .push((snapshot.date, snapshot.crc.unwrap_or(0)));
        Ok(())
    }

    async fn nodes_with_internet(&self, limit: usize) -> Result<Vec<Node>> {
        let Some(latest) = self.latest_snapshot_date().await? else {
            return Ok(Vec::new());
        };
        Ok(self
            .catalog
            .read()
            .await
            .iter()
            .filter(|(key, node)| key.0 == latest && node.has_inet())
            .map(|(_, node)| node.clone())
            .take(limit.max(1))
            .collect())
    }

    async fn nodes_by_zone(&self, zone: u16) -> Result<Vec<Node>> {
        let Some(latest) = self.latest_snapshot_date().await? else {
            return Ok(Vec::new());
        };
        Ok(self
            .catalog
            .read()
            .await
            .iter()
            .filter(|(key, _)| key.0 == latest && key.1 == zone)
            .map(|(_, node)| node.clone())
            .collect())
    }

    async fn nodes_by_protocol(&self, tag: &str, limit: usize) -> Result<Vec<Node>> {
        let Some(latest) = self.latest_snapshot_date().await? else {
            return Ok(Vec::new());
        };
        let protocol = InternetProtocol::from_tag(tag).ok();
        Ok(self
            .catalog
            .read()
            .await
            .iter()
            .filter(|(key, node)| {
                key.0 == latest
                    && protocol
                        .map(|p| node.internet.protocols.contains_key(&p))
                        .unwrap_or(false)
            })
            .map(|(_, node)| node.clone())
            .take(limit.max(1))
            .collect())
    }

    async fn node(&self, address: NodeAddress) -> Result<Option<Node>> {
        let Some(latest) = self.latest_snapshot_date().await? else {
            return Ok(None);
        };
        Ok(self
            .catalog
            .read()
            .await
            .iter()
            .find(|(key, _)| {
                key.0 == latest
                    && key.1 == address.zone
                    && key.2 == address.net
                    && key.3 == address.node
            })
            .map(|(_, node)| node.clone()))
    }
}

#[async_trait]
impl ResultStore for InMemoryStore {
    async fn store_test_result(&self, result: TestResult) -> Result<()> {
        let should_flush = {
            let mut buffer = self.buffer.lock().await;
            buffer.push(result);
            buffer.len() >= self.batch_size
        };
        if should_flush {
            self.flush_inner().await?;
        }
        Ok(())
    }

    async fn store_test_results(&self, results: Vec<TestResult>) -> Result<()> {
        self.buffer.lock().await.extend(results);
        self.flush_inner().await
    }

    async fn flush(&self) -> Result<()> {
        self.flush_inner().await
    }

    async fn latest_test_results(&self, limit: usize) -> Result<Vec<TestResult>> {
        let mut results = self.written.read().await.clone();
        results.sort_by(|a, b| b.time.cmp(&a.time));
        results.truncate(limit.max(1));
        Ok(results)
    }

    async fn node_history(&self, address: NodeAddress, limit: usize) -> Result<Vec<TestResult>> {
        let mut results: Vec<TestResult> = self
            .written
            .read()
            .await
            .iter()
            .filter(|r| r.address == address)
            .cloned()
            .collect();
        results.sort_by(|a, b| b.time.cmp(&a.time));
        results.truncate(limit.max(1));
        Ok(results)
    }

    async fn current_status(&self) -> Result<Vec<NodeStatus>> {
        let cutoff = Utc::now() - ChronoDuration::days(7);
        let mut latest: BTreeMap<NodeAddress, TestResult> = BTreeMap::new();

        for result in self.written.read().await.iter() {
            if result.time < cutoff {
                continue;
            }
            let replace = latest
                .get(&result.address)
                .is_none_or(|existing| existing.time < result.time);
            if replace {
                let _ = latest.insert(result.address, result.clone());
            }
        }

        Ok(latest
            .into_values()
            .map(|result| NodeStatus {
                address: result.address,
                last_tested: result.time,
                is_operational: result.is_operational,
                binkp_success: result.protocol(InternetProtocol::Binkp).is_success(),
                ifcico_success: result.protocol(InternetProtocol::Ifcico).is_success(),
                telnet_success: result.protocol(InternetProtocol::Telnet).is_success(),
                country: result.geo.country.clone(),
                isp: result.geo.isp.clone(),
            })
            .collect())
    }

    async fn recent_outcomes(&self, days: u32) -> Result<Vec<OutcomeRow>> {
        let cutoff = Utc::now() - ChronoDuration::days(days as i64);
        let mut outcomes: Vec<OutcomeRow> = self
            .written
            .read()
            .await
            .iter()
            .filter(|r| r.time >= cutoff)
            .map(|r| OutcomeRow {
                address: r.address,
                time: r.time,
                is_operational: r.is_operational,
            })
            .collect();
        outcomes.sort_by(|a, b| b.time.cmp(&a.time));
        Ok(outcomes)
    }

    async fn close(&self) -> Result<()> {
        self.flush_inner().await
    }
}
