// Copyright 2025 the ftn-prober contributors.
//
// This software is licensed to you under The General Public License (GPL), version 3. Unless
// required by applicable law or agreed to in writing, software distributed under the GPL Licence
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either
// express or implied. Please review the Licence for the specific language governing permissions
// and limitations.

//! The ClickHouse-backed store.
//!
//! Owns the write batch: results accumulate until `batch_size` rows or
//! `flush_interval` has passed, whichever comes first. A failed flush
//! leaves the buffer intact for the next trigger, and the buffer's
//! capacity is reused across flushes.

use crate::{
    row::{CatalogRow, CurrentStatusRow, OutcomeProjectionRow, TestResultRow},
    schema, CatalogStore, Error, NodeStatus, OutcomeRow, Result, ResultStore,
};
use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use clickhouse::Client;
use ftn_model::{Node, NodeAddress, NodelistSnapshot, TestResult};
use std::time::Duration;
use tokio::{sync::Mutex, time::Instant};

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub url: String,
    pub database: String,
    pub user: String,
    pub password: String,
    pub batch_size: usize,
    pub flush_interval: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8123".to_string(),
            database: "nodelist".to_string(),
            user: "default".to_string(),
            password: String::new(),
            batch_size: 100,
            flush_interval: Duration::from_secs(30),
        }
    }
}

pub struct ClickHouseStore {
    client: Client,
    batch_size: usize,
    flush_interval: Duration,
    buffer: Mutex<Vec<TestResultRow>>,
    last_flush: Mutex<Instant>,
}

impl ClickHouseStore {
    /// Connect, ping and ensure the schema exists.
    pub async fn connect(config: StoreConfig) -> Result<Self> {
        let client = Client::default()
            .with_url(&config.url)
            .with_database(&config.database)
            .with_user(&config.user)
            .with_password(&config.password);

        client
            .query("SELECT 1")
            .execute()
            .await
            .map_err(|e| Error::storage("ping", e))?;

        for ddl in schema::MIGRATIONS {
            client
                .query(ddl)
                .execute()
                .await
                .map_err(|e| Error::storage("prepare", e))?;
        }

        info!(
            "Connected to ClickHouse at {} (database {}), schema ensured",
            config.url, config.database
        );

        Ok(Self {
            client,
            batch_size: config.batch_size.max(1),
            flush_interval: config.flush_interval,
            buffer: Mutex::new(Vec::new()),
            last_flush: Mutex::new(Instant::now()),
        })
    }

    async fn latest_date(&self) -> Result<Option<NaiveDate>> {
        let days: u32 = self
            .client
            .query("SELECT toUInt32(max(nodelist_date)) FROM nodes")
            .fetch_one()
            .await
            .map_err(|e| Error::storage("send", e))?;
        if days == 0 {
            return Ok(None);
        }
        Ok(NaiveDate::from_ymd_opt(1970, 1, 1)
            .and_then(|epoch| epoch.checked_add_days(Days::new(days as u64))))
    }

    async fn fetch_nodes(
        &self,
        filter: &str,
        limit: Option<usize>,
        bind_date: NaiveDate,
    ) -> Result<Vec<Node>> {
        let limit_clause = limit
            .map(|l| format!(" LIMIT {}", l.max(1)))
            .unwrap_or_default();
        let sql = format!(
            "SELECT ?fields FROM nodes FINAL WHERE nodelist_date = ? {filter} \
             ORDER BY zone, net, node, conflict_sequence{limit_clause}"
        );
        let rows: Vec<CatalogRow> = self
            .client
            .query(&sql)
            .bind(bind_date.to_string())
            .fetch_all()
            .await
            .map_err(|e| Error::storage("send", e))?;

        rows.into_iter().map(CatalogRow::into_node).collect()
    }

    /// Write the buffered rows out in one insert. Holding the buffer lock
    /// for the whole insert serialises flushes.
    async fn flush_buffer(&self) -> Result<()> {
        let mut buffer = self.buffer.lock().await;
        if buffer.is_empty() {
            *self.last_flush.lock().await = Instant::now();
            return Ok(());
        }

        let mut insert = self
            .client
            .insert("node_test_results")
            .map_err(|e| Error::storage("prepare", e))?;
        for row in buffer.iter() {
            insert
                .write(row)
                .await
                .map_err(|e| Error::storage("append", e))?;
        }
        insert.end().await.map_err(|e| Error::storage("send", e))?;

        debug!("Flushed {} test results to storage", buffer.len());
        // clear() keeps the allocation for the next batch.
        buffer.clear();
        *self.last_flush.lock().await = Instant::now();
        Ok(())
    }

    async fn should_flush_by_age(&self) -> bool {
        self.last_flush.lock().await.elapsed() >= self.flush_interval
    }

    /// Recompute one day's aggregate stats row.
    pub async fn update_daily_stats(&self, date: NaiveDate) -> Result<()> {
        self.client
            .query(schema::DAILY_STATS_UPSERT)
            .bind(date.to_string())
            .execute()
            .await
            .map_err(|e| Error::storage("send", e))
    }
}

#[async_trait]
impl CatalogStore for ClickHouseStore {
    async fn latest_snapshot_date(&self) -> Result<Option<NaiveDate>> {
        self.latest_date().await
    }

    async fn has_snapshot(&self, date: NaiveDate, crc: Option<u32>) -> Result<bool> {
        let count: u64 = self
            .client
            .query("SELECT count() FROM nodes WHERE nodelist_date = ? AND crc = ?")
            .bind(date.to_string())
            .bind(crc.unwrap_or(0))
            .fetch_one()
            .await
            .map_err(|e| Error::storage("send", e))?;
        Ok(count > 0)
    }

    async fn insert_catalog(&self, snapshot: &NodelistSnapshot) -> Result<()> {
        let mut insert = self
            .client
            .insert("nodes")
            .map_err(|e| Error::storage("prepare", e))?;
        for node in &snapshot.nodes {
            let row = CatalogRow::from_node(snapshot, node)?;
            insert
                .write(&row)
                .await
                .map_err(|e| Error::storage("append", e))?;
        }
        insert.end().await.map_err(|e| Error::storage("send", e))?;
        info!(
            "Ingested snapshot {} ({} nodes) into catalog",
            snapshot.date,
            snapshot.nodes.len()
        );
        Ok(())
    }

    async fn nodes_with_internet(&self, limit: usize) -> Result<Vec<Node>> {
        let Some(date) = self.latest_date().await? else {
            return Ok(Vec::new());
        };
        self.fetch_nodes("AND has_inet", Some(limit), date).await
    }

    async fn nodes_by_zone(&self, zone: u16) -> Result<Vec<Node>> {
        let Some(date) = self.latest_date().await? else {
            return Ok(Vec::new());
        };
        let filter = format!("AND zone = {zone}");
        self.fetch_nodes(&filter, None, date).await
    }

    async fn nodes_by_protocol(&self, tag: &str, limit: usize) -> Result<Vec<Node>> {
        let Some(date) = self.latest_date().await? else {
            return Ok(Vec::new());
        };
        let tag = tag
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_uppercase();
        let filter = format!("AND has(protocols, '{tag}')");
        self.fetch_nodes(&filter, Some(limit), date).await
    }

    async fn node(&self, address: NodeAddress) -> Result<Option<Node>> {
        let Some(date) = self.latest_date().await? else {
            return Ok(None);
        };
        let filter = format!(
            "AND zone = {} AND net = {} AND node = {}",
            address.zone, address.net, address.node
        );
        Ok(self
            .fetch_nodes(&filter, Some(1), date)
            .await?
            .into_iter()
            .next())
    }
}

#[async_trait]
impl ResultStore for ClickHouseStore {
    async fn store_test_result(&self, result: TestResult) -> Result<()> {
        let should_flush = {
            let mut buffer = self.buffer.lock().await;
            buffer.push(TestResultRow::from_model(&result));
            buffer.len() >= self.batch_size
        };

        if should_flush || self.should_flush_by_age().await {
            self.flush_buffer().await?;
        }
        Ok(())
    }

    async fn store_test_results(&self, results: Vec<TestResult>) -> Result<()> {
        {
            let mut buffer = self.buffer.lock().await;
            buffer.extend(results.iter().map(TestResultRow::from_model));
        }
        // Explicit batches bound loss by flushing immediately.
        self.flush_buffer().await
    }

    async fn flush(&self) -> Result<()> {
        self.flush_buffer().await
    }

    async fn latest_test_results(&self, limit: usize) -> Result<Vec<TestResult>> {
        let rows: Vec<TestResultRow> = self
            .client
            .query("SELECT ?fields FROM node_test_results ORDER BY test_time DESC LIMIT ?")
            .bind(limit.max(1) as u64)
            .fetch_all()
            .await
            .map_err(|e| Error::storage("send", e))?;
        rows.into_iter().map(TestResultRow::into_model).collect()
    }

    async fn node_history(&self, address: NodeAddress, limit: usize) -> Result<Vec<TestResult>> {
        let rows: Vec<TestResultRow> = self
            .client
            .query(
                "SELECT ?fields FROM node_test_results \
                 WHERE zone = ? AND net = ? AND node = ? \
                 ORDER BY test_time DESC LIMIT ?",
            )
            .bind(address.zone)
            .bind(address.net)
            .bind(address.node)
            .bind(limit.max(1) as u64)
            .fetch_all()
            .await
            .map_err(|e| Error::storage("send", e))?;
        rows.into_iter().map(TestResultRow::into_model).collect()
    }

    async fn current_status(&self) -> Result<Vec<NodeStatus>> {
        let rows: Vec<CurrentStatusRow> = self
            .client
            .query(
                "SELECT zone, net, node, \
                        max(test_time) AS last_tested, \
                        argMax(is_operational, test_time) AS is_operational, \
                        argMax(binkp_success, test_time) AS binkp_success, \
                        argMax(ifcico_success, test_time) AS ifcico_success, \
                        argMax(telnet_success, test_time) AS telnet_success, \
                        argMax(country, test_time) AS country, \
                        argMax(isp, test_time) AS isp \
                 FROM node_test_results \
                 WHERE test_date >= today() - 7 \
                 GROUP BY zone, net, node \
                 ORDER BY zone, net, node",
            )
            .fetch_all()
            .await
            .map_err(|e| Error::storage("send", e))?;

        Ok(rows
            .into_iter()
            .map(|row| NodeStatus {
                address: NodeAddress::new(row.zone, row.net, row.node),
                last_tested: row.last_tested,
                is_operational: row.is_operational,
                binkp_success: row.binkp_success,
                ifcico_success: row.ifcico_success,
                telnet_success: row.telnet_success,
                country: row.country,
                isp: row.isp,
            })
            .collect())
    }

    async fn recent_outcomes(&self, days: u32) -> Result<Vec<OutcomeRow>> {
        let rows: Vec<OutcomeProjectionRow> = self
            .client
            .query(
                "SELECT zone, net, node, test_time, is_operational \
                 FROM node_test_results \
                 WHERE test_date >= today() - ? \
                 ORDER BY test_time DESC",
            )
            .bind(days)
            .fetch_all()
            .await
            .map_err(|e| Error::storage("send", e))?;

        Ok(rows
            .into_iter()
            .map(|row| OutcomeRow {
                address: NodeAddress::new(row.zone, row.net, row.node),
                time: row.test_time,
                is_operational: row.is_operational,
            })
            .collect())
    }

    async fn close(&self) -> Result<()> {
        self.flush_buffer().await
    }
}
