// Copyright 2025 the ftn-prober contributors.
//
// This software is licensed to you under The General Public License (GPL), version 3. Unless
// required by applicable law or agreed to in writing, software distributed under the GPL Licence
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either
// express or implied. Please review the Licence for the specific language governing permissions
// and limitations.

pub mod history;
pub mod ingest;
pub mod node_info;
pub mod output;
pub mod run;
pub mod status;

use crate::config::AppConfig;
use color_eyre::eyre::{eyre, Result};
use ftn_engine::{EngineConfig, ProbePipeline};
use ftn_lookup::{CacheConfig, DnsResolver, IpApiGeoProvider, PersistentCache, WhoisClient};
use ftn_model::NodeAddress;
use ftn_probes::default_registry;
use ftn_storage::ClickHouseStore;
use std::{sync::Arc, time::Duration};

/// Parse a CLI node address; failures are user error (exit code 2).
pub fn parse_address(input: &str) -> Result<NodeAddress> {
    input
        .parse()
        .map_err(|_| eyre!("invalid node address {input:?}, expected zone:net/node"))
}

pub async fn connect_store(config: &AppConfig) -> Result<Arc<ClickHouseStore>> {
    let store = ClickHouseStore::connect(config.store_config()).await?;
    Ok(Arc::new(store))
}

/// The lookup caches backing a pipeline, kept so callers can persist
/// them: the daemon flushes periodically, one-shot commands on exit.
pub struct LookupCaches {
    pub dns: PersistentCache<ftn_model::DnsOutcome>,
    pub geo: PersistentCache<ftn_model::Geolocation>,
}

impl LookupCaches {
    pub async fn flush(&self) {
        if let Err(err) = self.dns.flush_to_disk().await {
            warn!("DNS cache flush failed: {err}");
        }
        if let Err(err) = self.geo.flush_to_disk().await {
            warn!("Geolocation cache flush failed: {err}");
        }
    }

    pub fn spawn_periodic_flush(&self) {
        let _ = self.dns.flush_periodically();
        let _ = self.geo.flush_periodically();
    }
}

/// Assemble the probe pipeline with live lookup services.
pub fn build_pipeline(
    config: &AppConfig,
    engine_config: Arc<EngineConfig>,
) -> Result<(Arc<ProbePipeline>, LookupCaches)> {
    let cache_dir = config.cache_dir();

    let mut dns_cache_config = CacheConfig::new(
        &cache_dir,
        "dns_cache.json",
        Duration::from_secs(config.lookup.dns_cache_ttl_secs),
    );
    dns_cache_config.disable_writes = config.lookup.disable_cache_writes;
    let dns_cache = PersistentCache::new(dns_cache_config)?;
    let resolver = Arc::new(DnsResolver::from_system_conf(dns_cache.clone())?);

    let mut geo_cache_config = CacheConfig::new(
        &cache_dir,
        "geolocation_cache.json",
        Duration::from_secs(config.lookup.geo_cache_ttl_secs),
    );
    geo_cache_config.disable_writes = config.lookup.disable_cache_writes;
    let geo_cache = PersistentCache::new(geo_cache_config)?;
    let geo = match &config.lookup.geo_base_url {
        Some(base_url) => IpApiGeoProvider::with_base_url(base_url, geo_cache.clone())?,
        None => IpApiGeoProvider::new(geo_cache.clone())?,
    };

    let pipeline = Arc::new(ProbePipeline::new(
        resolver,
        Some(Arc::new(geo)),
        default_registry(),
        engine_config,
    ));
    Ok((
        pipeline,
        LookupCaches {
            dns: dns_cache,
            geo: geo_cache,
        },
    ))
}

pub fn build_whois(config: &AppConfig) -> Result<WhoisClient> {
    let mut cache_config = CacheConfig::new(
        config.cache_dir(),
        "whois_cache.json",
        Duration::from_secs(config.lookup.whois_cache_ttl_secs),
    );
    cache_config.disable_writes = config.lookup.disable_cache_writes;
    let cache = PersistentCache::new(cache_config)?;

    Ok(match &config.lookup.whois_server {
        Some(server) => WhoisClient::with_server(server, cache),
        None => WhoisClient::new(cache),
    })
}
