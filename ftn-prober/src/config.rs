// Copyright 2025 the ftn-prober contributors.
//
// This software is licensed to you under The General Public License (GPL), version 3. Unless
// required by applicable law or agreed to in writing, software distributed under the GPL Licence
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either
// express or implied. Please review the Licence for the specific language governing permissions
// and limitations.

//! Application configuration: a TOML file with `[storage]`, `[engine]`
//! and `[lookup]` tables, every field optional.

use color_eyre::eyre::{eyre, Result};
use ftn_engine::EngineConfig;
use ftn_storage::StoreConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub storage: StorageSection,
    pub engine: EngineConfig,
    pub lookup: LookupSection,
    pub ingest: IngestSection,
}

/// Optional nodelist directory the daemon re-scans periodically.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IngestSection {
    pub dir: Option<PathBuf>,
    pub interval_secs: u64,
}

impl Default for IngestSection {
    fn default() -> Self {
        Self {
            dir: None,
            interval_secs: 6 * 60 * 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageSection {
    pub url: String,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl Default for StorageSection {
    fn default() -> Self {
        let defaults = StoreConfig::default();
        Self {
            url: defaults.url,
            database: defaults.database,
            user: defaults.user,
            password: defaults.password,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LookupSection {
    /// Directory for the persistent DNS/geolocation/WHOIS caches.
    pub cache_dir: Option<PathBuf>,
    pub geo_base_url: Option<String>,
    pub whois_server: Option<String>,
    pub disable_cache_writes: bool,
    pub dns_cache_ttl_secs: u64,
    pub geo_cache_ttl_secs: u64,
    pub whois_cache_ttl_secs: u64,
}

impl Default for LookupSection {
    fn default() -> Self {
        Self {
            cache_dir: None,
            geo_base_url: None,
            whois_server: None,
            disable_cache_writes: false,
            dns_cache_ttl_secs: ftn_lookup::DNS_CACHE_TTL.as_secs(),
            geo_cache_ttl_secs: ftn_lookup::GEO_CACHE_TTL.as_secs(),
            whois_cache_ttl_secs: ftn_lookup::WHOIS_CACHE_TTL.as_secs(),
        }
    }
}

impl AppConfig {
    /// Load from an explicit path, or the default location if it exists,
    /// or fall back to built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_path().filter(|p| p.exists()),
        };

        let Some(path) = path else {
            return Ok(Self::default());
        };

        let raw = std::fs::read_to_string(&path)
            .map_err(|e| eyre!("cannot read config file {path:?}: {e}"))?;
        let config: AppConfig =
            toml::from_str(&raw).map_err(|e| eyre!("invalid config file {path:?}: {e}"))?;
        Ok(config)
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs_next::config_dir().map(|dir| dir.join("ftn-prober").join("config.toml"))
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.lookup.cache_dir.clone().unwrap_or_else(|| {
            dirs_next::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("ftn-prober")
        })
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            url: self.storage.url.clone(),
            database: self.storage.database.clone(),
            user: self.storage.user.clone(),
            password: self.storage.password.clone(),
            batch_size: self.engine.batch_size,
            flush_interval: self.engine.flush_interval,
        }
    }
}
