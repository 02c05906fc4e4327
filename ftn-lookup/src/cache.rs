// Copyright 2025 the ftn-prober contributors.
//
// This software is licensed to you under The General Public License (GPL), version 3. Unless
// required by applicable law or agreed to in writing, software distributed under the GPL Licence
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either
// express or implied. Please review the Licence for the specific language governing permissions
// and limitations.

//! Key-value cache with per-entry TTL and JSON persistence.
//!
//! Lives in memory behind an `RwLock`; flushes to disk atomically so a
//! crash mid-write never corrupts the cache file. Expired entries are
//! pruned at flush time.

use crate::{Error, Result};
use atomic_write_file::AtomicWriteFile;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, SystemTime},
};
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub cache_dir: PathBuf,
    pub file_name: String,
    /// Default TTL applied by [`PersistentCache::insert`].
    pub ttl: Duration,
    /// Skip all disk writes (useful for one-shot commands and tests).
    pub disable_writes: bool,
    /// Interval for the periodic flush task.
    pub flush_interval: Duration,
}

impl CacheConfig {
    pub fn new(cache_dir: impl Into<PathBuf>, file_name: impl Into<String>, ttl: Duration) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            file_name: file_name.into(),
            ttl,
            disable_writes: false,
            flush_interval: Duration::from_secs(10 * 60),
        }
    }

    fn file_path(&self) -> PathBuf {
        self.cache_dir.join(&self.file_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Entry<V> {
    value: V,
    expires_at: SystemTime,
}

impl<V> Entry<V> {
    fn expired(&self) -> bool {
        self.expires_at <= SystemTime::now()
    }
}

/// Concurrent-safe TTL cache persisted as one JSON file.
#[derive(Debug)]
pub struct PersistentCache<V> {
    config: Arc<CacheConfig>,
    data: Arc<RwLock<HashMap<String, Entry<V>>>>,
}

impl<V> Clone for PersistentCache<V> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            data: Arc::clone(&self.data),
        }
    }
}

impl<V> PersistentCache<V>
where
    V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Create the store, loading any existing cache file. A cache file
    /// that fails to parse is discarded with a warning, not an error.
    pub fn new(config: CacheConfig) -> Result<Self> {
        if !config.cache_dir.exists() {
            fs::create_dir_all(&config.cache_dir).map_err(|source| Error::CacheIo {
                path: config.cache_dir.clone(),
                source,
            })?;
        }

        let data = match Self::load(&config.file_path()) {
            Ok(data) => data,
            Err(Error::NotFound) => HashMap::new(),
            Err(err) => {
                warn!(
                    "Failed to load cache data from {:?}, starting empty: {err}",
                    config.file_path()
                );
                HashMap::new()
            }
        };

        Ok(Self {
            config: Arc::new(config),
            data: Arc::new(RwLock::new(data)),
        })
    }

    fn load(path: &Path) -> Result<HashMap<String, Entry<V>>> {
        if !path.exists() {
            return Err(Error::NotFound);
        }
        let raw = fs::read(path).map_err(|source| Error::CacheIo {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_slice(&raw)?)
    }

    /// Look up a key. Expired or absent entries are a typed
    /// [`Error::NotFound`].
    pub async fn get(&self, key: &str) -> Result<V> {
        let data = self.data.read().await;
        match data.get(key) {
            Some(entry) if !entry.expired() => Ok(entry.value.clone()),
            _ => Err(Error::NotFound),
        }
    }

    /// Insert with the configured default TTL.
    pub async fn insert(&self, key: impl Into<String>, value: V) {
        self.insert_with_ttl(key, value, self.config.ttl).await;
    }

    pub async fn insert_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let entry = Entry {
            value,
            expires_at: SystemTime::now() + ttl,
        };
        let _ = self.data.write().await.insert(key.into(), entry);
    }

    pub async fn remove(&self, key: &str) {
        let _ = self.data.write().await.remove(key);
    }

    pub async fn len(&self) -> usize {
        self.data.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.data.read().await.is_empty()
    }

    /// Prune expired entries and write the cache file atomically.
    pub async fn flush_to_disk(&self) -> Result<()> {
        {
            let mut data = self.data.write().await;
            data.retain(|_, entry| !entry.expired());
        }

        if self.config.disable_writes {
            debug!("Cache writing is disabled, skipping flush to disk");
            return Ok(());
        }

        let path = self.config.file_path();
        let serialized = {
            let data = self.data.read().await;
            serde_json::to_vec(&*data)?
        };

        let mut file = AtomicWriteFile::open(&path).map_err(|source| Error::CacheIo {
            path: path.clone(),
            source,
        })?;
        file.write_all(&serialized).map_err(|source| Error::CacheIo {
            path: path.clone(),
            source,
        })?;
        file.commit().map_err(|source| Error::CacheIo {
            path: path.clone(),
            source,
        })?;

        debug!("Flushed cache to {path:?}");
        Ok(())
    }

    /// Spawn a background task that flushes on an interval, the same
    /// pattern the scheduler uses for its own periodic work.
    pub fn flush_periodically(&self) -> tokio::task::JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            if cache.config.disable_writes {
                info!("Cache writing is disabled, skipping periodic flush task");
                return;
            }
            loop {
                tokio::time::sleep(cache.config.flush_interval).await;
                if let Err(err) = cache.flush_to_disk().await {
                    error!("Periodic cache flush failed: {err}");
                }
            }
        })
    }
}
