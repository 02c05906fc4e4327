// Copyright 2025 the ftn-prober contributors.
//
// This software is licensed to you under The General Public License (GPL), version 3. Unless
// required by applicable law or agreed to in writing, software distributed under the GPL Licence
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either
// express or implied. Please review the Licence for the specific language governing permissions
// and limitations.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Cache miss or expired entry. Distinct from real failures so callers
    /// can fall through to a live lookup.
    #[error("Not found in cache")]
    NotFound,

    #[error("DNS resolution failed: {0}")]
    Dns(String),

    #[error("Geolocation lookup failed: {0}")]
    Geo(String),

    #[error("WHOIS query failed: {0}")]
    Whois(String),

    #[error("Lookup timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Cache I/O failed on {path:?}: {source}")]
    CacheIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cache serialization failed: {0}")]
    CacheSerde(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
