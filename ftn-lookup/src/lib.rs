// Copyright 2025 the ftn-prober contributors.
//
// This software is licensed to you under The General Public License (GPL), version 3. Unless
// required by applicable law or agreed to in writing, software distributed under the GPL Licence
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either
// express or implied. Please review the Licence for the specific language governing permissions
// and limitations.

//! Lookup services for the probe pipeline.
//!
//! - DNS resolution with dual-stack fan-out (parallel A and AAAA, failures
//!   in one family never suppress the other)
//! - Geolocation over an ip-api style HTTP endpoint
//! - WHOIS over plain TCP port 43
//!
//! All three sit behind persistent TTL caches that flush to JSON files
//! with atomic writes.

#[macro_use]
extern crate tracing;

pub mod cache;
pub mod dns;
pub mod error;
pub mod geo;
pub mod whois;

pub use cache::{CacheConfig, PersistentCache};
pub use dns::{DnsResolver, Resolver, StaticResolver};
pub use error::{Error, Result};
pub use geo::{GeoLookup, IpApiGeoProvider};
pub use whois::{registrable_domain, WhoisClient, WhoisInfo};

use std::time::Duration;

/// Default TTL for DNS cache entries.
pub const DNS_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);
/// Default TTL for geolocation cache entries.
pub const GEO_CACHE_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
/// Default TTL for WHOIS cache entries.
pub const WHOIS_CACHE_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);
