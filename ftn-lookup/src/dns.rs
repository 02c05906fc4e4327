// Copyright 2025 the ftn-prober contributors.
//
// This software is licensed to you under The General Public License (GPL), version 3. Unless
// required by applicable law or agreed to in writing, software distributed under the GPL Licence
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either
// express or implied. Please review the Licence for the specific language governing permissions
// and limitations.

//! Dual-stack DNS resolution.
//!
//! A and AAAA queries run in parallel; an error in one family never
//! suppresses the records of the other. Outcomes are cached with a 24 hour
//! TTL.

use crate::{cache::PersistentCache, Result};
use async_trait::async_trait;
use ftn_model::DnsOutcome;
use hickory_resolver::{
    error::{ResolveError, ResolveErrorKind},
    TokioAsyncResolver,
};
use std::{
    collections::HashMap,
    net::{IpAddr, Ipv4Addr, Ipv6Addr},
    time::Duration,
};
use tokio::time::timeout;

/// Per-family query timeout.
const QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Hostname to dual-stack address lists. Implemented by the live resolver
/// and by deterministic fakes in tests.
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, hostname: &str) -> DnsOutcome;
}

/// Live resolver over the system DNS configuration.
pub struct DnsResolver {
    resolver: TokioAsyncResolver,
    cache: PersistentCache<DnsOutcome>,
}

impl DnsResolver {
    pub fn from_system_conf(cache: PersistentCache<DnsOutcome>) -> Result<Self> {
        let resolver = TokioAsyncResolver::tokio_from_system_conf()
            .map_err(|e| crate::Error::Dns(e.to_string()))?;
        Ok(Self { resolver, cache })
    }

    async fn resolve_families(&self, host: &str) -> DnsOutcome {
        let mut outcome = DnsOutcome::default();

        let (v4, v6) = tokio::join!(
            timeout(QUERY_TIMEOUT, self.resolver.ipv4_lookup(host)),
            timeout(QUERY_TIMEOUT, self.resolver.ipv6_lookup(host)),
        );

        let mut errors: Vec<String> = Vec::new();

        match v4 {
            Ok(Ok(records)) => outcome.ipv4 = records.iter().map(|a| a.0).collect(),
            Ok(Err(err)) => {
                if let Some(message) = real_resolve_error(&err) {
                    errors.push(format!("A: {message}"));
                }
            }
            Err(_) => errors.push(format!("A: timed out after {QUERY_TIMEOUT:?}")),
        }

        match v6 {
            Ok(Ok(records)) => outcome.ipv6 = records.iter().map(|a| a.0).collect(),
            Ok(Err(err)) => {
                if let Some(message) = real_resolve_error(&err) {
                    errors.push(format!("AAAA: {message}"));
                }
            }
            Err(_) => errors.push(format!("AAAA: timed out after {QUERY_TIMEOUT:?}")),
        }

        if !errors.is_empty() && !outcome.resolved_any() {
            outcome.error = Some(errors.join("; "));
        }

        outcome
    }
}

/// `NoRecordsFound` is an empty family, not a failure.
fn real_resolve_error(err: &ResolveError) -> Option<String> {
    match err.kind() {
        ResolveErrorKind::NoRecordsFound { .. } => None,
        _ => Some(err.to_string()),
    }
}

#[async_trait]
impl Resolver for DnsResolver {
    async fn resolve(&self, hostname: &str) -> DnsOutcome {
        let host = sanitize_hostname(hostname);

        // IP literals short-circuit the query entirely.
        if let Ok(ip) = host.parse::<IpAddr>() {
            let mut outcome = DnsOutcome::default();
            match ip {
                IpAddr::V4(v4) => outcome.ipv4.push(v4),
                IpAddr::V6(v6) => outcome.ipv6.push(v6),
            }
            return outcome;
        }

        if let Ok(cached) = self.cache.get(&host).await {
            trace!("DNS cache hit for {host}");
            return cached;
        }

        let outcome = self.resolve_families(&host).await;
        debug!(
            "Resolved {host}: {} v4, {} v6, error: {:?}",
            outcome.ipv4.len(),
            outcome.ipv6.len(),
            outcome.error
        );
        self.cache.insert(host, outcome.clone()).await;
        outcome
    }
}

/// Strip a `:port` suffix and IPv6 brackets so `host:2030` resolves `host`
/// and `[2001:db8::1]:24554` resolves the literal inside the brackets.
pub fn sanitize_hostname(hostname: &str) -> String {
    let hostname = hostname.trim();

    if let Some(rest) = hostname.strip_prefix('[') {
        if let Some(close) = rest.find(']') {
            return rest[..close].to_string();
        }
    }

    if let Some((host, port)) = hostname.rsplit_once(':') {
        if !host.contains(':') && port.chars().all(|c| c.is_ascii_digit()) && !port.is_empty() {
            return host.to_string();
        }
    }

    hostname.to_string()
}

/// Deterministic resolver for tests: a fixed hostname table.
#[derive(Debug, Default, Clone)]
pub struct StaticResolver {
    entries: HashMap<String, DnsOutcome>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(
        mut self,
        hostname: impl Into<String>,
        ipv4: Vec<Ipv4Addr>,
        ipv6: Vec<Ipv6Addr>,
    ) -> Self {
        let _ = self.entries.insert(
            hostname.into(),
            DnsOutcome {
                ipv4,
                ipv6,
                error: None,
            },
        );
        self
    }

    pub fn with_failure(mut self, hostname: impl Into<String>, error: impl Into<String>) -> Self {
        let _ = self.entries.insert(
            hostname.into(),
            DnsOutcome {
                ipv4: Vec::new(),
                ipv6: Vec::new(),
                error: Some(error.into()),
            },
        );
        self
    }
}

#[async_trait]
impl Resolver for StaticResolver {
    async fn resolve(&self, hostname: &str) -> DnsOutcome {
        let host = sanitize_hostname(hostname);
        self.entries.get(&host).cloned().unwrap_or(DnsOutcome {
            ipv4: Vec::new(),
            ipv6: Vec::new(),
            error: Some(format!("no such host: {host}")),
        })
    }
}
