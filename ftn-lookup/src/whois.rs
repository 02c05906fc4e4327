// Copyright 2025 the ftn-prober contributors.
//
// This software is licensed to you under The General Public License (GPL), version 3. Unless
// required by applicable law or agreed to in writing, software distributed under the GPL Licence
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either
// express or implied. Please review the Licence for the specific language governing permissions
// and limitations.

//! WHOIS over plain TCP port 43.

use crate::{cache::PersistentCache, Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    time::timeout,
};

pub const DEFAULT_WHOIS_SERVER: &str = "whois.verisign-grs.com";
const WHOIS_PORT: u16 = 43;
const QUERY_TIMEOUT: Duration = Duration::from_secs(20);
/// Responses are bounded; registries occasionally return very long text.
const MAX_RESPONSE_BYTES: u64 = 64 * 1024;

/// Parsed registration facts for one domain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WhoisInfo {
    pub domain: String,
    pub registrar: String,
    pub status: Vec<String>,
    pub creation: Option<DateTime<Utc>>,
    pub expiration: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub checked_at: DateTime<Utc>,
}

/// WHOIS client with a persistent cache and a recency contract: callers
/// ask for results no older than a `max_age` and get a fresh query past it.
pub struct WhoisClient {
    server: String,
    cache: PersistentCache<WhoisInfo>,
}

impl WhoisClient {
    pub fn new(cache: PersistentCache<WhoisInfo>) -> Self {
        Self::with_server(DEFAULT_WHOIS_SERVER, cache)
    }

    pub fn with_server(server: impl Into<String>, cache: PersistentCache<WhoisInfo>) -> Self {
        Self {
            server: server.into(),
            cache,
        }
    }

    /// Cached result no older than `max_age`, else a fresh query.
    pub async fn recent(&self, domain: &str, max_age: Duration) -> Result<WhoisInfo> {
        if let Ok(cached) = self.cache.get(domain).await {
            let age = Utc::now().signed_duration_since(cached.checked_at);
            if age.to_std().is_ok_and(|age| age <= max_age) {
                trace!("WHOIS cache hit for {domain} (age {age})");
                return Ok(cached);
            }
        }
        self.lookup(domain).await
    }

    /// Persist the cache file; callers decide when (periodically for the
    /// daemon, on exit for one-shot commands).
    pub async fn flush_cache(&self) -> Result<()> {
        self.cache.flush_to_disk().await
    }

    /// Always query, then refresh the cache.
    pub async fn lookup(&self, domain: &str) -> Result<WhoisInfo> {
        let raw = self.query(domain).await?;
        let mut info = parse_whois_response(&raw);
        info.domain = domain.to_string();
        info.checked_at = Utc::now();

        debug!(
            "WHOIS for {domain}: registrar {:?}, expires {:?}",
            info.registrar, info.expiration
        );
        self.cache.insert(domain.to_string(), info.clone()).await;
        Ok(info)
    }

    async fn query(&self, domain: &str) -> Result<String> {
        let endpoint = format!("{}:{WHOIS_PORT}", self.server);
        let mut stream = timeout(QUERY_TIMEOUT, TcpStream::connect(&endpoint))
            .await
            .map_err(|_| Error::Timeout(QUERY_TIMEOUT))?
            .map_err(|e| Error::Whois(format!("connect {endpoint}: {e}")))?;

        stream
            .write_all(format!("{domain}\r\n").as_bytes())
            .await
            .map_err(|e| Error::Whois(format!("send query: {e}")))?;

        let mut response = Vec::new();
        let read = timeout(
            QUERY_TIMEOUT,
            (&mut stream).take(MAX_RESPONSE_BYTES).read_to_end(&mut response),
        )
        .await
        .map_err(|_| Error::Timeout(QUERY_TIMEOUT))?;
        let _ = read.map_err(|e| Error::Whois(format!("read response: {e}")))?;

        Ok(String::from_utf8_lossy(&response).into_owned())
    }
}

/// Pull the interesting keys out of a registry response. Unknown lines are
/// ignored; dates are RFC 3339 as Verisign-style registries emit them.
fn parse_whois_response(raw: &str) -> WhoisInfo {
    let mut info = WhoisInfo::default();

    for line in raw.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();
        if value.is_empty() {
            continue;
        }

        match key.as_str() {
            "registrar" => {
                if info.registrar.is_empty() {
                    info.registrar = value.to_string();
                }
            }
            "domain status" => {
                // Status lines look like `ok https://icann.org/epp#ok`.
                let status = value.split_whitespace().next().unwrap_or(value);
                info.status.push(status.to_string());
            }
            "creation date" | "created" => {
                if info.creation.is_none() {
                    info.creation = parse_whois_date(value);
                }
            }
            "registry expiry date" | "expiry date" | "expiration date" | "paid-till" => {
                if info.expiration.is_none() {
                    info.expiration = parse_whois_date(value);
                }
            }
            _ => {}
        }
    }

    info
}

/// Naive registrable domain: the last two labels of a hostname. Good
/// enough for the `.com`/`.org`-style domains nodelists carry; IP
/// literals yield `None`.
pub fn registrable_domain(hostname: &str) -> Option<String> {
    if hostname.parse::<std::net::IpAddr>().is_ok() {
        return None;
    }
    let labels: Vec<&str> = hostname
        .trim_end_matches('.')
        .split('.')
        .filter(|l| !l.is_empty())
        .collect();
    if labels.len() < 2 {
        return None;
    }
    Some(labels[labels.len() - 2..].join("."))
}

fn parse_whois_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    // Some registries drop the time part.
    chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RESPONSE: &str = "\
   Domain Name: EXAMPLE.COM\r
   Registrar: Example Registrar, Inc.\r
   Creation Date: 1995-08-14T04:00:00Z\r
   Registry Expiry Date: 2026-08-13T04:00:00Z\r
   Domain Status: clientDeleteProhibited https://icann.org/epp#clientDeleteProhibited\r
   Domain Status: clientTransferProhibited https://icann.org/epp#clientTransferProhibited\r
";

    #[test]
    fn parses_registrar_dates_and_status() {
        let info = parse_whois_response(SAMPLE_RESPONSE);
        assert_eq!(info.registrar, "Example Registrar, Inc.");
        assert_eq!(
            info.status,
            vec![
                "clientDeleteProhibited".to_string(),
                "clientTransferProhibited".to_string()
            ]
        );
        assert_eq!(
            info.creation.map(|d| d.to_rfc3339()),
            Some("1995-08-14T04:00:00+00:00".to_string())
        );
        assert!(info.expiration.is_some());
    }

    #[test]
    fn date_only_values_parse_at_midnight() {
        let parsed = parse_whois_date("2027-01-02").expect("date");
        assert_eq!(parsed.to_rfc3339(), "2027-01-02T00:00:00+00:00");
    }

    #[test]
    fn empty_response_yields_defaults() {
        let info = parse_whois_response("No match for domain.");
        assert!(info.registrar.is_empty());
        assert!(info.creation.is_none());
        assert!(info.expiration.is_none());
    }

    #[test]
    fn registrable_domain_takes_the_last_two_labels() {
        assert_eq!(
            registrable_domain("bbs.example.com").as_deref(),
            Some("example.com")
        );
        assert_eq!(
            registrable_domain("example.org").as_deref(),
            Some("example.org")
        );
        assert_eq!(registrable_domain("localhost"), None);
        assert_eq!(registrable_domain("192.0.2.1"), None);
    }
}
