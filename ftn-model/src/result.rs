// Copyright 2025 the ftn-prober contributors.
//
// This software is licensed to you under The General Public License (GPL), version 3. Unless
// required by applicable law or agreed to in writing, software distributed under the GPL Licence
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either
// express or implied. Please review the Licence for the specific language governing permissions
// and limitations.

//! Per-probe observation model.
//!
//! A protocol that was never attempted is `ProtocolStatus::NotTested`; only
//! `Tested` carries observation fields, so states like "not tested but
//! successful" are unrepresentable.

use crate::node::{InternetProtocol, NodeAddress};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::net::{Ipv4Addr, Ipv6Addr};

/// Outcome of one protocol handshake against one address family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FamilyResult {
    pub tested: bool,
    pub success: bool,
    pub response_ms: u32,
    /// The literal peer address the probe dialed.
    pub address: String,
    pub error: String,
}

impl FamilyResult {
    pub fn success(address: String, response_ms: u32) -> Self {
        Self {
            tested: true,
            success: true,
            response_ms,
            address,
            error: String::new(),
        }
    }

    pub fn failure(address: String, error: impl Into<String>) -> Self {
        Self {
            tested: true,
            success: false,
            response_ms: 0,
            address,
            error: error.into(),
        }
    }
}

/// Identity details a mailer announces during its handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MailerIdentity {
    pub system_name: String,
    pub sysop: String,
    pub location: String,
    pub version: String,
    /// Announced AKA list, e.g. `["2:450/1024", "2:450/0"]`.
    pub addresses: Vec<String>,
    pub capabilities: Vec<String>,
    pub mailer_info: String,
    pub response_type: String,
}

/// Everything observed while testing one protocol on one hostname.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProtocolObservation {
    pub port: u16,
    pub ipv4: FamilyResult,
    pub ipv6: FamilyResult,
    /// Mailer identity, when the protocol announces one (BinkP, IFCICO).
    pub identity: Option<MailerIdentity>,
    /// AKAs announced on the IPv4 connection.
    pub ipv4_announced: Vec<String>,
    /// AKAs announced on the IPv6 connection.
    pub ipv6_announced: Vec<String>,
}

impl ProtocolObservation {
    /// Combined success: either family completed the handshake.
    pub fn success(&self) -> bool {
        self.ipv4.success || self.ipv6.success
    }

    /// Combined response time: minimum over the successful families.
    pub fn response_ms(&self) -> Option<u32> {
        match (self.ipv4.success, self.ipv6.success) {
            (true, true) => Some(self.ipv4.response_ms.min(self.ipv6.response_ms)),
            (true, false) => Some(self.ipv4.response_ms),
            (false, true) => Some(self.ipv6.response_ms),
            (false, false) => None,
        }
    }

    /// Combined error string for failed probes; empty when successful.
    pub fn error(&self) -> String {
        if self.success() {
            return String::new();
        }
        let mut parts = Vec::new();
        if self.ipv4.tested && !self.ipv4.error.is_empty() {
            parts.push(format!("v4: {}", self.ipv4.error));
        }
        if self.ipv6.tested && !self.ipv6.error.is_empty() {
            parts.push(format!("v6: {}", self.ipv6.error));
        }
        parts.join("; ")
    }

    pub fn connectivity(&self) -> ConnectivityType {
        ConnectivityType::derive(&self.ipv4, &self.ipv6)
    }
}

/// Tagged per-protocol outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ProtocolStatus {
    #[default]
    NotTested,
    Tested(ProtocolObservation),
}

impl ProtocolStatus {
    pub fn is_tested(&self) -> bool {
        matches!(self, ProtocolStatus::Tested(_))
    }

    pub fn is_success(&self) -> bool {
        match self {
            ProtocolStatus::NotTested => false,
            ProtocolStatus::Tested(obs) => obs.success(),
        }
    }

    pub fn observation(&self) -> Option<&ProtocolObservation> {
        match self {
            ProtocolStatus::NotTested => None,
            ProtocolStatus::Tested(obs) => Some(obs),
        }
    }
}

/// Derived dual-stack classification of one protocol observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectivityType {
    DualStack,
    Ipv4Only,
    Ipv6Only,
    Failed,
    NotTested,
}

impl ConnectivityType {
    /// Total over the family-result cube: success on both families is
    /// dual-stack, a lone success is the corresponding `-only`, any tested
    /// failure without a success is failed, nothing tested is not-tested.
    pub fn derive(ipv4: &FamilyResult, ipv6: &FamilyResult) -> Self {
        match (
            ipv4.tested && ipv4.success,
            ipv6.tested && ipv6.success,
            ipv4.tested || ipv6.tested,
        ) {
            (true, true, _) => ConnectivityType::DualStack,
            (true, false, _) => ConnectivityType::Ipv4Only,
            (false, true, _) => ConnectivityType::Ipv6Only,
            (false, false, true) => ConnectivityType::Failed,
            (false, false, false) => ConnectivityType::NotTested,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectivityType::DualStack => "dual-stack",
            ConnectivityType::Ipv4Only => "ipv4-only",
            ConnectivityType::Ipv6Only => "ipv6-only",
            ConnectivityType::Failed => "failed",
            ConnectivityType::NotTested => "not-tested",
        }
    }
}

/// DNS resolution outcome for one hostname.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DnsOutcome {
    pub ipv4: Vec<Ipv4Addr>,
    pub ipv6: Vec<Ipv6Addr>,
    pub error: Option<String>,
}

impl DnsOutcome {
    pub fn resolved_any(&self) -> bool {
        !self.ipv4.is_empty() || !self.ipv6.is_empty()
    }
}

/// Geolocation block attached to a result; all fields best-effort.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Geolocation {
    pub country: String,
    pub country_code: String,
    pub city: String,
    pub region: String,
    pub latitude: f64,
    pub longitude: f64,
    pub isp: String,
    pub org: String,
    pub asn: String,
}

/// Sentinel `hostname_index` for aggregated or legacy rows.
pub const HOSTNAME_INDEX_AGGREGATED: i32 = -1;

/// One probe record for a `(node, hostname)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub time: DateTime<Utc>,
    pub address: NodeAddress,
    pub hostname: String,
    /// Position among the node's hostnames; `-1` for aggregated rows.
    pub hostname_index: i32,
    pub dns: DnsOutcome,
    pub geo: Geolocation,
    pub protocols: BTreeMap<InternetProtocol, ProtocolStatus>,
    pub is_operational: bool,
    pub has_connectivity_issues: bool,
    pub address_validated: bool,
    pub address_validated_ipv4: bool,
    pub address_validated_ipv6: bool,
    pub ipv4_skipped: bool,
    pub is_aggregated: bool,
    pub total_hostnames: u32,
    pub hostnames_tested: u32,
    pub hostnames_operational: u32,
}

impl TestResult {
    pub fn new(address: NodeAddress, hostname: impl Into<String>, hostname_index: i32) -> Self {
        Self {
            time: Utc::now(),
            address,
            hostname: hostname.into(),
            hostname_index,
            dns: DnsOutcome::default(),
            geo: Geolocation::default(),
            protocols: BTreeMap::new(),
            is_operational: false,
            has_connectivity_issues: false,
            address_validated: false,
            address_validated_ipv4: false,
            address_validated_ipv6: false,
            ipv4_skipped: false,
            is_aggregated: false,
            total_hostnames: 0,
            hostnames_tested: 0,
            hostnames_operational: 0,
        }
    }

    /// Recompute the summary flags from the per-protocol observations.
    ///
    /// `is_operational` holds iff at least one protocol succeeded;
    /// `has_connectivity_issues` marks results where something was reachable
    /// but at least one attempted family handshake failed.
    pub fn finalize(&mut self) {
        self.is_operational = self.protocols.values().any(ProtocolStatus::is_success);

        let any_family_failure = self.protocols.values().any(|status| {
            status.observation().is_some_and(|obs| {
                (obs.ipv4.tested && !obs.ipv4.success) || (obs.ipv6.tested && !obs.ipv6.success)
            })
        });
        self.has_connectivity_issues = self.is_operational && any_family_failure;

        self.address_validated = self.address_validated_ipv4 || self.address_validated_ipv6;
    }

    pub fn protocol(&self, protocol: InternetProtocol) -> &ProtocolStatus {
        const NOT_TESTED: &ProtocolStatus = &ProtocolStatus::NotTested;
        self.protocols.get(&protocol).unwrap_or(NOT_TESTED)
    }

    /// Best (smallest) combined response time over successful protocols.
    pub fn best_response_ms(&self) -> Option<u32> {
        self.protocols
            .values()
            .filter_map(|status| status.observation().and_then(ProtocolObservation::response_ms))
            .min()
    }
}

/// Per-hostname summary inside an aggregated rollup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostnameSummary {
    pub operational: bool,
    pub best_response_ms: Option<u32>,
    pub dns_error: Option<String>,
}

/// Rollup across all of a node's hostnames for one test cycle. Computed on
/// read from the per-hostname rows; never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AggregatedTestResult {
    pub address: NodeAddress,
    pub primary_hostname: String,
    pub hostnames: BTreeMap<String, HostnameSummary>,
    pub working_hostnames: BTreeSet<String>,
    pub failing_hostnames: BTreeSet<String>,
    pub best_response_ms: Option<u32>,
    pub best_hostname: Option<String>,
    pub any_operational: bool,
    /// Percent of hostnames that were operational.
    pub success_rate: f32,
}

impl AggregatedTestResult {
    /// Roll up one cycle's per-hostname results. The first result's
    /// hostname is taken as primary (results arrive in hostname order).
    pub fn from_results(address: NodeAddress, results: &[TestResult]) -> Self {
        let mut aggregated = AggregatedTestResult {
            address,
            ..Default::default()
        };

        for result in results {
            if aggregated.primary_hostname.is_empty() {
                aggregated.primary_hostname = result.hostname.clone();
            }

            let best = result.best_response_ms();
            let _ = aggregated.hostnames.insert(
                result.hostname.clone(),
                HostnameSummary {
                    operational: result.is_operational,
                    best_response_ms: best,
                    dns_error: result.dns.error.clone(),
                },
            );

            if result.is_operational {
                let _ = aggregated.working_hostnames.insert(result.hostname.clone());
                aggregated.any_operational = true;
                if let Some(ms) = best {
                    if aggregated.best_response_ms.is_none_or(|current| ms < current) {
                        aggregated.best_response_ms = Some(ms);
                        aggregated.best_hostname = Some(result.hostname.clone());
                    }
                }
            } else {
                let _ = aggregated.failing_hostnames.insert(result.hostname.clone());
            }
        }

        if !aggregated.hostnames.is_empty() {
            aggregated.success_rate = 100.0 * aggregated.working_hostnames.len() as f32
                / aggregated.hostnames.len() as f32;
        }

        aggregated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tested(v4_success: bool, v4_ms: u32, v6_success: bool, v6_ms: u32) -> ProtocolObservation {
        ProtocolObservation {
            port: 24554,
            ipv4: FamilyResult {
                tested: true,
                success: v4_success,
                response_ms: v4_ms,
                address: "192.0.2.1".into(),
                error: if v4_success { String::new() } else { "refused".into() },
            },
            ipv6: FamilyResult {
                tested: true,
                success: v6_success,
                response_ms: v6_ms,
                address: "2001:db8::1".into(),
                error: if v6_success { String::new() } else { "timeout".into() },
            },
            ..Default::default()
        }
    }

    #[test]
    fn combined_success_is_or_of_families() {
        assert!(tested(true, 10, false, 0).success());
        assert!(tested(false, 0, true, 20).success());
        assert!(!tested(false, 0, false, 0).success());
    }

    #[test]
    fn combined_response_is_min_of_successful_families() {
        assert_eq!(tested(true, 80, true, 45).response_ms(), Some(45));
        assert_eq!(tested(true, 80, false, 45).response_ms(), Some(80));
        assert_eq!(tested(false, 80, false, 45).response_ms(), None);
    }

    #[test]
    fn connectivity_type_covers_the_full_cube() {
        assert_eq!(
            tested(true, 1, true, 1).connectivity(),
            ConnectivityType::DualStack
        );
        assert_eq!(
            tested(true, 1, false, 0).connectivity(),
            ConnectivityType::Ipv4Only
        );
        assert_eq!(
            tested(false, 0, true, 1).connectivity(),
            ConnectivityType::Ipv6Only
        );
        assert_eq!(
            tested(false, 0, false, 0).connectivity(),
            ConnectivityType::Failed
        );

        // One family tested and failed, the other untested: failed.
        let mut one_sided = tested(false, 0, false, 0);
        one_sided.ipv6 = FamilyResult::default();
        assert_eq!(one_sided.connectivity(), ConnectivityType::Failed);

        // One family tested and succeeded, the other untested: that family only.
        let lone_v6 = ProtocolObservation {
            ipv6: FamilyResult::success("2001:db8::1".into(), 9),
            ..Default::default()
        };
        assert_eq!(lone_v6.connectivity(), ConnectivityType::Ipv6Only);

        assert_eq!(
            ProtocolObservation::default().connectivity(),
            ConnectivityType::NotTested
        );
    }

    #[test]
    fn error_string_joins_family_errors_only_on_failure() {
        let failed = tested(false, 0, false, 0);
        assert_eq!(failed.error(), "v4: refused; v6: timeout");
        assert_eq!(tested(true, 5, false, 0).error(), "");
    }

    #[test]
    fn finalize_sets_operational_iff_any_protocol_succeeded() {
        let mut result = TestResult::new(NodeAddress::new(2, 450, 1024), "bbs.example.com", 0);
        let _ = result.protocols.insert(
            InternetProtocol::Binkp,
            ProtocolStatus::Tested(tested(false, 0, false, 0)),
        );
        result.finalize();
        assert!(!result.is_operational);

        let _ = result.protocols.insert(
            InternetProtocol::Telnet,
            ProtocolStatus::Tested(tested(true, 30, false, 0)),
        );
        result.finalize();
        assert!(result.is_operational);
        assert!(result.has_connectivity_issues);
    }

    #[test]
    fn finalize_without_family_failures_reports_no_issues() {
        let mut result = TestResult::new(NodeAddress::new(2, 450, 1024), "bbs.example.com", 0);
        let _ = result.protocols.insert(
            InternetProtocol::Binkp,
            ProtocolStatus::Tested(tested(true, 12, true, 18)),
        );
        result.finalize();
        assert!(result.is_operational);
        assert!(!result.has_connectivity_issues);
    }

    #[test]
    fn aggregation_selects_best_hostname_and_success_rate() {
        let address = NodeAddress::new(1, 234, 56);
        let mut ok = TestResult::new(address, "a.example.com", 0);
        let _ = ok.protocols.insert(
            InternetProtocol::Binkp,
            ProtocolStatus::Tested(tested(true, 40, true, 25)),
        );
        ok.finalize();

        let mut slower = TestResult::new(address, "b.example.com", 1);
        let _ = slower.protocols.insert(
            InternetProtocol::Binkp,
            ProtocolStatus::Tested(tested(true, 90, false, 0)),
        );
        slower.finalize();

        let mut dead = TestResult::new(address, "c.example.com", 2);
        dead.dns.error = Some("no addresses".into());
        dead.finalize();

        let aggregated =
            AggregatedTestResult::from_results(address, &[ok, slower, dead]);

        assert!(aggregated.any_operational);
        assert_eq!(aggregated.primary_hostname, "a.example.com");
        assert_eq!(aggregated.best_hostname.as_deref(), Some("a.example.com"));
        assert_eq!(aggregated.best_response_ms, Some(25));
        assert_eq!(aggregated.working_hostnames.len(), 2);
        assert_eq!(aggregated.failing_hostnames.len(), 1);
        assert!((aggregated.success_rate - 66.666_67).abs() < 0.01);
    }

    #[test]
    fn not_tested_protocol_lookup_returns_default() {
        let result = TestResult::new(NodeAddress::new(2, 2, 2), "x.example.com", 0);
        assert!(!result.protocol(InternetProtocol::Ftp).is_tested());
    }
}
