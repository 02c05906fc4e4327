// Copyright 2025 the ftn-prober contributors.
//
// This software is licensed to you under The General Public License (GPL), version 3. Unless
// required by applicable law or agreed to in writing, software distributed under the GPL Licence
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either
// express or implied. Please review the Licence for the specific language governing permissions
// and limitations.

//! The per-node probe pipeline: DNS, per-(family × protocol) handshake
//! fan-out, best-effort geolocation, aggregation into a `TestResult`.

use crate::EngineConfig;
use ftn_lookup::{GeoLookup, Resolver};
use ftn_model::{
    FamilyResult, InternetProtocol, Node, ProtocolObservation, ProtocolStatus, TestResult,
    HOSTNAME_INDEX_AGGREGATED,
};
use ftn_probes::{announces_address, ProbeOutcome, Prober};
use std::{
    collections::BTreeMap,
    net::{IpAddr, SocketAddr},
    sync::Arc,
};

pub struct ProbePipeline {
    resolver: Arc<dyn Resolver>,
    geo: Option<Arc<dyn GeoLookup>>,
    probers: BTreeMap<InternetProtocol, Arc<dyn Prober>>,
    config: Arc<EngineConfig>,
}

impl ProbePipeline {
    pub fn new(
        resolver: Arc<dyn Resolver>,
        geo: Option<Arc<dyn GeoLookup>>,
        probers: BTreeMap<InternetProtocol, Arc<dyn Prober>>,
        config: Arc<EngineConfig>,
    ) -> Self {
        Self {
            resolver,
            geo,
            probers,
            config,
        }
    }

    /// Test every hostname the node advertises (or only the primary one,
    /// per configuration). One `TestResult` row per hostname.
    pub async fn test_node(&self, node: &Node) -> Vec<TestResult> {
        let hostnames = node.hostnames();
        if hostnames.is_empty() {
            let mut result =
                TestResult::new(node.address, String::new(), HOSTNAME_INDEX_AGGREGATED);
            result.dns.error = Some("no hostname advertised".to_string());
            result.finalize();
            return vec![result];
        }

        let total = hostnames.len() as u32;
        let selected: Vec<(usize, String)> = if self.config.test_all_hostnames {
            hostnames.into_iter().enumerate().collect()
        } else {
            hostnames.into_iter().enumerate().take(1).collect()
        };
        let tested = selected.len() as u32;

        let mut results = Vec::with_capacity(selected.len());
        for (index, hostname) in selected {
            let mut result = self.test_hostname(node, &hostname, index as i32).await;
            result.total_hostnames = total;
            result.hostnames_tested = tested;
            results.push(result);
        }

        let operational = results.iter().filter(|r| r.is_operational).count() as u32;
        for result in &mut results {
            result.hostnames_operational = operational;
        }
        results
    }

    /// Drive one `(node, hostname)` test end to end.
    pub async fn test_hostname(&self, node: &Node, hostname: &str, index: i32) -> TestResult {
        let mut result = TestResult::new(node.address, hostname, index);

        result.dns = self.resolver.resolve(hostname).await;
        if !result.dns.resolved_any() {
            if result.dns.error.is_none() {
                result.dns.error = Some("no addresses resolved".to_string());
            }
            debug!(
                "DNS for {hostname} ({}) yielded no addresses: {:?}",
                node.address, result.dns.error
            );
            result.finalize();
            return result;
        }

        let skip_ipv4 = self.config.honor_ino4 && node.internet.ipv4_disabled();
        let skip_ipv6 = self.config.honor_ino6 && node.internet.ipv6_disabled();
        result.ipv4_skipped = skip_ipv4;

        let ipv4_target = (!skip_ipv4)
            .then(|| result.dns.ipv4.first().copied())
            .flatten()
            .map(IpAddr::V4);
        let ipv6_target = (!skip_ipv6)
            .then(|| result.dns.ipv6.first().copied())
            .flatten()
            .map(IpAddr::V6);

        // Both families masked or unresolved: nothing to dial, every
        // protocol stays not-tested.
        if ipv4_target.is_none() && ipv6_target.is_none() {
            result.finalize();
            return result;
        }

        let probe_runs = self.enabled_protocols(node).into_iter().filter_map(|protocol| {
            let port = node.internet.port_for(protocol)?;
            let prober = Arc::clone(self.probers.get(&protocol)?);
            let timeout = self.config.timeout_for(protocol);
            Some(async move {
                let (ipv4, ipv6) = tokio::join!(
                    maybe_probe(&*prober, ipv4_target, port, timeout),
                    maybe_probe(&*prober, ipv6_target, port, timeout),
                );
                (
                    protocol,
                    build_observation(port, ipv4_target, ipv4, ipv6_target, ipv6),
                )
            })
        });
        let observations = futures::future::join_all(probe_runs).await;

        for (protocol, observation) in observations {
            if matches!(protocol, InternetProtocol::Binkp | InternetProtocol::Ifcico) {
                if observation.ipv4.success
                    && announces_address(node.address, &observation.ipv4_announced)
                {
                    result.address_validated_ipv4 = true;
                }
                if observation.ipv6.success
                    && announces_address(node.address, &observation.ipv6_announced)
                {
                    result.address_validated_ipv6 = true;
                }
            }
            let _ = result
                .protocols
                .insert(protocol, ProtocolStatus::Tested(observation));
        }

        // Geolocation is best-effort and never gates the probe.
        if let Some(geo) = &self.geo {
            let first_ip = result
                .dns
                .ipv4
                .first()
                .copied()
                .map(IpAddr::V4)
                .or_else(|| result.dns.ipv6.first().copied().map(IpAddr::V6));
            if let Some(ip) = first_ip {
                match geo.lookup(ip).await {
                    Ok(geolocation) => result.geo = geolocation,
                    Err(err) => debug!("Geolocation for {ip} failed: {err}"),
                }
            }
        }

        result.finalize();
        info!(
            "Tested {} via {hostname}: operational={}, protocols={}",
            node.address,
            result.is_operational,
            result.protocols.len()
        );
        result
    }

    /// Advertised protocols intersected with the enable list and the
    /// prober registry.
    fn enabled_protocols(&self, node: &Node) -> Vec<InternetProtocol> {
        node.probeable_protocols()
            .into_iter()
            .filter(|p| self.config.protocol_enabled(*p))
            .filter(|p| self.probers.contains_key(p))
            .collect()
    }
}

async fn maybe_probe(
    prober: &dyn Prober,
    target: Option<IpAddr>,
    port: u16,
    timeout: std::time::Duration,
) -> Option<ProbeOutcome> {
    let ip = target?;
    Some(prober.probe(SocketAddr::new(ip, port), timeout).await)
}

fn build_observation(
    port: u16,
    ipv4_target: Option<IpAddr>,
    ipv4: Option<ProbeOutcome>,
    ipv6_target: Option<IpAddr>,
    ipv6: Option<ProbeOutcome>,
) -> ProtocolObservation {
    let mut observation = ProtocolObservation {
        port,
        ..Default::default()
    };

    if let Some(outcome) = &ipv4 {
        observation.ipv4_announced = outcome.announced_addresses().to_vec();
    }
    if let Some(outcome) = &ipv6 {
        observation.ipv6_announced = outcome.announced_addresses().to_vec();
    }

    observation.identity = ipv4
        .as_ref()
        .filter(|o| o.identity.is_some())
        .or(ipv6.as_ref().filter(|o| o.identity.is_some()))
        .and_then(|o| o.identity.clone());

    observation.ipv4 = family_result(ipv4_target, ipv4);
    observation.ipv6 = family_result(ipv6_target, ipv6);
    observation
}

fn family_result(target: Option<IpAddr>, outcome: Option<ProbeOutcome>) -> FamilyResult {
    match outcome {
        None => FamilyResult::default(),
        Some(outcome) => FamilyResult {
            tested: true,
            success: outcome.success,
            response_ms: if outcome.success { outcome.elapsed_ms } else { 0 },
            address: target.map(|ip| ip.to_string()).unwrap_or_default(),
            error: outcome.error.unwrap_or_default(),
        },
    }
}
