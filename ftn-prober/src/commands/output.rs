// Copyright 2025 the ftn-prober contributors.
//
// This software is licensed to you under The General Public License (GPL), version 3. Unless
// required by applicable law or agreed to in writing, software distributed under the GPL Licence
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either
// express or implied. Please review the Licence for the specific language governing permissions
// and limitations.

//! Plain-text rendering of results for the CLI commands.

use ftn_model::{InternetProtocol, Node, ProtocolStatus, TestResult};
use ftn_storage::NodeStatus;

pub fn print_test_result(result: &TestResult) {
    println!(
        "{} via {} at {}",
        result.address,
        if result.hostname.is_empty() {
            "<no hostname>"
        } else {
            result.hostname.as_str()
        },
        result.time.format("%Y-%m-%d %H:%M:%S UTC")
    );

    match &result.dns.error {
        Some(error) => println!("  DNS: FAILED ({error})"),
        None => println!(
            "  DNS: {} IPv4, {} IPv6",
            result.dns.ipv4.len(),
            result.dns.ipv6.len()
        ),
    }

    if !result.geo.country.is_empty() {
        println!(
            "  Location: {}, {} ({})",
            result.geo.city, result.geo.country, result.geo.isp
        );
    }

    for protocol in InternetProtocol::ALL {
        let status = result.protocol(protocol);
        let ProtocolStatus::Tested(observation) = status else {
            continue;
        };
        let verdict = if observation.success() {
            match observation.response_ms() {
                Some(ms) => format!("OK {ms}ms ({})", observation.connectivity().as_str()),
                None => "OK".to_string(),
            }
        } else {
            format!("FAILED ({})", observation.error())
        };
        println!("  {:>4}:{} {verdict}", protocol.tag(), observation.port);

        if let Some(identity) = &observation.identity {
            if !identity.system_name.is_empty() {
                println!(
                    "        {} / {} ({})",
                    identity.system_name, identity.sysop, identity.version
                );
            }
            if !identity.addresses.is_empty() {
                println!("        AKAs: {}", identity.addresses.join(" "));
            }
        }
    }

    println!(
        "  Operational: {}, address validated: {}{}",
        result.is_operational,
        result.address_validated,
        if result.ipv4_skipped { " (IPv4 skipped)" } else { "" }
    );
}

pub fn print_node(node: &Node) {
    println!("{} ({})", node.address, node.role);
    println!("  System: {}", node.system_name);
    println!("  Sysop: {}", node.sysop_name);
    println!("  Location: {}", node.location);
    if let Some(region) = node.region {
        println!("  Region: {region}");
    }
    if !node.flags.is_empty() {
        println!("  Flags: {}", node.flags.join(","));
    }
    if !node.modem_flags.is_empty() {
        println!("  Modem flags: {}", node.modem_flags.join(","));
    }
    for (protocol, endpoints) in &node.internet.protocols {
        let rendered: Vec<String> = endpoints
            .iter()
            .map(|e| match (&e.address, e.port) {
                (Some(address), Some(port)) => format!("{address}:{port}"),
                (Some(address), None) => address.clone(),
                (None, Some(port)) => format!(":{port}"),
                (None, None) => "<default>".to_string(),
            })
            .collect();
        println!("  {}: {}", protocol.tag(), rendered.join(" "));
    }
    if let Some(default_hostname) = node.internet.default_hostname() {
        println!("  INA: {default_hostname}");
    }
    if !node.internet.info_flags.is_empty() {
        let flags: Vec<&str> = node.internet.info_flags.iter().map(String::as_str).collect();
        println!("  Info flags: {}", flags.join(","));
    }
}

pub fn print_status_row(status: &NodeStatus) {
    let protocols = [
        ("IBN", status.binkp_success),
        ("IFC", status.ifcico_success),
        ("ITN", status.telnet_success),
    ]
    .iter()
    .filter(|(_, ok)| *ok)
    .map(|(tag, _)| *tag)
    .collect::<Vec<_>>()
    .join(",");

    println!(
        "{:<14} {:<4} {:<19} {:<12} {}",
        status.address.to_string(),
        if status.is_operational { "up" } else { "down" },
        status.last_tested.format("%Y-%m-%d %H:%M:%S"),
        if protocols.is_empty() { "-" } else { protocols.as_str() },
        if status.country.is_empty() { "-" } else { status.country.as_str() },
    );
}
