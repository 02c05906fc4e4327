// Copyright 2025 the ftn-prober contributors.
//
// This software is licensed to you under The General Public License (GPL), version 3. Unless
// required by applicable law or agreed to in writing, software distributed under the GPL Licence
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either
// express or implied. Please review the Licence for the specific language governing permissions
// and limitations.

//! The node catalog model: addresses, roles, flags and the internet
//! configuration a nodelist row advertises.

use crate::{Error, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    path::PathBuf,
    str::FromStr,
};

/// The three-component addressing tuple. Unique per nodelist date modulo
/// declared conflicts.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct NodeAddress {
    pub zone: u16,
    pub net: u16,
    pub node: u16,
}

impl NodeAddress {
    pub fn new(zone: u16, net: u16, node: u16) -> Self {
        Self { zone, net, node }
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.zone, self.net, self.node)
    }
}

impl FromStr for NodeAddress {
    type Err = Error;

    /// Parses `zone:net/node`. Point addresses (`.point` suffix) are not
    /// part of the catalog and are rejected.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidNodeAddress(s.to_string());

        let (zone, rest) = s.split_once(':').ok_or_else(invalid)?;
        let (net, node) = rest.split_once('/').ok_or_else(invalid)?;
        if node.contains('.') {
            return Err(invalid());
        }

        Ok(Self {
            zone: zone.trim().parse().map_err(|_| invalid())?,
            net: net.trim().parse().map_err(|_| invalid())?,
            node: node.trim().parse().map_err(|_| invalid())?,
        })
    }
}

/// The role keyword carried in the first field of a nodelist row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum NodeRole {
    #[default]
    Node,
    Zone,
    Region,
    Host,
    Hub,
    Pvt,
    Hold,
    Down,
}

impl NodeRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeRole::Node => "Node",
            NodeRole::Zone => "Zone",
            NodeRole::Region => "Region",
            NodeRole::Host => "Host",
            NodeRole::Hub => "Hub",
            NodeRole::Pvt => "Pvt",
            NodeRole::Hold => "Hold",
            NodeRole::Down => "Down",
        }
    }
}

impl FromStr for NodeRole {
    type Err = Error;

    /// Case-insensitive; the empty string is a plain node row.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" => Ok(NodeRole::Node),
            "zone" => Ok(NodeRole::Zone),
            "region" => Ok(NodeRole::Region),
            "host" => Ok(NodeRole::Host),
            "hub" => Ok(NodeRole::Hub),
            "pvt" => Ok(NodeRole::Pvt),
            "hold" => Ok(NodeRole::Hold),
            "down" => Ok(NodeRole::Down),
            other => Err(Error::InvalidNodeRole(other.to_string())),
        }
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Application protocols a node can advertise in its flag list.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum InternetProtocol {
    /// BinkP mailer (`IBN`), default port 24554.
    Binkp,
    /// ifcico/EMSI mailer (`IFC`), default port 60179.
    Ifcico,
    /// Telnet (`ITN`), default port 23.
    Telnet,
    /// VModem (`IVM`), default port 3141.
    Vmodem,
    /// FTP (`IFT`), default port 21.
    Ftp,
    /// Generic IP flag (`IP`), no protocol of its own.
    GeneralIp,
}

impl InternetProtocol {
    pub const ALL: [InternetProtocol; 6] = [
        InternetProtocol::Binkp,
        InternetProtocol::Ifcico,
        InternetProtocol::Telnet,
        InternetProtocol::Vmodem,
        InternetProtocol::Ftp,
        InternetProtocol::GeneralIp,
    ];

    /// The nodelist flag tag, e.g. `IBN`.
    pub fn tag(&self) -> &'static str {
        match self {
            InternetProtocol::Binkp => "IBN",
            InternetProtocol::Ifcico => "IFC",
            InternetProtocol::Telnet => "ITN",
            InternetProtocol::Vmodem => "IVM",
            InternetProtocol::Ftp => "IFT",
            InternetProtocol::GeneralIp => "IP",
        }
    }

    /// Default port used when the flag value does not carry one.
    pub fn default_port(&self) -> Option<u16> {
        match self {
            InternetProtocol::Binkp => Some(24554),
            InternetProtocol::Ifcico => Some(60179),
            InternetProtocol::Telnet => Some(23),
            InternetProtocol::Vmodem => Some(3141),
            InternetProtocol::Ftp => Some(21),
            InternetProtocol::GeneralIp => None,
        }
    }

    /// Parse a flag tag, honouring the `BND` and `TEL` aliases.
    pub fn from_tag(tag: &str) -> Result<Self> {
        match tag.to_ascii_uppercase().as_str() {
            "IBN" | "BND" => Ok(InternetProtocol::Binkp),
            "IFC" => Ok(InternetProtocol::Ifcico),
            "ITN" | "TEL" => Ok(InternetProtocol::Telnet),
            "IVM" => Ok(InternetProtocol::Vmodem),
            "IFT" => Ok(InternetProtocol::Ftp),
            "IP" => Ok(InternetProtocol::GeneralIp),
            other => Err(Error::UnknownProtocolTag(other.to_string())),
        }
    }
}

impl fmt::Display for InternetProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// One endpoint advertised for a protocol: `IBN:bbs.example.com:24555`
/// yields `{address: Some("bbs.example.com"), port: Some(24555)}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct InternetEndpoint {
    pub address: Option<String>,
    pub port: Option<u16>,
}

impl InternetEndpoint {
    pub fn address_only(address: impl Into<String>) -> Self {
        Self {
            address: Some(address.into()),
            port: None,
        }
    }

    pub fn port_only(port: u16) -> Self {
        Self {
            address: None,
            port: Some(port),
        }
    }
}

/// Informational flag suppressing IPv4 probing.
pub const INFO_FLAG_NO_IPV4: &str = "INO4";
/// Informational flag suppressing IPv6 probing.
pub const INFO_FLAG_NO_IPV6: &str = "INO6";

/// The internet configuration extracted from a node's flag list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct InternetConfig {
    /// Protocol tag to ordered endpoint list, in flag order.
    pub protocols: BTreeMap<InternetProtocol, Vec<InternetEndpoint>>,
    /// Defaults map, e.g. `INA` default hostname and `IEM` default email.
    pub defaults: BTreeMap<String, String>,
    /// Email-only protocols (`IMI`, `ITX`, `ISE`, `IUC`, `EMA`, `EVY`).
    pub email_protocols: BTreeMap<String, String>,
    /// Informational flags (`INO4`, `INO6`, `ICM`).
    pub info_flags: BTreeSet<String>,
}

impl InternetConfig {
    pub fn has_inet(&self) -> bool {
        !self.protocols.is_empty()
    }

    /// The `INA` default hostname, if any.
    pub fn default_hostname(&self) -> Option<&str> {
        self.defaults.get("INA").map(String::as_str)
    }

    /// The `IEM` default email, if any.
    pub fn default_email(&self) -> Option<&str> {
        self.defaults.get("IEM").map(String::as_str)
    }

    pub fn ipv4_disabled(&self) -> bool {
        self.info_flags.contains(INFO_FLAG_NO_IPV4)
    }

    pub fn ipv6_disabled(&self) -> bool {
        self.info_flags.contains(INFO_FLAG_NO_IPV6)
    }

    /// Resolved port for a protocol: first endpoint port, else the
    /// protocol default.
    pub fn port_for(&self, protocol: InternetProtocol) -> Option<u16> {
        self.protocols
            .get(&protocol)
            .and_then(|endpoints| endpoints.iter().find_map(|e| e.port))
            .or_else(|| protocol.default_port())
    }
}

/// One parsed nodelist row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Node {
    pub address: NodeAddress,
    pub role: NodeRole,
    /// Region this node belongs to, where the scoping context knew one.
    pub region: Option<u16>,
    pub system_name: String,
    pub location: String,
    pub sysop_name: String,
    pub phone: String,
    /// Max speed field; non-numeric values collapse to zero.
    pub max_speed: u32,
    /// Raw flags that did not classify as internet/modem flags.
    pub flags: Vec<String>,
    /// Modem-family flags (V34, HST, ZYX, ...).
    pub modem_flags: Vec<String>,
    pub internet: InternetConfig,
    /// Set when this address occurs more than once within one snapshot.
    pub has_conflict: bool,
    /// Zero-based occurrence index among conflicting duplicates.
    pub conflict_sequence: u32,
}

impl Node {
    pub fn is_cm(&self) -> bool {
        self.flags.iter().any(|f| f == "CM")
    }

    pub fn is_mo(&self) -> bool {
        self.flags.iter().any(|f| f == "MO")
    }

    pub fn has_inet(&self) -> bool {
        self.internet.has_inet()
    }

    /// Every hostname this node advertises, in flag order, deduplicated.
    /// Protocol endpoint addresses come first, the `INA` default last.
    pub fn hostnames(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        let mut hostnames = Vec::new();

        for endpoints in self.internet.protocols.values() {
            for endpoint in endpoints {
                if let Some(address) = &endpoint.address {
                    if !address.is_empty() && seen.insert(address.clone()) {
                        hostnames.push(address.clone());
                    }
                }
            }
        }

        if let Some(default) = self.internet.default_hostname() {
            if !default.is_empty() && seen.insert(default.to_string()) {
                hostnames.push(default.to_string());
            }
        }

        hostnames
    }

    /// The hostname the scheduler probes when it tests only one.
    pub fn primary_hostname(&self) -> Option<String> {
        self.hostnames().into_iter().next()
    }

    /// Protocols with a usable endpoint, i.e. everything advertised except
    /// the bare `IP` marker.
    pub fn probeable_protocols(&self) -> Vec<InternetProtocol> {
        self.internet
            .protocols
            .keys()
            .filter(|p| !matches!(p, InternetProtocol::GeneralIp))
            .copied()
            .collect()
    }
}

/// Detected on the first node line of a file; selects the legacy flag
/// rewrite behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodelistFormat {
    F1986,
    F1990,
    F2000,
    F2020,
}

impl NodelistFormat {
    pub fn year(&self) -> u16 {
        match self {
            NodelistFormat::F1986 => 1986,
            NodelistFormat::F1990 => 1990,
            NodelistFormat::F2000 => 2000,
            NodelistFormat::F2020 => 2020,
        }
    }
}

impl fmt::Display for NodelistFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.year())
    }
}

/// A dated, immutable set of nodes produced from one nodelist file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodelistSnapshot {
    pub date: NaiveDate,
    pub day_of_year: u32,
    /// CRC token from the header, when present.
    pub crc: Option<u32>,
    pub format: NodelistFormat,
    pub source_path: PathBuf,
    pub nodes: Vec<Node>,
}

impl NodelistSnapshot {
    /// Number of nodes advertising at least one internet protocol.
    pub fn internet_node_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.has_inet()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_address_parses_and_round_trips() {
        let addr: NodeAddress = "2:450/1024".parse().expect("should parse");
        assert_eq!(addr, NodeAddress::new(2, 450, 1024));
        assert_eq!(addr.to_string(), "2:450/1024");
    }

    #[test]
    fn node_address_rejects_point_suffix() {
        assert!("2:450/1024.1".parse::<NodeAddress>().is_err());
    }

    #[test]
    fn node_address_rejects_garbage() {
        assert!("not-an-address".parse::<NodeAddress>().is_err());
        assert!("2:450".parse::<NodeAddress>().is_err());
        assert!("2:-1/5".parse::<NodeAddress>().is_err());
    }

    #[test]
    fn node_role_parses_case_insensitively() {
        assert_eq!("hub".parse::<NodeRole>().expect("parse"), NodeRole::Hub);
        assert_eq!("ZONE".parse::<NodeRole>().expect("parse"), NodeRole::Zone);
        assert_eq!("".parse::<NodeRole>().expect("parse"), NodeRole::Node);
    }

    #[test]
    fn protocol_tag_aliases_resolve() {
        assert_eq!(
            InternetProtocol::from_tag("BND").expect("alias"),
            InternetProtocol::Binkp
        );
        assert_eq!(
            InternetProtocol::from_tag("TEL").expect("alias"),
            InternetProtocol::Telnet
        );
    }

    #[test]
    fn default_port_table_matches_conventions() {
        assert_eq!(InternetProtocol::Binkp.default_port(), Some(24554));
        assert_eq!(InternetProtocol::Telnet.default_port(), Some(23));
        assert_eq!(InternetProtocol::Ifcico.default_port(), Some(60179));
        assert_eq!(InternetProtocol::Ftp.default_port(), Some(21));
        assert_eq!(InternetProtocol::Vmodem.default_port(), Some(3141));
        assert_eq!(InternetProtocol::GeneralIp.default_port(), None);
    }

    #[test]
    fn port_for_prefers_endpoint_port_over_default() {
        let mut config = InternetConfig::default();
        let _ = config.protocols.insert(
            InternetProtocol::Binkp,
            vec![InternetEndpoint {
                address: Some("bbs.example.com".into()),
                port: Some(24555),
            }],
        );
        assert_eq!(config.port_for(InternetProtocol::Binkp), Some(24555));
        assert_eq!(config.port_for(InternetProtocol::Telnet), Some(23));
    }

    #[test]
    fn hostnames_are_ordered_and_deduplicated() {
        let mut node = Node::default();
        let _ = node.internet.protocols.insert(
            InternetProtocol::Binkp,
            vec![
                InternetEndpoint::address_only("first.example.com"),
                InternetEndpoint::address_only("second.example.com"),
            ],
        );
        let _ = node.internet.protocols.insert(
            InternetProtocol::Telnet,
            vec![InternetEndpoint::address_only("first.example.com")],
        );
        let _ = node
            .internet
            .defaults
            .insert("INA".to_string(), "default.example.com".to_string());

        assert_eq!(
            node.hostnames(),
            vec![
                "first.example.com".to_string(),
                "second.example.com".to_string(),
                "default.example.com".to_string()
            ]
        );
        assert_eq!(
            node.primary_hostname(),
            Some("first.example.com".to_string())
        );
    }

    #[test]
    fn info_flags_control_family_masks() {
        let mut config = InternetConfig::default();
        assert!(!config.ipv4_disabled());
        let _ = config.info_flags.insert(INFO_FLAG_NO_IPV4.to_string());
        assert!(config.ipv4_disabled());
        assert!(!config.ipv6_disabled());
    }

    #[test]
    fn probeable_protocols_excludes_general_ip_marker() {
        let mut node = Node::default();
        let _ = node
            .internet
            .protocols
            .insert(InternetProtocol::Binkp, vec![]);
        let _ = node
            .internet
            .protocols
            .insert(InternetProtocol::GeneralIp, vec![]);

        assert_eq!(node.probeable_protocols(), vec![InternetProtocol::Binkp]);
    }
}
