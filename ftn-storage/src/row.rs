// Copyright 2025 the ftn-prober contributors.
//
// This software is licensed to you under The General Public License (GPL), version 3. Unless
// required by applicable law or agreed to in writing, software distributed under the GPL Licence
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either
// express or implied. Please review the Licence for the specific language governing permissions
// and limitations.

//! Flat row types mirroring the wire schema, with conversions to and from
//! the domain model. Nullables normalise to empty strings on write and
//! back to `None` on read.

use crate::{Error, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clickhouse::Row;
use ftn_model::{
    DnsOutcome, FamilyResult, Geolocation, InternetConfig, InternetProtocol, MailerIdentity, Node,
    NodeAddress, NodeRole, NodelistSnapshot, ProtocolObservation, ProtocolStatus, TestResult,
};
use serde::{Deserialize, Serialize};

/// One catalog row: a parsed node plus its snapshot metadata. The full
/// internet configuration rides along as JSON so reads lose nothing.
#[derive(Debug, Clone, Row, Serialize, Deserialize)]
pub struct CatalogRow {
    #[serde(with = "clickhouse::serde::chrono::date")]
    pub nodelist_date: NaiveDate,
    pub day_of_year: u16,
    pub crc: u32,
    pub format: String,
    pub zone: u16,
    pub net: u16,
    pub node: u16,
    pub region: u16,
    pub role: String,
    pub system_name: String,
    pub location: String,
    pub sysop_name: String,
    pub phone: String,
    pub max_speed: u32,
    pub flags: Vec<String>,
    pub modem_flags: Vec<String>,
    pub protocols: Vec<String>,
    pub hostnames: Vec<String>,
    pub internet_config: String,
    pub has_inet: bool,
    pub has_conflict: bool,
    pub conflict_sequence: u32,
}

impl CatalogRow {
    pub fn from_node(snapshot: &NodelistSnapshot, node: &Node) -> Result<Self> {
        Ok(Self {
            nodelist_date: snapshot.date,
            day_of_year: snapshot.day_of_year as u16,
            crc: snapshot.crc.unwrap_or(0),
            format: snapshot.format.to_string(),
            zone: node.address.zone,
            net: node.address.net,
            node: node.address.node,
            region: node.region.unwrap_or(0),
            role: node.role.to_string(),
            system_name: node.system_name.clone(),
            location: node.location.clone(),
            sysop_name: node.sysop_name.clone(),
            phone: node.phone.clone(),
            max_speed: node.max_speed,
            flags: node.flags.clone(),
            modem_flags: node.modem_flags.clone(),
            protocols: node
                .internet
                .protocols
                .keys()
                .map(|p| p.tag().to_string())
                .collect(),
            hostnames: node.hostnames(),
            internet_config: serde_json::to_string(&node.internet)?,
            has_inet: node.has_inet(),
            has_conflict: node.has_conflict,
            conflict_sequence: node.conflict_sequence,
        })
    }

    pub fn into_node(self) -> Result<Node> {
        let internet: InternetConfig = serde_json::from_str(&self.internet_config)?;
        let role: NodeRole = self
            .role
            .parse()
            .map_err(|_| Error::InvalidStoredValue(format!("role {:?}", self.role)))?;

        Ok(Node {
            address: NodeAddress::new(self.zone, self.net, self.node),
            role,
            region: (self.region > 0).then_some(self.region),
            system_name: self.system_name,
            location: self.location,
            sysop_name: self.sysop_name,
            phone: self.phone,
            max_speed: self.max_speed,
            flags: self.flags,
            modem_flags: self.modem_flags,
            internet,
            has_conflict: self.has_conflict,
            conflict_sequence: self.conflict_sequence,
        })
    }
}

/// One probe record, fully flattened for the columnar store.
#[derive(Debug, Clone, Default, Row, Serialize, Deserialize)]
pub struct TestResultRow {
    #[serde(with = "clickhouse::serde::chrono::datetime")]
    pub test_time: DateTime<Utc>,
    #[serde(with = "clickhouse::serde::chrono::date")]
    pub test_date: NaiveDate,
    pub zone: u16,
    pub net: u16,
    pub node: u16,
    pub address: String,
    pub hostname: String,
    pub resolved_ipv4: Vec<String>,
    pub resolved_ipv6: Vec<String>,
    pub dns_error: String,
    pub country: String,
    pub country_code: String,
    pub city: String,
    pub region: String,
    pub latitude: f64,
    pub longitude: f64,
    pub isp: String,
    pub org: String,
    pub asn: String,

    pub binkp_tested: bool,
    pub binkp_success: bool,
    pub binkp_response_ms: u32,
    pub binkp_port: u16,
    pub binkp_error: String,
    pub binkp_ipv4_tested: bool,
    pub binkp_ipv4_success: bool,
    pub binkp_ipv4_response_ms: u32,
    pub binkp_ipv4_address: String,
    pub binkp_ipv4_error: String,
    pub binkp_ipv6_tested: bool,
    pub binkp_ipv6_success: bool,
    pub binkp_ipv6_response_ms: u32,
    pub binkp_ipv6_address: String,
    pub binkp_ipv6_error: String,
    pub binkp_system_name: String,
    pub binkp_sysop: String,
    pub binkp_location: String,
    pub binkp_version: String,
    pub binkp_addresses: Vec<String>,
    pub binkp_capabilities: Vec<String>,
    pub binkp_ipv4_announced: Vec<String>,
    pub binkp_ipv6_announced: Vec<String>,

    pub ifcico_tested: bool,
    pub ifcico_success: bool,
    pub ifcico_response_ms: u32,
    pub ifcico_port: u16,
    pub ifcico_error: String,
    pub ifcico_ipv4_tested: bool,
    pub ifcico_ipv4_success: bool,
    pub ifcico_ipv4_response_ms: u32,
    pub ifcico_ipv4_address: String,
    pub ifcico_ipv4_error: String,
    pub ifcico_ipv6_tested: bool,
    pub ifcico_ipv6_success: bool,
    pub ifcico_ipv6_response_ms: u32,
    pub ifcico_ipv6_address: String,
    pub ifcico_ipv6_error: String,
    pub ifcico_mailer_info: String,
    pub ifcico_response_type: String,
    pub ifcico_addresses: Vec<String>,
    pub ifcico_ipv4_announced: Vec<String>,
    pub ifcico_ipv6_announced: Vec<String>,

    pub telnet_tested: bool,
    pub telnet_success: bool,
    pub telnet_response_ms: u32,
    pub telnet_port: u16,
    pub telnet_error: String,
    pub telnet_ipv4_tested: bool,
    pub telnet_ipv4_success: bool,
    pub telnet_ipv4_response_ms: u32,
    pub telnet_ipv4_address: String,
    pub telnet_ipv4_error: String,
    pub telnet_ipv6_tested: bool,
    pub telnet_ipv6_success: bool,
    pub telnet_ipv6_response_ms: u32,
    pub telnet_ipv6_address: String,
    pub telnet_ipv6_error: String,

    pub ftp_tested: bool,
    pub ftp_success: bool,
    pub ftp_response_ms: u32,
    pub ftp_port: u16,
    pub ftp_error: String,
    pub ftp_ipv4_tested: bool,
    pub ftp_ipv4_success: bool,
    pub ftp_ipv4_response_ms: u32,
    pub ftp_ipv4_address: String,
    pub ftp_ipv4_error: String,
    pub ftp_ipv6_tested: bool,
    pub ftp_ipv6_success: bool,
    pub ftp_ipv6_response_ms: u32,
    pub ftp_ipv6_address: String,
    pub ftp_ipv6_error: String,

    pub vmodem_tested: bool,
    pub vmodem_success: bool,
    pub vmodem_response_ms: u32,
    pub vmodem_port: u16,
    pub vmodem_error: String,
    pub vmodem_ipv4_tested: bool,
    pub vmodem_ipv4_success: bool,
    pub vmodem_ipv4_response_ms: u32,
    pub vmodem_ipv4_address: String,
    pub vmodem_ipv4_error: String,
    pub vmodem_ipv6_tested: bool,
    pub vmodem_ipv6_success: bool,
    pub vmodem_ipv6_response_ms: u32,
    pub vmodem_ipv6_address: String,
    pub vmodem_ipv6_error: String,

    pub is_operational: bool,
    pub has_connectivity_issues: bool,
    pub address_validated: bool,
    pub address_validated_ipv4: bool,
    pub address_validated_ipv6: bool,
    pub ipv4_skipped: bool,
    pub tested_hostname: String,
    pub hostname_index: i32,
    pub is_aggregated: bool,
    pub total_hostnames: u32,
    pub hostnames_tested: u32,
    pub hostnames_operational: u32,
}

/// Flattened per-protocol columns, the unit both conversions work in.
#[derive(Debug, Clone, Default)]
struct ProtocolColumns {
    tested: bool,
    success: bool,
    response_ms: u32,
    port: u16,
    error: String,
    ipv4: FamilyColumns,
    ipv6: FamilyColumns,
}

#[derive(Debug, Clone, Default)]
struct FamilyColumns {
    tested: bool,
    success: bool,
    response_ms: u32,
    address: String,
    error: String,
}

impl FamilyColumns {
    fn from_model(family: &FamilyResult) -> Self {
        Self {
            tested: family.tested,
            success: family.success,
            response_ms: family.response_ms,
            address: family.address.clone(),
            error: family.error.clone(),
        }
    }

    fn into_model(self) -> FamilyResult {
        FamilyResult {
            tested: self.tested,
            success: self.success,
            response_ms: self.response_ms,
            address: self.address,
            error: self.error,
        }
    }
}

impl ProtocolColumns {
    fn from_status(status: &ProtocolStatus) -> Self {
        match status.observation() {
            None => Self::default(),
            Some(obs) => Self {
                tested: true,
                success: obs.success(),
                response_ms: obs.response_ms().unwrap_or(0),
                port: obs.port,
                error: obs.error(),
                ipv4: FamilyColumns::from_model(&obs.ipv4),
                ipv6: FamilyColumns::from_model(&obs.ipv6),
            },
        }
    }

    fn into_status(self) -> ProtocolStatus {
        if !self.tested {
            return ProtocolStatus::NotTested;
        }
        ProtocolStatus::Tested(ProtocolObservation {
            port: self.port,
            ipv4: self.ipv4.into_model(),
            ipv6: self.ipv6.into_model(),
            identity: None,
            ipv4_announced: Vec::new(),
            ipv6_announced: Vec::new(),
        })
    }
}

fn option_to_column(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn column_to_option(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

impl TestResultRow {
    pub fn from_model(result: &TestResult) -> Self {
        let binkp = ProtocolColumns::from_status(result.protocol(InternetProtocol::Binkp));
        let ifcico = ProtocolColumns::from_status(result.protocol(InternetProtocol::Ifcico));
        let telnet = ProtocolColumns::from_status(result.protocol(InternetProtocol::Telnet));
        let ftp = ProtocolColumns::from_status(result.protocol(InternetProtocol::Ftp));
        let vmodem = ProtocolColumns::from_status(result.protocol(InternetProtocol::Vmodem));

        let binkp_obs = result.protocol(InternetProtocol::Binkp).observation();
        let binkp_identity = binkp_obs.and_then(|o| o.identity.as_ref());
        let ifcico_obs = result.protocol(InternetProtocol::Ifcico).observation();
        let ifcico_identity = ifcico_obs.and_then(|o| o.identity.as_ref());

        Self {
            test_time: result.time,
            test_date: result.time.date_naive(),
            zone: result.address.zone,
            net: result.address.net,
            node: result.address.node,
            address: result.address.to_string(),
            hostname: result.hostname.clone(),
            resolved_ipv4: result.dns.ipv4.iter().map(|ip| ip.to_string()).collect(),
            resolved_ipv6: result.dns.ipv6.iter().map(|ip| ip.to_string()).collect(),
            dns_error: option_to_column(&result.dns.error),
            country: result.geo.country.clone(),
            country_code: result.geo.country_code.clone(),
            city: result.geo.city.clone(),
            region: result.geo.region.clone(),
            latitude: result.geo.latitude,
            longitude: result.geo.longitude,
            isp: result.geo.isp.clone(),
            org: result.geo.org.clone(),
            asn: result.geo.asn.clone(),

            binkp_tested: binkp.tested,
            binkp_success: binkp.success,
            binkp_response_ms: binkp.response_ms,
            binkp_port: binkp.port,
            binkp_error: binkp.error,
            binkp_ipv4_tested: binkp.ipv4.tested,
            binkp_ipv4_success: binkp.ipv4.success,
            binkp_ipv4_response_ms: binkp.ipv4.response_ms,
            binkp_ipv4_address: binkp.ipv4.address,
            binkp_ipv4_error: binkp.ipv4.error,
            binkp_ipv6_tested: binkp.ipv6.tested,
            binkp_ipv6_success: binkp.ipv6.success,
            binkp_ipv6_response_ms: binkp.ipv6.response_ms,
            binkp_ipv6_address: binkp.ipv6.address,
            binkp_ipv6_error: binkp.ipv6.error,
            binkp_system_name: binkp_identity.map(|i| i.system_name.clone()).unwrap_or_default(),
            binkp_sysop: binkp_identity.map(|i| i.sysop.clone()).unwrap_or_default(),
            binkp_location: binkp_identity.map(|i| i.location.clone()).unwrap_or_default(),
            binkp_version: binkp_identity.map(|i| i.version.clone()).unwrap_or_default(),
            binkp_addresses: binkp_identity.map(|i| i.addresses.clone()).unwrap_or_default(),
            binkp_capabilities: binkp_identity
                .map(|i| i.capabilities.clone())
                .unwrap_or_default(),
            binkp_ipv4_announced: binkp_obs.map(|o| o.ipv4_announced.clone()).unwrap_or_default(),
            binkp_ipv6_announced: binkp_obs.map(|o| o.ipv6_announced.clone()).unwrap_or_default(),

            ifcico_tested: ifcico.tested,
            ifcico_success: ifcico.success,
            ifcico_response_ms: ifcico.response_ms,
            ifcico_port: ifcico.port,
            ifcico_error: ifcico.error,
            ifcico_ipv4_tested: ifcico.ipv4.tested,
            ifcico_ipv4_success: ifcico.ipv4.success,
            ifcico_ipv4_response_ms: ifcico.ipv4.response_ms,
            ifcico_ipv4_address: ifcico.ipv4.address,
            ifcico_ipv4_error: ifcico.ipv4.error,
            ifcico_ipv6_tested: ifcico.ipv6.tested,
            ifcico_ipv6_success: ifcico.ipv6.success,
            ifcico_ipv6_response_ms: ifcico.ipv6.response_ms,
            ifcico_ipv6_address: ifcico.ipv6.address,
            ifcico_ipv6_error: ifcico.ipv6.error,
            ifcico_mailer_info: ifcico_identity
                .map(|i| i.mailer_info.clone())
                .unwrap_or_default(),
            ifcico_response_type: ifcico_identity
                .map(|i| i.response_type.clone())
                .unwrap_or_default(),
            ifcico_addresses: ifcico_identity.map(|i| i.addresses.clone()).unwrap_or_default(),
            ifcico_ipv4_announced: ifcico_obs
                .map(|o| o.ipv4_announced.clone())
                .unwrap_or_default(),
            ifcico_ipv6_announced: ifcico_obs
                .map(|o| o.ipv6_announced.clone())
                .unwrap_or_default(),

            telnet_tested: telnet.tested,
            telnet_success: telnet.success,
            telnet_response_ms: telnet.response_ms,
            telnet_port: telnet.port,
            telnet_error: telnet.error,
            telnet_ipv4_tested: telnet.ipv4.tested,
            telnet_ipv4_success: telnet.ipv4.success,
            telnet_ipv4_response_ms: telnet.ipv4.response_ms,
            telnet_ipv4_address: telnet.ipv4.address,
            telnet_ipv4_error: telnet.ipv4.error,
            telnet_ipv6_tested: telnet.ipv6.tested,
            telnet_ipv6_success: telnet.ipv6.success,
            telnet_ipv6_response_ms: telnet.ipv6.response_ms,
            telnet_ipv6_address: telnet.ipv6.address,
            telnet_ipv6_error: telnet.ipv6.error,

            ftp_tested: ftp.tested,
            ftp_success: ftp.success,
            ftp_response_ms: ftp.response_ms,
            ftp_port: ftp.port,
            ftp_error: ftp.error,
            ftp_ipv4_tested: ftp.ipv4.tested,
            ftp_ipv4_success: ftp.ipv4.success,
            ftp_ipv4_response_ms: ftp.ipv4.response_ms,
            ftp_ipv4_address: ftp.ipv4.address,
            ftp_ipv4_error: ftp.ipv4.error,
            ftp_ipv6_tested: ftp.ipv6.tested,
            ftp_ipv6_success: ftp.ipv6.success,
            ftp_ipv6_response_ms: ftp.ipv6.response_ms,
            ftp_ipv6_address: ftp.ipv6.address,
            ftp_ipv6_error: ftp.ipv6.error,

            vmodem_tested: vmodem.tested,
            vmodem_success: vmodem.success,
            vmodem_response_ms: vmodem.response_ms,
            vmodem_port: vmodem.port,
            vmodem_error: vmodem.error,
            vmodem_ipv4_tested: vmodem.ipv4.tested,
            vmodem_ipv4_success: vmodem.ipv4.success,
            vmodem_ipv4_response_ms: vmodem.ipv4.response_ms,
            vmodem_ipv4_address: vmodem.ipv4.address,
            vmodem_ipv4_error: vmodem.ipv4.error,
            vmodem_ipv6_tested: vmodem.ipv6.tested,
            vmodem_ipv6_success: vmodem.ipv6.success,
            vmodem_ipv6_response_ms: vmodem.ipv6.response_ms,
            vmodem_ipv6_address: vmodem.ipv6.address,
            vmodem_ipv6_error: vmodem.ipv6.error,

            is_operational: result.is_operational,
            has_connectivity_issues: result.has_connectivity_issues,
            address_validated: result.address_validated,
            address_validated_ipv4: result.address_validated_ipv4,
            address_validated_ipv6: result.address_validated_ipv6,
            ipv4_skipped: result.ipv4_skipped,
            tested_hostname: result.hostname.clone(),
            hostname_index: result.hostname_index,
            is_aggregated: result.is_aggregated,
            total_hostnames: result.total_hostnames,
            hostnames_tested: result.hostnames_tested,
            hostnames_operational: result.hostnames_operational,
        }
    }

    pub fn into_model(self) -> Result<TestResult> {
        let address: NodeAddress = self
            .address
            .parse()
            .map_err(|_| Error::InvalidStoredValue(format!("address {:?}", self.address)))?;

        let mut result = TestResult::new(address, self.hostname.clone(), self.hostname_index);
        result.time = self.test_time;

        result.dns = DnsOutcome {
            ipv4: self
                .resolved_ipv4
                .iter()
                .filter_map(|ip| ip.parse().ok())
                .collect(),
            ipv6: self
                .resolved_ipv6
                .iter()
                .filter_map(|ip| ip.parse().ok())
                .collect(),
            error: column_to_option(self.dns_error),
        };
        result.geo = Geolocation {
            country: self.country,
            country_code: self.country_code,
            city: self.city,
            region: self.region,
            latitude: self.latitude,
            longitude: self.longitude,
            isp: self.isp,
            org: self.org,
            asn: self.asn,
        };

        let mut binkp = ProtocolColumns {
            tested: self.binkp_tested,
            success: self.binkp_success,
            response_ms: self.binkp_response_ms,
            port: self.binkp_port,
            error: self.binkp_error,
            ipv4: FamilyColumns {
                tested: self.binkp_ipv4_tested,
                success: self.binkp_ipv4_success,
                response_ms: self.binkp_ipv4_response_ms,
                address: self.binkp_ipv4_address,
                error: self.binkp_ipv4_error,
            },
            ipv6: FamilyColumns {
                tested: self.binkp_ipv6_tested,
                success: self.binkp_ipv6_success,
                response_ms: self.binkp_ipv6_response_ms,
                address: self.binkp_ipv6_address,
                error: self.binkp_ipv6_error,
            },
        }
        .into_status();
        if let ProtocolStatus::Tested(obs) = &mut binkp {
            obs.ipv4_announced = self.binkp_ipv4_announced;
            obs.ipv6_announced = self.binkp_ipv6_announced;
            let has_identity = !self.binkp_system_name.is_empty()
                || !self.binkp_version.is_empty()
                || !self.binkp_addresses.is_empty();
            if has_identity {
                obs.identity = Some(MailerIdentity {
                    system_name: self.binkp_system_name,
                    sysop: self.binkp_sysop,
                    location: self.binkp_location,
                    version: self.binkp_version,
                    addresses: self.binkp_addresses,
                    capabilities: self.binkp_capabilities,
                    mailer_info: String::new(),
                    response_type: String::new(),
                });
            }
        }

        let mut ifcico = ProtocolColumns {
            tested: self.ifcico_tested,
            success: self.ifcico_success,
            response_ms: self.ifcico_response_ms,
            port: self.ifcico_port,
            error: self.ifcico_error,
            ipv4: FamilyColumns {
                tested: self.ifcico_ipv4_tested,
                success: self.ifcico_ipv4_success,
                response_ms: self.ifcico_ipv4_response_ms,
                address: self.ifcico_ipv4_address,
                error: self.ifcico_ipv4_error,
            },
            ipv6: FamilyColumns {
                tested: self.ifcico_ipv6_tested,
                success: self.ifcico_ipv6_success,
                response_ms: self.ifcico_ipv6_response_ms,
                address: self.ifcico_ipv6_address,
                error: self.ifcico_ipv6_error,
            },
        }
        .into_status();
        if let ProtocolStatus::Tested(obs) = &mut ifcico {
            obs.ipv4_announced = self.ifcico_ipv4_announced;
            obs.ipv6_announced = self.ifcico_ipv6_announced;
            let has_identity = !self.ifcico_mailer_info.is_empty()
                || !self.ifcico_response_type.is_empty()
                || !self.ifcico_addresses.is_empty();
            if has_identity {
                obs.identity = Some(MailerIdentity {
                    system_name: String::new(),
                    sysop: String::new(),
                    location: String::new(),
                    version: String::new(),
                    addresses: self.ifcico_addresses,
                    capabilities: Vec::new(),
                    mailer_info: self.ifcico_mailer_info,
                    response_type: self.ifcico_response_type,
                });
            }
        }

        let telnet = ProtocolColumns {
            tested: self.telnet_tested,
            success: self.telnet_success,
            response_ms: self.telnet_response_ms,
            port: self.telnet_port,
            error: self.telnet_error,
            ipv4: FamilyColumns {
                tested: self.telnet_ipv4_tested,
                success: self.telnet_ipv4_success,
                response_ms: self.telnet_ipv4_response_ms,
                address: self.telnet_ipv4_address,
                error: self.telnet_ipv4_error,
            },
            ipv6: FamilyColumns {
                tested: self.telnet_ipv6_tested,
                success: self.telnet_ipv6_success,
                response_ms: self.telnet_ipv6_response_ms,
                address: self.telnet_ipv6_address,
                error: self.telnet_ipv6_error,
            },
        }
        .into_status();

        let ftp = ProtocolColumns {
            tested: self.ftp_tested,
            success: self.ftp_success,
            response_ms: self.ftp_response_ms,
            port: self.ftp_port,
            error: self.ftp_error,
            ipv4: FamilyColumns {
                tested: self.ftp_ipv4_tested,
                success: self.ftp_ipv4_success,
                response_ms: self.ftp_ipv4_response_ms,
                address: self.ftp_ipv4_address,
                error: self.ftp_ipv4_error,
            },
            ipv6: FamilyColumns {
                tested: self.ftp_ipv6_tested,
                success: self.ftp_ipv6_success,
                response_ms: self.ftp_ipv6_response_ms,
                address: self.ftp_ipv6_address,
                error: self.ftp_ipv6_error,
            },
        }
        .into_status();

        let vmodem = ProtocolColumns {
            tested: self.vmodem_tested,
            success: self.vmodem_success,
            response_ms: self.vmodem_response_ms,
            port: self.vmodem_port,
            error: self.vmodem_error,
            ipv4: FamilyColumns {
                tested: self.vmodem_ipv4_tested,
                success: self.vmodem_ipv4_success,
                response_ms: self.vmodem_ipv4_response_ms,
                address: self.vmodem_ipv4_address,
                error: self.vmodem_ipv4_error,
            },
            ipv6: FamilyColumns {
                tested: self.vmodem_ipv6_tested,
                success: self.vmodem_ipv6_success,
                response_ms: self.vmodem_ipv6_response_ms,
                address: self.vmodem_ipv6_address,
                error: self.vmodem_ipv6_error,
            },
        }
        .into_status();

        for (protocol, status) in [
            (InternetProtocol::Binkp, binkp),
            (InternetProtocol::Ifcico, ifcico),
            (InternetProtocol::Telnet, telnet),
            (InternetProtocol::Ftp, ftp),
            (InternetProtocol::Vmodem, vmodem),
        ] {
            if status.is_tested() {
                let _ = result.protocols.insert(protocol, status);
            }
        }

        result.is_operational = self.is_operational;
        result.has_connectivity_issues = self.has_connectivity_issues;
        result.address_validated = self.address_validated;
        result.address_validated_ipv4 = self.address_validated_ipv4;
        result.address_validated_ipv6 = self.address_validated_ipv6;
        result.ipv4_skipped = self.ipv4_skipped;
        result.is_aggregated = self.is_aggregated;
        result.total_hostnames = self.total_hostnames;
        result.hostnames_tested = self.hostnames_tested;
        result.hostnames_operational = self.hostnames_operational;

        Ok(result)
    }
}

/// Reduced projection used by `current_status`. Field order matches the
/// SELECT in the adapter.
#[derive(Debug, Clone, Row, Serialize, Deserialize)]
pub struct CurrentStatusRow {
    pub zone: u16,
    pub net: u16,
    pub node: u16,
    #[serde(with = "clickhouse::serde::chrono::datetime")]
    pub last_tested: DateTime<Utc>,
    pub is_operational: bool,
    pub binkp_success: bool,
    pub ifcico_success: bool,
    pub telnet_success: bool,
    pub country: String,
    pub isp: String,
}

/// Reduced projection used to rebuild scheduler state.
#[derive(Debug, Clone, Row, Serialize, Deserialize)]
pub struct OutcomeProjectionRow {
    pub zone: u16,
    pub net: u16,
    pub node: u16,
    #[serde(with = "clickhouse::serde::chrono::datetime")]
    pub test_time: DateTime<Utc>,
    pub is_operational: bool,
}
