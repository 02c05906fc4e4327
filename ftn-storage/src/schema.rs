// Copyright 2025 the ftn-prober contributors.
//
// This software is licensed to you under The General Public License (GPL), version 3. Unless
// required by applicable law or agreed to in writing, software distributed under the GPL Licence
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either
// express or implied. Please review the Licence for the specific language governing permissions
// and limitations.

//! Ordered DDL to ensure the schema exists. Every statement is idempotent
//! (`IF NOT EXISTS`) so the whole list runs on every startup.

/// The catalog table is a ReplacingMergeTree keyed by the full identity
/// tuple, which makes snapshot ingestion an idempotent upsert.
pub const MIGRATIONS: &[&str] = &[
    r"CREATE TABLE IF NOT EXISTS nodes
(
    nodelist_date      Date,
    day_of_year        UInt16,
    crc                UInt32,
    format             LowCardinality(String),
    zone               UInt16,
    net                UInt16,
    node               UInt16,
    region             UInt16,
    role               LowCardinality(String),
    system_name        String,
    location           String,
    sysop_name         String,
    phone              String,
    max_speed          UInt32,
    flags              Array(String),
    modem_flags        Array(String),
    protocols          Array(String),
    hostnames          Array(String),
    internet_config    String,
    has_inet           Bool,
    has_conflict       Bool,
    conflict_sequence  UInt32
)
ENGINE = ReplacingMergeTree
PARTITION BY toYYYYMM(nodelist_date)
ORDER BY (nodelist_date, zone, net, node, conflict_sequence)
SETTINGS index_granularity = 8192",

    r"CREATE TABLE IF NOT EXISTS node_test_results
(
    test_time                 DateTime('UTC'),
    test_date                 Date,
    zone                      UInt16,
    net                       UInt16,
    node                      UInt16,
    address                   String,
    hostname                  String,
    resolved_ipv4             Array(String),
    resolved_ipv6             Array(String),
    dns_error                 String,
    country                   LowCardinality(String),
    country_code              LowCardinality(String),
    city                      String,
    region                    String,
    latitude                  Float64,
    longitude                 Float64,
    isp                       String,
    org                       String,
    asn                       String,
    binkp_tested              Bool,
    binkp_success             Bool,
    binkp_response_ms         UInt32,
    binkp_port                UInt16,
    binkp_error               String,
    binkp_ipv4_tested         Bool,
    binkp_ipv4_success        Bool,
    binkp_ipv4_response_ms    UInt32,
    binkp_ipv4_address        String,
    binkp_ipv4_error          String,
    binkp_ipv6_tested         Bool,
    binkp_ipv6_success        Bool,
    binkp_ipv6_response_ms    UInt32,
    binkp_ipv6_address        String,
    binkp_ipv6_error          String,
    binkp_system_name         String,
    binkp_sysop               String,
    binkp_location            String,
    binkp_version             String,
    binkp_addresses           Array(String),
    binkp_capabilities        Array(String),
    binkp_ipv4_announced      Array(String),
    binkp_ipv6_announced      Array(String),
    ifcico_tested             Bool,
    ifcico_success            Bool,
    ifcico_response_ms        UInt32,
    ifcico_port               UInt16,
    ifcico_error              String,
    ifcico_ipv4_tested        Bool,
    ifcico_ipv4_success       Bool,
    ifcico_ipv4_response_ms   UInt32,
    ifcico_ipv4_address       String,
    ifcico_ipv4_error         String,
    ifcico_ipv6_tested        Bool,
    ifcico_ipv6_success       Bool,
    ifcico_ipv6_response_ms   UInt32,
    ifcico_ipv6_address       String,
    ifcico_ipv6_error         String,
    ifcico_mailer_info        String,
    ifcico_response_type      LowCardinality(String),
    ifcico_addresses          Array(String),
    ifcico_ipv4_announced     Array(String),
    ifcico_ipv6_announced     Array(String),
    telnet_tested             Bool,
    telnet_success            Bool,
    telnet_response_ms        UInt32,
    telnet_port               UInt16,
    telnet_error              String,
    telnet_ipv4_tested        Bool,
    telnet_ipv4_success       Bool,
    telnet_ipv4_response_ms   UInt32,
    telnet_ipv4_address       String,
    telnet_ipv4_error         String,
    telnet_ipv6_tested        Bool,
    telnet_ipv6_success       Bool,
    telnet_ipv6_response_ms   UInt32,
    telnet_ipv6_address       String,
    telnet_ipv6_error         String,
    ftp_tested                Bool,
    ftp_success               Bool,
    ftp_response_ms           UInt32,
    ftp_port                  UInt16,
    ftp_error                 String,
    ftp_ipv4_tested           Bool,
    ftp_ipv4_success          Bool,
    ftp_ipv4_response_ms      UInt32,
    ftp_ipv4_address          String,
    ftp_ipv4_error            String,
    ftp_ipv6_tested           Bool,
    ftp_ipv6_success          Bool,
    ftp_ipv6_response_ms      UInt32,
    ftp_ipv6_address          String,
    ftp_ipv6_error            String,
    vmodem_tested             Bool,
    vmodem_success            Bool,
    vmodem_response_ms        UInt32,
    vmodem_port               UInt16,
    vmodem_error              String,
    vmodem_ipv4_tested        Bool,
    vmodem_ipv4_success       Bool,
    vmodem_ipv4_response_ms   UInt32,
    vmodem_ipv4_address       String,
    vmodem_ipv4_error         String,
    vmodem_ipv6_tested        Bool,
    vmodem_ipv6_success       Bool,
    vmodem_ipv6_response_ms   UInt32,
    vmodem_ipv6_address       String,
    vmodem_ipv6_error         String,
    is_operational            Bool,
    has_connectivity_issues   Bool,
    address_validated         Bool,
    address_validated_ipv4    Bool,
    address_validated_ipv6    Bool,
    ipv4_skipped              Bool,
    tested_hostname           String,
    hostname_index            Int32,
    is_aggregated             Bool,
    total_hostnames           UInt32,
    hostnames_tested          UInt32,
    hostnames_operational     UInt32
)
ENGINE = MergeTree
PARTITION BY toYYYYMM(test_date)
ORDER BY (test_date, zone, net, node)
SETTINGS index_granularity = 8192",

    r"CREATE TABLE IF NOT EXISTS node_test_daily_stats
(
    date                      Date,
    total_tests               UInt32,
    operational               UInt32,
    with_connectivity_issues  UInt32,
    dns_failures              UInt32,
    countries                 Map(String, UInt32),
    isps                      Map(String, UInt32),
    protocols                 Map(String, UInt32),
    errors                    Map(String, UInt32)
)
ENGINE = ReplacingMergeTree
ORDER BY date
SETTINGS index_granularity = 8192",
];

/// Recompute one day's aggregate row from the raw results. The daily table
/// replaces by date, so re-running is safe.
pub const DAILY_STATS_UPSERT: &str = r"INSERT INTO node_test_daily_stats
SELECT
    test_date AS date,
    toUInt32(count()) AS total_tests,
    toUInt32(countIf(is_operational)) AS operational,
    toUInt32(countIf(has_connectivity_issues)) AS with_connectivity_issues,
    toUInt32(countIf(dns_error != '')) AS dns_failures,
    CAST(sumMap(map(country, toUInt32(1))), 'Map(String, UInt32)') AS countries,
    CAST(sumMap(map(isp, toUInt32(1))), 'Map(String, UInt32)') AS isps,
    CAST(sumMap(mapFromArrays(
        ['IBN', 'IFC', 'ITN', 'IFT', 'IVM'],
        [toUInt32(binkp_success), toUInt32(ifcico_success), toUInt32(telnet_success),
         toUInt32(ftp_success), toUInt32(vmodem_success)]
    )), 'Map(String, UInt32)') AS protocols,
    CAST(sumMap(map(
        multiIf(dns_error != '', 'dns', is_operational, 'none', 'probe'),
        toUInt32(1)
    )), 'Map(String, UInt32)') AS errors
FROM node_test_results
WHERE test_date = ?
GROUP BY test_date";
