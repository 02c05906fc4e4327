// Copyright 2025 the ftn-prober contributors.
//
// This software is licensed to you under The General Public License (GPL), version 3. Unless
// required by applicable law or agreed to in writing, software distributed under the GPL Licence
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either
// express or implied. Please review the Licence for the specific language governing permissions
// and limitations.

//! File-level parser tests: gzip input, snapshot invariants, internet
//! config extraction on realistic rows.

use flate2::{write::GzEncoder, Compression};
use ftn_model::{InternetProtocol, NodelistFormat};
use ftn_nodelist::NodelistParser;
use std::{collections::HashSet, io::Write};

const SAMPLE: &str = "\
;A FidoNet Nodelist for Friday, May 5, 2023 -- Day number 125 : CRC-1F2E\r
;S Distribution nodelist\r
;\r
Zone,2,Europe,Somewhere,Zone_Coordinator,-Unpublished-,300,IBN,INA:zc.example.org\r
Host,450,Net_450,Kyiv,Host_Op,-Unpublished-,300,IBN,ITN\r
,1024,Test_BBS,Kyiv,Some_Sysop,-Unpublished-,300,CM,IBN:bbs.example.com,ITN:bbs.example.com:2323,INO6\r
Hub,200,Area_Hub,Lviv,Hub_Op,-Unpublished-,300,CM,XA,IFC:mailer.example.com\r
Pvt,300,Hidden,Odesa,Quiet_Op,-Unpublished-,300,MO\r
,1024,Dup_BBS,Kyiv,Other_Sysop,-Unpublished-,300,IBN\r
";

fn gzip(content: &str) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(content.as_bytes())
        .expect("gzip write should succeed");
    encoder.finish().expect("gzip finish should succeed")
}

#[test]
fn gzipped_file_parses_like_plain_text() {
    let dir = tempfile::tempdir().expect("tempdir");
    let plain_path = dir.path().join("nodelist.125");
    let gz_path = dir.path().join("nodelist.125.gz");
    std::fs::write(&plain_path, SAMPLE).expect("write plain");
    std::fs::write(&gz_path, gzip(SAMPLE)).expect("write gz");

    let parser = NodelistParser::new();
    let (plain, _) = parser.parse_file(&plain_path).expect("parse plain");
    let (gzipped, _) = parser.parse_file(&gz_path).expect("parse gz");

    assert_eq!(plain.nodes, gzipped.nodes);
    assert_eq!(plain.date, gzipped.date);
    assert_eq!(plain.crc, Some(0x1f2e));
}

#[test]
fn snapshot_identity_tuples_are_unique() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("nodelist.125");
    std::fs::write(&path, SAMPLE).expect("write");

    let (snapshot, stats) = NodelistParser::new().parse_file(&path).expect("parse");

    let mut seen = HashSet::new();
    for node in &snapshot.nodes {
        let key = (
            node.address.zone,
            node.address.net,
            node.address.node,
            node.conflict_sequence,
        );
        assert!(seen.insert(key), "duplicate identity tuple {key:?}");
    }
    assert_eq!(stats.duplicates, 1);
}

#[test]
fn realistic_rows_extract_internet_config() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("nodelist.125");
    std::fs::write(&path, SAMPLE).expect("write");

    let (snapshot, _) = NodelistParser::new().parse_file(&path).expect("parse");
    assert_eq!(snapshot.format, NodelistFormat::F2020);

    let bbs = snapshot
        .nodes
        .iter()
        .find(|n| n.system_name == "Test BBS")
        .expect("bbs row");
    assert_eq!(bbs.address.to_string(), "2:450/1024");
    assert!(bbs.is_cm());
    assert!(bbs.internet.ipv6_disabled());
    assert_eq!(
        bbs.internet.port_for(InternetProtocol::Telnet),
        Some(2323)
    );
    assert_eq!(
        bbs.hostnames(),
        vec!["bbs.example.com".to_string()]
    );

    let zc = snapshot
        .nodes
        .iter()
        .find(|n| n.system_name == "Europe")
        .expect("zone row");
    assert_eq!(zc.internet.default_hostname(), Some("zc.example.org"));
}
