// Copyright 2025 the ftn-prober contributors.
//
// This software is licensed to you under The General Public License (GPL), version 3. Unless
// required by applicable law or agreed to in writing, software distributed under the GPL Licence
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either
// express or implied. Please review the Licence for the specific language governing permissions
// and limitations.

//! Line-by-line nodelist parsing with scoping context and duplicate
//! tracking.

use crate::{
    flags::classify_flags,
    header::{self, HeaderInfo},
    reader, Result,
};
use chrono::{Datelike, NaiveDate};
use ftn_model::{
    Node, NodeAddress, NodeRole, NodelistFormat, NodelistSnapshot,
};
use std::{
    collections::HashMap,
    path::Path,
};

/// Header recovery scans at most this many leading comment lines.
const MAX_HEADER_COMMENT_LINES: usize = 20;

/// Zone pre-seeded for year >= 1987 lists that never declare one.
const PRESEED_ZONE: u16 = 2;

/// Counters for one parsed file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
    pub lines_total: usize,
    pub nodes_parsed: usize,
    pub lines_skipped: usize,
    pub duplicates: usize,
}

/// Nodelist file parser. Stateless between files; per-file scoping state
/// lives in the parse pass.
#[derive(Debug, Clone, Default)]
pub struct NodelistParser;

impl NodelistParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse one nodelist file into a snapshot plus counters.
    pub fn parse_file(&self, path: &Path) -> Result<(NodelistSnapshot, ParseStats)> {
        let text = reader::read_nodelist_text(path)?;
        self.parse_text(&text, path)
    }

    /// Parse already-read nodelist text. `path` feeds the date fallback
    /// chain and the snapshot metadata.
    pub fn parse_text(&self, text: &str, path: &Path) -> Result<(NodelistSnapshot, ParseStats)> {
        let mut stats = ParseStats::default();
        let mut header_info = HeaderInfo::default();
        let mut comment_lines_scanned = 0usize;

        // First pass over leading comments only: the date decides the
        // scoping pre-seed, so it must be known before the first node row.
        for line in text.lines() {
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            if !line.starts_with(';') {
                break;
            }
            if comment_lines_scanned >= MAX_HEADER_COMMENT_LINES {
                break;
            }
            comment_lines_scanned += 1;
            if line.starts_with(";A") || line.starts_with(";S") {
                header_info.merge(header::parse_header_line(line));
            }
        }

        let date = header_info
            .date
            .or_else(|| header::date_from_filename(path))
            .or_else(|| {
                debug!("No header or filename date for {path:?}, falling back to mtime");
                header::date_from_mtime(path)
            })
            .ok_or_else(|| crate::Error::DateUnknown {
                path: path.to_path_buf(),
            })?;

        let mut pass = ParsePass::new(date);

        for (line_number, line) in text.lines().enumerate() {
            let line = line.trim_end_matches('\r');
            stats.lines_total += 1;

            if line.is_empty() || line.starts_with(';') {
                continue;
            }

            match pass.parse_node_line(line) {
                Some(node) => {
                    pass.track_duplicate(node, &mut stats);
                    stats.nodes_parsed += 1;
                }
                None => {
                    stats.lines_skipped += 1;
                    warn!(
                        "Skipping malformed nodelist line {} in {path:?}: {line:?}",
                        line_number + 1
                    );
                }
            }
        }

        let snapshot = NodelistSnapshot {
            date,
            day_of_year: header_info
                .day_of_year
                .unwrap_or_else(|| header::day_of_year(date)),
            crc: header_info.crc,
            format: pass.format.unwrap_or(NodelistFormat::F1990),
            source_path: path.to_path_buf(),
            nodes: pass.nodes,
        };

        info!(
            "Parsed {path:?}: {} nodes ({} with internet), format {}, date {}",
            snapshot.nodes.len(),
            snapshot.internet_node_count(),
            snapshot.format,
            snapshot.date
        );

        Ok((snapshot, stats))
    }
}

/// Mutable state for one pass over a file: format, scope and duplicates.
struct ParsePass {
    format: Option<NodelistFormat>,
    current_zone: u16,
    current_net: u16,
    current_region: Option<u16>,
    nodes: Vec<Node>,
    occurrences: HashMap<NodeAddress, Vec<usize>>,
}

impl ParsePass {
    fn new(date: NaiveDate) -> Self {
        // Lists from 1987 on with no explicit Zone row are zone 2 lists.
        let preseed = if date.year() >= 1987 { PRESEED_ZONE } else { 1 };
        Self {
            format: None,
            current_zone: preseed,
            current_net: preseed,
            current_region: None,
            nodes: Vec::new(),
            occurrences: HashMap::new(),
        }
    }

    /// Parse one non-comment line; `None` means malformed (skipped).
    fn parse_node_line(&mut self, line: &str) -> Option<Node> {
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() < 7 {
            return None;
        }

        if self.format.is_none() {
            self.format = Some(detect_format(&fields));
            debug!("Detected nodelist format {}", self.format.unwrap_or(NodelistFormat::F1990));
        }
        let format = self.format.unwrap_or(NodelistFormat::F1990);

        let role: NodeRole = fields[0].parse().ok()?;
        let number: u16 = fields[1].trim().trim_start_matches('-').parse().ok()?;

        let address = match role {
            NodeRole::Zone => {
                self.current_zone = number;
                self.current_net = number;
                self.current_region = None;
                NodeAddress::new(number, number, 0)
            }
            NodeRole::Region => {
                self.current_region = Some(number);
                self.current_net = number;
                NodeAddress::new(self.current_zone, number, 0)
            }
            NodeRole::Host => {
                self.current_net = number;
                NodeAddress::new(self.current_zone, number, 0)
            }
            NodeRole::Node | NodeRole::Hub | NodeRole::Pvt | NodeRole::Hold | NodeRole::Down => {
                NodeAddress::new(self.current_zone, self.current_net, number)
            }
        };

        let mut node = Node {
            address,
            role,
            region: self.current_region,
            system_name: clean_field(fields[2]),
            location: clean_field(fields[3]),
            sysop_name: clean_field(fields[4]),
            phone: fields[5].trim().to_string(),
            max_speed: fields[6].trim().parse().unwrap_or_else(|_| {
                trace!("Non-numeric max speed {:?}, defaulting to 0", fields[6]);
                0
            }),
            ..Default::default()
        };

        let classified = classify_flags(
            fields[7..].iter().map(|t| t.to_string()),
            format,
            &mut node.internet,
        );
        node.flags = classified.raw;
        node.modem_flags = classified.modem;

        Some(node)
    }

    /// Duplicates are preserved; the current and all prior occurrences are
    /// marked conflicting, and the current one records its occurrence index.
    fn track_duplicate(&mut self, mut node: Node, stats: &mut ParseStats) {
        let indices = self.occurrences.entry(node.address).or_default();
        if !indices.is_empty() {
            stats.duplicates += 1;
            node.has_conflict = true;
            node.conflict_sequence = indices.len() as u32;
            for index in indices.iter() {
                self.nodes[*index].has_conflict = true;
            }
        }
        indices.push(self.nodes.len());
        self.nodes.push(node);
    }
}

/// Underscores are the nodelist's space substitute in text fields.
fn clean_field(field: &str) -> String {
    field.trim().replace('_', " ")
}

/// Detect the nodelist format from the first node line's fields, checking
/// marker sets from newest to oldest.
fn detect_format(fields: &[&str]) -> NodelistFormat {
    let flags = &fields[7.min(fields.len())..];
    let has = |predicate: &dyn Fn(&str) -> bool| flags.iter().any(|f| predicate(f.trim()));

    if has(&|f| {
        f == "IBN"
            || f.starts_with("IBN:")
            || f == "ITN"
            || f.starts_with("ITN:")
            || f.starts_with("INA:")
    }) {
        return NodelistFormat::F2020;
    }
    if has(&|f| f == "V34" || f == "V90" || f == "X75") {
        return NodelistFormat::F2000;
    }
    if has(&|f| f == "XA" || f == "CM" || f == "MO") {
        return NodelistFormat::F1990;
    }
    if has(&|f| f == "XP:" || f == "MO:" || f == "CM:") {
        return NodelistFormat::F1986;
    }
    NodelistFormat::F1990
}

#[cfg(test)]
mod tests {
    use super::*;
    use ftn_model::InternetProtocol;

    fn parse(text: &str) -> (NodelistSnapshot, ParseStats) {
        NodelistParser::new()
            .parse_text(text, Path::new("/lists/2023/nodelist.123"))
            .expect("parse should succeed")
    }

    const HEADER: &str = ";A FidoNet Nodelist for Friday, May 5, 2023 -- Day number 125 : CRC-BEEF\r\n";

    #[test]
    fn zone_and_host_rows_update_the_scope() {
        let text = format!(
            "{HEADER}\
             Zone,2,Europe,Somewhere,Coordinator,-Unpublished-,300\r\n\
             Host,450,Net_450,City,Host_Op,-Unpublished-,300\r\n\
             ,1024,Test_BBS,Town,Some_Op,-Unpublished-,300,IBN\r\n"
        );
        let (snapshot, stats) = parse(&text);

        assert_eq!(stats.nodes_parsed, 3);
        assert_eq!(snapshot.nodes[0].address, NodeAddress::new(2, 2, 0));
        assert_eq!(snapshot.nodes[1].address, NodeAddress::new(2, 450, 0));
        assert_eq!(snapshot.nodes[2].address, NodeAddress::new(2, 450, 1024));
        assert_eq!(snapshot.nodes[2].system_name, "Test BBS");
        assert!(snapshot.nodes[2].has_inet());
    }

    #[test]
    fn region_row_sets_region_and_net() {
        let text = format!(
            "{HEADER}\
             Zone,1,NA,Somewhere,Zc,-Unpublished-,300\r\n\
             Region,17,Region_17,City,Rc,-Unpublished-,300\r\n\
             ,5,Node_Five,Town,Op,-Unpublished-,300\r\n"
        );
        let (snapshot, _) = parse(&text);

        assert_eq!(snapshot.nodes[1].address, NodeAddress::new(1, 17, 0));
        assert_eq!(snapshot.nodes[2].address, NodeAddress::new(1, 17, 5));
        assert_eq!(snapshot.nodes[2].region, Some(17));
    }

    #[test]
    fn missing_zone_row_preseeds_zone_two_from_1987_on() {
        let text = format!(
            "{HEADER}\
             ,99,Loner,Town,Op,-Unpublished-,9600,IBN:bbs.example.com\r\n"
        );
        let (snapshot, _) = parse(&text);
        assert_eq!(snapshot.nodes[0].address, NodeAddress::new(2, 2, 99));
    }

    #[test]
    fn legacy_1986_line_detects_format_and_rewrites_flags() {
        let text = ";A Nodelist for Friday, 3 February\r\n\
                    Hub,1,Test_Hub,City,User,123-4567,9600,XP:\r\n";
        let (snapshot, _) = NodelistParser::new()
            .parse_text(text, Path::new("/lists/1986/nodelist.034"))
            .expect("parse");

        assert_eq!(snapshot.format, NodelistFormat::F1986);
        let hub = &snapshot.nodes[0];
        assert_eq!(hub.role, NodeRole::Hub);
        assert_eq!(hub.address.node, 1);
        assert!(hub.flags.contains(&"XA".to_string()));
    }

    #[test]
    fn format_detection_order_prefers_newest_markers() {
        let v2020 = format!("{HEADER},1,S,L,O,P,300,CM,V34,IBN\r\n");
        assert_eq!(parse(&v2020).0.format, NodelistFormat::F2020);

        let v2000 = format!("{HEADER},1,S,L,O,P,300,CM,V34\r\n");
        assert_eq!(parse(&v2000).0.format, NodelistFormat::F2000);

        let v1990 = format!("{HEADER},1,S,L,O,P,300,CM,XA\r\n");
        assert_eq!(parse(&v1990).0.format, NodelistFormat::F1990);

        let default = format!("{HEADER},1,S,L,O,P,300,SOMETHING\r\n");
        assert_eq!(parse(&default).0.format, NodelistFormat::F1990);
    }

    #[test]
    fn duplicate_addresses_are_kept_and_marked() {
        let text = format!(
            "{HEADER}\
             Zone,1,NA,Somewhere,Zc,-Unpublished-,300\r\n\
             Host,5001,Net,City,Op,-Unpublished-,300\r\n\
             ,100,First,Town,Op,-Unpublished-,300\r\n\
             ,101,Other,Town,Op,-Unpublished-,300\r\n\
             ,100,Second,Town,Op,-Unpublished-,300\r\n"
        );
        let (snapshot, stats) = parse(&text);

        assert_eq!(stats.duplicates, 1);
        let first = snapshot
            .nodes
            .iter()
            .find(|n| n.system_name == "First")
            .expect("first occurrence");
        let second = snapshot
            .nodes
            .iter()
            .find(|n| n.system_name == "Second")
            .expect("second occurrence");

        assert!(first.has_conflict);
        assert_eq!(first.conflict_sequence, 0);
        assert!(second.has_conflict);
        assert_eq!(second.conflict_sequence, 1);

        let other = snapshot
            .nodes
            .iter()
            .find(|n| n.system_name == "Other")
            .expect("unrelated node");
        assert!(!other.has_conflict);
    }

    #[test]
    fn malformed_lines_are_skipped_not_fatal() {
        let text = format!(
            "{HEADER}\
             not,enough,fields\r\n\
             ,1024,Ok_System,Town,Op,-Unpublished-,300,IBN\r\n\
             ,badnumber,X,Y,Z,P,300\r\n"
        );
        let (snapshot, stats) = parse(&text);

        assert_eq!(stats.nodes_parsed, 1);
        assert_eq!(stats.lines_skipped, 2);
        assert_eq!(snapshot.nodes[0].system_name, "Ok System");
    }

    #[test]
    fn whitespace_variations_yield_the_same_node() {
        let spaced = format!(
            "{HEADER}, 1024 , Test_BBS , Town , Some_Op , -Unpublished- , 300 , CM , IBN:bbs.example.com \r\n"
        );
        let tight = format!(
            "{HEADER},1024,Test_BBS,Town,Some_Op,-Unpublished-,300,CM,IBN:bbs.example.com\r\n"
        );
        assert_eq!(parse(&spaced).0.nodes, parse(&tight).0.nodes);
    }

    #[test]
    fn leading_dash_on_node_number_is_stripped() {
        let text = format!("{HEADER},-42,S,L,O,P,300,CM\r\n");
        let (snapshot, _) = parse(&text);
        assert_eq!(snapshot.nodes[0].address.node, 42);
    }

    #[test]
    fn header_date_and_crc_flow_into_the_snapshot() {
        let (snapshot, _) = parse(&format!("{HEADER},1,S,L,O,P,300\r\n"));
        assert_eq!(snapshot.date, NaiveDate::from_ymd_opt(2023, 5, 5).expect("date"));
        assert_eq!(snapshot.day_of_year, 125);
        assert_eq!(snapshot.crc, Some(0xbeef));
    }

    #[test]
    fn filename_date_fallback_applies_without_header() {
        let text = ",1,S,L,O,P,300,IBN:host.example.org\r\n";
        let (snapshot, _) = NodelistParser::new()
            .parse_text(text, Path::new("/lists/nodelist_2021_200"))
            .expect("parse");
        assert_eq!(snapshot.date, NaiveDate::from_yo_opt(2021, 200).expect("date"));
        assert_eq!(
            snapshot.nodes[0]
                .internet
                .protocols
                .get(&InternetProtocol::Binkp)
                .and_then(|e| e.first())
                .and_then(|e| e.address.as_deref()),
            Some("host.example.org")
        );
    }

    #[test]
    fn down_and_hold_rows_reuse_current_scope() {
        let text = format!(
            "{HEADER}\
             Zone,2,Eu,Somewhere,Zc,-Unpublished-,300\r\n\
             Hold,7,Held,Town,Op,-Unpublished-,300\r\n\
             Down,8,Gone,Town,Op,-Unpublished-,300\r\n"
        );
        let (snapshot, _) = parse(&text);
        assert_eq!(snapshot.nodes[1].address, NodeAddress::new(2, 2, 7));
        assert_eq!(snapshot.nodes[1].role, NodeRole::Hold);
        assert_eq!(snapshot.nodes[2].address, NodeAddress::new(2, 2, 8));
        assert_eq!(snapshot.nodes[2].role, NodeRole::Down);
    }
}
