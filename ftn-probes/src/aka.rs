// Copyright 2025 the ftn-prober contributors.
//
// This software is licensed to you under The General Public License (GPL), version 3. Unless
// required by applicable law or agreed to in writing, software distributed under the GPL Licence
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either
// express or implied. Please review the Licence for the specific language governing permissions
// and limitations.

//! Announced-address validation.

use ftn_model::NodeAddress;

/// Whether an announced AKA list contains the expected `zone:net/node`.
///
/// AKAs arrive with optional domain suffixes (`2:450/1024@fidonet`) and
/// point parts; point zero is the node itself.
pub fn announces_address(expected: NodeAddress, announced: &[String]) -> bool {
    announced
        .iter()
        .filter_map(|aka| parse_aka(aka))
        .any(|(address, point)| address == expected && point == 0)
}

/// Parse one AKA into `(address, point)`; `None` when malformed.
fn parse_aka(aka: &str) -> Option<(NodeAddress, u16)> {
    let aka = aka.trim();
    let without_domain = aka.split('@').next().unwrap_or(aka);

    let (main, point) = match without_domain.rsplit_once('.') {
        Some((main, point_text)) => (main, point_text.parse::<u16>().ok()?),
        None => (without_domain, 0),
    };

    main.parse::<NodeAddress>().ok().map(|addr| (addr, point))
}
