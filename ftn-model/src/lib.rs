// Copyright 2025 the ftn-prober contributors.
//
// This software is licensed to you under The General Public License (GPL), version 3. Unless
// required by applicable law or agreed to in writing, software distributed under the GPL Licence
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either
// express or implied. Please review the Licence for the specific language governing permissions
// and limitations.

//! Shared domain model for the nodelist connectivity tester.
//!
//! Every other crate in the workspace speaks these types: the parsed node
//! catalog (`node`), the per-probe observation model (`result`) and the
//! snapshot metadata that versions a parsed nodelist file.

pub mod error;
pub mod node;
pub mod result;

pub use error::{Error, Result};
pub use node::{
    InternetConfig, InternetEndpoint, InternetProtocol, Node, NodeAddress, NodeRole,
    NodelistFormat, NodelistSnapshot,
};
pub use result::{
    AggregatedTestResult, ConnectivityType, DnsOutcome, FamilyResult, Geolocation,
    HostnameSummary, MailerIdentity, ProtocolObservation, ProtocolStatus, TestResult,
    HOSTNAME_INDEX_AGGREGATED,
};
