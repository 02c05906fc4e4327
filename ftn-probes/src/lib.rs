// Copyright 2025 the ftn-prober contributors.
//
// This software is licensed to you under The General Public License (GPL), version 3. Unless
// required by applicable law or agreed to in writing, software distributed under the GPL Licence
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either
// express or implied. Please review the Licence for the specific language governing permissions
// and limitations.

//! Per-protocol handshake probers.
//!
//! Every prober implements the same contract: dial one `(address, port)`
//! peer, attempt the protocol's handshake within a timeout, and report the
//! outcome as data (failures are observations, not errors). Cancellation is
//! cooperative: dropping the probe future closes the socket, so callers
//! cancel by selecting against a shutdown signal.

#[macro_use]
extern crate tracing;

pub mod aka;
pub mod binkp;
pub mod error;
pub mod ftp;
pub mod ifcico;
pub mod telnet;
pub mod vmodem;

pub use aka::announces_address;
pub use binkp::BinkpProber;
pub use error::{Error, Result};
pub use ftp::FtpProber;
pub use ifcico::IfcicoProber;
pub use telnet::TelnetProber;
pub use vmodem::VmodemProber;

use async_trait::async_trait;
use ftn_model::{InternetProtocol, MailerIdentity};
use std::{collections::BTreeMap, net::SocketAddr, sync::Arc, time::Duration};

/// What one dial attempt observed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub success: bool,
    /// Milliseconds from dial start to handshake completion.
    pub elapsed_ms: u32,
    pub error: Option<String>,
    /// Identity details for protocols that announce one.
    pub identity: Option<MailerIdentity>,
}

impl ProbeOutcome {
    pub fn failure(elapsed_ms: u32, error: impl Into<String>) -> Self {
        Self {
            success: false,
            elapsed_ms,
            error: Some(error.into()),
            identity: None,
        }
    }

    /// Announced AKA list, empty for protocols without one.
    pub fn announced_addresses(&self) -> &[String] {
        self.identity
            .as_ref()
            .map(|identity| identity.addresses.as_slice())
            .unwrap_or(&[])
    }
}

/// The shared prober contract.
#[async_trait]
pub trait Prober: Send + Sync {
    fn protocol(&self) -> InternetProtocol;

    /// Dial `peer` and run the handshake, bounded by `timeout`.
    async fn probe(&self, peer: SocketAddr, timeout: Duration) -> ProbeOutcome;
}

/// Build the default prober registry, one prober per probeable protocol.
pub fn default_registry() -> BTreeMap<InternetProtocol, Arc<dyn Prober>> {
    let mut registry: BTreeMap<InternetProtocol, Arc<dyn Prober>> = BTreeMap::new();
    let _ = registry.insert(
        InternetProtocol::Binkp,
        Arc::new(BinkpProber::default()) as Arc<dyn Prober>,
    );
    let _ = registry.insert(
        InternetProtocol::Ifcico,
        Arc::new(IfcicoProber::default()) as Arc<dyn Prober>,
    );
    let _ = registry.insert(
        InternetProtocol::Telnet,
        Arc::new(TelnetProber::default()) as Arc<dyn Prober>,
    );
    let _ = registry.insert(
        InternetProtocol::Ftp,
        Arc::new(FtpProber::default()) as Arc<dyn Prober>,
    );
    let _ = registry.insert(
        InternetProtocol::Vmodem,
        Arc::new(VmodemProber::default()) as Arc<dyn Prober>,
    );
    registry
}
