// Copyright 2025 the ftn-prober contributors.
//
// This software is licensed to you under The General Public License (GPL), version 3. Unless
// required by applicable law or agreed to in writing, software distributed under the GPL Licence
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either
// express or implied. Please review the Licence for the specific language governing permissions
// and limitations.

//! VModem prober: any readable handshake byte within the timeout counts as
//! reachable. The protocol has no identity exchange worth parsing.

use crate::{Error, ProbeOutcome, Prober, Result};
use async_trait::async_trait;
use ftn_model::InternetProtocol;
use std::{net::SocketAddr, time::Duration};
use tokio::{
    io::AsyncReadExt,
    net::TcpStream,
    time::{timeout_at, Instant},
};

#[derive(Debug, Clone, Default)]
pub struct VmodemProber;

impl VmodemProber {
    async fn first_byte(&self, peer: SocketAddr, deadline: Instant) -> Result<()> {
        let mut stream = timeout_at(deadline, TcpStream::connect(peer))
            .await
            .map_err(|_| Error::Timeout(Duration::ZERO))?
            .map_err(Error::Connect)?;

        let mut byte = [0u8; 1];
        match timeout_at(deadline, stream.read(&mut byte)).await {
            Ok(Ok(0)) => Err(Error::ClosedByPeer),
            Ok(Ok(_)) => Ok(()),
            Ok(Err(err)) => Err(err.into()),
            Err(_) => Err(Error::Timeout(Duration::ZERO)),
        }
    }
}

#[async_trait]
impl Prober for VmodemProber {
    fn protocol(&self) -> InternetProtocol {
        InternetProtocol::Vmodem
    }

    async fn probe(&self, peer: SocketAddr, timeout: Duration) -> ProbeOutcome {
        let started = Instant::now();
        let deadline = started + timeout;

        match self.first_byte(peer, deadline).await {
            Ok(()) => {
                let elapsed_ms = started.elapsed().as_millis() as u32;
                debug!("VModem byte from {peer} in {elapsed_ms}ms");
                ProbeOutcome {
                    success: true,
                    elapsed_ms,
                    error: None,
                    identity: None,
                }
            }
            Err(err) => {
                let error = match err {
                    Error::Timeout(_) => format!("timed out after {timeout:?}"),
                    other => other.to_string(),
                };
                trace!("VModem probe of {peer} failed: {error}");
                ProbeOutcome::failure(started.elapsed().as_millis() as u32, error)
            }
        }
    }
}
