// Copyright 2025 the ftn-prober contributors.
//
// This software is licensed to you under The General Public License (GPL), version 3. Unless
// required by applicable law or agreed to in writing, software distributed under the GPL Licence
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either
// express or implied. Please review the Licence for the specific language governing permissions
// and limitations.

//! Telnet banner prober: reachable iff the BBS sends anything printable
//! within the timeout. IAC negotiation bytes are stripped before the first
//! banner line is captured.

use crate::{Error, ProbeOutcome, Prober, Result};
use async_trait::async_trait;
use ftn_model::{InternetProtocol, MailerIdentity};
use std::{net::SocketAddr, time::Duration};
use tokio::{
    io::AsyncReadExt,
    net::TcpStream,
    time::{timeout_at, Instant},
};

const IAC: u8 = 255;
const SB: u8 = 250;
const SE: u8 = 240;

const MAX_BANNER_BYTES: usize = 4 * 1024;

#[derive(Debug, Clone, Default)]
pub struct TelnetProber;

impl TelnetProber {
    async fn read_banner(&self, peer: SocketAddr, deadline: Instant) -> Result<String> {
        let mut stream = timeout_at(deadline, TcpStream::connect(peer))
            .await
            .map_err(|_| Error::Timeout(Duration::ZERO))?
            .map_err(Error::Connect)?;

        let mut buffer = Vec::new();
        let mut chunk = [0u8; 512];
        loop {
            let read = match timeout_at(deadline, stream.read(&mut chunk)).await {
                Ok(Ok(0)) => break,
                Ok(Ok(read)) => read,
                Ok(Err(err)) => return Err(err.into()),
                Err(_) if !buffer.is_empty() => break,
                Err(_) => return Err(Error::Timeout(Duration::ZERO)),
            };
            buffer.extend_from_slice(&chunk[..read]);

            let printable = strip_iac(&buffer);
            if printable.contains(&b'\n') || buffer.len() >= MAX_BANNER_BYTES {
                break;
            }
        }

        let printable = strip_iac(&buffer);
        if printable.is_empty() {
            return Err(Error::Protocol(
                "only negotiation bytes received".to_string(),
            ));
        }

        let text = String::from_utf8_lossy(&printable);
        Ok(text
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or_default()
            .to_string())
    }
}

/// Remove IAC command and subnegotiation sequences from a telnet stream.
fn strip_iac(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] != IAC {
            out.push(raw[i]);
            i += 1;
            continue;
        }
        // IAC IAC is an escaped 255 data byte.
        if raw.get(i + 1) == Some(&IAC) {
            out.push(IAC);
            i += 2;
            continue;
        }
        if raw.get(i + 1) == Some(&SB) {
            // Skip until IAC SE.
            let mut j = i + 2;
            while j + 1 < raw.len() && !(raw[j] == IAC && raw[j + 1] == SE) {
                j += 1;
            }
            i = (j + 2).min(raw.len());
            continue;
        }
        // IAC <command> <option>
        i = (i + 3).min(raw.len());
    }
    out
}

#[async_trait]
impl Prober for TelnetProber {
    fn protocol(&self) -> InternetProtocol {
        InternetProtocol::Telnet
    }

    async fn probe(&self, peer: SocketAddr, timeout: Duration) -> ProbeOutcome {
        let started = Instant::now();
        let deadline = started + timeout;

        match self.read_banner(peer, deadline).await {
            Ok(banner) => {
                let elapsed_ms = started.elapsed().as_millis() as u32;
                debug!("Telnet banner from {peer} in {elapsed_ms}ms: {banner:?}");
                ProbeOutcome {
                    success: true,
                    elapsed_ms,
                    error: None,
                    identity: Some(MailerIdentity {
                        mailer_info: banner,
                        ..Default::default()
                    }),
                }
            }
            Err(err) => {
                let error = match err {
                    Error::Timeout(_) => format!("timed out after {timeout:?}"),
                    other => other.to_string(),
                };
                trace!("Telnet probe of {peer} failed: {error}");
                ProbeOutcome::failure(started.elapsed().as_millis() as u32, error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(strip_iac(b"Welcome!"), b"Welcome!".to_vec());
    }

    #[test]
    fn negotiation_sequences_are_removed() {
        // IAC WILL ECHO, IAC DO SUPPRESS-GO-AHEAD, then the banner.
        let raw = [255, 251, 1, 255, 253, 3, b'H', b'i'];
        assert_eq!(strip_iac(&raw), b"Hi".to_vec());
    }

    #[test]
    fn subnegotiation_blocks_are_removed() {
        let raw = [255, 250, 24, 1, 2, 3, 255, 240, b'O', b'k'];
        assert_eq!(strip_iac(&raw), b"Ok".to_vec());
    }

    #[test]
    fn escaped_iac_byte_is_preserved() {
        let raw = [b'a', 255, 255, b'b'];
        assert_eq!(strip_iac(&raw), vec![b'a', 255, b'b']);
    }
}
