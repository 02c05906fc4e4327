// Copyright 2025 the ftn-prober contributors.
//
// This software is licensed to you under The General Public License (GPL), version 3. Unless
// required by applicable law or agreed to in writing, software distributed under the GPL Licence
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either
// express or implied. Please review the Licence for the specific language governing permissions
// and limitations.

//! BinkP handshake client.
//!
//! Speaks just enough of the FRL-1026 session setup to read the peer's
//! `M_NUL` identity records and `M_ADR` address list: the session is
//! considered up once the peer sends `M_OK`, or closes cleanly after its
//! `M_ADR`. No mail is ever transferred.

use crate::{Error, ProbeOutcome, Prober, Result};
use async_trait::async_trait;
use ftn_model::{InternetProtocol, MailerIdentity};
use std::{net::SocketAddr, time::Duration};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    time::{timeout_at, Instant},
};

// FRL-1026 command ids.
const M_NUL: u8 = 0;
const M_ADR: u8 = 1;
const M_PWD: u8 = 2;
const M_OK: u8 = 4;
const M_ERR: u8 = 7;
const M_BSY: u8 = 8;

/// Frame length field is 15 bits.
const MAX_FRAME_LEN: usize = 0x7fff;
/// Give up after this many frames without session completion.
const MAX_HANDSHAKE_FRAMES: usize = 64;

/// Identity the prober announces about itself.
const OUR_SYSTEM: &str = "Nodelist probe";
const OUR_MAILER: &str = "ftn-prober/0.1 binkp/1.1";
/// Unlisted test address; peers answer unprotected sessions with M_OK.
const OUR_ADDRESS: &str = "2:9999/9999@fidonet";

#[derive(Debug, Clone, Default)]
pub struct BinkpProber;

impl BinkpProber {
    async fn handshake(&self, peer: SocketAddr, deadline: Instant) -> Result<MailerIdentity> {
        let mut stream = timeout_at(deadline, TcpStream::connect(peer))
            .await
            .map_err(|_| Error::Timeout(Duration::ZERO))?
            .map_err(Error::Connect)?;

        send_frame(&mut stream, M_NUL, format!("SYS {OUR_SYSTEM}").as_bytes(), deadline).await?;
        send_frame(&mut stream, M_NUL, format!("VER {OUR_MAILER}").as_bytes(), deadline).await?;
        send_frame(&mut stream, M_ADR, OUR_ADDRESS.as_bytes(), deadline).await?;
        send_frame(&mut stream, M_PWD, b"-", deadline).await?;

        let mut identity = MailerIdentity::default();
        let mut got_adr = false;

        for _ in 0..MAX_HANDSHAKE_FRAMES {
            let frame = match read_frame(&mut stream, deadline).await {
                Ok(frame) => frame,
                Err(Error::ClosedByPeer) if got_adr => {
                    // Clean close after M_ADR still counts as reachable.
                    identity.response_type = "closed-after-adr".to_string();
                    return Ok(identity);
                }
                Err(err) => return Err(err),
            };

            let Frame::Command(command, args) = frame else {
                // Data frames during session setup are noise; skip them.
                continue;
            };

            match command {
                M_NUL => apply_nul_record(&mut identity, &args),
                M_ADR => {
                    got_adr = true;
                    identity.addresses =
                        args.split_whitespace().map(|s| s.to_string()).collect();
                }
                M_OK => {
                    identity.response_type = "M_OK".to_string();
                    return Ok(identity);
                }
                M_ERR => return Err(Error::Protocol(format!("M_ERR: {args}"))),
                M_BSY => return Err(Error::Protocol(format!("M_BSY: {args}"))),
                _ => {}
            }
        }

        Err(Error::Protocol(
            "session setup did not complete".to_string(),
        ))
    }
}

/// `M_NUL` records are `KEY value` pairs.
fn apply_nul_record(identity: &mut MailerIdentity, args: &str) {
    let Some((key, value)) = args.split_once(' ') else {
        return;
    };
    let value = value.trim();
    match key {
        "SYS" => identity.system_name = value.to_string(),
        "ZYZ" => identity.sysop = value.to_string(),
        "LOC" => identity.location = value.to_string(),
        "VER" => identity.version = value.to_string(),
        "NDL" => {
            identity.capabilities = value
                .split(',')
                .filter(|c| !c.is_empty())
                .map(|c| c.to_string())
                .collect();
        }
        _ => {}
    }
}

enum Frame {
    Command(u8, String),
    Data,
}

async fn read_frame(stream: &mut TcpStream, deadline: Instant) -> Result<Frame> {
    let mut header = [0u8; 2];
    match timeout_at(deadline, stream.read_exact(&mut header)).await {
        Ok(Ok(_)) => {}
        Ok(Err(err)) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(Error::ClosedByPeer);
        }
        Ok(Err(err)) => return Err(err.into()),
        Err(_) => return Err(Error::Timeout(Duration::ZERO)),
    }

    let word = u16::from_be_bytes(header);
    let is_command = word & 0x8000 != 0;
    let length = (word & 0x7fff) as usize;

    let mut payload = vec![0u8; length];
    match timeout_at(deadline, stream.read_exact(&mut payload)).await {
        Ok(Ok(_)) => {}
        Ok(Err(err)) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(Error::ClosedByPeer);
        }
        Ok(Err(err)) => return Err(err.into()),
        Err(_) => return Err(Error::Timeout(Duration::ZERO)),
    }

    if !is_command {
        return Ok(Frame::Data);
    }
    if payload.is_empty() {
        return Err(Error::Protocol("empty command frame".to_string()));
    }

    let command = payload[0];
    let args = String::from_utf8_lossy(&payload[1..])
        .trim_end_matches('\0')
        .to_string();
    Ok(Frame::Command(command, args))
}

async fn send_frame(
    stream: &mut TcpStream,
    command: u8,
    args: &[u8],
    deadline: Instant,
) -> Result<()> {
    let length = (args.len() + 1).min(MAX_FRAME_LEN) as u16;
    let header = (0x8000u16 | length).to_be_bytes();

    let mut frame = Vec::with_capacity(2 + length as usize);
    frame.extend_from_slice(&header);
    frame.push(command);
    frame.extend_from_slice(&args[..length as usize - 1]);

    match timeout_at(deadline, stream.write_all(&frame)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(err.into()),
        Err(_) => Err(Error::Timeout(Duration::ZERO)),
    }
}

#[async_trait]
impl Prober for BinkpProber {
    fn protocol(&self) -> InternetProtocol {
        InternetProtocol::Binkp
    }

    async fn probe(&self, peer: SocketAddr, timeout: Duration) -> ProbeOutcome {
        let started = Instant::now();
        let deadline = started + timeout;

        match self.handshake(peer, deadline).await {
            Ok(identity) => {
                let elapsed_ms = started.elapsed().as_millis() as u32;
                debug!(
                    "BinkP handshake with {peer} ok in {elapsed_ms}ms: {} ({})",
                    identity.system_name, identity.version
                );
                ProbeOutcome {
                    success: true,
                    elapsed_ms,
                    error: None,
                    identity: Some(identity),
                }
            }
            Err(err) => {
                let error = match err {
                    Error::Timeout(_) => format!("timed out after {timeout:?}"),
                    other => other.to_string(),
                };
                trace!("BinkP handshake with {peer} failed: {error}");
                ProbeOutcome::failure(started.elapsed().as_millis() as u32, error)
            }
        }
    }
}
