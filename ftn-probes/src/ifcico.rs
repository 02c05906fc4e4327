// Copyright 2025 the ftn-prober contributors.
//
// This software is licensed to you under The General Public License (GPL), version 3. Unless
// required by applicable law or agreed to in writing, software distributed under the GPL Licence
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either
// express or implied. Please review the Licence for the specific language governing permissions
// and limitations.

//! IFCICO (EMSI) mailer prober.
//!
//! Dials the mailer, provokes a greeting with `EMSI_INQ`, and classifies
//! the response: `EMSI_REQ`, `EMSI_ACK` or a full `EMSI_DAT` packet, whose
//! braced fields carry the announced addresses and mailer identity. YooHoo
//! greetings from pre-EMSI mailers count as reachable too.

use crate::{Error, ProbeOutcome, Prober, Result};
use async_trait::async_trait;
use ftn_model::{InternetProtocol, MailerIdentity};
use std::{net::SocketAddr, time::Duration};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    time::{timeout_at, Instant},
};

/// Sequence that asks an EMSI mailer to identify itself.
const EMSI_INQ: &[u8] = b"**EMSI_INQC816\r";
/// YooHoo bell byte sent by pre-EMSI FTS-0006 mailers.
const YOOHOO_BANNER: u8 = 0xf1;

const MAX_GREETING_BYTES: usize = 16 * 1024;

#[derive(Debug, Clone, Default)]
pub struct IfcicoProber;

impl IfcicoProber {
    async fn greet(&self, peer: SocketAddr, deadline: Instant) -> Result<MailerIdentity> {
        let mut stream = timeout_at(deadline, TcpStream::connect(peer))
            .await
            .map_err(|_| Error::Timeout(Duration::ZERO))?
            .map_err(Error::Connect)?;

        timeout_at(deadline, stream.write_all(EMSI_INQ))
            .await
            .map_err(|_| Error::Timeout(Duration::ZERO))??;

        let mut buffer = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let read = match timeout_at(deadline, stream.read(&mut chunk)).await {
                Ok(Ok(0)) => break,
                Ok(Ok(read)) => read,
                Ok(Err(err)) => return Err(err.into()),
                // Timeout with data already received is fine; classify it.
                Err(_) if !buffer.is_empty() => break,
                Err(_) => return Err(Error::Timeout(Duration::ZERO)),
            };
            buffer.extend_from_slice(&chunk[..read]);

            if buffer.len() >= MAX_GREETING_BYTES || contains_complete_response(&buffer) {
                break;
            }
        }

        classify_greeting(&buffer)
    }
}

fn contains_complete_response(buffer: &[u8]) -> bool {
    let text = String::from_utf8_lossy(buffer);
    if let Some(dat_start) = text.find("**EMSI_DAT") {
        // A data packet is complete once its trailing CRC arrived.
        return emsi_dat_payload(&text[dat_start..]).is_some();
    }
    text.contains("**EMSI_REQ") || text.contains("**EMSI_ACK")
}

/// Classify whatever the mailer sent; an error means nothing recognisable
/// arrived at all.
fn classify_greeting(buffer: &[u8]) -> Result<MailerIdentity> {
    if buffer.is_empty() {
        return Err(Error::ClosedByPeer);
    }

    let text = String::from_utf8_lossy(buffer);

    if let Some(dat_start) = text.find("**EMSI_DAT") {
        if let Some(payload) = emsi_dat_payload(&text[dat_start..]) {
            let mut identity = parse_emsi_dat(payload);
            identity.response_type = "EMSI_DAT".to_string();
            return Ok(identity);
        }
    }

    for marker in ["EMSI_REQ", "EMSI_ACK", "EMSI_NAK", "EMSI_HBT"] {
        if text.contains(&format!("**{marker}")) {
            return Ok(MailerIdentity {
                response_type: marker.to_string(),
                mailer_info: first_printable_line(&text),
                ..Default::default()
            });
        }
    }

    if buffer.contains(&YOOHOO_BANNER) {
        return Ok(MailerIdentity {
            response_type: "YOOHOO".to_string(),
            ..Default::default()
        });
    }

    Err(Error::Protocol("no EMSI greeting in response".to_string()))
}

/// Extract the payload of `**EMSI_DAT<len4><payload><crc8>`; `None` until
/// the whole packet (including CRC) has arrived.
fn emsi_dat_payload(text: &str) -> Option<&str> {
    let after_tag = text.strip_prefix("**EMSI_DAT")?;
    if after_tag.len() < 4 {
        return None;
    }
    let length = usize::from_str_radix(&after_tag[..4], 16).ok()?;
    let rest = &after_tag[4..];
    if rest.len() < length + 8 {
        return None;
    }
    Some(&rest[..length])
}

/// EMSI_DAT payload: `{EMSI}{addresses}{password}{link}{compat}{product
/// code}{mailer name}{version}{serial}...` with `}` escaped as `}}`.
fn parse_emsi_dat(payload: &str) -> MailerIdentity {
    let fields = braced_fields(payload);
    let mut identity = MailerIdentity::default();

    // fields[0] should be the literal EMSI marker.
    if let Some(addresses) = fields.get(1) {
        identity.addresses = addresses
            .split_whitespace()
            .map(|s| s.to_string())
            .collect();
    }
    if let Some(compat) = fields.get(4) {
        identity.capabilities = compat
            .split(',')
            .filter(|c| !c.is_empty())
            .map(|c| c.to_string())
            .collect();
    }
    let mailer_name = fields.get(6).cloned().unwrap_or_default();
    let mailer_version = fields.get(7).cloned().unwrap_or_default();
    if !mailer_name.is_empty() {
        identity.mailer_info = format!("{mailer_name} {mailer_version}").trim().to_string();
        identity.version = mailer_version;
        identity.system_name = mailer_name;
    }

    identity
}

/// Split `{a}{b}{c}` into fields, honouring the `}}`-escape for literal
/// closing braces.
fn braced_fields(payload: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut inside = false;
    let mut chars = payload.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if !inside => {
                inside = true;
                current.clear();
            }
            '}' if inside => {
                if chars.peek() == Some(&'}') {
                    let _ = chars.next();
                    current.push('}');
                } else {
                    inside = false;
                    fields.push(current.clone());
                }
            }
            _ if inside => current.push(c),
            _ => {}
        }
    }

    fields
}

fn first_printable_line(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && line.chars().any(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_default()
        .to_string()
}

#[async_trait]
impl Prober for IfcicoProber {
    fn protocol(&self) -> InternetProtocol {
        InternetProtocol::Ifcico
    }

    async fn probe(&self, peer: SocketAddr, timeout: Duration) -> ProbeOutcome {
        let started = Instant::now();
        let deadline = started + timeout;

        match self.greet(peer, deadline).await {
            Ok(identity) => {
                let elapsed_ms = started.elapsed().as_millis() as u32;
                debug!(
                    "IFCICO greeting from {peer} in {elapsed_ms}ms: {} ({:?})",
                    identity.response_type, identity.mailer_info
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
                trace!("IFCICO greeting from {peer} failed: {error}");
                ProbeOutcome::failure(started.elapsed().as_millis() as u32, error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dat_packet(payload: &str) -> String {
        format!("**EMSI_DAT{:04X}{payload}DEADBEEF", payload.len())
    }

    #[test]
    fn emsi_dat_parses_addresses_and_mailer() {
        let payload = "{EMSI}{2:450/1024@fidonet 2:450/0@fidonet}{}{8N1,PUA}{ZAP,ZMO}{FE}{qico}{0.59.1}{0}";
        let packet = dat_packet(payload);
        let identity = classify_greeting(packet.as_bytes()).expect("classify");

        assert_eq!(identity.response_type, "EMSI_DAT");
        assert_eq!(
            identity.addresses,
            vec!["2:450/1024@fidonet".to_string(), "2:450/0@fidonet".to_string()]
        );
        assert_eq!(identity.system_name, "qico");
        assert_eq!(identity.version, "0.59.1");
        assert_eq!(identity.mailer_info, "qico 0.59.1");
        assert_eq!(identity.capabilities, vec!["ZAP", "ZMO"]);
    }

    #[test]
    fn emsi_req_marker_classifies_without_payload() {
        let identity =
            classify_greeting(b"some banner\r\n**EMSI_REQA77E\r").expect("classify");
        assert_eq!(identity.response_type, "EMSI_REQ");
        assert_eq!(identity.mailer_info, "some banner");
    }

    #[test]
    fn yoohoo_bell_counts_as_reachable() {
        let identity = classify_greeting(&[0xf1, 0x00, 0x10]).expect("classify");
        assert_eq!(identity.response_type, "YOOHOO");
    }

    #[test]
    fn unrecognised_banner_is_a_protocol_error() {
        assert!(classify_greeting(b"SSH-2.0-OpenSSH_9.0\r\n").is_err());
    }

    #[test]
    fn incomplete_dat_packet_is_not_complete() {
        let payload = "{EMSI}{2:450/1024}";
        let packet = format!("**EMSI_DAT{:04X}{payload}", payload.len());
        assert!(!contains_complete_response(packet.as_bytes()));
    }

    #[test]
    fn braced_fields_honour_escaped_braces() {
        let fields = braced_fields("{a}{b}}c}{d}");
        assert_eq!(fields, vec!["a".to_string(), "b}c".to_string(), "d".to_string()]);
    }
}
