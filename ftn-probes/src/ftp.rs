// Copyright 2025 the ftn-prober contributors.
//
// This software is licensed to you under The General Public License (GPL), version 3. Unless
// required by applicable law or agreed to in writing, software distributed under the GPL Licence
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either
// express or implied. Please review the Licence for the specific language governing permissions
// and limitations.

//! FTP prober: a `220` welcome marks the server reachable; an optional
//! anonymous-login attempt is recorded as a capability, never as a failure.

use crate::{Error, ProbeOutcome, Prober, Result};
use async_trait::async_trait;
use ftn_model::{InternetProtocol, MailerIdentity};
use std::{net::SocketAddr, time::Duration};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::TcpStream,
    time::{timeout_at, Instant},
};

const ANONYMOUS_PASSWORD: &str = "probe@example.net";

#[derive(Debug, Clone)]
pub struct FtpProber {
    /// Attempt `USER anonymous` after the welcome.
    pub try_anonymous_login: bool,
}

impl Default for FtpProber {
    fn default() -> Self {
        Self {
            try_anonymous_login: true,
        }
    }
}

impl FtpProber {
    async fn session(&self, peer: SocketAddr, deadline: Instant) -> Result<MailerIdentity> {
        let stream = timeout_at(deadline, TcpStream::connect(peer))
            .await
            .map_err(|_| Error::Timeout(Duration::ZERO))?
            .map_err(Error::Connect)?;
        let mut stream = BufReader::new(stream);

        let (code, welcome) = read_reply(&mut stream, deadline).await?;
        if code != 220 {
            return Err(Error::Protocol(format!("unexpected welcome: {code} {welcome}")));
        }

        let mut identity = MailerIdentity {
            mailer_info: welcome,
            response_type: "220".to_string(),
            ..Default::default()
        };

        if self.try_anonymous_login {
            if let Ok(true) = self.anonymous_login(&mut stream, deadline).await {
                identity.capabilities.push("anonymous-login".to_string());
            }
        }

        let _ = send_line(&mut stream, "QUIT", deadline).await;
        Ok(identity)
    }

    async fn anonymous_login(
        &self,
        stream: &mut BufReader<TcpStream>,
        deadline: Instant,
    ) -> Result<bool> {
        send_line(stream, "USER anonymous", deadline).await?;
        let (code, _) = read_reply(stream, deadline).await?;
        match code {
            230 => return Ok(true),
            331 => {}
            _ => return Ok(false),
        }

        send_line(stream, &format!("PASS {ANONYMOUS_PASSWORD}"), deadline).await?;
        let (code, _) = read_reply(stream, deadline).await?;
        Ok(code == 230)
    }
}

async fn send_line(
    stream: &mut BufReader<TcpStream>,
    line: &str,
    deadline: Instant,
) -> Result<()> {
    let data = format!("{line}\r\n");
    match timeout_at(deadline, stream.get_mut().write_all(data.as_bytes())).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(err.into()),
        Err(_) => Err(Error::Timeout(Duration::ZERO)),
    }
}

/// Read one (possibly multi-line) FTP reply, returning the code and the
/// text of its final line.
async fn read_reply(
    stream: &mut BufReader<TcpStream>,
    deadline: Instant,
) -> Result<(u16, String)> {
    loop {
        let mut line = String::new();
        let read = match timeout_at(deadline, stream.read_line(&mut line)).await {
            Ok(Ok(read)) => read,
            Ok(Err(err)) => return Err(err.into()),
            Err(_) => return Err(Error::Timeout(Duration::ZERO)),
        };
        if read == 0 {
            return Err(Error::ClosedByPeer);
        }

        let line = line.trim_end();
        let bytes = line.as_bytes();
        if bytes.len() < 4 {
            continue;
        }
        // `NNN-text` lines continue a multi-line reply.
        if bytes[3] == b'-' {
            continue;
        }
        let code = line
            .get(..3)
            .and_then(|code_text| code_text.parse::<u16>().ok());
        if let Some(code) = code {
            let text = line.get(4..).unwrap_or_default().trim().to_string();
            return Ok((code, text));
        }
    }
}

#[async_trait]
impl Prober for FtpProber {
    fn protocol(&self) -> InternetProtocol {
        InternetProtocol::Ftp
    }

    async fn probe(&self, peer: SocketAddr, timeout: Duration) -> ProbeOutcome {
        let started = Instant::now();
        let deadline = started + timeout;

        match self.session(peer, deadline).await {
            Ok(identity) => {
                let elapsed_ms = started.elapsed().as_millis() as u32;
                debug!("FTP welcome from {peer} in {elapsed_ms}ms: {:?}", identity.mailer_info);
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
                trace!("FTP probe of {peer} failed: {error}");
                ProbeOutcome::failure(started.elapsed().as_millis() as u32, error)
            }
        }
    }
}
