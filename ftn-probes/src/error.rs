// Copyright 2025 the ftn-prober contributors.
//
// This software is licensed to you under The General Public License (GPL), version 3. Unless
// required by applicable law or agreed to in writing, software distributed under the GPL Licence
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either
// express or implied. Please review the Licence for the specific language governing permissions
// and limitations.

use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Internal probe failures. These never escape a prober: they are folded
/// into the outcome's error string so a failed handshake stays data.
#[derive(Debug, Error)]
pub enum Error {
    #[error("connect: {0}")]
    Connect(std::io::Error),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection closed by peer")]
    ClosedByPeer,

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),
}
