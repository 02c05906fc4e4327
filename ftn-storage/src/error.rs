// Copyright 2025 the ftn-prober contributors.
//
// This software is licensed to you under The General Public License (GPL), version 3. Unless
// required by applicable law or agreed to in writing, software distributed under the GPL Licence
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either
// express or implied. Please review the Licence for the specific language governing permissions
// and limitations.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A ClickHouse operation failed; `op` names what was being attempted
    /// (open/ping/prepare/append/send).
    #[error("Storage error during {op}: {source}")]
    Storage {
        op: &'static str,
        #[source]
        source: clickhouse::error::Error,
    },

    /// The backing store refused the operation; used by test doubles and
    /// surfaced by the scheduler's self-pause logic.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Invalid stored value: {0}")]
    InvalidStoredValue(String),
}

impl Error {
    pub(crate) fn storage(op: &'static str, source: clickhouse::error::Error) -> Self {
        Error::Storage { op, source }
    }
}
