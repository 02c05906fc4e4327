// Copyright 2025 the ftn-prober contributors.
//
// This software is licensed to you under The General Public License (GPL), version 3. Unless
// required by applicable law or agreed to in writing, software distributed under the GPL Licence
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either
// express or implied. Please review the Licence for the specific language governing permissions
// and limitations.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// I/O, open, read or gzip failure. Fatal for the file.
    #[error("File error during {op} on {path:?}: {source}")]
    File {
        path: PathBuf,
        op: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// Decompressed content exceeded the configured bound.
    #[error("Decompressed size of {path:?} exceeds the {limit} byte limit")]
    DecompressedTooLarge { path: PathBuf, limit: u64 },

    /// Every date source (header, filename, mtime) failed.
    #[error("Could not determine a nodelist date for {path:?}")]
    DateUnknown { path: PathBuf },

    #[error(transparent)]
    Model(#[from] ftn_model::Error),
}

impl Error {
    pub(crate) fn file(path: impl Into<PathBuf>, op: &'static str, source: std::io::Error) -> Self {
        Error::File {
            path: path.into(),
            op,
            source,
        }
    }
}
