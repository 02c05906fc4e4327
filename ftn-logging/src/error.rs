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
    #[error("Could not configure the log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),

    #[error("Could not initialize the global subscriber: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),

    #[error("Could not create the log directory: {0}")]
    Io(#[from] std::io::Error),
}
