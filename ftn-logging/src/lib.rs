// Copyright 2025 the ftn-prober contributors.
//
// This software is licensed to you under The General Public License (GPL), version 3. Unless
// required by applicable law or agreed to in writing, software distributed under the GPL Licence
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either
// express or implied. Please review the Licence for the specific language governing permissions
// and limitations.

//! Logging setup for the prober binaries: an env-filter driven fmt layer
//! to stderr, optionally teeing into a daily-rotated log file.

pub mod error;
pub mod layers;

pub use error::{Error, Result};
pub use layers::{LogBuilder, LogOutputDest};

/// Environment variable controlling the log filter, e.g.
/// `FTN_LOG=debug,hickory_resolver=warn`.
pub const LOG_ENV_VAR: &str = "FTN_LOG";

/// Default directives applied when [`LOG_ENV_VAR`] is unset. Noisy
/// dependencies stay at warn.
pub const DEFAULT_DIRECTIVES: &str =
    "info,hickory_resolver=warn,hickory_proto=warn,reqwest=warn,hyper=warn";
