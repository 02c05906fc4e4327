// Copyright 2025 the ftn-prober contributors.
//
// This software is licensed to you under The General Public License (GPL), version 3. Unless
// required by applicable law or agreed to in writing, software distributed under the GPL Licence
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either
// express or implied. Please review the Licence for the specific language governing permissions
// and limitations.

//! Nodelist parser.
//!
//! Converts directory text files (optionally gzipped) into typed
//! [`NodelistSnapshot`](ftn_model::NodelistSnapshot)s: format detection,
//! header date and CRC extraction with a filename/mtime fallback chain,
//! scoped line parsing, flag classification and duplicate tracking.
//!
//! A malformed line is logged and skipped; the file still yields a
//! snapshot. Unreadable files and gzip failures abort with a typed error
//! carrying the path and operation.

// The static header regexes are expect-compiled once.
#![allow(clippy::expect_used)]

#[macro_use]
extern crate tracing;

pub mod error;
pub mod flags;
pub mod header;
pub mod parser;
pub mod reader;

pub use error::{Error, Result};
pub use parser::{NodelistParser, ParseStats};

/// Decompressed input is capped here to defeat decompression bombs.
pub const MAX_DECOMPRESSED_SIZE: u64 = 500 * 1024 * 1024;
