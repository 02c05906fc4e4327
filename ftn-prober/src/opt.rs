// Copyright 2025 the ftn-prober contributors.
//
// This software is licensed to you under The General Public License (GPL), version 3. Unless
// required by applicable law or agreed to in writing, software distributed under the GPL Licence
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either
// express or implied. Please review the Licence for the specific language governing permissions
// and limitations.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "ftn-prober",
    about = "Fleet-scale connectivity tester for FidoNet-style nodelists",
    version
)]
pub struct Opt {
    /// Path to the TOML config file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Also write logs into daily-rotated files in this directory.
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the continuous testing daemon.
    Run,

    /// Parse nodelist files or directories into the catalog.
    Ingest {
        /// Nodelist files or directories of them.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Test one node immediately and store the result.
    Test {
        /// Node address, e.g. `2:450/1024`.
        address: String,

        /// Test only this hostname instead of everything advertised.
        hostname: Option<String>,

        /// Restrict to these protocol tags (IBN, IFC, ITN, IFT, IVM).
        #[arg(long, value_delimiter = ',')]
        protocols: Vec<String>,
    },

    /// Show the current per-node status over the last week.
    Status {
        #[arg(short = 'n', long, default_value_t = 50)]
        limit: usize,
    },

    /// Show catalog details for one node.
    NodeInfo {
        /// Node address, e.g. `2:450/1024`.
        address: String,
    },

    /// Show recent test history for one node.
    History {
        /// Node address, e.g. `2:450/1024`.
        address: String,

        #[arg(short = 'n', long, default_value_t = 10)]
        limit: usize,
    },
}
