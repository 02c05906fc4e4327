// Copyright 2025 the ftn-prober contributors.
//
// This software is licensed to you under The General Public License (GPL), version 3. Unless
// required by applicable law or agreed to in writing, software distributed under the GPL Licence
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either
// express or implied. Please review the Licence for the specific language governing permissions
// and limitations.

#[macro_use]
extern crate tracing;

mod commands;
mod config;
mod exit_code;
mod opt;

use clap::Parser;
use color_eyre::eyre::Result;
use config::AppConfig;
use ftn_logging::{LogBuilder, LogOutputDest};
use opt::{Command, Opt};

#[tokio::main]
async fn main() {
    let code = match run().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            exit_code::OPERATIONAL_FAILURE
        }
    };
    std::process::exit(code);
}

async fn run() -> Result<i32> {
    color_eyre::install()?;
    let opt = Opt::parse();

    let dest = match &opt.log_dir {
        Some(dir) => LogOutputDest::Dir(dir.clone()),
        None => LogOutputDest::Stderr,
    };
    let _log_guard = LogBuilder::new(dest).initialize()?;

    let config = AppConfig::load(opt.config.as_deref())?;

    match opt.command {
        Command::Run => commands::run::run(config, opt.config.clone()).await,
        Command::Ingest { paths } => commands::ingest::ingest(config, paths).await,
        Command::Test {
            address,
            hostname,
            protocols,
        } => commands::test::test(config, address, hostname, protocols).await,
        Command::Status { limit } => commands::status::status(config, limit).await,
        Command::NodeInfo { address } => commands::node_info::node_info(config, address).await,
        Command::History { address, limit } => {
            commands::history::history(config, address, limit).await
        }
    }
}
