// Copyright 2025 the ftn-prober contributors.
//
// This software is licensed to you under The General Public License (GPL), version 3. Unless
// required by applicable law or agreed to in writing, software distributed under the GPL Licence
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either
// express or implied. Please review the Licence for the specific language governing permissions
// and limitations.

use crate::{commands, config::AppConfig, exit_code};
use color_eyre::eyre::Result;
use ftn_lookup::registrable_domain;
use ftn_storage::CatalogStore;
use std::time::Duration;

/// WHOIS results older than this are refreshed.
const WHOIS_MAX_AGE: Duration = Duration::from_secs(30 * 24 * 60 * 60);

pub async fn node_info(config: AppConfig, address: String) -> Result<i32> {
    let address = match commands::parse_address(&address) {
        Ok(address) => address,
        Err(err) => {
            eprintln!("{err}");
            return Ok(exit_code::MISUSE);
        }
    };

    let store = commands::connect_store(&config).await?;
    let Some(node) = store.node(address).await? else {
        eprintln!("node {address} is not in the latest nodelist");
        return Ok(exit_code::OPERATIONAL_FAILURE);
    };

    commands::output::print_node(&node);

    // Best-effort domain registration facts for the primary hostname.
    if let Some(domain) = node
        .primary_hostname()
        .as_deref()
        .and_then(registrable_domain)
    {
        let whois = commands::build_whois(&config)?;
        match whois.recent(&domain, WHOIS_MAX_AGE).await {
            Ok(info) => {
                if !info.registrar.is_empty() {
                    println!("  Domain {domain}: registrar {}", info.registrar);
                }
                if let Some(expiration) = info.expiration {
                    println!("  Domain {domain} expires {}", expiration.format("%Y-%m-%d"));
                }
            }
            Err(err) => debug!("WHOIS for {domain} failed: {err}"),
        }
        if let Err(err) = whois.flush_cache().await {
            debug!("WHOIS cache flush failed: {err}");
        }
    }

    Ok(exit_code::SUCCESS)
}
