// Copyright 2025 the ftn-prober contributors.
//
// This software is licensed to you under The General Public License (GPL), version 3. Unless
// required by applicable law or agreed to in writing, software distributed under the GPL Licence
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either
// express or implied. Please review the Licence for the specific language governing permissions
// and limitations.

use crate::{commands, config::AppConfig, exit_code};
use color_eyre::eyre::Result;
use ftn_storage::ResultStore;

pub async fn history(config: AppConfig, address: String, limit: usize) -> Result<i32> {
    let address = match commands::parse_address(&address) {
        Ok(address) => address,
        Err(err) => {
            eprintln!("{err}");
            return Ok(exit_code::MISUSE);
        }
    };

    let store = commands::connect_store(&config).await?;
    let results = store.node_history(address, limit).await?;
    if results.is_empty() {
        println!("No stored results for {address}.");
        return Ok(exit_code::SUCCESS);
    }

    for result in &results {
        commands::output::print_test_result(result);
        println!();
    }
    Ok(exit_code::SUCCESS)
}
