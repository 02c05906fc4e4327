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

pub async fn status(config: AppConfig, limit: usize) -> Result<i32> {
    let store = commands::connect_store(&config).await?;
    let mut rows = store.current_status().await?;

    if rows.is_empty() {
        println!("No test results in the last 7 days.");
        return Ok(exit_code::SUCCESS);
    }

    let operational = rows.iter().filter(|r| r.is_operational).count();
    println!(
        "{} nodes tested in the last 7 days, {} operational",
        rows.len(),
        operational
    );
    println!(
        "{:<14} {:<4} {:<19} {:<12} {}",
        "address", "", "last tested", "protocols", "country"
    );

    rows.truncate(limit.max(1));
    for row in &rows {
        commands::output::print_status_row(row);
    }
    Ok(exit_code::SUCCESS)
}
