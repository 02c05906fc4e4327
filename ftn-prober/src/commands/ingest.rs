// Copyright 2025 the ftn-prober contributors.
//
// This software is licensed to you under The General Public License (GPL), version 3. Unless
// required by applicable law or agreed to in writing, software distributed under the GPL Licence
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either
// express or implied. Please review the Licence for the specific language governing permissions
// and limitations.

use crate::{commands, config::AppConfig, exit_code};
use color_eyre::eyre::Result;
use ftn_engine::NodelistIngestor;
use ftn_storage::CatalogStore;
use std::{path::PathBuf, sync::Arc};

pub async fn ingest(config: AppConfig, paths: Vec<PathBuf>) -> Result<i32> {
    let store = commands::connect_store(&config).await?;
    let ingestor = NodelistIngestor::new(Arc::clone(&store) as Arc<dyn CatalogStore>);

    let report = ingestor.ingest_paths(&paths).await?;
    println!(
        "Ingested {} of {} files ({} skipped as already present, {} failed), {} nodes",
        report.files_ingested,
        report.files_seen,
        report.files_skipped,
        report.files_failed,
        report.nodes_ingested
    );

    if report.files_seen > 0 && report.files_ingested + report.files_skipped == 0 {
        return Ok(exit_code::OPERATIONAL_FAILURE);
    }
    Ok(exit_code::SUCCESS)
}
