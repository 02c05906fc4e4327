// Copyright 2025 the ftn-prober contributors.
//
// This software is licensed to you under The General Public License (GPL), version 3. Unless
// required by applicable law or agreed to in writing, software distributed under the GPL Licence
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either
// express or implied. Please review the Licence for the specific language governing permissions
// and limitations.

//! Input pipeline: nodelist files in, catalog rows out.

use crate::Result;
use ftn_nodelist::NodelistParser;
use ftn_storage::CatalogStore;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

/// Summary of one ingest pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub files_seen: usize,
    pub files_ingested: usize,
    pub files_skipped: usize,
    pub files_failed: usize,
    pub nodes_ingested: usize,
}

/// Walks nodelist files, parses them and hands snapshots to the catalog.
/// Snapshots whose `(date, crc)` is already present are skipped, so
/// re-running over the same directory is idempotent.
pub struct NodelistIngestor {
    parser: NodelistParser,
    catalog: Arc<dyn CatalogStore>,
}

impl NodelistIngestor {
    pub fn new(catalog: Arc<dyn CatalogStore>) -> Self {
        Self {
            parser: NodelistParser::new(),
            catalog,
        }
    }

    /// Ingest a mix of files and directories. A failing file is counted
    /// and logged; the pass continues.
    pub async fn ingest_paths(&self, paths: &[PathBuf]) -> Result<IngestReport> {
        let mut report = IngestReport::default();

        for path in paths {
            if path.is_dir() {
                let mut entries = collect_files(path);
                entries.sort();
                for file in entries {
                    self.ingest_file(&file, &mut report).await;
                }
            } else {
                self.ingest_file(path, &mut report).await;
            }
        }

        info!(
            "Ingest pass done: {} files seen, {} ingested, {} skipped, {} failed, {} nodes",
            report.files_seen,
            report.files_ingested,
            report.files_skipped,
            report.files_failed,
            report.nodes_ingested
        );
        Ok(report)
    }

    async fn ingest_file(&self, path: &Path, report: &mut IngestReport) {
        report.files_seen += 1;

        let (snapshot, stats) = match self.parser.parse_file(path) {
            Ok(parsed) => parsed,
            Err(err) => {
                report.files_failed += 1;
                warn!("Failed to parse {path:?}: {err}");
                return;
            }
        };

        match self.catalog.has_snapshot(snapshot.date, snapshot.crc).await {
            Ok(true) => {
                debug!(
                    "Snapshot {} (crc {:?}) already ingested, skipping {path:?}",
                    snapshot.date, snapshot.crc
                );
                report.files_skipped += 1;
                return;
            }
            Ok(false) => {}
            Err(err) => {
                report.files_failed += 1;
                warn!("Snapshot lookup for {path:?} failed: {err}");
                return;
            }
        }

        match self.catalog.insert_catalog(&snapshot).await {
            Ok(()) => {
                report.files_ingested += 1;
                report.nodes_ingested += snapshot.nodes.len();
                if stats.lines_skipped > 0 {
                    debug!(
                        "{path:?}: {} malformed lines skipped during parse",
                        stats.lines_skipped
                    );
                }
            }
            Err(err) => {
                report.files_failed += 1;
                warn!("Failed to store snapshot from {path:?}: {err}");
            }
        }
    }
}

fn collect_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let Ok(entries) = std::fs::read_dir(dir) else {
        warn!("Cannot read directory {dir:?}");
        return files;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use ftn_storage::InMemoryStore;

    const SAMPLE: &str = "\
;A FidoNet Nodelist for Friday, May 5, 2023 -- Day number 125 : CRC-BEEF\r
Zone,2,Europe,Somewhere,Zc,-Unpublished-,300,IBN\r
,1024,Test_BBS,Town,Op,-Unpublished-,300,IBN:bbs.example.com\r
";

    #[tokio::test]
    async fn ingests_once_and_skips_on_rerun() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("nodelist.125"), SAMPLE).expect("write");

        let store = Arc::new(InMemoryStore::new(1));
        let ingestor = NodelistIngestor::new(Arc::clone(&store) as Arc<dyn CatalogStore>);

        let first = ingestor
            .ingest_paths(&[dir.path().to_path_buf()])
            .await
            .expect("ingest");
        assert_eq!(first.files_ingested, 1);
        assert_eq!(first.nodes_ingested, 2);

        let second = ingestor
            .ingest_paths(&[dir.path().to_path_buf()])
            .await
            .expect("re-ingest");
        assert_eq!(second.files_ingested, 0);
        assert_eq!(second.files_skipped, 1);
    }

    #[tokio::test]
    async fn unparseable_file_is_counted_not_fatal() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("nodelist.125"), SAMPLE).expect("write");
        std::fs::write(dir.path().join("broken.gz"), [0x1f, 0x8b, 0x00]).expect("write");

        let store = Arc::new(InMemoryStore::new(1));
        let ingestor = NodelistIngestor::new(Arc::clone(&store) as Arc<dyn CatalogStore>);

        let report = ingestor
            .ingest_paths(&[dir.path().to_path_buf()])
            .await
            .expect("ingest");
        assert_eq!(report.files_seen, 2);
        assert_eq!(report.files_ingested, 1);
        assert_eq!(report.files_failed, 1);
    }
}
