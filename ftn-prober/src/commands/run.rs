// Copyright 2025 the ftn-prober contributors.
//
// This software is licensed to you under The General Public License (GPL), version 3. Unless
// required by applicable law or agreed to in writing, software distributed under the GPL Licence
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either
// express or implied. Please review the Licence for the specific language governing permissions
// and limitations.

//! The continuous testing daemon.

use crate::{commands, config::AppConfig, exit_code};
use color_eyre::eyre::Result;
use ftn_engine::{shutdown_channel, NodelistIngestor, ResultBatcher, Scheduler, WorkerPool};
use ftn_storage::{CatalogStore, ResultStore};
use std::{path::PathBuf, sync::Arc, time::Duration};

pub async fn run(config: AppConfig, config_path: Option<PathBuf>) -> Result<i32> {
    let engine_config = Arc::new(config.engine.clone());
    let store = commands::connect_store(&config).await?;
    let (pipeline, caches) = commands::build_pipeline(&config, Arc::clone(&engine_config))?;
    caches.spawn_periodic_flush();

    let batcher = Arc::new(ResultBatcher::new(
        Arc::clone(&store) as Arc<dyn ResultStore>,
        engine_config.batch_size,
        engine_config.flush_interval,
    ));
    let pool = Arc::new(WorkerPool::new(engine_config.worker_count));

    let scheduler = Arc::new(Scheduler::new(
        Arc::clone(&store) as Arc<dyn CatalogStore>,
        Arc::clone(&store) as Arc<dyn ResultStore>,
        pipeline,
        Arc::clone(&batcher),
        pool,
        Arc::clone(&engine_config),
    ));

    let (shutdown_handle, shutdown) = shutdown_channel();
    let flush_task = batcher.spawn_periodic_flush(shutdown_handle.subscribe());

    if let Some(dir) = config.ingest.dir.clone() {
        let ingestor = NodelistIngestor::new(Arc::clone(&store) as Arc<dyn CatalogStore>);
        let interval = Duration::from_secs(config.ingest.interval_secs.max(60));
        let mut shutdown = shutdown_handle.subscribe();
        tokio::spawn(async move {
            loop {
                if let Err(err) = ingestor.ingest_paths(&[dir.clone()]).await {
                    warn!("Periodic nodelist ingest failed: {err}");
                }
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = shutdown.wait() => break,
                }
            }
        });
    }

    #[cfg(unix)]
    {
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move {
            use tokio::signal::unix::{signal, SignalKind};
            let Ok(mut hangup) = signal(SignalKind::hangup()) else {
                warn!("Cannot install the SIGHUP handler, config reload disabled");
                return;
            };
            while hangup.recv().await.is_some() {
                match AppConfig::load(config_path.as_deref()) {
                    Ok(reloaded) => scheduler.reload_config(reloaded.engine).await,
                    Err(err) => warn!("Config reload failed: {err}"),
                }
            }
        });
    }

    #[cfg(not(unix))]
    let _ = config_path;

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, shutting down");
            shutdown_handle.trigger();
        }
    });

    info!(
        "Daemon starting: {} workers, poll every {:?}",
        engine_config.worker_count, engine_config.poll_interval
    );
    scheduler.run(shutdown).await?;

    // The pool is drained; wait for the batcher's final flush, then close.
    let _ = flush_task.await;
    caches.flush().await;
    store.update_daily_stats(chrono::Utc::now().date_naive()).await?;
    store.close().await?;
    info!("Daemon stopped cleanly");
    Ok(exit_code::SUCCESS)
}
