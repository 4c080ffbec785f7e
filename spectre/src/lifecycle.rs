//! Owns every long-lived component as a plain field instead of global state
//! (spec.md §9 "Global mutable state -> lifecycle-owned components"), and
//! starts/stops the background tasks the teacher keeps separate from the
//! write path: the idle hour-file closer (`spectre_store::Closer`, unchanged
//! from the teacher's `sk-store::manager` shape) plus a retention task this
//! repo adds for `delete_old_files`/`cleanup_old_state_snapshots`.

use std::sync::Arc;

use spectre_extractors::{default_extractors, Pipeline};
use spectre_graph::GraphClient;
use spectre_store::{Closer, Storage};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::SpectreConfig;
use crate::ingest::{self, SequenceCounters};
use crate::query_engine::QueryEngine;

pub struct Lifecycle {
    pub storage: Arc<Storage>,
    pub graph: Arc<GraphClient>,
    pub query_engine: Arc<QueryEngine>,
    closer: Option<Closer>,
    retention: Option<RetentionTask>,
}

struct RetentionTask {
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl Lifecycle {
    pub async fn start(config: SpectreConfig) -> anyhow::Result<Self> {
        let storage = Arc::new(Storage::new(config.store.clone())?);
        let graph = Arc::new(GraphClient::new(config.graph.clone()));
        let pipeline = Arc::new(Pipeline::new(default_extractors()));
        let sequences = Arc::new(SequenceCounters::new());
        let query_engine = Arc::new(QueryEngine::new(graph.clone(), config.query_timeout()));

        ingest::wire(&storage, graph.clone(), pipeline, sequences).await;

        let closer = Closer::start(storage.clone());
        let retention = RetentionTask::start(storage.clone(), &config);

        Ok(Lifecycle { storage, graph, query_engine, closer: Some(closer), retention: Some(retention) })
    }

    pub async fn shutdown(mut self) {
        if let Some(closer) = self.closer.take() {
            closer.stop().await;
        }
        if let Some(retention) = self.retention.take() {
            retention.stop().await;
        }
        if let Err(e) = self.storage.shutdown().await {
            error!("storage shutdown failed: {e}");
        }
    }
}

impl RetentionTask {
    fn start(storage: Arc<Storage>, config: &SpectreConfig) -> Self {
        let interval = config.retention_check_interval();
        let max_file_age_hours = storage.config().max_file_age_hours;
        let max_snapshot_age_days = storage.config().max_state_snapshot_age_days;
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match storage.delete_old_files(max_file_age_hours).await {
                            Ok(n) if n > 0 => info!("retention removed {n} expired hour files"),
                            Ok(_) => {},
                            Err(e) => error!("retention file sweep failed: {e}"),
                        }
                        if let Err(e) = storage.cleanup_old_state_snapshots(max_snapshot_age_days).await {
                            error!("retention snapshot cleanup failed: {e}");
                        }
                    },
                    _ = &mut shutdown_rx => {
                        info!("retention task shutting down");
                        break;
                    },
                }
            }
        });

        RetentionTask { shutdown_tx, handle }
    }

    async fn stop(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.handle.await;
    }
}
