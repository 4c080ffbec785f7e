//! Background task that periodically closes idle hour-files, following the
//! teacher's `tokio::select!`-driven task shape (`sk-store::manager`) rather
//! than folding maintenance into the write path.

use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::{error, info};

use crate::storage::Storage;

pub struct Closer {
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: tokio::task::JoinHandle<()>,
}

impl Closer {
    pub fn start(storage: Arc<Storage>) -> Self {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let interval = storage.config().closer_interval();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = storage.close_idle().await {
                            error!("idle hour-file closer pass failed: {e}");
                        }
                    },
                    _ = &mut shutdown_rx => {
                        info!("hour-file closer shutting down");
                        break;
                    },
                }
            }
        });

        Closer { shutdown_tx: Some(shutdown_tx), handle }
    }

    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let _ = self.handle.await;
    }
}
