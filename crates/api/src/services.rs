//! Long-running background services: the worker pool and the reservation
//! sweeper. Both stop when the shared [`CancellationToken`] fires.

use std::sync::Arc;
use std::time::Duration;

use goldrush_engine::{Engine, EngineConfig};
use goldrush_provider::GenerationProvider;
use goldrush_worker::WorkerPool;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct BackgroundServices {
    cancel: CancellationToken,
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl BackgroundServices {
    /// Spawn the worker pool and the sweeper over `engine`.
    pub fn start(
        engine: &Engine,
        provider: Arc<dyn GenerationProvider>,
        config: &EngineConfig,
    ) -> Self {
        let cancel = CancellationToken::new();

        let pool = WorkerPool::new(engine, provider, config);
        let pool_cancel = cancel.clone();
        let pool_handle = tokio::spawn(async move { pool.run(pool_cancel).await });

        let sweeper = engine.sweeper(config);
        let sweeper_cancel = cancel.clone();
        let sweeper_handle = tokio::spawn(async move { sweeper.run(sweeper_cancel).await });

        Self {
            cancel,
            handles: vec![("worker pool", pool_handle), ("sweeper", sweeper_handle)],
        }
    }

    /// Signal every service to stop and wait up to `timeout` for each.
    pub async fn shutdown(self, timeout: Duration) {
        self.cancel.cancel();
        for (name, handle) in self.handles {
            match tokio::time::timeout(timeout, handle).await {
                Ok(Ok(())) => tracing::info!(service = name, "Background service stopped"),
                Ok(Err(e)) => tracing::error!(service = name, error = %e, "Background service panicked"),
                Err(_) => tracing::warn!(service = name, "Background service did not stop in time"),
            }
        }
    }
}
