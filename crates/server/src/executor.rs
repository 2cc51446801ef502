//! Background graph builds on the tokio blocking pool.

use std::sync::Arc;

use multivec_core::index::{BuildExecutor, BuildJob};
use tokio::runtime::Handle;
use tokio::sync::Semaphore;

/// Runs graph builds with `spawn_blocking`, at most `workers` at a time.
///
/// Jobs submitted after [`close`](Self::close) fail immediately, leaving their space
/// degraded until a retry.
#[derive(Debug)]
pub struct TokioBuildExecutor {
    handle: Handle,
    permits: Arc<Semaphore>,
}

impl TokioBuildExecutor {
    /// Must be called from within a tokio runtime.
    pub fn new(workers: usize) -> Self {
        Self {
            handle: Handle::current(),
            permits: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    /// Stop accepting builds. Queued jobs waiting for a permit fail.
    pub fn close(&self) {
        self.permits.close();
    }
}

impl BuildExecutor for TokioBuildExecutor {
    fn submit(&self, job: BuildJob) {
        let permits = Arc::clone(&self.permits);
        self.handle.spawn(async move {
            let permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    job.fail("build executor is shut down");
                    return;
                }
            };
            let segment = job.segment();
            let vector_space = job.vector_space().to_string();
            let result = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                job.run()
            })
            .await;
            if let Err(e) = result {
                tracing::error!(segment, vector_space = %vector_space, error = %e, "build task aborted");
            }
        });
    }
}
