// SPDX-License-Identifier: GPL-3.0-only
use std::future::Future;
use std::pin::Pin;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::SyncError;

type JobFuture = Pin<Box<dyn Future<Output = Result<(), SyncError>> + Send>>;

struct QueuedJob {
    name: String,
    job: JobFuture,
}

/// Detached queue for fire-and-forget remote work such as telemetry.
///
/// Jobs run one at a time on a worker task. Their failures are logged and
/// never reach the code that enqueued them. A full queue drops new jobs.
#[derive(Clone)]
pub struct BackgroundQueue {
    sender: mpsc::Sender<QueuedJob>,
}

impl BackgroundQueue {
    /// Spawn the worker. It exits once every queue handle is dropped.
    pub fn start(capacity: usize) -> (Self, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::channel::<QueuedJob>(capacity.max(1));

        let worker = tokio::spawn(async move {
            info!("Background worker started");
            while let Some(QueuedJob { name, job }) = receiver.recv().await {
                // Run on its own task so a panicking job cannot take the worker down.
                match tokio::spawn(job).await {
                    Ok(Ok(())) => debug!(job = %name, "Background job finished"),
                    Ok(Err(e)) => warn!(job = %name, code = e.code(), error = %e, "Background job failed"),
                    Err(e) => error!(job = %name, error = %e, "Background job panicked"),
                }
            }
            info!("Background worker stopped");
        });

        (Self { sender }, worker)
    }

    /// Queue `job`; returns `false` when it was dropped.
    pub fn enqueue<F>(&self, name: &str, job: F) -> bool
    where
        F: Future<Output = Result<(), SyncError>> + Send + 'static,
    {
        let queued = QueuedJob {
            name: name.to_string(),
            job: Box::pin(job),
        };
        match self.sender.try_send(queued) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(job = %name, "Background queue full, dropping job");
                false
            }
            Err(TrySendError::Closed(_)) => {
                warn!(job = %name, "Background worker stopped, dropping job");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::sync::{oneshot, Notify};

    fn explode() -> Result<(), SyncError> {
        panic!("job exploded")
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_the_worker() {
        let (queue, worker) = BackgroundQueue::start(8);
        let done = Arc::new(AtomicU32::new(0));

        assert!(queue.enqueue("fails", async {
            Err(SyncError::TransientUnavailable("busy".to_string()))
        }));
        assert!(queue.enqueue("panics", async { explode() }));
        let counter = done.clone();
        assert!(queue.enqueue("works", async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));

        drop(queue);
        worker.await.unwrap();
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_full_queue_drops_jobs() {
        let (queue, worker) = BackgroundQueue::start(1);
        let release = Arc::new(Notify::new());
        let (started_tx, started_rx) = oneshot::channel();

        let gate = release.clone();
        assert!(queue.enqueue("blocking", async move {
            let _ = started_tx.send(());
            gate.notified().await;
            Ok(())
        }));
        started_rx.await.unwrap();

        assert!(queue.enqueue("queued", async { Ok(()) }));
        assert!(!queue.enqueue("dropped", async { Ok(()) }));

        release.notify_one();
        drop(queue);
        worker.await.unwrap();
    }
}
