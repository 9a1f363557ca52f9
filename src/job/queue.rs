//! Single-worker job queue. Job messages are run one at a time, in arrival
//! order, so concurrent jobs never share the scratch directory or the device.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::Instrument;
use uuid::Uuid;

use super::{JobError, JobOrchestrator};
use crate::dispatch::JobRequest;

enum QueuedJob {
    Run(JobRequest),
    Reject { order_id: Option<String>, reason: String },
}

#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::Sender<QueuedJob>,
}

impl JobQueue {
    /// Start the worker task draining the queue into `orchestrator`.
    pub fn spawn(orchestrator: Arc<JobOrchestrator>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<QueuedJob>(capacity);

        let worker = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                match job {
                    QueuedJob::Run(request) => {
                        let span = tracing::info_span!("job", order_id = %request.order_id, run = %Uuid::new_v4());
                        // handle() reports failures itself
                        let _ = orchestrator.handle(request).instrument(span).await;
                    }
                    QueuedJob::Reject { order_id, reason } => {
                        let span = tracing::info_span!("job", order_id = ?order_id, run = %Uuid::new_v4());
                        orchestrator.reject(order_id.as_deref(), &reason).instrument(span).await;
                    }
                }
            }
            tracing::debug!("Job queue closed, worker exiting");
        });

        (Self { tx }, worker)
    }

    /// Waits for queue space when the queue is full.
    pub async fn enqueue(&self, request: JobRequest) -> Result<(), JobError> {
        tracing::info!(order_id = %request.order_id, "Print job queued");
        self.tx.send(QueuedJob::Run(request)).await.map_err(|_| JobError::QueueClosed)
    }

    /// Queue a job message that could not be read, so its failure is reported
    /// in arrival order with the other jobs.
    pub async fn reject(&self, order_id: Option<String>, reason: String) -> Result<(), JobError> {
        tracing::warn!(order_id = ?order_id, "Malformed print job queued for rejection: {}", reason);
        self.tx
            .send(QueuedJob::Reject { order_id, reason })
            .await
            .map_err(|_| JobError::QueueClosed)
    }
}
