//! Polls the device queue until it drains.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::{Instant, sleep};

use super::{GatewayError, OutputGateway};
use crate::config::PrinterConfig;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WaitError {
    #[error("Timed out after {elapsed_secs}s waiting for print jobs to complete")]
    Timeout { elapsed_secs: u64 },
}

/// Source of the device's active job list.
#[async_trait]
pub trait ActiveJobs: Send + Sync {
    async fn active_jobs(&self) -> Vec<String>;
}

pub struct CompletionWaiter {
    jobs: Arc<dyn ActiveJobs>,
    poll_interval: Duration,
    timeout: Duration,
}

impl CompletionWaiter {
    pub fn new(jobs: Arc<dyn ActiveJobs>, poll_interval: Duration, timeout: Duration) -> Self {
        Self { jobs, poll_interval, timeout }
    }

    pub fn from_config(jobs: Arc<dyn ActiveJobs>, config: &PrinterConfig) -> Self {
        Self::new(jobs, config.poll_interval(), config.completion_timeout())
    }

    /// Suspends the calling task until the queue is empty or the timeout elapses.
    pub async fn wait_for_empty(&self) -> Result<(), WaitError> {
        let start = Instant::now();
        loop {
            let active = self.jobs.active_jobs().await;
            if active.is_empty() {
                tracing::info!("All print jobs completed");
                return Ok(());
            }

            let elapsed = start.elapsed();
            if elapsed >= self.timeout {
                return Err(WaitError::Timeout { elapsed_secs: elapsed.as_secs() });
            }
            tracing::debug!(remaining = active.len(), "Waiting for print jobs to complete");
            sleep(self.poll_interval).await;
        }
    }

    /// Wait for the queue to drain, then submit a follow-up file such as an
    /// order receipt.
    pub async fn submit_when_drained(
        &self,
        gateway: &OutputGateway,
        path: &Path,
        title: &str,
    ) -> Result<String, GatewayError> {
        self.wait_for_empty().await?;
        let job_id = gateway.submit(path, title, None).await?;
        tracing::info!(%job_id, "Receipt submitted after queue drained");
        Ok(job_id)
    }
}
