// src/job/orchestrator.rs - Job message pipeline
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use super::{ArtifactDescriptor, Downloader, JobError, ManifestSource, ScratchDir};
use crate::control::{OutputGateway, PrinterStatus};
use crate::dispatch::JobRequest;

/// Receives status transitions for publication.
#[async_trait]
pub trait StatusSink: Send + Sync {
    async fn report(&self, status: PrinterStatus);
}

/// State of one job invocation. Not persisted.
#[derive(Debug, Clone, Default)]
pub struct PrintJob {
    pub order_id: String,
    pub artifacts: Vec<ArtifactDescriptor>,
    pub downloaded: Vec<PathBuf>,
    pub submissions: Vec<String>,
}

impl PrintJob {
    pub fn new(order_id: impl Into<String>, artifacts: Vec<ArtifactDescriptor>) -> Self {
        Self {
            order_id: order_id.into(),
            artifacts,
            downloaded: Vec::new(),
            submissions: Vec::new(),
        }
    }

    pub fn title(&self) -> String {
        format!("Order-{}", self.order_id)
    }
}

pub struct JobOrchestrator {
    manifest: Arc<dyn ManifestSource>,
    downloader: Arc<dyn Downloader>,
    gateway: Arc<OutputGateway>,
    status: Arc<dyn StatusSink>,
    scratch: ScratchDir,
}

impl JobOrchestrator {
    pub fn new(
        manifest: Arc<dyn ManifestSource>,
        downloader: Arc<dyn Downloader>,
        gateway: Arc<OutputGateway>,
        status: Arc<dyn StatusSink>,
        scratch: ScratchDir,
    ) -> Self {
        Self { manifest, downloader, gateway, status, scratch }
    }

    /// Run one job end to end. Every failure is turned into an `error` status
    /// report here; the returned error is informational.
    pub async fn handle(&self, request: JobRequest) -> Result<PrintJob, JobError> {
        self.status.report(PrinterStatus::Printing).await;

        match self.run(&request).await {
            Ok(job) => {
                self.status.report(PrinterStatus::Idle).await;
                if let Err(e) = self.scratch.clear().await {
                    tracing::warn!("Failed to clear scratch directory: {}", e);
                }
                tracing::info!(
                    order_id = %job.order_id,
                    submitted = job.submissions.len(),
                    "Print job finished"
                );
                Ok(job)
            }
            Err(e) => {
                // Scratch files are kept on failure.
                tracing::error!(order_id = %request.order_id, "Print job failed: {}", e);
                self.status.report(PrinterStatus::Error).await;
                Err(e)
            }
        }
    }

    /// Fail a job message whose fields could not be read. Reports the same
    /// `printing` then `error` sequence as a job that fails in the pipeline.
    pub async fn reject(&self, order_id: Option<&str>, reason: &str) {
        self.status.report(PrinterStatus::Printing).await;
        tracing::error!(order_id = order_id.unwrap_or("unknown"), "Print job rejected: {}", reason);
        self.status.report(PrinterStatus::Error).await;
    }

    async fn run(&self, request: &JobRequest) -> Result<PrintJob, JobError> {
        let artifacts = self.manifest.fetch(&request.order_id).await?;
        if artifacts.is_empty() {
            return Err(JobError::NoArtifacts(request.order_id.clone()));
        }
        self.scratch.ensure().await?;

        let mut job = PrintJob::new(request.order_id.clone(), artifacts);

        for (index, artifact) in job.artifacts.iter().enumerate() {
            let url = format!("{}{}", request.image_url_prev, artifact.online_name);
            let dest = self.scratch.path_for(&artifact.target_file_name)?;
            self.downloader
                .download(&url, &dest)
                .await
                .map_err(|reason| JobError::Download { index, url: url.clone(), reason })?;
            tracing::debug!(index, dest = %dest.display(), "Artifact stored");
            job.downloaded.push(dest);
        }

        let title = job.title();
        for (index, path) in job.downloaded.iter().enumerate() {
            let job_id = self
                .gateway
                .submit(path, &title, None)
                .await
                .map_err(|source| JobError::Submission { index, source })?;
            job.submissions.push(job_id);
        }

        Ok(job)
    }
}
