//! The print-job pipeline: manifest lookup, artifact download, submission,
//! and status reporting at each transition.

pub mod download;
pub mod manifest;
pub mod orchestrator;
pub mod queue;
pub mod scratch;

pub use download::{Downloader, HttpDownloader};
pub use manifest::{ArtifactDescriptor, HttpManifestSource, ManifestSource};
pub use orchestrator::{JobOrchestrator, PrintJob, StatusSink};
pub use queue::JobQueue;
pub use scratch::ScratchDir;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("Manifest request for order {order_id} failed: {reason}")]
    Manifest { order_id: String, reason: String },
    #[error("Order {0} has no images")]
    NoArtifacts(String),
    #[error("Scratch directory error: {0}")]
    Scratch(#[from] std::io::Error),
    #[error("Invalid artifact file name: {0:?}")]
    InvalidFileName(String),
    #[error("Download {index} from {url} failed: {reason}")]
    Download { index: usize, url: String, reason: String },
    #[error("Submission {index} failed: {source}")]
    Submission {
        index: usize,
        source: crate::control::GatewayError,
    },
    #[error("Job queue is closed")]
    QueueClosed,
}
