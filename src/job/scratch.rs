// src/job/scratch.rs - Download directory for job artifacts
use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;

use super::JobError;

/// Transient on-disk location for downloaded artifacts. Shared by all jobs.
#[derive(Debug, Clone)]
pub struct ScratchDir {
    root: PathBuf,
}

impl ScratchDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the directory if it is missing.
    pub async fn ensure(&self) -> io::Result<()> {
        fs::create_dir_all(&self.root).await
    }

    /// Destination for an artifact. Only the final path component of
    /// `file_name` is used.
    pub fn path_for(&self, file_name: &str) -> Result<PathBuf, JobError> {
        let name = Path::new(file_name)
            .file_name()
            .ok_or_else(|| JobError::InvalidFileName(file_name.to_string()))?;
        Ok(self.root.join(name))
    }

    /// Remove everything inside the directory, whichever job produced it.
    pub async fn clear(&self) -> io::Result<usize> {
        if !fs::try_exists(&self.root).await? {
            return Ok(0);
        }
        tracing::debug!(dir = %self.root.display(), "Clearing scratch directory");

        let mut entries = fs::read_dir(&self.root).await?;
        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_dir() {
                fs::remove_dir_all(&path).await?;
            } else {
                fs::remove_file(&path).await?;
            }
            removed += 1;
        }
        tracing::info!(dir = %self.root.display(), removed, "Scratch directory cleared");
        Ok(removed)
    }

    pub async fn list(&self) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        if !fs::try_exists(&self.root).await? {
            return Ok(files);
        }
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            files.push(entry.path());
        }
        files.sort();
        Ok(files)
    }
}
