use std::path::Path;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Fetches one artifact to a local path. A failed download leaves no file behind.
#[async_trait]
pub trait Downloader: Send + Sync {
    async fn download(&self, url: &str, dest: &Path) -> Result<(), String>;
}

pub struct HttpDownloader {
    client: reqwest::Client,
}

impl HttpDownloader {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn fetch_to(&self, url: &str, dest: &Path) -> Result<u64, String> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| e.to_string())?;

        let mut file = fs::File::create(dest).await.map_err(|e| e.to_string())?;
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await.map_err(|e| e.to_string())? {
            file.write_all(&chunk).await.map_err(|e| e.to_string())?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(|e| e.to_string())?;
        Ok(written)
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn download(&self, url: &str, dest: &Path) -> Result<(), String> {
        match self.fetch_to(url, dest).await {
            Ok(bytes) => {
                tracing::info!(url, dest = %dest.display(), bytes, "Image downloaded");
                Ok(())
            }
            Err(e) => {
                if fs::try_exists(dest).await.unwrap_or(false) {
                    let _ = fs::remove_file(dest).await;
                }
                Err(e)
            }
        }
    }
}
