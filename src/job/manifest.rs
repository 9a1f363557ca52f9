use async_trait::async_trait;
use serde::Deserialize;

use super::JobError;

/// One image of an order: where to fetch it (relative to the job's URL
/// prefix) and what to call it on disk.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ArtifactDescriptor {
    #[serde(rename = "onLineUrl", alias = "onlineName")]
    pub online_name: String,
    #[serde(rename = "fileName", alias = "targetFileName")]
    pub target_file_name: String,
}

#[derive(Debug, Deserialize)]
struct ManifestResponse {
    #[serde(default)]
    data: Vec<ManifestRecord>,
}

#[derive(Debug, Deserialize)]
struct ManifestRecord {
    #[serde(rename = "imageInfo", default)]
    image_info: Option<Vec<ArtifactDescriptor>>,
}

/// Image list from the first record of a manifest body. A missing record or
/// list is an empty list.
pub fn parse_manifest(body: &[u8]) -> Result<Vec<ArtifactDescriptor>, serde_json::Error> {
    let response: ManifestResponse = serde_json::from_slice(body)?;
    Ok(response
        .data
        .into_iter()
        .next()
        .and_then(|record| record.image_info)
        .unwrap_or_default())
}

#[async_trait]
pub trait ManifestSource: Send + Sync {
    async fn fetch(&self, order_id: &str) -> Result<Vec<ArtifactDescriptor>, JobError>;
}

/// `GET {url}?orderId=...` against the order service.
pub struct HttpManifestSource {
    client: reqwest::Client,
    url: String,
}

impl HttpManifestSource {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self { client, url: url.into() }
    }
}

#[async_trait]
impl ManifestSource for HttpManifestSource {
    async fn fetch(&self, order_id: &str) -> Result<Vec<ArtifactDescriptor>, JobError> {
        let failed = |reason: String| JobError::Manifest { order_id: order_id.to_string(), reason };

        let response = self
            .client
            .get(&self.url)
            .query(&[("orderId", order_id)])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| failed(e.to_string()))?;
        let body = response.bytes().await.map_err(|e| failed(e.to_string()))?;

        let artifacts = parse_manifest(&body).map_err(|e| failed(e.to_string()))?;
        tracing::debug!(order_id, count = artifacts.len(), "Fetched image manifest");
        Ok(artifacts)
    }
}
