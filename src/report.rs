//! Device status reports published to the report topic.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::control::PrinterStatus;
use crate::identity::DeviceIdentity;
use crate::job::StatusSink;
use crate::session::{ConnectionManager, Transport};

fn iso_millis<S: Serializer>(timestamp: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&timestamp.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// One status report; built fresh for every publication.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatusReport {
    pub ip_address: String,
    pub mac_address: String,
    pub printer_status: PrinterStatus,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    #[serde(serialize_with = "iso_millis")]
    pub timestamp: DateTime<Utc>,
}

impl DeviceStatusReport {
    pub fn new(identity: &DeviceIdentity, printer_status: PrinterStatus, extra: Map<String, Value>) -> Self {
        Self {
            ip_address: identity.ip_address.clone(),
            mac_address: identity.mac_address.clone(),
            printer_status,
            extra,
            timestamp: Utc::now(),
        }
    }
}

pub struct StatusReporter<T: Transport> {
    session: Arc<ConnectionManager<T>>,
    identity: DeviceIdentity,
    topic: String,
}

impl<T: Transport> StatusReporter<T> {
    pub fn new(session: Arc<ConnectionManager<T>>, identity: DeviceIdentity, topic: impl Into<String>) -> Self {
        Self { session, identity, topic: topic.into() }
    }

    /// Publish a report. Never fails: a missing session triggers a background
    /// connect and the publish is attempted anyway; errors are logged.
    pub async fn report_with(&self, status: PrinterStatus, extra: Map<String, Value>) {
        if !self.session.is_connected().await {
            let session = self.session.clone();
            tokio::spawn(async move {
                let _ = session.connect().await;
            });
        }

        let report = DeviceStatusReport::new(&self.identity, status, extra);
        let payload = match serde_json::to_vec(&report) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!("Failed to encode status report: {}", e);
                return;
            }
        };

        match self.session.publish(&self.topic, payload).await {
            Ok(()) => tracing::info!(%status, mac = %self.identity.mac_address, "Device status reported"),
            Err(e) => tracing::error!(%status, "Failed to report status: {}", e),
        }
    }
}

#[async_trait]
impl<T: Transport> StatusSink for StatusReporter<T> {
    async fn report(&self, status: PrinterStatus) {
        self.report_with(status, Map::new()).await;
    }
}
