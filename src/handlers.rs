// src/handlers.rs - Handlers for the inbound command set
use std::sync::Arc;

use async_trait::async_trait;

use crate::control::{OutputGateway, PrinterStatus};
use crate::dispatch::{HandlerError, JobRequest, MessageHandler};
use crate::job::{JobQueue, StatusSink};

pub struct AgentHandler {
    jobs: JobQueue,
    gateway: Arc<OutputGateway>,
    status: Arc<dyn StatusSink>,
}

impl AgentHandler {
    pub fn new(jobs: JobQueue, gateway: Arc<OutputGateway>, status: Arc<dyn StatusSink>) -> Self {
        Self { jobs, gateway, status }
    }
}

#[async_trait]
impl MessageHandler for AgentHandler {
    async fn on_print_job(&self, _topic: &str, job: JobRequest) -> Result<(), HandlerError> {
        self.jobs.enqueue(job).await?;
        Ok(())
    }

    async fn on_invalid_job(&self, _topic: &str, order_id: Option<String>, reason: String) -> Result<(), HandlerError> {
        self.jobs.reject(order_id, reason).await?;
        Ok(())
    }

    async fn on_print_status(&self, _topic: &str) -> Result<(), HandlerError> {
        let probe = self.gateway.probe().detect().await;
        if let Some(error) = &probe.error {
            tracing::error!("Printer connection probe failed: {}", error);
            self.status.report(PrinterStatus::Offline).await;
            return Ok(());
        }
        if !probe.connected {
            self.status.report(PrinterStatus::Offline).await;
            return Ok(());
        }

        match self.gateway.query_status().await {
            Ok(status) => {
                self.status.report(status).await;
                Ok(())
            }
            Err(e) => {
                self.status.report(PrinterStatus::Error).await;
                Err(e.into())
            }
        }
    }

    async fn on_cancel_print(&self, _topic: &str) -> Result<(), HandlerError> {
        // No status report follows a cancel.
        self.gateway.cancel_all().await?;
        Ok(())
    }
}
