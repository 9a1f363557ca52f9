//! Decoding of inbound payloads and routing to the message handler.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;

pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("payload is not a JSON object")]
    NotAnObject,
}

/// Inbound job command.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    #[serde(deserialize_with = "string_or_number")]
    pub order_id: String,
    pub image_url_prev: String,
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("expected string or number, got {other}"))),
    }
}

/// Closed set of inbound commands, selected by the `type` discriminator.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    PrintJob(JobRequest),
    /// A `printJob` message whose fields did not decode. Still a job message:
    /// it goes through the job path and ends in an `error` status.
    InvalidJob { order_id: Option<String>, reason: String },
    PrintStatus,
    CancelPrint,
    Unknown { kind: Option<String>, body: Value },
}

impl Command {
    pub fn route(&self) -> &'static str {
        match self {
            Command::PrintJob(_) | Command::InvalidJob { .. } => "printJob",
            Command::PrintStatus => "printStatus",
            Command::CancelPrint => "cancelPrint",
            Command::Unknown { .. } => "default",
        }
    }
}

pub fn decode(payload: &[u8]) -> Result<Command, DecodeError> {
    let body: Value = serde_json::from_slice(payload)?;
    if !body.is_object() {
        return Err(DecodeError::NotAnObject);
    }

    let kind = body.get("type").and_then(Value::as_str).map(str::to_string);
    match kind.as_deref() {
        Some("printJob") => {
            let order_id = body.get("orderId").and_then(|id| match id {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            });
            Ok(serde_json::from_value(body)
                .map(Command::PrintJob)
                .unwrap_or_else(|e| Command::InvalidJob { order_id, reason: e.to_string() }))
        }
        Some("printStatus") => Ok(Command::PrintStatus),
        Some("cancelPrint") => Ok(Command::CancelPrint),
        _ => Ok(Command::Unknown { kind, body }),
    }
}

#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    async fn on_print_job(&self, topic: &str, job: JobRequest) -> Result<(), HandlerError>;

    async fn on_invalid_job(&self, topic: &str, order_id: Option<String>, reason: String) -> Result<(), HandlerError>;

    async fn on_print_status(&self, topic: &str) -> Result<(), HandlerError>;

    async fn on_cancel_print(&self, topic: &str) -> Result<(), HandlerError>;

    /// Messages with no dedicated handler.
    async fn on_unknown(&self, topic: &str, kind: Option<&str>, _body: &Value) -> Result<(), HandlerError> {
        tracing::info!(%topic, "Received message of unregistered type: {}", kind.unwrap_or("unknown"));
        Ok(())
    }
}

/// What the dispatcher did with a payload.
#[derive(Debug)]
pub enum Dispatch {
    Routed(&'static str),
    Dropped(DecodeError),
}

pub struct MessageDispatcher<H: MessageHandler> {
    handler: Arc<H>,
}

impl<H: MessageHandler> Clone for MessageDispatcher<H> {
    fn clone(&self) -> Self {
        Self { handler: self.handler.clone() }
    }
}

impl<H: MessageHandler> MessageDispatcher<H> {
    pub fn new(handler: Arc<H>) -> Self {
        Self { handler }
    }

    /// Decode and hand off to the handler on its own task. Handler completion
    /// is not awaited; handler errors are logged on that task.
    pub fn dispatch(&self, topic: &str, payload: &[u8]) -> Dispatch {
        let command = match decode(payload) {
            Ok(command) => command,
            Err(e) => {
                tracing::error!(%topic, "Failed to decode message: {}", e);
                return Dispatch::Dropped(e);
            }
        };

        let route = command.route();
        let handler = self.handler.clone();
        let topic = topic.to_string();
        let span = tracing::info_span!("message", %topic, route, run = %Uuid::new_v4());

        tokio::spawn(
            async move {
                let result = match command {
                    Command::PrintJob(job) => handler.on_print_job(&topic, job).await,
                    Command::InvalidJob { order_id, reason } => {
                        handler.on_invalid_job(&topic, order_id, reason).await
                    }
                    Command::PrintStatus => handler.on_print_status(&topic).await,
                    Command::CancelPrint => handler.on_cancel_print(&topic).await,
                    Command::Unknown { kind, body } => handler.on_unknown(&topic, kind.as_deref(), &body).await,
                };
                if let Err(e) = result {
                    tracing::error!(route, "Message handler failed: {}", e);
                }
            }
            .instrument(span),
        );
        Dispatch::Routed(route)
    }
}
