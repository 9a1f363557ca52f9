// src/agent.rs - Wiring and lifecycle of the relay
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::Config;
use crate::control::{CommandRunner, CompletionWaiter, GatewayError, OutputGateway, PrinterStatus, TokioCommandRunner};
use crate::dispatch::{Dispatch, MessageDispatcher, MessageHandler};
use crate::handlers::AgentHandler;
use crate::identity::DeviceIdentity;
use crate::job::{HttpDownloader, HttpManifestSource, JobOrchestrator, JobQueue, ScratchDir, StatusSink};
use crate::report::StatusReporter;
use crate::session::{ConnectionError, ConnectionManager, InboundMessage, MqttTransport};

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),
    #[error("Printer error: {0}")]
    Printer(#[from] GatewayError),
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Feed inbound messages to the dispatcher until the channel closes or
/// `shutdown` resolves. Returns the number of messages dropped as undecodable.
pub async fn serve<H, F>(
    mut inbound: mpsc::Receiver<InboundMessage>,
    dispatcher: MessageDispatcher<H>,
    shutdown: F,
) -> usize
where
    H: MessageHandler,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut dropped = 0;
    loop {
        tokio::select! {
            message = inbound.recv() => match message {
                Some(message) => {
                    if let Dispatch::Dropped(_) = dispatcher.dispatch(&message.topic, &message.payload) {
                        dropped += 1;
                    }
                }
                None => {
                    tracing::info!("Inbound channel closed");
                    break;
                }
            },
            _ = &mut shutdown => {
                tracing::info!("Shutdown requested");
                break;
            }
        }
    }
    dropped
}

/// Start the relay and run until ctrl-c.
pub async fn run(config: Config, identity: DeviceIdentity) -> Result<(), AgentError> {
    let client_id = config.mqtt.client_id_for(&identity.mac_address);
    let topics = vec![
        config.mqtt.print_topic_for(&identity.mac_address),
        config.mqtt.status_topic.clone(),
    ];

    let transport = Arc::new(MqttTransport::new(&config.mqtt, &identity.mac_address));
    let (session, inbound) = ConnectionManager::new(
        transport,
        topics,
        config.reconnect.clone(),
        config.mqtt.connect_timeout(),
        config.mqtt.channel_capacity,
    );
    session.connect().await?;
    tracing::info!(client_id = %client_id, "Printer {} connected to MQTT broker", identity.mac_address);

    let reporter = Arc::new(StatusReporter::new(session.clone(), identity, config.mqtt.report_topic.clone()));
    reporter.report(PrinterStatus::Maintenance).await;

    let runner: Arc<dyn CommandRunner> = Arc::new(TokioCommandRunner::default());
    let gateway = Arc::new(OutputGateway::new(&config.printer, runner));
    let probe = gateway.probe().detect().await;
    match &probe.direct_uri {
        Some(uri) => gateway.register(uri).await?,
        None => tracing::warn!(
            "No directly attached printer found: {}",
            probe.error.as_deref().unwrap_or("unknown reason")
        ),
    }

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.jobs.request_timeout_secs))
        .build()?;
    let status: Arc<dyn StatusSink> = reporter.clone();
    let orchestrator = Arc::new(JobOrchestrator::new(
        Arc::new(HttpManifestSource::new(http.clone(), config.jobs.manifest_url.clone())),
        Arc::new(HttpDownloader::new(http)),
        gateway.clone(),
        status.clone(),
        ScratchDir::new(config.jobs.scratch_dir.clone()),
    ));
    let (jobs, worker) = JobQueue::spawn(orchestrator, config.jobs.queue_capacity);

    let handler = Arc::new(AgentHandler::new(jobs, gateway.clone(), status));
    let dispatcher = MessageDispatcher::new(handler);

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    };
    let dropped = serve(inbound, dispatcher, shutdown).await;
    tracing::info!(dropped, "Relay stopping");

    worker.abort();
    // Let jobs already handed to the printer finish before releasing it.
    let drain = CompletionWaiter::from_config(gateway.clone(), &config.printer);
    if let Err(e) = drain.wait_for_empty().await {
        tracing::warn!("Releasing printer with jobs still queued: {}", e);
    }
    gateway.disconnect().await;
    Ok(())
}
