// src/control/gateway.rs - Printer binding on the local control surface
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use tokio::sync::Mutex;

use super::waiter::ActiveJobs;
use super::{CommandOutput, CommandRunner, ConnectionProbe, GatewayError, PrinterStatus};
use crate::config::PrinterConfig;

static REQUEST_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"request id is (\S+)").expect("request id pattern is valid"));

/// One accepted submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRecord {
    pub job_id: String,
    pub file_path: PathBuf,
    pub submitted_at: DateTime<Utc>,
}

/// The local printer binding.
#[derive(Debug, Clone)]
pub struct OutputDevice {
    pub name: String,
    pub connected: bool,
    /// Last URI the device was registered with.
    pub uri: Option<String>,
    /// Append-only; grows only on successful submission.
    pub history: Vec<JobRecord>,
}

impl OutputDevice {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            connected: false,
            uri: None,
            history: Vec::new(),
        }
    }
}

/// Translates printer intents into control-surface commands and parses the results.
pub struct OutputGateway {
    runner: Arc<dyn CommandRunner>,
    probe: ConnectionProbe,
    driver_profile: String,
    default_priority: u8,
    device: Mutex<OutputDevice>,
}

impl OutputGateway {
    pub fn new(config: &PrinterConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            probe: ConnectionProbe::new(runner.clone()),
            runner,
            driver_profile: config.driver_profile.clone(),
            default_priority: config.priority,
            device: Mutex::new(OutputDevice::new(config.name.clone())),
        }
    }

    pub async fn name(&self) -> String {
        self.device.lock().await.name.clone()
    }

    pub async fn is_registered(&self) -> bool {
        self.device.lock().await.connected
    }

    pub async fn job_history(&self) -> Vec<JobRecord> {
        self.device.lock().await.history.clone()
    }

    pub fn probe(&self) -> &ConnectionProbe {
        &self.probe
    }

    async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, GatewayError> {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        self.runner.run(program, &args).await
    }

    /// Add and enable the printer at `uri`, make it the default, and confirm
    /// it is reported as enabled.
    pub async fn register(&self, uri: &str) -> Result<(), GatewayError> {
        if uri.trim().is_empty() {
            return Err(GatewayError::Registration("connection URI is empty".to_string()));
        }
        let name = self.name().await;
        tracing::info!(printer = %name, uri, "Registering printer");

        let added = self
            .run("lpadmin", &["-p", &name, "-E", "-v", uri, "-P", &self.driver_profile])
            .await?;
        if !added.success {
            return Err(GatewayError::Registration(format!("lpadmin failed: {}", added.stderr.trim())));
        }

        let default = self.run("lpoptions", &["-d", &name]).await?;
        if !default.success {
            tracing::warn!(printer = %name, "Could not set default printer: {}", default.stderr.trim());
        }

        let listing = self.run("lpstat", &["-p"]).await?;
        let enabled = Regex::new(&format!(r"printer\s+{}\s+is\s+\w+", regex::escape(&name)))
            .map_err(|e| GatewayError::Registration(e.to_string()))?;
        if !enabled.is_match(&listing.stdout) {
            tracing::warn!(printer = %name, "Printer not listed as enabled after registration");
            return Err(GatewayError::Registration(format!("printer {} not found after adding it", name)));
        }

        let mut device = self.device.lock().await;
        device.connected = true;
        device.uri = Some(uri.to_string());
        tracing::info!(printer = %name, "Printer added and enabled");
        Ok(())
    }

    /// Re-register when the binding was lost. Failures are logged; the caller
    /// proceeds and lets the actual command decide.
    async fn ensure_registered(&self) {
        let known_uri = {
            let device = self.device.lock().await;
            if device.connected {
                return;
            }
            device.uri.clone()
        };

        let uri = match known_uri {
            Some(uri) => uri,
            None => match self.probe.detect().await.direct_uri {
                Some(uri) => uri,
                None => {
                    tracing::warn!("Printer not registered and no direct connection found");
                    return;
                }
            },
        };

        if let Err(e) = self.register(&uri).await {
            tracing::warn!("Lazy printer registration failed: {}", e);
        }
    }

    pub async fn query_status(&self) -> Result<PrinterStatus, GatewayError> {
        let name = self.name().await;
        let output = self.run("lpstat", &["-p", &name]).await?;
        let status = PrinterStatus::classify(&output.combined());
        match status {
            PrinterStatus::NotFound => tracing::error!(printer = %name, "Printer not found"),
            PrinterStatus::Unknown => {
                tracing::warn!(printer = %name, output = %output.combined().trim(), "Unrecognised printer status")
            }
            _ => tracing::debug!(printer = %name, %status, "Printer status"),
        }
        Ok(status)
    }

    /// Submit a file and return the control surface's request id.
    pub async fn submit(&self, path: &Path, title: &str, priority: Option<u8>) -> Result<String, GatewayError> {
        self.ensure_registered().await;
        let name = self.name().await;
        let priority = priority.unwrap_or(self.default_priority).to_string();
        let file = path.to_string_lossy();

        let output = self
            .run("lp", &["-d", &name, "-t", title, "-q", &priority, &file])
            .await
            .map_err(|e| GatewayError::Submission(e.to_string()))?;
        if !output.success {
            return Err(GatewayError::Submission(format!("lp failed: {}", output.stderr.trim())));
        }

        let job_id = REQUEST_ID
            .captures(&output.stdout)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| {
                GatewayError::Submission(format!("no request id in output: {}", output.stdout.trim()))
            })?;

        let mut device = self.device.lock().await;
        device.history.push(JobRecord {
            job_id: job_id.clone(),
            file_path: path.to_path_buf(),
            submitted_at: Utc::now(),
        });
        tracing::info!(%job_id, file = %file, "Print job submitted");
        Ok(job_id)
    }

    pub async fn cancel_all(&self) -> Result<(), GatewayError> {
        self.ensure_registered().await;
        let name = self.name().await;
        let output = self
            .run("cancel", &["-a", &name])
            .await
            .map_err(|e| GatewayError::Cancel(e.to_string()))?;
        if !output.success {
            return Err(GatewayError::Cancel(output.stderr.trim().to_string()));
        }
        tracing::info!(printer = %name, "All print jobs cancelled");
        Ok(())
    }

    /// Lines describing jobs still queued on the device. A failed query yields
    /// an empty list, indistinguishable from an empty queue.
    pub async fn list_active_jobs(&self) -> Vec<String> {
        self.ensure_registered().await;
        let name = self.name().await;
        match self.run("lpstat", &["-o", &name]).await {
            Ok(output) if output.success => output
                .stdout
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(|line| line.to_string())
                .collect(),
            Ok(output) => {
                tracing::error!("Failed to read print queue: {}", output.stderr.trim());
                Vec::new()
            }
            Err(e) => {
                tracing::error!("Failed to read print queue: {}", e);
                Vec::new()
            }
        }
    }

    /// Release the binding; the next operation re-registers lazily.
    pub async fn disconnect(&self) {
        self.device.lock().await.connected = false;
        tracing::info!("Printer binding released");
    }
}

#[async_trait]
impl ActiveJobs for OutputGateway {
    async fn active_jobs(&self) -> Vec<String> {
        self.list_active_jobs().await
    }
}
