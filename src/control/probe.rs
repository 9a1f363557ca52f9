//! Printer connectivity probe based on the device listing (`lpinfo -v`).

use std::sync::Arc;

use super::CommandRunner;

/// Outcome of one connectivity probe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeResult {
    pub connected: bool,
    pub direct_uri: Option<String>,
    pub error: Option<String>,
}

impl ProbeResult {
    fn found(uri: String) -> Self {
        Self { connected: true, direct_uri: Some(uri), error: None }
    }

    fn failed(error: impl Into<String>) -> Self {
        Self { connected: false, direct_uri: None, error: Some(error.into()) }
    }
}

/// Extract the URI of the first directly attached device from `lpinfo -v` output.
pub fn parse_device_list(output: &str) -> Result<String, String> {
    let line = output
        .lines()
        .find(|line| line.starts_with("direct "))
        .ok_or_else(|| "no directly attached printer found".to_string())?;

    let uri = line["direct ".len()..].trim();
    if uri.is_empty() {
        return Err("direct connection URI is empty".to_string());
    }
    Ok(uri.to_string())
}

#[derive(Clone)]
pub struct ConnectionProbe {
    runner: Arc<dyn CommandRunner>,
}

impl ConnectionProbe {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    pub async fn detect(&self) -> ProbeResult {
        let output = match self.runner.run("lpinfo", &["-v".to_string()]).await {
            Ok(output) => output,
            Err(e) => return ProbeResult::failed(e.to_string()),
        };
        if !output.success {
            return ProbeResult::failed(format!("lpinfo exited with {:?}: {}", output.code, output.stderr.trim()));
        }
        if !output.stderr.trim().is_empty() {
            return ProbeResult::failed(output.stderr.trim());
        }
        match parse_device_list(&output.stdout) {
            Ok(uri) => ProbeResult::found(uri),
            Err(e) => ProbeResult::failed(e),
        }
    }
}
