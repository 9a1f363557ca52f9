//! # Relay Configuration
//!
//! This module defines the configuration structs for the broker session, the
//! reconnect policy, the local printer binding, and the job pipeline.
//!
//! ## Example: TOML Configuration
//!
//! ```toml
//! [mqtt]
//! host = "broker.local"
//! port = 1883
//! print_topic = "control/printer-task/{mac}"
//!
//! [reconnect]
//! base_delay_secs = 5
//! max_delay_secs = 60
//!
//! [printer]
//! name = "EPSON_L8050"
//!
//! [jobs]
//! manifest_url = "http://broker.local/app/readImages"
//! scratch_dir = "/var/lib/print-relay/images"
//! ```
//!
//! Every field has a default, so an empty file is a valid configuration.
//! `{mac}` in topic names is replaced by the device hardware address at startup.

// src/config.rs - Single configuration file
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration struct for the relay.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub mqtt: MqttConfig,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    #[serde(default)]
    pub printer: PrinterConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Broker connection and topic layout.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MqttConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Falls back to the device hardware address when unset.
    #[serde(default)]
    pub client_id: Option<String>,
    /// `{mac}` is substituted; an empty value connects without credentials.
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_true")]
    pub clean_session: bool,
    #[serde(default = "default_print_topic")]
    pub print_topic: String,
    #[serde(default = "default_status_topic")]
    pub status_topic: String,
    #[serde(default = "default_report_topic")]
    pub report_topic: String,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            client_id: None,
            username: default_username(),
            password: None,
            keep_alive_secs: default_keep_alive_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            clean_session: true,
            print_topic: default_print_topic(),
            status_topic: default_status_topic(),
            report_topic: default_report_topic(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl MqttConfig {
    /// Topic carrying job commands, with `{mac}` substituted.
    pub fn print_topic_for(&self, mac_address: &str) -> String {
        self.print_topic.replace("{mac}", mac_address)
    }

    pub fn client_id_for(&self, mac_address: &str) -> String {
        self.client_id.clone().unwrap_or_else(|| mac_address.to_string())
    }

    /// Broker username with `{mac}` substituted, or `None` when left empty.
    pub fn username_for(&self, mac_address: &str) -> Option<String> {
        let username = self.username.replace("{mac}", mac_address);
        (!username.trim().is_empty()).then_some(username)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Delay policy applied after an unexpected session drop.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_base_delay_secs")]
    pub base_delay_secs: u64,
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay_secs: default_base_delay_secs(),
            max_delay_secs: default_max_delay_secs(),
            jitter: true,
        }
    }
}

/// Local printer binding on the control surface.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PrinterConfig {
    #[serde(default = "default_printer_name")]
    pub name: String,
    #[serde(default = "default_driver_profile")]
    pub driver_profile: String,
    #[serde(default = "default_priority")]
    pub priority: u8,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_completion_timeout_secs")]
    pub completion_timeout_secs: u64,
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self {
            name: default_printer_name(),
            driver_profile: default_driver_profile(),
            priority: default_priority(),
            poll_interval_ms: default_poll_interval_ms(),
            completion_timeout_secs: default_completion_timeout_secs(),
        }
    }
}

impl PrinterConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn completion_timeout(&self) -> Duration {
        Duration::from_secs(self.completion_timeout_secs)
    }
}

/// Artifact retrieval and the job worker.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JobsConfig {
    #[serde(default = "default_manifest_url")]
    pub manifest_url: String,
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            manifest_url: default_manifest_url(),
            scratch_dir: default_scratch_dir(),
            queue_capacity: default_queue_capacity(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Identity overrides; discovery fills whatever is left unset.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DeviceConfig {
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub mac_address: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level() }
    }
}

impl Config {
    /// Reject values the agent cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mqtt.host.trim().is_empty() {
            return Err(ConfigError::Invalid("mqtt.host must not be empty".to_string()));
        }
        if self.printer.name.trim().is_empty() {
            return Err(ConfigError::Invalid("printer.name must not be empty".to_string()));
        }
        if self.printer.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("printer.poll_interval_ms must be > 0".to_string()));
        }
        if self.reconnect.max_delay_secs < self.reconnect.base_delay_secs {
            return Err(ConfigError::Invalid(format!(
                "reconnect.max_delay_secs ({}) must be >= base_delay_secs ({})",
                self.reconnect.max_delay_secs, self.reconnect.base_delay_secs
            )));
        }
        if self.jobs.queue_capacity == 0 || self.mqtt.channel_capacity == 0 {
            return Err(ConfigError::Invalid("channel capacities must be > 0".to_string()));
        }
        Ok(())
    }
}

// Default value functions
fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 1883 }
fn default_username() -> String { "node-{mac}".to_string() }
fn default_keep_alive_secs() -> u64 { 60 }
fn default_connect_timeout_secs() -> u64 { 10 }
fn default_true() -> bool { true }
fn default_print_topic() -> String { "control/printer-task/{mac}".to_string() }
fn default_status_topic() -> String { "control/status".to_string() }
fn default_report_topic() -> String { "control/reportStatus".to_string() }
fn default_channel_capacity() -> usize { 64 }
fn default_base_delay_secs() -> u64 { 5 }
fn default_max_delay_secs() -> u64 { 60 }
fn default_printer_name() -> String { "EPSON_L8050".to_string() }
fn default_driver_profile() -> String {
    "/opt/epson-inkjet-printer-escpr2/share/cups/model/epson-inkjet-printer-escpr2/Epson-L8050_Series-epson-escpr2-en.ppd".to_string()
}
fn default_priority() -> u8 { 50 }
fn default_poll_interval_ms() -> u64 { 1000 }
fn default_completion_timeout_secs() -> u64 { 300 }
fn default_manifest_url() -> String { "http://127.0.0.1/app/readImages".to_string() }
fn default_scratch_dir() -> PathBuf { PathBuf::from("public/images") }
fn default_queue_capacity() -> usize { 16 }
fn default_request_timeout_secs() -> u64 { 30 }
fn default_log_level() -> String { "info".to_string() }

/// Load configuration from a TOML file at the given path.
pub fn load_config(path: &str) -> Result<Config, ConfigError> {
    let config: Config = match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!("Failed to parse config TOML: {}", e);
                return Err(ConfigError::Toml(e));
            }
        },
        Err(e) => {
            tracing::error!("Failed to read config file '{}': {}", path, e);
            return Err(ConfigError::Io(e));
        }
    };
    config.validate()?;
    Ok(config)
}
