use std::fmt;

use serde::{Deserialize, Serialize};

/// Categorical printer state as reported over the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrinterStatus {
    Idle,
    Printing,
    Stopped,
    Disabled,
    Paused,
    Error,
    Maintenance,
    NotFound,
    Offline,
    Unknown,
}

impl PrinterStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrinterStatus::Idle => "idle",
            PrinterStatus::Printing => "printing",
            PrinterStatus::Stopped => "stopped",
            PrinterStatus::Disabled => "disabled",
            PrinterStatus::Paused => "paused",
            PrinterStatus::Error => "error",
            PrinterStatus::Maintenance => "maintenance",
            PrinterStatus::NotFound => "notfound",
            PrinterStatus::Offline => "offline",
            PrinterStatus::Unknown => "unknown",
        }
    }

    /// Map raw status-query output to a status. First match wins.
    pub fn classify(raw: &str) -> PrinterStatus {
        // Order matters: "error" and "maintenance" can co-occur with the others.
        const RULES: &[(&str, PrinterStatus)] = &[
            ("is idle", PrinterStatus::Idle),
            ("now printing", PrinterStatus::Printing),
            ("is stopped", PrinterStatus::Stopped),
            ("disabled", PrinterStatus::Disabled),
            ("paused", PrinterStatus::Paused),
            ("error", PrinterStatus::Error),
            ("maintenance", PrinterStatus::Maintenance),
            ("no such printer", PrinterStatus::NotFound),
            ("invalid destination", PrinterStatus::NotFound),
        ];

        let output = raw.to_lowercase();
        RULES
            .iter()
            .find(|(needle, _)| output.contains(needle))
            .map(|(_, status)| *status)
            .unwrap_or(PrinterStatus::Unknown)
    }
}

impl fmt::Display for PrinterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
