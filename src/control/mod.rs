//! Control surface of the local printer: command execution, status parsing,
//! device discovery, and the queue-drain waiter.

pub mod command;
pub mod gateway;
pub mod probe;
pub mod status;
pub mod waiter;

pub use command::{CommandOutput, CommandRunner, TokioCommandRunner};
pub use gateway::{JobRecord, OutputDevice, OutputGateway};
pub use probe::{ConnectionProbe, ProbeResult};
pub use status::PrinterStatus;
pub use waiter::{ActiveJobs, CompletionWaiter, WaitError};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Registration failed: {0}")]
    Registration(String),
    #[error("Submission failed: {0}")]
    Submission(String),
    #[error("Cancel failed: {0}")]
    Cancel(String),
    #[error("Failed to run {program}: {message}")]
    Command { program: String, message: String },
    #[error(transparent)]
    Wait(#[from] WaitError),
}
