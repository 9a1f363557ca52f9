//! print-relay: bridges an MQTT command channel to a locally attached
//! CUPS printer.
//!
//! Job messages are resolved to image downloads and submitted to the printer;
//! status transitions are published back to the broker.

pub mod agent;
pub mod config;
pub mod control;
pub mod dispatch;
pub mod handlers;
pub mod identity;
pub mod job;
pub mod report;
pub mod session;

pub use config::Config;
pub use control::{OutputGateway, PrinterStatus};
pub use dispatch::{Command, JobRequest, MessageDispatcher, MessageHandler};
pub use identity::DeviceIdentity;
pub use session::{ConnectionManager, SessionState};
