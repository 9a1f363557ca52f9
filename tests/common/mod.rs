// Shared fakes for integration tests
#![allow(dead_code)]

use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use print_relay::control::{CommandOutput, CommandRunner, GatewayError, PrinterStatus};
use print_relay::job::{ArtifactDescriptor, Downloader, JobError, ManifestSource, StatusSink};
use print_relay::session::{ConnectionError, SessionEvent, Transport};
use tokio::sync::{Notify, Semaphore, mpsc};

pub const PRINTER: &str = "EPSON_L8050";

pub fn ok(stdout: &str) -> CommandOutput {
    CommandOutput { success: true, code: Some(0), stdout: stdout.to_string(), stderr: String::new() }
}

pub fn fail(stderr: &str) -> CommandOutput {
    CommandOutput { success: false, code: Some(1), stdout: String::new(), stderr: stderr.to_string() }
}

type Responder = Box<dyn Fn(&str, &[String]) -> CommandOutput + Send + Sync>;

/// Control surface stand-in; answers by program name and records every call.
pub struct FakeRunner {
    calls: Mutex<Vec<String>>,
    overrides: Mutex<Vec<(String, CommandOutput)>>,
    fallback: Responder,
    next_request: AtomicUsize,
}

impl FakeRunner {
    /// A healthy, idle printer attached over USB.
    pub fn healthy() -> Self {
        Self::with_responder(Box::new(|program, args| match program {
            "lpinfo" => ok("network ipp\ndirect usb://EPSON/L8050%20Series?serial=X1\n"),
            "lpadmin" | "lpoptions" | "cancel" => ok(""),
            "lpstat" if args.first().map(String::as_str) == Some("-o") => ok(""),
            "lpstat" => ok(&format!("printer {PRINTER} is idle.  enabled since Mon 01 Jan\n")),
            _ => fail("unexpected command"),
        }))
    }

    pub fn with_responder(fallback: Responder) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            overrides: Mutex::new(Vec::new()),
            fallback,
            next_request: AtomicUsize::new(1),
        }
    }

    /// Answer commands whose rendered line starts with `prefix` with `output`.
    pub fn respond(&self, prefix: &str, output: CommandOutput) {
        self.overrides.lock().unwrap().push((prefix.to_string(), output));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, program: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.split_whitespace().next() == Some(program))
            .collect()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, GatewayError> {
        let line = std::iter::once(program.to_string())
            .chain(args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ");
        self.calls.lock().unwrap().push(line.clone());

        let matched = self
            .overrides
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(prefix, _)| line.starts_with(prefix.as_str()))
            .map(|(_, output)| output.clone());
        if let Some(output) = matched {
            return Ok(output);
        }
        if program == "lp" {
            let n = self.next_request.fetch_add(1, Ordering::SeqCst);
            return Ok(ok(&format!("request id is {PRINTER}-{n} (1 file(s))\n")));
        }
        Ok((self.fallback)(program, args))
    }
}

#[derive(Default)]
pub struct RecordingSink {
    statuses: Mutex<Vec<PrinterStatus>>,
    changed: Notify,
}

impl RecordingSink {
    pub fn statuses(&self) -> Vec<PrinterStatus> {
        self.statuses.lock().unwrap().clone()
    }

    /// Wait until at least `count` statuses were reported.
    pub async fn wait_for(&self, count: usize) -> Vec<PrinterStatus> {
        let wait = async {
            loop {
                let notified = self.changed.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                let statuses = self.statuses();
                if statuses.len() >= count {
                    return statuses;
                }
                notified.await;
            }
        };
        tokio::time::timeout(std::time::Duration::from_secs(5), wait)
            .await
            .expect("status reports did not arrive")
    }
}

#[async_trait]
impl StatusSink for RecordingSink {
    async fn report(&self, status: PrinterStatus) {
        self.statuses.lock().unwrap().push(status);
        self.changed.notify_waiters();
    }
}

pub fn artifact(name: &str) -> ArtifactDescriptor {
    ArtifactDescriptor { online_name: format!("orders/{name}"), target_file_name: name.to_string() }
}

pub struct FakeManifest {
    artifacts: Option<Vec<ArtifactDescriptor>>,
    pub requests: Mutex<Vec<String>>,
}

impl FakeManifest {
    pub fn with(artifacts: Vec<ArtifactDescriptor>) -> Self {
        Self { artifacts: Some(artifacts), requests: Mutex::new(Vec::new()) }
    }

    pub fn unreachable() -> Self {
        Self { artifacts: None, requests: Mutex::new(Vec::new()) }
    }
}

#[async_trait]
impl ManifestSource for FakeManifest {
    async fn fetch(&self, order_id: &str) -> Result<Vec<ArtifactDescriptor>, JobError> {
        self.requests.lock().unwrap().push(order_id.to_string());
        self.artifacts.clone().ok_or_else(|| JobError::Manifest {
            order_id: order_id.to_string(),
            reason: "connection refused".to_string(),
        })
    }
}

/// Writes a small file per URL; fails at `fail_at` without creating it.
#[derive(Default)]
pub struct FakeDownloader {
    pub fail_at: Option<usize>,
    pub urls: Mutex<Vec<String>>,
}

impl FakeDownloader {
    pub fn failing_at(index: usize) -> Self {
        Self { fail_at: Some(index), urls: Mutex::new(Vec::new()) }
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Downloader for FakeDownloader {
    async fn download(&self, url: &str, dest: &Path) -> Result<(), String> {
        let index = {
            let mut urls = self.urls.lock().unwrap();
            urls.push(url.to_string());
            urls.len() - 1
        };
        if self.fail_at == Some(index) {
            return Err("HTTP status server error (503 Service Unavailable)".to_string());
        }
        tokio::fs::write(dest, url.as_bytes()).await.map_err(|e| e.to_string())
    }
}

/// Broker stand-in. `open` fails for the first `failures` attempts and tracks
/// how many attempts overlap.
pub struct MockTransport {
    failures: AtomicUsize,
    pub opens: AtomicUsize,
    in_open: AtomicUsize,
    pub max_concurrent_opens: AtomicUsize,
    pub subscriptions: Mutex<Vec<String>>,
    pub published: Mutex<Vec<(String, Vec<u8>)>>,
    pub fail_subscribe: bool,
    /// While set, each `subscribe` waits for a permit on `subscribe_gate`.
    pub hold_subscribe: AtomicBool,
    pub subscribe_gate: Semaphore,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<SessionEvent>>,
}

impl MockTransport {
    pub fn new(failures: usize) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            failures: AtomicUsize::new(failures),
            opens: AtomicUsize::new(0),
            in_open: AtomicUsize::new(0),
            max_concurrent_opens: AtomicUsize::new(0),
            subscriptions: Mutex::new(Vec::new()),
            published: Mutex::new(Vec::new()),
            fail_subscribe: false,
            hold_subscribe: AtomicBool::new(false),
            subscribe_gate: Semaphore::new(0),
            events_tx,
            events_rx: tokio::sync::Mutex::new(events_rx),
        }
    }

    pub fn fail_next_opens(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }

    pub fn push(&self, event: SessionEvent) {
        let _ = self.events_tx.send(event);
    }

    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(&self) -> Result<(), ConnectionError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let now = self.in_open.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent_opens.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        self.in_open.fetch_sub(1, Ordering::SeqCst);

        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(ConnectionError::Refused("ServiceUnavailable".to_string()));
        }
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<(), ConnectionError> {
        if self.hold_subscribe.load(Ordering::SeqCst) {
            if let Ok(permit) = self.subscribe_gate.acquire().await {
                permit.forget();
            }
        }
        self.subscriptions.lock().unwrap().push(topic.to_string());
        if self.fail_subscribe {
            return Err(ConnectionError::Transport("request queue full".to_string()));
        }
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), ConnectionError> {
        self.published.lock().unwrap().push((topic.to_string(), payload));
        Ok(())
    }

    async fn next_event(&self) -> SessionEvent {
        let mut rx = self.events_rx.lock().await;
        match rx.recv().await {
            Some(event) => event,
            None => std::future::pending().await,
        }
    }
}
