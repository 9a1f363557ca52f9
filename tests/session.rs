mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use common::MockTransport;
use print_relay::config::ReconnectConfig;
use print_relay::control::PrinterStatus;
use print_relay::identity::DeviceIdentity;
use print_relay::job::StatusSink;
use print_relay::report::StatusReporter;
use print_relay::session::{ConnectionError, ConnectionManager, InboundMessage, SessionEvent, SessionState};
use tokio::sync::mpsc;

const TOPICS: [&str; 2] = ["control/printer-task/aa:bb:cc:dd:ee:ff", "control/status"];

fn manager(
    transport: Arc<MockTransport>,
) -> (Arc<ConnectionManager<MockTransport>>, mpsc::Receiver<InboundMessage>) {
    let reconnect = ReconnectConfig { base_delay_secs: 5, max_delay_secs: 60, jitter: false };
    ConnectionManager::new(
        transport,
        TOPICS.iter().map(|t| t.to_string()).collect(),
        reconnect,
        Duration::from_secs(10),
        8,
    )
}

#[tokio::test(start_paused = true)]
async fn test_connect_subscribes_and_forwards_messages() {
    let transport = Arc::new(MockTransport::new(0));
    let (session, mut inbound) = manager(transport.clone());

    session.connect().await.unwrap();
    assert_eq!(session.state().await, SessionState::Connected);
    assert_eq!(transport.subscriptions.lock().unwrap().clone(), TOPICS.to_vec());

    transport.push(SessionEvent::Message {
        topic: "control/status".to_string(),
        payload: br#"{"type":"printStatus"}"#.to_vec(),
    });
    let message = inbound.recv().await.unwrap();
    assert_eq!(message.topic, "control/status");
    assert_eq!(message.payload, br#"{"type":"printStatus"}"#.to_vec());
}

#[tokio::test(start_paused = true)]
async fn test_connect_is_noop_when_connected() {
    let transport = Arc::new(MockTransport::new(0));
    let (session, _inbound) = manager(transport.clone());

    session.connect().await.unwrap();
    session.connect().await.unwrap();
    assert_eq!(transport.opens.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_initial_connect_failure_is_returned() {
    let transport = Arc::new(MockTransport::new(1));
    let (session, _inbound) = manager(transport.clone());

    let err = session.connect().await.unwrap_err();
    assert!(matches!(err, ConnectionError::Refused(_)));
    assert_eq!(session.state().await, SessionState::Disconnected);
    assert!(!session.reconnect_in_flight());

    session.connect().await.unwrap();
    assert!(session.is_connected().await);
}

#[tokio::test(start_paused = true)]
async fn test_subscription_failure_keeps_session() {
    let mut transport = MockTransport::new(0);
    transport.fail_subscribe = true;
    let transport = Arc::new(transport);
    let (session, _inbound) = manager(transport.clone());

    session.connect().await.unwrap();
    assert!(session.is_connected().await);
    assert_eq!(transport.subscriptions.lock().unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_single_reconnect_loop_under_concurrent_triggers() {
    let transport = Arc::new(MockTransport::new(0));
    let (session, _inbound) = manager(transport.clone());
    session.connect().await.unwrap();

    transport.fail_next_opens(3);
    transport.push(SessionEvent::Disconnected);
    while session.state().await != SessionState::Reconnecting {
        tokio::task::yield_now().await;
    }

    let mut triggers = Vec::new();
    for _ in 0..5 {
        let s = session.clone();
        triggers.push(tokio::spawn(async move { s.notify_disconnected().await }));
        let s = session.clone();
        triggers.push(tokio::spawn(async move {
            let _ = s.connect().await;
        }));
    }
    for trigger in triggers {
        trigger.await.unwrap();
    }
    assert!(session.reconnect_in_flight());

    // 5 + 10 + 20 + 40 seconds of backoff, plus slack
    tokio::time::sleep(Duration::from_secs(120)).await;

    assert_eq!(transport.max_concurrent_opens.load(Ordering::SeqCst), 1);
    assert_eq!(transport.opens.load(Ordering::SeqCst), 1 + 4);
    assert!(session.is_connected().await);
    assert!(!session.reconnect_in_flight());
    assert_eq!(transport.subscriptions.lock().unwrap().len(), 2 * TOPICS.len());
}

#[tokio::test(start_paused = true)]
async fn test_second_drop_reconnects_again() {
    let transport = Arc::new(MockTransport::new(0));
    let (session, _inbound) = manager(transport.clone());
    session.connect().await.unwrap();

    transport.push(SessionEvent::Disconnected);
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(session.is_connected().await);

    transport.push(SessionEvent::Disconnected);
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(session.is_connected().await);
    assert_eq!(transport.opens.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_late_drop_notice_keeps_restored_session() {
    let transport = Arc::new(MockTransport::new(0));
    let (session, _inbound) = manager(transport.clone());
    session.connect().await.unwrap();

    // Reconnect succeeds but stalls while re-subscribing, still holding the guard.
    transport.hold_subscribe.store(true, Ordering::SeqCst);
    transport.push(SessionEvent::Disconnected);
    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(session.state().await, SessionState::Connected);
    assert!(session.reconnect_in_flight());

    session.notify_disconnected().await;
    assert_eq!(session.state().await, SessionState::Connected);

    transport.hold_subscribe.store(false, Ordering::SeqCst);
    transport.subscribe_gate.add_permits(TOPICS.len());
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(session.is_connected().await);
    assert!(!session.reconnect_in_flight());
    assert_eq!(transport.opens.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_report_publishes_device_status() {
    let transport = Arc::new(MockTransport::new(0));
    let (session, _inbound) = manager(transport.clone());
    session.connect().await.unwrap();

    let identity = DeviceIdentity::new("192.168.1.10", "aa:bb:cc:dd:ee:ff");
    let reporter = StatusReporter::new(session, identity, "control/reportStatus");
    reporter.report(PrinterStatus::Maintenance).await;

    let published = transport.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].0, "control/reportStatus");
    let body: serde_json::Value = serde_json::from_slice(&published[0].1).unwrap();
    assert_eq!(body["printerStatus"], "maintenance");
    assert_eq!(body["macAddress"], "aa:bb:cc:dd:ee:ff");
    assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));
}

#[tokio::test(start_paused = true)]
async fn test_report_while_disconnected_triggers_connect() {
    let transport = Arc::new(MockTransport::new(0));
    let (session, _inbound) = manager(transport.clone());

    let identity = DeviceIdentity::new("192.168.1.10", "aa:bb:cc:dd:ee:ff");
    let reporter = StatusReporter::new(session.clone(), identity, "control/reportStatus");
    reporter.report(PrinterStatus::Idle).await;

    assert_eq!(transport.published().len(), 1);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(session.is_connected().await);
}
