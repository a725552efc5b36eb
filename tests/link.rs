mod common;

use std::time::Duration;

use common::{PORT, config, count, drain, settle, start};
use heartlink::channel::mock::MockConnector;
use heartlink::{ConnectionState, EventKind};
use tokio::time;

#[tokio::test(start_paused = true)]
async fn absent_device_is_reported_once_until_it_appears() {
    let mut fx = start(MockConnector::new(PORT), config());

    time::sleep(Duration::from_secs(125)).await;
    let events = drain(&mut fx.events);
    assert_eq!(count(&events, EventKind::PortMissing), 1);
    assert_eq!(fx.agent.state(), ConnectionState::Searching);
    assert_eq!(fx.mock.opens(), 0);

    let missing = events
        .iter()
        .find(|e| e.kind == EventKind::PortMissing)
        .unwrap();
    assert_eq!(
        missing.message(),
        "COM5 not found. Is the device connected? Retrying in 30s..."
    );

    fx.mock.set_present(true);
    time::sleep(Duration::from_secs(30)).await;
    assert_eq!(fx.agent.state(), ConnectionState::Connected);
    let events = drain(&mut fx.events);
    assert_eq!(count(&events, EventKind::PortOpened), 1);
    assert_eq!(count(&events, EventKind::PortMissing), 0);

    fx.agent.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn heartbeats_follow_the_interval_and_log_once() {
    let mut fx = start(MockConnector::new(PORT).with_device(), config());
    settle().await;

    let connected_at = time::Instant::now();
    time::sleep(Duration::from_secs(60)).await;
    let d = connected_at.elapsed().as_secs();

    let sent = fx.mock.writes();
    assert!(sent.iter().all(|l| l == "on"));
    let expected = (d / 5) as usize;
    assert!(
        sent.len() + 1 >= expected && sent.len() <= expected + 1,
        "{} heartbeats in {d}s",
        sent.len()
    );

    let events = drain(&mut fx.events);
    assert_eq!(count(&events, EventKind::HeartbeatSent), 1);
    let hb = events
        .iter()
        .find(|e| e.kind == EventKind::HeartbeatSent)
        .unwrap();
    assert_eq!(hb.message(), "Sent: on");

    fx.agent.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn failed_write_reconnects_without_intervention() {
    let mut fx = start(MockConnector::new(PORT).with_device(), config());
    settle().await;
    assert_eq!(fx.mock.opens(), 1);

    fx.mock.fail_next_writes(1);
    time::sleep(Duration::from_secs(5)).await;
    assert_eq!(fx.agent.state(), ConnectionState::Searching);
    assert_eq!(fx.mock.open_links(), 0);

    time::sleep(Duration::from_secs(31)).await;
    assert_eq!(fx.agent.state(), ConnectionState::Connected);
    assert_eq!(fx.mock.opens(), 2);
    assert!(fx.mock.max_open_links() <= 1);

    let events = drain(&mut fx.events);
    assert_eq!(count(&events, EventKind::LinkLost), 1);
    assert_eq!(count(&events, EventKind::PortOpened), 2);
    assert_eq!(count(&events, EventKind::HeartbeatSent), 2);
    let lost = events
        .iter()
        .find(|e| e.kind == EventKind::LinkLost)
        .unwrap();
    assert!(lost.message().starts_with("Error: "));
    assert!(lost.message().ends_with("Retrying in 30s..."));

    fx.agent.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn unplugging_closes_the_port_before_searching() {
    let mut fx = start(MockConnector::new(PORT).with_device(), config());
    settle().await;

    for _ in 0..3 {
        fx.mock.set_present(false);
        time::sleep(Duration::from_secs(40)).await;
        assert_eq!(fx.mock.open_links(), 0);

        fx.mock.set_present(true);
        time::sleep(Duration::from_secs(40)).await;
        assert_eq!(fx.agent.state(), ConnectionState::Connected);
        assert_eq!(fx.mock.open_links(), 1);
    }
    assert_eq!(fx.mock.max_open_links(), 1);

    let events = drain(&mut fx.events);
    assert_eq!(count(&events, EventKind::PortOpened), 4);

    fx.agent.stop().await.unwrap();
    assert_eq!(fx.mock.open_links(), 0);
}

#[tokio::test(start_paused = true)]
async fn read_errors_are_logged_and_leave_the_link_alone() {
    let mut fx = start(MockConnector::new(PORT).with_device(), config());
    settle().await;

    assert!(fx.mock.push_read_error("framing error"));
    settle().await;
    assert!(fx.mock.push_line("still here"));
    time::sleep(Duration::from_secs(1)).await;

    let events = drain(&mut fx.events);
    let failed = events
        .iter()
        .find(|e| e.kind == EventKind::ReadFailed)
        .unwrap();
    assert_eq!(failed.message(), "Read error: framing error");
    assert_eq!(count(&events, EventKind::LineReceived), 1);
    assert_eq!(fx.agent.state(), ConnectionState::Connected);

    fx.agent.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn commands_are_heard_after_repeated_read_errors() {
    let mut fx = start(MockConnector::new(PORT).with_device(), config());
    settle().await;

    for _ in 0..3 {
        assert!(fx.mock.push_read_error("framing error"));
    }
    time::sleep(Duration::from_secs(2)).await;
    assert!(fx.mock.push_line("request_shutdown"));
    time::sleep(Duration::from_secs(10)).await;

    assert!(fx.agent.is_shutdown_pending());
    assert!(fx.mock.push_line("cancel_shutdown"));
    time::sleep(Duration::from_secs(60)).await;

    let events = drain(&mut fx.events);
    assert_eq!(count(&events, EventKind::ReadFailed), 3);
    assert_eq!(count(&events, EventKind::ShutdownRequested), 1);
    assert_eq!(count(&events, EventKind::ShutdownCancelled), 1);
    assert_eq!(count(&events, EventKind::LinkLost), 0);
    assert_eq!(fx.agent.state(), ConnectionState::Connected);
    assert_eq!(fx.mock.opens(), 1);
    assert_eq!(fx.power.calls(), 0);

    fx.agent.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn stop_closes_the_port_and_reports_lifecycle() {
    let mut fx = start(MockConnector::new(PORT).with_device(), config());
    settle().await;
    assert_eq!(fx.mock.open_links(), 1);

    let started = time::Instant::now();
    fx.agent.stop().await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(fx.mock.open_links(), 0);
    assert!(!fx.mock.push_line("request_shutdown"));

    let kinds: Vec<EventKind> = drain(&mut fx.events).iter().map(|e| e.kind).collect();
    assert_eq!(kinds.first(), Some(&EventKind::AgentStarting));
    assert_eq!(kinds.last(), Some(&EventKind::AgentStopped));
    assert!(kinds.contains(&EventKind::PortClosed));
}
