//! # Link supervisor: discovery, reconnect and heartbeat loop.
//!
//! [`LinkSupervisor`] exclusively owns the [`LineChannel`]. Nothing else opens,
//! replaces or closes it; the listener only receives a read capability.
//!
//! ## State machine
//! ```text
//!            device enumerable              open ok
//! Searching ───────────────────► Opening ───────────► Connected
//!     ▲                            │                      │
//!     │        backoff             ▼ open failed          │ write failed
//!     └──────────────────────── Failed                    │ / device gone
//!     ▲                                                   │
//!     └───────────────────────────────────────────────────┘
//! ```
//!
//! ## One iteration
//! 1. Device not enumerable: drop any connection, publish `PortMissing` once per
//!    transition, wait the backoff.
//! 2. No connection: open it. On failure publish `PortOpenFailed` and wait the
//!    backoff. On success spawn a fresh listener and publish `PortOpened`.
//! 3. Connected: write the heartbeat. The first successful write per connection
//!    publishes `HeartbeatSent`; then wait the heartbeat interval. A failed write
//!    publishes `LinkLost`, closes the connection and waits the backoff.
//!
//! Every wait observes the agent-wide token; cancellation ends the loop without
//! error and closes the connection.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::channel::{Connector, LineChannel, PortSettings};
use crate::config::Config;
use crate::error::LinkError;
use crate::core::listener::{Inbound, spawn_listener};
use crate::events::{Bus, Event, EventKind};
use crate::policies::BackoffPolicy;

/// Connection state of the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Waiting for the device to appear.
    Searching,
    /// Device found, port being opened.
    Opening,
    /// Port open; heartbeats are being sent.
    Connected,
    /// The last open attempt failed; waiting before searching again.
    Failed,
}

impl ConnectionState {
    /// Short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConnectionState::Searching => "searching",
            ConnectionState::Opening => "opening",
            ConnectionState::Connected => "connected",
            ConnectionState::Failed => "failed",
        }
    }
}

/// An open channel and the listener reading from it.
struct Connection {
    channel: LineChannel,
    listener: JoinHandle<()>,
    listener_token: CancellationToken,
}

impl Connection {
    /// Stops the listener first, then releases the port.
    async fn close(self) {
        self.listener_token.cancel();
        let _ = self.listener.await;
        self.channel.close().await;
    }
}

/// Owner of the connection and its retry/heartbeat loop.
pub(crate) struct LinkSupervisor {
    settings: PortSettings,
    heartbeat_interval: Duration,
    payload: String,
    backoff: BackoffPolicy,
    connector: Arc<dyn Connector>,
    bus: Bus,
    lines: mpsc::Sender<Inbound>,
    state: watch::Sender<ConnectionState>,
}

impl LinkSupervisor {
    pub(crate) fn new(
        cfg: &Config,
        connector: Arc<dyn Connector>,
        bus: Bus,
        lines: mpsc::Sender<Inbound>,
        state: watch::Sender<ConnectionState>,
    ) -> Self {
        Self {
            settings: PortSettings::from_config(cfg),
            heartbeat_interval: cfg.heartbeat_interval,
            payload: cfg.heartbeat_payload.clone(),
            backoff: cfg.backoff(),
            connector,
            bus,
            lines,
            state,
        }
    }

    fn set_state(&self, next: ConnectionState) {
        self.state.send_replace(next);
    }

    /// Waits `delay` unless cancelled first. Returns `false` on cancellation.
    async fn wait(&self, delay: Duration, token: &CancellationToken) -> bool {
        tokio::select! {
            _ = token.cancelled() => false,
            _ = time::sleep(delay) => true,
        }
    }

    fn attach(&self, channel: LineChannel, token: &CancellationToken) -> Connection {
        let listener_token = token.child_token();
        let listener = spawn_listener(
            channel.reader(),
            self.settings.timeout,
            self.lines.clone(),
            listener_token.clone(),
        );
        Connection {
            channel,
            listener,
            listener_token,
        }
    }

    /// Runs until `token` is cancelled. Never returns on its own.
    pub(crate) async fn run(self, token: CancellationToken) {
        let port = self.settings.port.as_str();
        let mut conn: Option<Connection> = None;
        let mut missing_logged = false;
        let mut heartbeat_logged = false;
        let mut failures = 0u32;

        while !token.is_cancelled() {
            if !self.connector.is_present(port).await {
                if let Some(c) = conn.take() {
                    c.close().await;
                }
                heartbeat_logged = false;
                self.set_state(ConnectionState::Searching);

                let delay = self.backoff.next(failures);
                failures = failures.saturating_add(1);
                if !missing_logged {
                    missing_logged = true;
                    let missing = LinkError::DeviceNotFound { port: port.to_string() };
                    self.bus.publish(
                        Event::new(EventKind::PortMissing)
                            .with_port(port)
                            .with_reason(missing.to_string())
                            .with_delay(delay),
                    );
                }
                if !self.wait(delay, &token).await {
                    break;
                }
                continue;
            }
            missing_logged = false;

            if conn.is_none() {
                self.set_state(ConnectionState::Opening);
                match LineChannel::open(self.connector.as_ref(), &self.settings).await {
                    Ok(channel) => {
                        failures = 0;
                        heartbeat_logged = false;
                        conn = Some(self.attach(channel, &token));
                        self.set_state(ConnectionState::Connected);
                        self.bus
                            .publish(Event::new(EventKind::PortOpened).with_port(port));
                    }
                    Err(e) => {
                        self.set_state(ConnectionState::Failed);
                        let delay = self.backoff.next(failures);
                        failures = failures.saturating_add(1);
                        self.bus.publish(
                            Event::new(EventKind::PortOpenFailed)
                                .with_port(port)
                                .with_reason(e.to_string())
                                .with_delay(delay),
                        );
                        if !self.wait(delay, &token).await {
                            break;
                        }
                        self.set_state(ConnectionState::Searching);
                        continue;
                    }
                }
            }
            let Some(c) = conn.as_ref() else { continue };

            let written = c.channel.write_line(&self.payload).await;
            match written {
                Ok(()) => {
                    if !heartbeat_logged {
                        heartbeat_logged = true;
                        self.bus.publish(
                            Event::new(EventKind::HeartbeatSent).with_line(self.payload.as_str()),
                        );
                    }
                    if !self.wait(self.heartbeat_interval, &token).await {
                        break;
                    }
                }
                Err(e) => {
                    if let Some(c) = conn.take() {
                        c.close().await;
                    }
                    heartbeat_logged = false;
                    self.set_state(ConnectionState::Searching);

                    let delay = self.backoff.next(failures);
                    failures = failures.saturating_add(1);
                    self.bus.publish(
                        Event::new(EventKind::LinkLost)
                            .with_port(port)
                            .with_reason(e.to_string())
                            .with_delay(delay),
                    );
                    if !self.wait(delay, &token).await {
                        break;
                    }
                }
            }
        }

        if let Some(c) = conn.take() {
            c.close().await;
            self.bus
                .publish(Event::new(EventKind::PortClosed).with_port(port));
        }
        self.set_state(ConnectionState::Searching);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::mock::MockConnector;

    struct Harness {
        mock: MockConnector,
        events: tokio::sync::broadcast::Receiver<Event>,
        state: watch::Receiver<ConnectionState>,
        lines: mpsc::Receiver<Inbound>,
        token: CancellationToken,
        handle: JoinHandle<()>,
    }

    fn start(mock: MockConnector) -> Harness {
        let cfg = Config {
            port: "COM5".into(),
            ..Config::default()
        };
        let bus = Bus::new(1024);
        let events = bus.subscribe();
        let (tx, lines) = mpsc::channel(16);
        let (state_tx, state) = watch::channel(ConnectionState::Searching);
        let sup = LinkSupervisor::new(&cfg, Arc::new(mock.clone()), bus, tx, state_tx);
        let token = CancellationToken::new();
        let handle = tokio::spawn(sup.run(token.clone()));
        Harness {
            mock,
            events,
            state,
            lines,
            token,
            handle,
        }
    }

    fn drain(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<EventKind> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev.kind);
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn connects_and_logs_first_heartbeat_only() {
        let mut h = start(MockConnector::new("COM5").with_device());
        time::sleep(Duration::from_secs(21)).await;

        assert_eq!(*h.state.borrow(), ConnectionState::Connected);
        assert_eq!(h.mock.writes().len(), 5);
        let kinds = drain(&mut h.events);
        assert_eq!(
            kinds,
            vec![EventKind::PortOpened, EventKind::HeartbeatSent]
        );

        h.token.cancel();
        h.handle.await.unwrap();
        assert_eq!(drain(&mut h.events), vec![EventKind::PortClosed]);
        assert_eq!(h.mock.open_links(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn forwards_received_lines_to_the_queue() {
        let mut h = start(MockConnector::new("COM5").with_device());
        time::sleep(Duration::from_millis(100)).await;

        assert!(h.mock.push_line("request_shutdown"));
        let line = h.lines.recv().await.unwrap().unwrap();
        assert_eq!(line, "request_shutdown");

        h.token.cancel();
        h.handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn missing_device_is_logged_once_per_transition() {
        let mut h = start(MockConnector::new("COM5"));
        time::sleep(Duration::from_secs(95)).await;
        assert_eq!(drain(&mut h.events), vec![EventKind::PortMissing]);
        assert_eq!(*h.state.borrow(), ConnectionState::Searching);
        assert_eq!(h.mock.opens(), 0);

        h.mock.set_present(true);
        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(*h.state.borrow(), ConnectionState::Connected);

        h.mock.set_present(false);
        time::sleep(Duration::from_secs(40)).await;
        let kinds = drain(&mut h.events);
        assert_eq!(
            kinds.iter().filter(|k| **k == EventKind::PortMissing).count(),
            1
        );

        h.token.cancel();
        h.handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn missing_device_carries_not_found_reason() {
        let mut h = start(MockConnector::new("COM5"));
        time::sleep(Duration::from_secs(1)).await;

        let ev = h.events.try_recv().unwrap();
        assert_eq!(ev.kind, EventKind::PortMissing);
        assert_eq!(ev.reason.as_deref(), Some("COM5 not found"));

        h.token.cancel();
        h.handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn failed_open_waits_backoff_then_retries() {
        let mock = MockConnector::new("COM5").with_device();
        mock.fail_next_opens(1);
        let mut h = start(mock);

        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(*h.state.borrow(), ConnectionState::Failed);
        assert_eq!(h.mock.opens(), 1);

        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(*h.state.borrow(), ConnectionState::Connected);
        assert_eq!(h.mock.opens(), 2);
        let kinds = drain(&mut h.events);
        assert_eq!(kinds[0], EventKind::PortOpenFailed);
        assert!(kinds.contains(&EventKind::PortOpened));

        h.token.cancel();
        h.handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_backoff_exits_promptly() {
        let h = start(MockConnector::new("COM5"));
        time::sleep(Duration::from_secs(1)).await;

        let started = time::Instant::now();
        h.token.cancel();
        h.handle.await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
