//! # Events emitted by the agent.
//!
//! The [`EventKind`] enum classifies events across four categories:
//! - **Lifecycle events**: agent start/stop
//! - **Link events**: discovery, open, heartbeat, connection loss
//! - **Command events**: received lines and recognized commands
//! - **Shutdown events**: countdown ticks and terminal outcomes
//!
//! The [`Event`] struct carries the metadata (port, line, session id, delays)
//! and renders the human-readable log line via [`Event::message`].
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use heartlink::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::PortMissing)
//!     .with_port("COM5")
//!     .with_delay(Duration::from_secs(30));
//!
//! assert_eq!(ev.kind, EventKind::PortMissing);
//! assert_eq!(ev.message(), "COM5 not found. Is the device connected? Retrying in 30s...");
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of agent events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Lifecycle ===
    /// `Agent::start` was called.
    AgentStarting,
    /// `Agent::stop` began teardown.
    AgentStopping,
    /// Teardown finished.
    AgentStopped,

    // === Link ===
    /// Configured port is not enumerable (published once per transition).
    ///
    /// Sets: `port`, `reason`, `delay_ms`
    PortMissing,
    /// Port opened; the link is connected.
    ///
    /// Sets: `port`
    PortOpened,
    /// Port present but open failed.
    ///
    /// Sets: `port`, `reason`, `delay_ms`
    PortOpenFailed,
    /// First heartbeat after a (re)connection.
    ///
    /// Sets: `line`
    HeartbeatSent,
    /// A heartbeat write failed; the connection is dropped.
    ///
    /// Sets: `reason`, `delay_ms`
    LinkLost,
    /// The port was closed on teardown.
    ///
    /// Sets: `port`
    PortClosed,

    // === Commands ===
    /// A non-empty line was received from the device.
    ///
    /// Sets: `line`
    LineReceived,
    /// Reading from the device failed.
    ///
    /// Sets: `reason`
    ReadFailed,
    /// `request_shutdown` received; a countdown session was created.
    ///
    /// Sets: `session`
    ShutdownRequested,
    /// `request_shutdown` received but dropped (repeat policy `ignore` or agent stopping).
    ///
    /// Sets: `session` (the active one, if any), `reason`
    ShutdownRequestIgnored,
    /// `cancel_shutdown` received.
    ///
    /// Sets: `session` (the active one, if any)
    CancelRequested,

    // === Shutdown workflow ===
    /// One countdown step.
    ///
    /// Sets: `session`, `remaining_s`
    ShutdownTick,
    /// Countdown cancelled before reaching zero.
    ///
    /// Sets: `session`
    ShutdownCancelled,
    /// Countdown reached zero and the OS shutdown primitive was launched.
    ///
    /// Sets: `session`
    ShutdownExecuted,
    /// The OS shutdown primitive could not be launched.
    ///
    /// Sets: `session`, `reason`
    ShutdownFailed,

    // === Subscribers ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets: `reason` (subscriber name and panic info)
    SubscriberPanicked,
    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `reason`
    SubscriberOverflow,
}

impl EventKind {
    /// Short kebab-case label used as log prefix.
    pub fn as_label(&self) -> &'static str {
        match self {
            EventKind::AgentStarting => "agent-starting",
            EventKind::AgentStopping => "agent-stopping",
            EventKind::AgentStopped => "agent-stopped",
            EventKind::PortMissing => "port-missing",
            EventKind::PortOpened => "port-opened",
            EventKind::PortOpenFailed => "port-open-failed",
            EventKind::HeartbeatSent => "heartbeat",
            EventKind::LinkLost => "link-lost",
            EventKind::PortClosed => "port-closed",
            EventKind::LineReceived => "received",
            EventKind::ReadFailed => "read-failed",
            EventKind::ShutdownRequested => "shutdown-requested",
            EventKind::ShutdownRequestIgnored => "shutdown-request-ignored",
            EventKind::CancelRequested => "cancel-requested",
            EventKind::ShutdownTick => "shutdown-tick",
            EventKind::ShutdownCancelled => "shutdown-cancelled",
            EventKind::ShutdownExecuted => "shutdown-executed",
            EventKind::ShutdownFailed => "shutdown-failed",
            EventKind::SubscriberPanicked => "subscriber-panicked",
            EventKind::SubscriberOverflow => "subscriber-overflow",
        }
    }
}

/// Agent event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Serial port name.
    pub port: Option<Arc<str>>,
    /// Line sent to or received from the device.
    pub line: Option<Arc<str>>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Wait before the next attempt in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Shutdown session id.
    pub session: Option<u64>,
    /// Seconds left in a shutdown countdown.
    pub remaining_s: Option<u64>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            port: None,
            line: None,
            reason: None,
            delay_ms: None,
            session: None,
            remaining_s: None,
        }
    }

    /// Attaches a port name.
    #[inline]
    pub fn with_port(mut self, port: impl Into<Arc<str>>) -> Self {
        self.port = Some(port.into());
        self
    }

    /// Attaches a line of text.
    #[inline]
    pub fn with_line(mut self, line: impl Into<Arc<str>>) -> Self {
        self.line = Some(line.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a retry delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Attaches a shutdown session id.
    #[inline]
    pub fn with_session(mut self, id: u64) -> Self {
        self.session = Some(id);
        self
    }

    /// Attaches the remaining countdown seconds.
    #[inline]
    pub fn with_remaining(mut self, secs: u64) -> Self {
        self.remaining_s = Some(secs);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_reason(format!("subscriber={subscriber} info={info}"))
    }

    /// Renders the log line for this event.
    pub fn message(&self) -> String {
        let port = self.port.as_deref().unwrap_or("port");
        let line = self.line.as_deref().unwrap_or("");
        let reason = self.reason.as_deref().unwrap_or("unknown error");
        let delay = self.delay_ms.map(|ms| ms.div_ceil(1000)).unwrap_or(0);

        match self.kind {
            EventKind::AgentStarting => "Service starting...".to_string(),
            EventKind::AgentStopping => "Service stopping...".to_string(),
            EventKind::AgentStopped => "Service stopped cleanly.".to_string(),
            EventKind::PortMissing => {
                format!("{port} not found. Is the device connected? Retrying in {delay}s...")
            }
            EventKind::PortOpened => format!("Serial port {port} opened."),
            EventKind::PortOpenFailed | EventKind::LinkLost => {
                format!("Error: {reason}. Retrying in {delay}s...")
            }
            EventKind::HeartbeatSent => format!("Sent: {line}"),
            EventKind::PortClosed => "Serial port closed.".to_string(),
            EventKind::LineReceived => format!("Received from device: {line}"),
            EventKind::ReadFailed => format!("Read error: {reason}"),
            EventKind::ShutdownRequested => {
                "Request shutdown command received from device.".to_string()
            }
            EventKind::ShutdownRequestIgnored => {
                format!("Request shutdown ignored: {reason}.")
            }
            EventKind::CancelRequested => match self.session {
                Some(_) => "Cancel shutdown command received from device.".to_string(),
                None => "Cancel shutdown command received from device; no shutdown pending."
                    .to_string(),
            },
            EventKind::ShutdownTick => {
                format!("Shutdown in {}s.", self.remaining_s.unwrap_or(0))
            }
            EventKind::ShutdownCancelled => "Shutdown cancelled by user.".to_string(),
            EventKind::ShutdownExecuted => "Shutdown command issued.".to_string(),
            EventKind::ShutdownFailed => format!("Request shutdown failed: {reason}"),
            EventKind::SubscriberPanicked => format!("Subscriber panicked: {reason}"),
            EventKind::SubscriberOverflow => format!("Subscriber dropped event: {reason}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_is_monotonic() {
        let a = Event::new(EventKind::AgentStarting);
        let b = Event::new(EventKind::AgentStarting);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn messages_render_metadata() {
        let ev = Event::new(EventKind::LinkLost)
            .with_reason("broken pipe")
            .with_delay(Duration::from_secs(30));
        assert_eq!(ev.message(), "Error: broken pipe. Retrying in 30s...");

        let ev = Event::new(EventKind::ShutdownTick)
            .with_session(1)
            .with_remaining(12);
        assert_eq!(ev.message(), "Shutdown in 12s.");

        let ev = Event::new(EventKind::LineReceived).with_line("hello");
        assert_eq!(ev.message(), "Received from device: hello");
    }

    #[test]
    fn sub_second_delay_rounds_up() {
        let ev = Event::new(EventKind::PortMissing)
            .with_port("COM5")
            .with_delay(Duration::from_millis(200));
        assert!(ev.message().ends_with("Retrying in 1s..."));
    }

    #[test]
    fn cancel_without_session_says_so() {
        let ev = Event::new(EventKind::CancelRequested);
        assert!(ev.message().contains("no shutdown pending"));
    }
}
