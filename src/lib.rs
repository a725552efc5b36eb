//! # heartlink
//!
//! **Heartlink** keeps a serial link to a small microcontroller alive and lets
//! the device power the host off.
//!
//! The agent announces host presence by writing a heartbeat line (`on`) every
//! few seconds. The device answers with commands: `request_shutdown` starts a
//! cancellable countdown ending in the OS shutdown command, `cancel_shutdown`
//! aborts it. Unplugged devices, failed opens and broken writes are all
//! transient: the agent waits and reconnects on its own, and only an explicit
//! stop ends it.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!                         ┌──────────────────────────────┐
//!   Agent::start() ─────► │  LinkSupervisor (owner)      │
//!                         │  Searching → Opening →       │
//!                         │  Connected ↔ Failed          │
//!                         └───┬──────────────┬───────────┘
//!                   write "on"│              │ spawns per connection
//!                             ▼              ▼
//!                       ┌───────────┐   ┌──────────┐   line queue   ┌──────────────────┐
//!                       │LineChannel│◄──│ listener │ ─────────────► │ CommandProcessor │
//!                       └───────────┘   └──────────┘                └────────┬─────────┘
//!                                                                            │ request/cancel
//!                                                                            ▼
//!                                                                  ┌───────────────────┐
//!                                                                  │ ShutdownWorkflow  │
//!                                                                  │ 30 × 1s countdown │
//!                                                                  │ → PowerControl    │
//!                                                                  └───────────────────┘
//!
//!  every component ── publish(Event) ──► Bus ──► SubscriberSet ──► LogWriter / FileSink / ...
//! ```
//!
//! ### Heartbeat loop
//! ```text
//! loop {
//!   ├─ device not enumerable ─► PortMissing (once) ─► wait backoff
//!   ├─ no connection ─► open
//!   │     ├─ Err ─► PortOpenFailed ─► wait backoff
//!   │     └─ Ok  ─► PortOpened, spawn listener
//!   └─ write "on"
//!         ├─ Ok  ─► HeartbeatSent (first per connection) ─► wait interval
//!         └─ Err ─► LinkLost, close ─► wait backoff
//! }
//! ```
//!
//! ## Features
//! | Area              | Description                                             | Key types / traits                       |
//! |-------------------|---------------------------------------------------------|------------------------------------------|
//! | **Lifecycle**     | `start` / `stop` hooks for a service manager.           | [`Agent`], [`AgentBuilder`]              |
//! | **Transport**     | Line I/O with bounded timeouts, pluggable backends.     | [`Connector`], [`LineChannel`]           |
//! | **Commands**      | Case-insensitive device commands.                       | [`Command`], [`CommandProcessor`]        |
//! | **Shutdown**      | Cancellable countdown and OS shutdown primitive.        | [`ShutdownWorkflow`], [`PowerControl`]   |
//! | **Policies**      | Reconnect backoff, jitter, repeated requests.           | [`BackoffPolicy`], [`RepeatPolicy`]      |
//! | **Subscriber API**| Hook into agent events (console, log file, custom).     | [`Subscribe`], [`LogWriter`], [`FileSink`] |
//! | **Configuration** | Defaults plus TOML file.                                | [`Config`]                               |
//!
//! ## Optional features
//! - `serial` (default): real serial backend [`SerialConnector`] and the `heartlink` binary.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use heartlink::{Agent, Config, ConnectionState, channel::mock::MockConnector};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mock = MockConnector::new("COM5").with_device();
//!     let cfg = Config { port: "COM5".into(), ..Config::default() };
//!
//!     let mut agent = Agent::builder(cfg)
//!         .with_connector(Arc::new(mock.clone()))
//!         .build()?;
//!     agent.start()?;
//!
//!     tokio::time::sleep(Duration::from_millis(50)).await;
//!     assert_eq!(agent.state(), ConnectionState::Connected);
//!     assert_eq!(mock.writes(), vec!["on".to_string()]);
//!
//!     agent.stop().await?;
//!     Ok(())
//! }
//! ```
pub mod channel;
mod command;
mod config;
mod core;
mod error;
mod events;
mod policies;
mod power;
mod subscribers;

// ---- Public re-exports ----

#[cfg(feature = "serial")]
pub use channel::SerialConnector;
pub use channel::{Connector, LineChannel, LineReader, PortSettings};
pub use command::Command;
pub use config::{Config, DEFAULT_PORT};
pub use core::{
    Agent, AgentBuilder, CommandProcessor, ConnectionState, Outcome, ShutdownSession,
    ShutdownWorkflow, wait_for_shutdown_signal,
};
pub use error::{AgentError, ConfigError, LinkError, ShutdownError};
pub use events::{Bus, Event, EventKind};
pub use policies::{BackoffPolicy, JitterPolicy, RepeatPolicy};
pub use power::{PowerControl, SystemPower};
pub use subscribers::{FileSink, LogWriter, Subscribe, SubscriberSet};
