//! Agent events: types and broadcast bus.
//!
//! Every observable condition of the agent (port missing, heartbeat sent,
//! command received, countdown tick, ...) is an [`Event`] published on the
//! [`Bus`]. Events are the only logging path: subscribers turn them into
//! stdout lines or log-file lines.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Agent`, `LinkSupervisor`, `CommandProcessor`, `ShutdownWorkflow`,
//!   `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the agent's subscriber listener (fans out to `SubscriberSet`) and tests.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
