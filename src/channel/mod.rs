//! # Line Channel: line-based text I/O over a serial connection.
//!
//! ## Contents
//! - [`Connector`] discovers and opens ports; [`SerialConnector`] is the real backend
//!   (feature `serial`), [`mock::MockConnector`] a scripted double for tests.
//! - [`LineRead`] / [`LineWrite`] the two halves of an open connection.
//! - [`LineChannel`] the handle owned by the link supervisor; [`LineReader`] the
//!   read-only capability handed to the listener.
//!
//! ## Rules
//! - Every read and write is bounded by the configured I/O timeout (500ms by default).
//! - `read_line` returns `Ok(None)` on timeout; it never blocks indefinitely.
//! - Reads and writes use separate halves, so a heartbeat write can overlap a pending
//!   read without sharing a lock. Writes are serialized among themselves, reads too.
//! - After [`LineChannel::close`] both halves are dropped; any later call returns
//!   [`LinkError::Closed`](crate::LinkError::Closed) without touching the port.
//!
//! ```text
//!            LinkSupervisor (owner)
//!                   │ open / write_line / close
//!                   ▼
//!   ┌────────────── LineChannel ──────────────┐
//!   │  writer: Mutex<Option<Box<dyn LineWrite>>>
//!   │  reader: Arc<Mutex<Option<Box<dyn LineRead>>>> ◄── LineReader (listener task)
//!   └─────────────────────────────────────────┘
//! ```

mod handle;
pub mod mock;
#[cfg(feature = "serial")]
mod serial;
mod transport;

pub use handle::{LineChannel, LineReader};
#[cfg(feature = "serial")]
pub use serial::SerialConnector;
pub use transport::{Connector, LineRead, LineWrite, Link, PortSettings};
