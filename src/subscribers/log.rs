//! # LogWriter: stdout event printer
//!
//! Prints every [`Event`] as `[label] message`. Used by the binary when it
//! runs in the foreground.
//!
//! ## Example output
//! ```text
//! [agent-starting] Service starting...
//! [port-missing] COM5 not found. Is the device connected? Retrying in 30s...
//! [port-opened] Serial port COM5 opened.
//! [heartbeat] Sent: on
//! [received] Received from device: request_shutdown
//! [shutdown-tick] Shutdown in 30s.
//! ```

use crate::events::Event;
use crate::subscribers::Subscribe;
use async_trait::async_trait;

/// Stdout writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        println!("[{}] {}", e.kind.as_label(), e.message());
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
