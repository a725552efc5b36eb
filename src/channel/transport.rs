//! Transport seams: what a backend must provide to carry the line protocol.

use std::io;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::LinkError;

/// Parameters used to open a port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSettings {
    /// Port name (`COM5`, `/dev/ttyUSB0`, ...).
    pub port: String,
    /// Baud rate.
    pub baud: u32,
    /// Read and write timeout of the port.
    pub timeout: Duration,
}

impl PortSettings {
    /// Settings derived from the agent configuration.
    pub fn from_config(cfg: &crate::Config) -> Self {
        Self {
            port: cfg.port.clone(),
            baud: cfg.baud,
            timeout: cfg.io_timeout,
        }
    }
}

/// Read half of an open connection.
#[async_trait]
pub trait LineRead: Send + 'static {
    /// Reads one line without its terminator.
    ///
    /// Returns `Ok(None)` when no complete line arrived within `timeout`.
    /// Partial data is kept for the next call.
    async fn read_line(&mut self, timeout: Duration) -> io::Result<Option<String>>;
}

/// Write half of an open connection.
#[async_trait]
pub trait LineWrite: Send + 'static {
    /// Writes `line` followed by `\n`.
    async fn write_line(&mut self, line: &str) -> io::Result<()>;
}

/// An open connection, split into halves.
pub struct Link {
    /// Read half.
    pub reader: Box<dyn LineRead>,
    /// Write half.
    pub writer: Box<dyn LineWrite>,
}

/// Discovers and opens serial ports.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Names of the currently enumerable ports.
    async fn available_ports(&self) -> Result<Vec<String>, LinkError>;

    /// Whether `port` is currently enumerable.
    ///
    /// Enumeration errors count as "not present".
    async fn is_present(&self, port: &str) -> bool {
        match self.available_ports().await {
            Ok(ports) => ports.iter().any(|p| p == port),
            Err(_) => false,
        }
    }

    /// Opens the port with DTR/RTS asserted so the device can detect the host.
    async fn open(&self, settings: &PortSettings) -> Result<Link, LinkError>;
}
