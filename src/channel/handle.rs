//! [`LineChannel`]: the open-connection handle.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time;

use crate::channel::transport::{Connector, LineRead, LineWrite, PortSettings};
use crate::error::LinkError;

type ReadHalf = Arc<Mutex<Option<Box<dyn LineRead>>>>;

/// Exclusive handle to one open connection.
///
/// Owned by the link supervisor. The listener only gets a [`LineReader`].
pub struct LineChannel {
    io_timeout: Duration,
    writer: Mutex<Option<Box<dyn LineWrite>>>,
    reader: ReadHalf,
}

impl LineChannel {
    /// Opens `settings.port` through `connector`.
    pub async fn open(connector: &dyn Connector, settings: &PortSettings) -> Result<Self, LinkError> {
        let link = connector.open(settings).await?;
        Ok(Self {
            io_timeout: settings.timeout,
            writer: Mutex::new(Some(link.writer)),
            reader: Arc::new(Mutex::new(Some(link.reader))),
        })
    }

    /// Writes one line, bounded by the I/O timeout.
    pub async fn write_line(&self, text: &str) -> Result<(), LinkError> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(LinkError::Closed)?;
        match time::timeout(self.io_timeout, writer.write_line(text)).await {
            Ok(res) => res.map_err(LinkError::io),
            Err(_) => Err(LinkError::io(format!(
                "write timed out after {:?}",
                self.io_timeout
            ))),
        }
    }

    /// Reads one line; `Ok(None)` when nothing arrived within `timeout`.
    pub async fn read_line(&self, timeout: Duration) -> Result<Option<String>, LinkError> {
        self.reader().read_line(timeout).await
    }

    /// Read-only capability sharing this channel's read half.
    pub fn reader(&self) -> LineReader {
        LineReader {
            reader: Arc::clone(&self.reader),
        }
    }

    /// True until [`close`](Self::close) was called.
    pub async fn is_open(&self) -> bool {
        self.writer.lock().await.is_some()
    }

    /// Drops both halves, releasing the port. Idempotent.
    ///
    /// Waits for an in-flight read or write to finish (each is bounded by its timeout).
    pub async fn close(&self) {
        let writer = self.writer.lock().await.take();
        let reader = self.reader.lock().await.take();
        drop(writer);
        drop(reader);
    }
}

/// Read side of a [`LineChannel`], handed to the line listener.
///
/// Reads fail with [`LinkError::Closed`] once the owning channel was closed.
#[derive(Clone)]
pub struct LineReader {
    reader: ReadHalf,
}

impl LineReader {
    /// Reads one line; `Ok(None)` when nothing arrived within `timeout`.
    pub async fn read_line(&self, timeout: Duration) -> Result<Option<String>, LinkError> {
        let mut guard = self.reader.lock().await;
        let reader = guard.as_mut().ok_or(LinkError::Closed)?;
        // The transport enforces `timeout` itself; the outer bound guards a misbehaving one.
        match time::timeout(timeout + timeout, reader.read_line(timeout)).await {
            Ok(res) => res.map_err(LinkError::io),
            Err(_) => Ok(None),
        }
    }
}
