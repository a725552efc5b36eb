//! Real serial backend built on the `serialport` crate.
//!
//! `serialport` is blocking, so every call runs on tokio's blocking pool. Each
//! half keeps its port behind a shared lock that the blocking closure takes, so a
//! caller that stops waiting (timeout, cancellation) never loses the port: the
//! next call simply waits for the abandoned one to release it.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use tokio::task;

use crate::channel::transport::{Connector, LineRead, LineWrite, Link, PortSettings};
use crate::error::LinkError;

/// Longest line kept while waiting for a terminator.
const MAX_LINE: usize = 4096;

/// Connector for physical serial ports.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialConnector;

impl SerialConnector {
    /// Creates the connector.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for SerialConnector {
    async fn available_ports(&self) -> Result<Vec<String>, LinkError> {
        let ports = task::spawn_blocking(serialport::available_ports)
            .await
            .map_err(LinkError::io)?
            .map_err(LinkError::io)?;
        Ok(ports.into_iter().map(|p| p.port_name).collect())
    }

    async fn is_present(&self, port: &str) -> bool {
        let listed = match self.available_ports().await {
            Ok(ports) => ports.iter().any(|p| p == port),
            Err(_) => false,
        };
        if listed {
            return true;
        }
        // Enumeration can miss devices (no udev, symlinked names); trust the device node.
        cfg!(unix) && std::path::Path::new(port).exists()
    }

    async fn open(&self, settings: &PortSettings) -> Result<Link, LinkError> {
        let s = settings.clone();
        let port_name = settings.port.clone();
        task::spawn_blocking(move || open_blocking(&s))
            .await
            .map_err(LinkError::io)?
            .map_err(|e| LinkError::OpenFailure {
                port: port_name,
                error: e.to_string(),
            })
    }
}

fn open_blocking(s: &PortSettings) -> serialport::Result<Link> {
    let mut port = serialport::new(s.port.as_str(), s.baud)
        .data_bits(DataBits::Eight)
        .stop_bits(StopBits::One)
        .parity(Parity::None)
        .flow_control(FlowControl::None)
        .timeout(s.timeout)
        .open()?;

    // Asserted handshake lines tell the device a host is attached.
    port.write_data_terminal_ready(true)?;
    port.write_request_to_send(true)?;

    let reader = port.try_clone()?;
    Ok(Link {
        reader: Box::new(SerialReader {
            state: Arc::new(Mutex::new(ReadState {
                port: reader,
                pending: Vec::new(),
            })),
        }),
        writer: Box::new(SerialWriter {
            port: Arc::new(Mutex::new(port)),
        }),
    })
}

/// Locks a half. A panicked blocking call leaves the port usable, so poisoning is ignored.
fn lock<T: ?Sized>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

struct SerialWriter {
    port: Arc<Mutex<Box<dyn SerialPort>>>,
}

#[async_trait]
impl LineWrite for SerialWriter {
    async fn write_line(&mut self, line: &str) -> io::Result<()> {
        let port = Arc::clone(&self.port);
        let mut bytes = Vec::with_capacity(line.len() + 1);
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(b'\n');

        task::spawn_blocking(move || {
            let mut port = lock(&port);
            port.write_all(&bytes).and_then(|()| port.flush())
        })
        .await
        .map_err(io::Error::other)?
    }
}

struct ReadState {
    port: Box<dyn SerialPort>,
    pending: Vec<u8>,
}

struct SerialReader {
    state: Arc<Mutex<ReadState>>,
}

#[async_trait]
impl LineRead for SerialReader {
    async fn read_line(&mut self, timeout: Duration) -> io::Result<Option<String>> {
        let state = Arc::clone(&self.state);
        task::spawn_blocking(move || -> io::Result<Option<String>> {
            let mut st = lock(&state);
            let ReadState { port, pending } = &mut *st;
            if let Some(line) = take_line(pending) {
                return Ok(Some(line));
            }
            fill_until_line(port.as_mut(), pending, timeout)?;
            Ok(take_line(pending))
        })
        .await
        .map_err(io::Error::other)?
    }
}

/// Reads into `pending` until it holds a full line or `timeout` elapses.
fn fill_until_line(
    port: &mut dyn SerialPort,
    pending: &mut Vec<u8>,
    timeout: Duration,
) -> io::Result<()> {
    let deadline = Instant::now() + timeout;
    let mut buf = [0u8; 256];

    while !pending.contains(&b'\n') && pending.len() < MAX_LINE {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        port.set_timeout(deadline - now)
            .map_err(|e| io::Error::other(e.to_string()))?;
        match port.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => pending.extend_from_slice(&buf[..n]),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => break,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Splits the first complete line off `pending` (lossy UTF-8, without `\n`).
///
/// An over-long unterminated buffer is flushed as one line.
fn take_line(pending: &mut Vec<u8>) -> Option<String> {
    let end = match pending.iter().position(|&b| b == b'\n') {
        Some(pos) => pos + 1,
        None if pending.len() >= MAX_LINE => pending.len(),
        None => return None,
    };
    let raw: Vec<u8> = pending.drain(..end).collect();
    let text = String::from_utf8_lossy(&raw);
    Some(text.trim_end_matches(['\n', '\r']).to_string())
}
