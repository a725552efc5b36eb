//! Scripted in-memory connector for tests and demos.
//!
//! [`MockConnector`] emulates one device on one port:
//! - presence can be toggled (`set_present`),
//! - opens and writes can be made to fail,
//! - inbound lines are injected with `push_line`,
//! - every successful write is recorded.
//!
//! Reads honor their timeout on the tokio clock, so tests can run with a paused clock.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time;

use crate::channel::transport::{Connector, LineRead, LineWrite, Link, PortSettings};
use crate::error::LinkError;

type Inbound = io::Result<String>;

#[derive(Default)]
struct MockState {
    present: bool,
    open_failures: usize,
    write_failures: usize,
    opens: usize,
    writes: Vec<String>,
    open_links: usize,
    max_open_links: usize,
    current: Option<CurrentLink>,
}

struct CurrentLink {
    inbound: mpsc::UnboundedSender<Inbound>,
    severed: Arc<AtomicBool>,
}

/// Scripted connector emulating a single device.
#[derive(Clone)]
pub struct MockConnector {
    port: String,
    state: Arc<Mutex<MockState>>,
}

impl MockConnector {
    /// A connector for `port` with the device absent.
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Marks the device as plugged in.
    pub fn with_device(self) -> Self {
        self.set_present(true);
        self
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        // Test double: a poisoned lock still holds usable counters.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Plugs (`true`) or unplugs (`false`) the device. Unplugging severs the open link.
    pub fn set_present(&self, present: bool) {
        let mut st = self.state();
        st.present = present;
        if !present {
            sever(&mut st);
        }
    }

    /// The next `n` opens fail even though the device is present.
    pub fn fail_next_opens(&self, n: usize) {
        self.state().open_failures = n;
    }

    /// The next `n` writes fail.
    pub fn fail_next_writes(&self, n: usize) {
        self.state().write_failures = n;
    }

    /// Breaks the current link: pending reads error out and writes fail until reopened.
    pub fn drop_connection(&self) {
        sever(&mut self.state());
    }

    /// Delivers `line` to the current link. Returns `false` if no link is open.
    pub fn push_line(&self, line: &str) -> bool {
        self.push(Ok(line.to_string()))
    }

    /// Makes the next read on the current link fail with `msg`.
    pub fn push_read_error(&self, msg: &str) -> bool {
        self.push(Err(io::Error::other(msg.to_string())))
    }

    fn push(&self, item: Inbound) -> bool {
        let st = self.state();
        match &st.current {
            Some(link) => link.inbound.send(item).is_ok(),
            None => false,
        }
    }

    /// Number of open attempts made so far.
    pub fn opens(&self) -> usize {
        self.state().opens
    }

    /// Lines written so far, in order.
    pub fn writes(&self) -> Vec<String> {
        self.state().writes.clone()
    }

    /// Number of links whose halves have not both been dropped yet.
    pub fn open_links(&self) -> usize {
        self.state().open_links
    }

    /// Highest number of simultaneously open links observed.
    pub fn max_open_links(&self) -> usize {
        self.state().max_open_links
    }
}

fn sever(st: &mut MockState) {
    if let Some(link) = st.current.take() {
        link.severed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn available_ports(&self) -> Result<Vec<String>, LinkError> {
        let st = self.state();
        Ok(if st.present {
            vec![self.port.clone()]
        } else {
            Vec::new()
        })
    }

    async fn open(&self, settings: &PortSettings) -> Result<Link, LinkError> {
        let mut st = self.state();
        st.opens += 1;

        let refuse = |error: &str| LinkError::OpenFailure {
            port: settings.port.clone(),
            error: error.to_string(),
        };
        if !st.present || settings.port != self.port {
            return Err(refuse("no such device"));
        }
        if st.open_failures > 0 {
            st.open_failures -= 1;
            return Err(refuse("access denied"));
        }

        sever(&mut st);
        let (tx, rx) = mpsc::unbounded_channel();
        let severed = Arc::new(AtomicBool::new(false));
        st.current = Some(CurrentLink {
            inbound: tx,
            severed: Arc::clone(&severed),
        });
        st.open_links += 1;
        st.max_open_links = st.max_open_links.max(st.open_links);

        let guard = Arc::new(LinkGuard {
            state: Arc::clone(&self.state),
        });
        Ok(Link {
            reader: Box::new(MockReader {
                rx,
                _guard: Arc::clone(&guard),
            }),
            writer: Box::new(MockWriter {
                state: Arc::clone(&self.state),
                severed,
                _guard: guard,
            }),
        })
    }
}

/// Decrements the open-link counter once both halves are gone.
struct LinkGuard {
    state: Arc<Mutex<MockState>>,
}

impl Drop for LinkGuard {
    fn drop(&mut self) {
        let mut st = self.state.lock().unwrap_or_else(|e| e.into_inner());
        st.open_links = st.open_links.saturating_sub(1);
    }
}

struct MockReader {
    rx: mpsc::UnboundedReceiver<Inbound>,
    _guard: Arc<LinkGuard>,
}

#[async_trait]
impl LineRead for MockReader {
    async fn read_line(&mut self, timeout: Duration) -> io::Result<Option<String>> {
        match time::timeout(timeout, self.rx.recv()).await {
            Err(_elapsed) => Ok(None),
            Ok(Some(item)) => item.map(Some),
            Ok(None) => Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "device disconnected",
            )),
        }
    }
}

struct MockWriter {
    state: Arc<Mutex<MockState>>,
    severed: Arc<AtomicBool>,
    _guard: Arc<LinkGuard>,
}

#[async_trait]
impl LineWrite for MockWriter {
    async fn write_line(&mut self, line: &str) -> io::Result<()> {
        let mut st = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if self.severed.load(Ordering::SeqCst) {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "device disconnected",
            ));
        }
        if st.write_failures > 0 {
            st.write_failures -= 1;
            return Err(io::Error::new(io::ErrorKind::TimedOut, "write timed out"));
        }
        st.writes.push(line.to_string());
        Ok(())
    }
}
