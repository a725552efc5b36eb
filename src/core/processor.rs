//! # Command processor: received lines to shutdown sessions.
//!
//! [`CommandProcessor`] consumes the listener queue, logs every non-empty line
//! and drives shutdown sessions:
//!
//! - `request_shutdown`: starts a [`ShutdownSession`] running the
//!   [`ShutdownWorkflow`] on its own task (the caller is never blocked). If a
//!   session is already active the [`RepeatPolicy`] decides whether it is
//!   superseded or the request dropped.
//! - `cancel_shutdown`: cancels the active session; a no-op when there is none.
//!
//! ## Rules
//! - At most one active session; the slot is guarded by a mutex and the task
//!   handle of each session is tracked so replacement is deterministic.
//! - Waiting for an outcome never empties the slot: waiters observe a `watch`
//!   published by the session task, so cancel and replace keep working.
//! - After [`close`](CommandProcessor::close) no new session starts. Running
//!   countdowns are left alone.
//! - Parsing never fails: unknown text is logged and ignored.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::command::Command;
use crate::core::listener::Inbound;
use crate::core::session::{Outcome, ShutdownSession};
use crate::core::workflow::ShutdownWorkflow;
use crate::events::{Bus, Event, EventKind};
use crate::policies::RepeatPolicy;

/// The active session, the task running its countdown and its published outcome.
struct ActiveSession {
    session: ShutdownSession,
    handle: JoinHandle<()>,
    outcome: watch::Receiver<Option<Outcome>>,
}

impl ActiveSession {
    fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

/// Parses received lines and owns the single shutdown-session slot.
pub struct CommandProcessor {
    bus: Bus,
    workflow: Arc<ShutdownWorkflow>,
    repeat: RepeatPolicy,
    active: Mutex<Option<ActiveSession>>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

impl CommandProcessor {
    /// Creates a processor starting sessions on `workflow`.
    pub fn new(workflow: Arc<ShutdownWorkflow>, repeat: RepeatPolicy, bus: Bus) -> Self {
        Self {
            bus,
            workflow,
            repeat,
            active: Mutex::new(None),
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<ActiveSession>> {
        // The slot only holds plain data; a panic elsewhere cannot leave it half-written.
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Handles raw bytes delivered by the channel (lossy UTF-8).
    pub fn on_line_received(&self, raw: &[u8]) -> Option<Command> {
        self.handle_line(&String::from_utf8_lossy(raw))
    }

    /// Handles one received line. Returns the recognized command, if any.
    ///
    /// Blank lines are ignored silently; every other line is published as
    /// `LineReceived` before it is interpreted.
    pub fn handle_line(&self, line: &str) -> Option<Command> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        self.bus
            .publish(Event::new(EventKind::LineReceived).with_line(line));

        let cmd = Command::parse(line)?;
        match cmd {
            Command::RequestShutdown => {
                self.request_shutdown();
            }
            Command::CancelShutdown => self.cancel_shutdown(),
        }
        Some(cmd)
    }

    /// Starts a shutdown session, honoring the repeat policy.
    ///
    /// Returns the id of the started session, or `None` if the request was dropped.
    /// Must be called within a tokio runtime.
    pub fn request_shutdown(&self) -> Option<u64> {
        let mut slot = self.slot();

        if self.closed.load(Ordering::SeqCst) {
            self.bus.publish(
                Event::new(EventKind::ShutdownRequestIgnored).with_reason("agent is stopping"),
            );
            return None;
        }

        if let Some(active) = slot.as_ref().filter(|a| a.is_running()) {
            match self.repeat {
                RepeatPolicy::Ignore => {
                    self.bus.publish(
                        Event::new(EventKind::ShutdownRequestIgnored)
                            .with_session(active.session.id())
                            .with_reason("shutdown already pending"),
                    );
                    return None;
                }
                RepeatPolicy::Replace => active.session.cancel(),
            }
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let session = ShutdownSession::new(id);
        self.bus
            .publish(Event::new(EventKind::ShutdownRequested).with_session(id));

        let workflow = Arc::clone(&self.workflow);
        let run_session = session.clone();
        let (outcome_tx, outcome) = watch::channel(None);
        let handle = tokio::spawn(async move {
            let outcome = workflow.run(&run_session).await;
            outcome_tx.send_replace(Some(outcome));
        });

        *slot = Some(ActiveSession {
            session,
            handle,
            outcome,
        });
        Some(id)
    }

    /// Cancels the active session. No observable effect besides the log line when none is active.
    pub fn cancel_shutdown(&self) {
        let slot = self.slot();
        let active = slot.as_ref().filter(|a| a.is_running());

        let mut ev = Event::new(EventKind::CancelRequested);
        if let Some(a) = active {
            ev = ev.with_session(a.session.id());
        }
        self.bus.publish(ev);

        if let Some(a) = active {
            a.session.cancel();
        }
    }

    /// True while a countdown is running.
    pub fn is_shutdown_pending(&self) -> bool {
        self.slot()
            .as_ref()
            .is_some_and(|a| a.is_running() && !a.session.is_cancelled())
    }

    /// Id of the active session, if any.
    pub fn active_session(&self) -> Option<u64> {
        self.slot()
            .as_ref()
            .filter(|a| a.is_running())
            .map(|a| a.session.id())
    }

    /// Waits for the most recent session to finish and returns its outcome.
    ///
    /// The session stays in the slot while waiting, so it can still be cancelled or
    /// superseded. Returns `None` if no session was ever started or its task panicked.
    pub async fn wait_session(&self) -> Option<Outcome> {
        let mut outcome = self.slot().as_ref().map(|a| a.outcome.clone())?;
        let done = outcome.wait_for(Option::is_some).await.ok()?;
        *done
    }

    /// Refuses every later shutdown request.
    pub fn close(&self) {
        let _slot = self.slot();
        self.closed.store(true, Ordering::SeqCst);
    }

    /// True once [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Consumes the listener queue until `token` is cancelled or every sender is gone.
    pub async fn run(self: Arc<Self>, mut rx: mpsc::Receiver<Inbound>, token: CancellationToken) {
        loop {
            let item = tokio::select! {
                _ = token.cancelled() => break,
                item = rx.recv() => match item {
                    Some(item) => item,
                    None => break,
                },
            };
            match item {
                Ok(line) => {
                    self.handle_line(&line);
                }
                Err(e) => self
                    .bus
                    .publish(Event::new(EventKind::ReadFailed).with_reason(e.to_string())),
            }
        }
    }
}
