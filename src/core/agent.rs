//! # Agent: host lifecycle for the heartbeat link.
//!
//! [`Agent`] wires the pieces together and exposes the two hooks a service
//! manager needs: [`Agent::start`] (returns immediately) and [`Agent::stop`]
//! (returns once teardown is complete).
//!
//! ## Architecture
//! ```text
//! Agent::start()
//!   ├─► subscriber_listener: Bus ──► SubscriberSet (LogWriter, FileSink, ...)
//!   ├─► CommandProcessor::run(queue)          ◄── line queue ◄── listener task
//!   └─► LinkSupervisor::run(token)                                   ▲
//!           └─ owns LineChannel ─ spawns one listener per connection ┘
//!
//! Agent::stop()
//!   ├─► processor.close()          no new shutdown session from here on
//!   ├─► token.cancel()             supervisor exits at its next wait point
//!   ├─► await supervisor (grace)   connection closed and released
//!   ├─► await processor
//!   └─► flush subscribers
//! ```
//!
//! Countdowns already running are not cancelled by `stop`; only the device can
//! cancel a shutdown session.
//!
//! ## Example
//! ```no_run
//! use heartlink::{Agent, Config};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut agent = Agent::builder(Config::default()).build()?;
//! agent.start()?;
//! heartlink::wait_for_shutdown_signal().await?;
//! agent.stop().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::channel::Connector;
use crate::config::Config;
use crate::core::processor::CommandProcessor;
use crate::core::session::Outcome;
use crate::core::supervisor::{ConnectionState, LinkSupervisor};
use crate::core::workflow::ShutdownWorkflow;
use crate::error::AgentError;
use crate::events::{Bus, Event, EventKind};
use crate::power::{PowerControl, SystemPower};
use crate::subscribers::{FileSink, Subscribe, SubscriberSet};

/// Capacity of the queue between the line listener and the command processor.
const LINE_QUEUE: usize = 64;

/// Builder for constructing an [`Agent`].
pub struct AgentBuilder {
    cfg: Config,
    connector: Option<Arc<dyn Connector>>,
    power: Option<Arc<dyn PowerControl>>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl AgentBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            connector: None,
            power: None,
            subscribers: Vec::new(),
        }
    }

    /// Overrides the serial backend.
    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Overrides the OS shutdown primitive.
    pub fn with_power(mut self, power: Arc<dyn PowerControl>) -> Self {
        self.power = Some(power);
        self
    }

    /// Sets event subscribers.
    ///
    /// A [`FileSink`] is appended automatically when `log_file` is configured.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Validates the configuration and assembles the agent. Nothing is spawned yet.
    pub fn build(self) -> Result<Agent, AgentError> {
        self.cfg.validate()?;

        let connector = match self.connector {
            Some(c) => c,
            None => default_connector()?,
        };
        let power = self
            .power
            .unwrap_or_else(|| Arc::new(SystemPower::default()));

        let mut subscribers = self.subscribers;
        if let Some(path) = &self.cfg.log_file {
            subscribers.push(Arc::new(FileSink::new(path.clone())));
        }

        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let workflow = Arc::new(ShutdownWorkflow::new(
            self.cfg.shutdown_steps(),
            power,
            bus.clone(),
        ));
        let processor = Arc::new(CommandProcessor::new(
            workflow,
            self.cfg.on_repeat_request,
            bus.clone(),
        ));
        let (state_tx, state_rx) = watch::channel(ConnectionState::Searching);

        Ok(Agent {
            cfg: self.cfg,
            bus,
            connector,
            processor,
            subscribers,
            state_tx: Some(state_tx),
            state_rx,
            running: None,
        })
    }
}

#[cfg(feature = "serial")]
fn default_connector() -> Result<Arc<dyn Connector>, AgentError> {
    Ok(Arc::new(crate::channel::SerialConnector::new()))
}

#[cfg(not(feature = "serial"))]
fn default_connector() -> Result<Arc<dyn Connector>, AgentError> {
    Err(AgentError::NoConnector)
}

/// Tasks spawned by [`Agent::start`].
struct Running {
    token: CancellationToken,
    supervisor: JoinHandle<()>,
    processor: JoinHandle<()>,
    events_token: CancellationToken,
    events: JoinHandle<()>,
}

/// Serial heartbeat agent.
///
/// Single-use: once stopped it cannot be started again.
pub struct Agent {
    cfg: Config,
    bus: Bus,
    connector: Arc<dyn Connector>,
    processor: Arc<CommandProcessor>,
    subscribers: Vec<Arc<dyn Subscribe>>,
    state_tx: Option<watch::Sender<ConnectionState>>,
    state_rx: watch::Receiver<ConnectionState>,
    running: Option<Running>,
}

impl Agent {
    /// Starts building an agent.
    pub fn builder(cfg: Config) -> AgentBuilder {
        AgentBuilder::new(cfg)
    }

    /// Spawns the supervisor, processor and subscriber tasks and returns immediately.
    ///
    /// Must be called within a tokio runtime.
    pub fn start(&mut self) -> Result<(), AgentError> {
        if self.running.is_some() {
            return Err(AgentError::AlreadyRunning);
        }
        let state_tx = self.state_tx.take().ok_or(AgentError::Stopped)?;

        let events_token = CancellationToken::new();
        let events = self.subscriber_listener(events_token.clone());
        self.bus
            .publish(Event::new(EventKind::AgentStarting).with_port(self.cfg.port.as_str()));

        let token = CancellationToken::new();
        let (tx, rx) = mpsc::channel(LINE_QUEUE);
        let processor = tokio::spawn(Arc::clone(&self.processor).run(rx, token.clone()));

        let supervisor = LinkSupervisor::new(
            &self.cfg,
            Arc::clone(&self.connector),
            self.bus.clone(),
            tx,
            state_tx,
        );
        let supervisor = tokio::spawn(supervisor.run(token.clone()));

        self.running = Some(Running {
            token,
            supervisor,
            processor,
            events_token,
            events,
        });
        Ok(())
    }

    /// Tears the agent down and returns once the port is released.
    ///
    /// No shutdown session can start once this is called. Returns
    /// [`AgentError::StopTimeout`] if the supervisor missed the grace period;
    /// it is aborted in that case.
    pub async fn stop(&mut self) -> Result<(), AgentError> {
        let mut running = self.running.take().ok_or(AgentError::NotRunning)?;
        self.bus.publish(Event::new(EventKind::AgentStopping));
        self.processor.close();
        running.token.cancel();

        let grace = self.cfg.grace;
        let mut result = match time::timeout(grace, &mut running.supervisor).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(AgentError::Join(e.to_string())),
            Err(_elapsed) => {
                running.supervisor.abort();
                Err(AgentError::StopTimeout { grace })
            }
        };
        if let Err(e) = running.processor.await {
            if result.is_ok() {
                result = Err(AgentError::Join(e.to_string()));
            }
        }

        self.bus.publish(Event::new(EventKind::AgentStopped));
        running.events_token.cancel();
        let _ = running.events.await;
        result
    }

    /// Subscribes to the bus and forwards events to the subscriber set.
    ///
    /// On `token` the backlog is delivered and the subscriber queues are drained.
    fn subscriber_listener(&mut self, token: CancellationToken) -> JoinHandle<()> {
        let mut rx = self.bus.subscribe();
        let set = SubscriberSet::new(std::mem::take(&mut self.subscribers), self.bus.clone());
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    res = rx.recv() => match res {
                        Ok(ev) => set.emit(&ev),
                        Err(RecvError::Lagged(_)) => continue,
                        Err(RecvError::Closed) => break,
                    },
                    _ = token.cancelled() => break,
                }
            }
            set.shutdown().await;
        })
    }

    /// True between `start` and `stop`.
    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Receiver notified on every connection state change.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Receiver for all events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// True while a shutdown countdown is running.
    pub fn is_shutdown_pending(&self) -> bool {
        self.processor.is_shutdown_pending()
    }

    /// Waits for the most recent shutdown session and returns its outcome.
    ///
    /// The countdown stays cancellable while awaited. Returns `None` if no session
    /// was ever started.
    pub async fn wait_shutdown(&self) -> Option<Outcome> {
        self.processor.wait_session().await
    }

    /// Configuration the agent was built with.
    pub fn config(&self) -> &Config {
        &self.cfg
    }
}

impl Drop for Agent {
    fn drop(&mut self) {
        if let Some(running) = &self.running {
            running.token.cancel();
            running.events_token.cancel();
        }
    }
}
