#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use heartlink::channel::mock::MockConnector;
use heartlink::{Agent, Config, Event, EventKind, PowerControl, ShutdownError};
use tokio::sync::broadcast;

pub const PORT: &str = "COM5";

/// Power control that only counts calls.
#[derive(Default)]
pub struct CountingPower {
    calls: AtomicUsize,
}

impl CountingPower {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PowerControl for CountingPower {
    fn power_off(&self) -> Result<(), ShutdownError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct Fixture {
    pub agent: Agent,
    pub mock: MockConnector,
    pub power: Arc<CountingPower>,
    pub events: broadcast::Receiver<Event>,
}

pub fn config() -> Config {
    Config {
        port: PORT.into(),
        ..Config::default()
    }
}

/// Builds and starts an agent over `mock`; events are captured from before start.
pub fn start(mock: MockConnector, cfg: Config) -> Fixture {
    let power = Arc::new(CountingPower::default());
    let mut agent = Agent::builder(cfg)
        .with_connector(Arc::new(mock.clone()))
        .with_power(power.clone())
        .build()
        .expect("valid config");
    let events = agent.subscribe();
    agent.start().expect("first start");
    Fixture {
        agent,
        mock,
        power,
        events,
    }
}

pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}

pub fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut out = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        out.push(ev);
    }
    out
}

pub fn count(events: &[Event], kind: EventKind) -> usize {
    events.iter().filter(|e| e.kind == kind).count()
}
