//! # Shutdown workflow: countdown and OS shutdown.
//!
//! [`ShutdownWorkflow::run`] counts down in one-second steps, publishing the
//! remaining seconds at every step. Cancellation is checked before each step and
//! once more before the final action, so a cancel signalled at the start of the
//! last step still yields [`Outcome::Cancelled`].
//!
//! ```text
//! for remaining in steps..=1:
//!     cancelled? ──yes──► ShutdownCancelled ──► Cancelled
//!     ShutdownTick(remaining)
//!     select! { sleep(tick), session.cancelled() }
//! cancelled? ──yes──► Cancelled
//! power_off() ──ok──► ShutdownExecuted ──► Executed
//!             └─err─► ShutdownFailed   ──► Failed   (not retried)
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::time;

use crate::core::session::{Outcome, ShutdownSession};
use crate::events::{Bus, Event, EventKind};
use crate::power::PowerControl;

/// Cancellable countdown ending in the OS shutdown primitive.
pub struct ShutdownWorkflow {
    steps: u64,
    tick: Duration,
    power: Arc<dyn PowerControl>,
    bus: Bus,
}

impl ShutdownWorkflow {
    /// Creates a workflow of `steps` one-second steps.
    pub fn new(steps: u64, power: Arc<dyn PowerControl>, bus: Bus) -> Self {
        Self {
            steps,
            tick: Duration::from_secs(1),
            power,
            bus,
        }
    }

    /// Runs the countdown for `session` and resolves to its terminal outcome.
    ///
    /// Never panics or propagates errors; launch failures resolve to [`Outcome::Failed`].
    pub async fn run(&self, session: &ShutdownSession) -> Outcome {
        for done in 0..self.steps {
            if session.is_cancelled() {
                return self.cancelled(session);
            }
            self.bus.publish(
                Event::new(EventKind::ShutdownTick)
                    .with_session(session.id())
                    .with_remaining(self.steps - done),
            );
            tokio::select! {
                _ = time::sleep(self.tick) => {}
                _ = session.cancelled() => {}
            }
        }
        if session.is_cancelled() {
            return self.cancelled(session);
        }

        match self.power.power_off() {
            Ok(()) => {
                self.bus
                    .publish(Event::new(EventKind::ShutdownExecuted).with_session(session.id()));
                Outcome::Executed
            }
            Err(e) => {
                self.bus.publish(
                    Event::new(EventKind::ShutdownFailed)
                        .with_session(session.id())
                        .with_reason(e.to_string()),
                );
                Outcome::Failed
            }
        }
    }

    fn cancelled(&self, session: &ShutdownSession) -> Outcome {
        self.bus
            .publish(Event::new(EventKind::ShutdownCancelled).with_session(session.id()));
        Outcome::Cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ShutdownError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingPower {
        calls: AtomicUsize,
        fail: bool,
    }

    impl PowerControl for CountingPower {
        fn power_off(&self) -> Result<(), ShutdownError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ShutdownError::LaunchFailure {
                    program: "shutdown".into(),
                    error: "not found".into(),
                });
            }
            Ok(())
        }
    }

    fn ticks(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<u64> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            if ev.kind == EventKind::ShutdownTick {
                out.extend(ev.remaining_s);
            }
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn full_countdown_powers_off_once() {
        let bus = Bus::new(128);
        let mut rx = bus.subscribe();
        let power = Arc::new(CountingPower::default());
        let wf = ShutdownWorkflow::new(30, power.clone(), bus);

        let started = time::Instant::now();
        let outcome = wf.run(&ShutdownSession::new(1)).await;

        assert_eq!(outcome, Outcome::Executed);
        assert_eq!(power.calls.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() >= Duration::from_secs(30));
        assert!(started.elapsed() < Duration::from_secs(31));
        let ticks = ticks(&mut rx);
        assert_eq!(ticks.len(), 30);
        assert_eq!(ticks.first(), Some(&30));
        assert_eq!(ticks.last(), Some(&1));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_mid_countdown_never_powers_off() {
        let power = Arc::new(CountingPower::default());
        let wf = Arc::new(ShutdownWorkflow::new(30, power.clone(), Bus::new(128)));
        let session = ShutdownSession::new(1);

        let run = {
            let wf = Arc::clone(&wf);
            let session = session.clone();
            tokio::spawn(async move { wf.run(&session).await })
        };
        time::sleep(Duration::from_secs(5)).await;
        session.cancel();

        assert_eq!(run.await.unwrap(), Outcome::Cancelled);
        assert_eq!(power.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_at_last_step_is_cancelled() {
        let bus = Bus::new(128);
        let mut rx = bus.subscribe();
        let power = Arc::new(CountingPower::default());
        let wf = Arc::new(ShutdownWorkflow::new(30, power.clone(), bus));
        let session = ShutdownSession::new(1);

        let run = {
            let wf = Arc::clone(&wf);
            let session = session.clone();
            tokio::spawn(async move { wf.run(&session).await })
        };
        // Step 30 starts at t=29s and its tick is published before the wait.
        time::sleep(Duration::from_millis(29_500)).await;
        session.cancel();

        assert_eq!(run.await.unwrap(), Outcome::Cancelled);
        assert_eq!(power.calls.load(Ordering::SeqCst), 0);
        assert_eq!(ticks(&mut rx).last(), Some(&1));
    }

    #[tokio::test(start_paused = true)]
    async fn pre_cancelled_session_does_nothing() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let power = Arc::new(CountingPower::default());
        let wf = ShutdownWorkflow::new(30, power.clone(), bus);
        let session = ShutdownSession::new(1);
        session.cancel();

        assert_eq!(wf.run(&session).await, Outcome::Cancelled);
        assert!(ticks(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn launch_failure_resolves_to_failed() {
        let bus = Bus::new(128);
        let mut rx = bus.subscribe();
        let power = Arc::new(CountingPower {
            fail: true,
            ..Default::default()
        });
        let wf = ShutdownWorkflow::new(2, power.clone(), bus);

        assert_eq!(wf.run(&ShutdownSession::new(3)).await, Outcome::Failed);
        assert_eq!(power.calls.load(Ordering::SeqCst), 1);

        let mut failed = None;
        while let Ok(ev) = rx.try_recv() {
            if ev.kind == EventKind::ShutdownFailed {
                failed = Some(ev);
            }
        }
        let failed = failed.expect("ShutdownFailed published");
        assert_eq!(failed.session, Some(3));
        assert!(failed.message().starts_with("Request shutdown failed: "));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_steps_powers_off_immediately() {
        let power = Arc::new(CountingPower::default());
        let wf = ShutdownWorkflow::new(0, power.clone(), Bus::new(16));
        assert_eq!(wf.run(&ShutdownSession::new(1)).await, Outcome::Executed);
        assert_eq!(power.calls.load(Ordering::SeqCst), 1);
    }
}
