//! # Line listener: the receive side of an open connection.
//!
//! One listener task runs per connection. It polls the [`LineReader`] with the
//! I/O timeout and pushes every received line onto the processor queue, which
//! decouples I/O from command handling.
//!
//! Read errors are queued too (the processor logs them) and the listener keeps
//! reading after a short pause that grows with consecutive failures. It only stops
//! on cancellation, on a final error ([`LinkError::Closed`]) or when the processor
//! queue is gone. A truly dead link is detected by the supervisor's heartbeat write,
//! which reopens the port and spawns a fresh listener.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::channel::LineReader;
use crate::error::LinkError;

/// Item delivered to the command processor.
pub(crate) type Inbound = Result<String, LinkError>;

/// Cap on the pause after consecutive read failures, in read timeouts.
const MAX_FAILURE_PAUSE: u32 = 8;

/// Spawns the listener for one connection.
///
/// Stops when `token` is cancelled, the channel is closed, or the processor queue
/// is gone.
pub(crate) fn spawn_listener(
    reader: LineReader,
    timeout: Duration,
    tx: mpsc::Sender<Inbound>,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut failures = 0u32;
        loop {
            let res = tokio::select! {
                _ = token.cancelled() => break,
                res = reader.read_line(timeout) => res,
            };
            match res {
                Ok(Some(line)) => {
                    failures = 0;
                    if tx.send(Ok(line)).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) if !e.is_transient() => break,
                Err(e) => {
                    failures = failures.saturating_add(1);
                    if tx.send(Err(e)).await.is_err() {
                        break;
                    }
                    let pause = timeout * failures.min(MAX_FAILURE_PAUSE);
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = time::sleep(pause) => {}
                    }
                }
            }
        }
    })
}
