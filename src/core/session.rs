//! # Shutdown session: one cancellable shutdown request.
//!
//! A [`ShutdownSession`] is created per accepted `request_shutdown` and carries
//! its own [`CancellationToken`]. The token is independent of the agent-wide one:
//! stopping the agent never cancels a countdown, only `cancel_shutdown` (or a
//! superseding request) does.

use std::fmt;

use tokio_util::sync::CancellationToken;

/// Terminal result of a shutdown session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The countdown reached zero and the OS shutdown primitive was launched.
    Executed,
    /// Cancellation was observed before the final action.
    Cancelled,
    /// The OS shutdown primitive could not be launched.
    Failed,
}

impl Outcome {
    /// Short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            Outcome::Executed => "executed",
            Outcome::Cancelled => "cancelled",
            Outcome::Failed => "failed",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// A pending host-shutdown request.
///
/// Cheap to clone; clones share the cancellation flag.
#[derive(Debug, Clone)]
pub struct ShutdownSession {
    id: u64,
    token: CancellationToken,
}

impl ShutdownSession {
    /// Creates an uncancelled session.
    pub fn new(id: u64) -> Self {
        Self {
            id,
            token: CancellationToken::new(),
        }
    }

    /// Session id, unique within one agent.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// True once [`cancel`](Self::cancel) was called.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes when the session is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_cancellation() {
        let s = ShutdownSession::new(7);
        let c = s.clone();
        assert!(!c.is_cancelled());
        s.cancel();
        s.cancel();
        assert!(c.is_cancelled());
        assert_eq!(c.id(), 7);
    }
}
