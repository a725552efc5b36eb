//! Agent core: connection management and the shutdown workflow.
//!
//! The only public entry point for hosts is [`Agent`]; the other types are
//! exposed for embedding and tests.
//!
//! Internal modules:
//! - [`supervisor`]: discovery, open/retry/backoff and the heartbeat loop;
//! - [`listener`]: reads lines from the open connection and queues them;
//! - [`processor`]: parses queued lines and drives shutdown sessions;
//! - [`session`]: one cancellable shutdown request and its outcome;
//! - [`workflow`]: the countdown ending in the OS shutdown primitive;
//! - [`agent`]: host lifecycle (`start` / `stop`) wiring everything together;
//! - [`signal`]: cross-platform termination signal handling for the binary.

mod agent;
mod listener;
mod processor;
mod session;
mod signal;
mod supervisor;
mod workflow;

pub use agent::{Agent, AgentBuilder};
pub use processor::CommandProcessor;
pub use session::{Outcome, ShutdownSession};
pub use signal::wait_for_shutdown_signal;
pub use supervisor::ConnectionState;
pub use workflow::ShutdownWorkflow;
