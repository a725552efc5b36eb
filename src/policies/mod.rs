//! Reconnect and repeat-request policies.
//!
//! ## Contents
//! - [`BackoffPolicy`] how long the link supervisor waits before retrying (first / factor / max + jitter)
//! - [`JitterPolicy`]  randomization applied to the backoff delay
//! - [`RepeatPolicy`]  what a second `request_shutdown` does while a countdown is running
//!
//! ## Defaults
//! - `BackoffPolicy::default()` → constant 30s, no jitter.
//! - `RepeatPolicy::Replace` → the running countdown is cancelled and a fresh one starts.

mod backoff;
mod jitter;
mod repeat;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
pub use repeat::RepeatPolicy;
