//! # Event subscribers.
//!
//! This module provides the [`Subscribe`] trait and the built-in log
//! subscribers. Subscribers are the agent's log sink collaborators: the core
//! only publishes [`Event`](crate::Event)s, subscribers decide where the lines go.
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   LinkSupervisor ── publish(Event) ──► Bus ──► subscriber_listener ──► SubscriberSet
//!                                                                          │
//!                                                              ┌───────────┼──────────┐
//!                                                              ▼           ▼          ▼
//!                                                          LogWriter   FileSink    Custom
//! ```
//!
//! ## Built-in subscribers
//! - [`LogWriter`] prints `[label] message` to stdout
//! - [`FileSink`] appends `YYYY-MM-DD HH:MM:SS - message` to a file; write failures are swallowed

mod file;
mod log;
mod set;
mod subscriber;

pub use file::FileSink;
pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscriber::Subscribe;
