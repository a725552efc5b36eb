//! # Repeat-request policy
//!
//! At most one shutdown countdown is active at a time. When another
//! `request_shutdown` arrives while one is counting down, the policy decides
//! what happens.
//!
//! - `Replace`: cancel the running countdown (it resolves to `Cancelled`) and start a fresh one.
//! - `Ignore`: keep the running countdown, drop the new request.

use serde::Deserialize;

/// How a new shutdown request is handled when a session is already active.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatPolicy {
    /// Stop the running countdown and restart from the full delay.
    ///
    /// The device asked again, so the latest request wins.
    #[default]
    Replace,

    /// Keep the running countdown; the repeated request is logged and dropped.
    Ignore,
}
