//! Error types used by the heartlink agent.
//!
//! This module defines the error enums of the agent:
//!
//! - [`LinkError`]: failures of the serial link (discovery, open, I/O).
//! - [`ShutdownError`]: failures of the OS shutdown primitive.
//! - [`ConfigError`]: failures while loading or validating a [`Config`](crate::Config).
//! - [`AgentError`]: failures of the host lifecycle hooks and agent assembly.
//!
//! All of them provide `as_label` for logs. Link errors on a live connection are
//! transient: they are logged and retried. Only [`LinkError::Closed`] is final.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// # Errors produced by the serial link.
///
/// Every variant except [`Closed`](LinkError::Closed) is transient: it is logged
/// and the operation is retried (after the backoff for discovery, open and write).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LinkError {
    /// The configured port is not among the enumerable ports.
    #[error("{port} not found")]
    DeviceNotFound {
        /// Configured port name.
        port: String,
    },

    /// The port is present but could not be opened.
    #[error("failed to open {port}: {error}")]
    OpenFailure {
        /// Configured port name.
        port: String,
        /// Underlying error message.
        error: String,
    },

    /// A read or write on an open connection failed.
    #[error("{error}")]
    IoFailure {
        /// Underlying error message.
        error: String,
    },

    /// The handle was used after [`LineChannel::close`](crate::channel::LineChannel::close).
    #[error("serial port is closed")]
    Closed,
}

impl LinkError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use heartlink::LinkError;
    ///
    /// let err = LinkError::DeviceNotFound { port: "COM5".into() };
    /// assert_eq!(err.as_label(), "device_not_found");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            LinkError::DeviceNotFound { .. } => "device_not_found",
            LinkError::OpenFailure { .. } => "open_failure",
            LinkError::IoFailure { .. } => "io_failure",
            LinkError::Closed => "closed",
        }
    }

    /// Indicates whether retrying the same operation can succeed.
    ///
    /// `Closed` is final: the handle was released and will never work again.
    pub fn is_transient(&self) -> bool {
        !matches!(self, LinkError::Closed)
    }

    pub(crate) fn io(err: impl std::fmt::Display) -> Self {
        LinkError::IoFailure {
            error: err.to_string(),
        }
    }
}

/// # Errors produced by the OS shutdown primitive.
///
/// Terminal for the session that raised it; never retried.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ShutdownError {
    /// The shutdown command could not be launched.
    #[error("failed to launch `{program}`: {error}")]
    LaunchFailure {
        /// Program that failed to start.
        program: String,
        /// Underlying error message.
        error: String,
    },
}

impl ShutdownError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ShutdownError::LaunchFailure { .. } => "shutdown_launch_failure",
        }
    }
}

/// # Errors produced while loading configuration.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read {path}: {source}")]
    Read {
        /// Path of the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML or has unknown keys.
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of its accepted range.
    #[error("invalid value for `{field}`: {reason}")]
    Invalid {
        /// Offending key.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::Read { .. } => "config_read",
            ConfigError::Parse(_) => "config_parse",
            ConfigError::Invalid { .. } => "config_invalid",
        }
    }
}

/// # Errors produced by the host lifecycle hooks.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum AgentError {
    /// [`Agent::start`](crate::Agent::start) was called twice.
    #[error("agent is already running")]
    AlreadyRunning,

    /// [`Agent::stop`](crate::Agent::stop) was called before `start`.
    #[error("agent is not running")]
    NotRunning,

    /// [`Agent::start`](crate::Agent::start) was called after `stop`; an agent runs once.
    #[error("agent has been stopped")]
    Stopped,

    /// No connector was supplied and the `serial` feature is disabled.
    #[error("no connector configured")]
    NoConnector,

    /// The configuration handed to the builder is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The supervisor loop did not finish within the stop grace period.
    #[error("supervisor did not stop within {grace:?}")]
    StopTimeout {
        /// The grace period that was exceeded.
        grace: Duration,
    },

    /// A background task panicked.
    #[error("background task failed: {0}")]
    Join(String),
}

impl AgentError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            AgentError::AlreadyRunning => "agent_already_running",
            AgentError::NotRunning => "agent_not_running",
            AgentError::Stopped => "agent_stopped",
            AgentError::NoConnector => "agent_no_connector",
            AgentError::Config(e) => e.as_label(),
            AgentError::StopTimeout { .. } => "agent_stop_timeout",
            AgentError::Join(_) => "agent_join",
        }
    }
}
