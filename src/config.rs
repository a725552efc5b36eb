//! # Agent configuration.
//!
//! Provides [`Config`], the settings for the link supervisor, the command
//! processor and the shutdown workflow.
//!
//! Config is used in two ways:
//! 1. **Defaults**: `Config::default()` matches the device firmware (115200 baud, 5s heartbeat,
//!    30s reconnect backoff, 30s shutdown countdown).
//! 2. **File**: `Config::load(path)` reads a TOML file; missing keys keep their defaults.
//!
//! ## File format
//! ```toml
//! port = "COM5"
//! baud = 115200
//! heartbeat_interval_s = 5
//! retry_backoff_s = 30
//! shutdown_delay_s = 30
//! # optional
//! io_timeout_ms = 500
//! backoff_factor = 1.0
//! backoff_max_s = 30
//! jitter = "none"            # none | full | equal
//! on_repeat_request = "replace" # replace | ignore
//! log_file = "heartlink.log"
//! grace_s = 5
//! ```
//!
//! Unknown keys are rejected so typos do not silently fall back to defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::policies::{BackoffPolicy, JitterPolicy, RepeatPolicy};

/// Port used when none is configured.
#[cfg(windows)]
pub const DEFAULT_PORT: &str = "COM5";
/// Port used when none is configured.
#[cfg(not(windows))]
pub const DEFAULT_PORT: &str = "/dev/ttyUSB0";

/// Agent configuration.
///
/// ## Field semantics
/// - `port`: device identifier as reported by port enumeration
/// - `baud`: bit rate of the serial link
/// - `heartbeat_interval`: pause between two heartbeats while connected
/// - `retry_backoff`: wait after a missing device, failed open or failed write
/// - `shutdown_delay`: countdown length, ticked in one-second steps
/// - `io_timeout`: bound for a single read or write
#[derive(Clone, Debug)]
pub struct Config {
    /// Target port name (`COM5`, `/dev/ttyUSB0`, ...).
    pub port: String,

    /// Baud rate.
    pub baud: u32,

    /// Heartbeat cadence while connected.
    pub heartbeat_interval: Duration,

    /// First reconnect delay; also the constant delay when `backoff_factor == 1.0`.
    pub retry_backoff: Duration,

    /// Growth factor for consecutive reconnect failures.
    pub backoff_factor: f64,

    /// Cap for the reconnect delay.
    pub backoff_max: Duration,

    /// Randomization of the reconnect delay.
    pub jitter: JitterPolicy,

    /// Shutdown countdown length.
    pub shutdown_delay: Duration,

    /// Read and write timeout of the serial port.
    pub io_timeout: Duration,

    /// Literal heartbeat line (without the newline).
    pub heartbeat_payload: String,

    /// What a repeated `request_shutdown` does during a countdown.
    pub on_repeat_request: RepeatPolicy,

    /// Capacity of the event bus ring buffer (min 1).
    pub bus_capacity: usize,

    /// Optional log file appended to by [`FileSink`](crate::FileSink).
    pub log_file: Option<PathBuf>,

    /// How long `Agent::stop` waits for the supervisor loop to exit.
    pub grace: Duration,
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `port = DEFAULT_PORT`, `baud = 115200`
    /// - `heartbeat_interval = 5s`, payload `"on"`
    /// - `retry_backoff = 30s` constant, no jitter
    /// - `shutdown_delay = 30s`
    /// - `io_timeout = 500ms`
    /// - `on_repeat_request = Replace`
    /// - `grace = 5s`
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT.to_string(),
            baud: 115_200,
            heartbeat_interval: Duration::from_secs(5),
            retry_backoff: Duration::from_secs(30),
            backoff_factor: 1.0,
            backoff_max: Duration::from_secs(30),
            jitter: JitterPolicy::None,
            shutdown_delay: Duration::from_secs(30),
            io_timeout: Duration::from_millis(500),
            heartbeat_payload: "on".to_string(),
            on_repeat_request: RepeatPolicy::Replace,
            bus_capacity: 1024,
            log_file: None,
            grace: Duration::from_secs(5),
        }
    }
}

/// On-disk representation; every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    port: Option<String>,
    baud: Option<u32>,
    heartbeat_interval_s: Option<u64>,
    retry_backoff_s: Option<u64>,
    shutdown_delay_s: Option<u64>,
    io_timeout_ms: Option<u64>,
    backoff_factor: Option<f64>,
    backoff_max_s: Option<u64>,
    jitter: Option<JitterPolicy>,
    on_repeat_request: Option<RepeatPolicy>,
    bus_capacity: Option<usize>,
    log_file: Option<PathBuf>,
    grace_s: Option<u64>,
}

impl Config {
    /// Reads and validates a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses and validates TOML content; absent keys keep their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: FileConfig = toml::from_str(content)?;
        let mut cfg = Config::default();

        if let Some(port) = file.port {
            cfg.port = port;
        }
        if let Some(baud) = file.baud {
            cfg.baud = baud;
        }
        if let Some(s) = file.heartbeat_interval_s {
            cfg.heartbeat_interval = Duration::from_secs(s);
        }
        if let Some(s) = file.retry_backoff_s {
            cfg.retry_backoff = Duration::from_secs(s);
            // Keep a constant backoff unless a cap is given explicitly.
            if file.backoff_max_s.is_none() {
                cfg.backoff_max = cfg.backoff_max.max(cfg.retry_backoff);
            }
        }
        if let Some(s) = file.shutdown_delay_s {
            cfg.shutdown_delay = Duration::from_secs(s);
        }
        if let Some(ms) = file.io_timeout_ms {
            cfg.io_timeout = Duration::from_millis(ms);
        }
        if let Some(f) = file.backoff_factor {
            cfg.backoff_factor = f;
        }
        if let Some(s) = file.backoff_max_s {
            cfg.backoff_max = Duration::from_secs(s);
        }
        if let Some(j) = file.jitter {
            cfg.jitter = j;
        }
        if let Some(p) = file.on_repeat_request {
            cfg.on_repeat_request = p;
        }
        if let Some(c) = file.bus_capacity {
            cfg.bus_capacity = c;
        }
        if let Some(s) = file.grace_s {
            cfg.grace = Duration::from_secs(s);
        }
        cfg.log_file = file.log_file;

        cfg.validate()?;
        Ok(cfg)
    }

    /// Rejects values the agent cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(field: &'static str, reason: &str) -> ConfigError {
            ConfigError::Invalid {
                field,
                reason: reason.to_string(),
            }
        }

        if self.port.trim().is_empty() {
            return Err(invalid("port", "must not be empty"));
        }
        if self.baud == 0 {
            return Err(invalid("baud", "must be greater than zero"));
        }
        if self.heartbeat_interval.is_zero() {
            return Err(invalid("heartbeat_interval_s", "must be greater than zero"));
        }
        if self.retry_backoff.is_zero() {
            return Err(invalid("retry_backoff_s", "must be greater than zero"));
        }
        if self.shutdown_delay.as_secs() == 0 {
            return Err(invalid("shutdown_delay_s", "must be at least one second"));
        }
        if self.io_timeout.is_zero() {
            return Err(invalid("io_timeout_ms", "must be greater than zero"));
        }
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(invalid("backoff_factor", "must be a finite number >= 1.0"));
        }
        if self.heartbeat_payload.contains('\n') {
            return Err(invalid("heartbeat_payload", "must be a single line"));
        }
        Ok(())
    }

    /// Reconnect policy derived from the backoff fields.
    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy {
            first: self.retry_backoff,
            max: self.backoff_max.max(self.retry_backoff),
            factor: self.backoff_factor,
            jitter: self.jitter,
        }
    }

    /// Number of one-second countdown steps.
    #[inline]
    pub fn shutdown_steps(&self) -> u64 {
        self.shutdown_delay.as_secs()
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_firmware() {
        let cfg = Config::default();
        assert_eq!(cfg.baud, 115_200);
        assert_eq!(cfg.heartbeat_interval, Duration::from_secs(5));
        assert_eq!(cfg.retry_backoff, Duration::from_secs(30));
        assert_eq!(cfg.shutdown_delay, Duration::from_secs(30));
        assert_eq!(cfg.io_timeout, Duration::from_millis(500));
        assert_eq!(cfg.heartbeat_payload, "on");
        assert_eq!(cfg.backoff(), BackoffPolicy::constant(Duration::from_secs(30)));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn recognized_keys_override_defaults() {
        let cfg = Config::from_toml_str(
            r#"
            port = "COM7"
            baud = 9600
            heartbeat_interval_s = 2
            retry_backoff_s = 10
            shutdown_delay_s = 60
            "#,
        )
        .unwrap();
        assert_eq!(cfg.port, "COM7");
        assert_eq!(cfg.baud, 9600);
        assert_eq!(cfg.heartbeat_interval, Duration::from_secs(2));
        assert_eq!(cfg.shutdown_delay, Duration::from_secs(60));
        assert_eq!(cfg.backoff().next(3), Duration::from_secs(10));
    }

    #[test]
    fn retry_backoff_above_default_cap_stays_constant() {
        let cfg = Config::from_toml_str("retry_backoff_s = 45").unwrap();
        assert_eq!(cfg.backoff().next(0), Duration::from_secs(45));
        assert_eq!(cfg.backoff().next(5), Duration::from_secs(45));
    }

    #[test]
    fn optional_policies_parse() {
        let cfg = Config::from_toml_str(
            r#"
            jitter = "equal"
            on_repeat_request = "ignore"
            backoff_factor = 2.0
            backoff_max_s = 300
            "#,
        )
        .unwrap();
        assert_eq!(cfg.jitter, JitterPolicy::Equal);
        assert_eq!(cfg.on_repeat_request, RepeatPolicy::Ignore);
        assert_eq!(cfg.backoff().max, Duration::from_secs(300));
    }

    #[test]
    fn unknown_key_is_rejected() {
        let err = Config::from_toml_str("prot = \"COM5\"").unwrap_err();
        assert_eq!(err.as_label(), "config_parse");
    }

    #[test]
    fn zero_interval_is_rejected() {
        let err = Config::from_toml_str("heartbeat_interval_s = 0").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "heartbeat_interval_s",
                ..
            }
        ));
    }

    #[test]
    fn zero_shutdown_delay_is_rejected() {
        let err = Config::from_toml_str("shutdown_delay_s = 0").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "shutdown_delay_s",
                ..
            }
        ));

        let cfg = Config {
            shutdown_delay: Duration::from_millis(500),
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn empty_port_is_rejected() {
        let err = Config::from_toml_str("port = \"  \"").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "port", .. }));
    }
}
