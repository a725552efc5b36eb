//! Inbound command parsing.
//!
//! The device sends newline-terminated ASCII lines. A line is trimmed and
//! matched case-insensitively against the known commands; anything else is
//! data, not an error.

use std::fmt;

/// Command sent by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Start (or restart) the shutdown countdown.
    RequestShutdown,
    /// Cancel the running countdown, if any.
    CancelShutdown,
}

impl Command {
    /// Wire form of the command.
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::RequestShutdown => "request_shutdown",
            Command::CancelShutdown => "cancel_shutdown",
        }
    }

    /// Parses a raw line. Returns `None` for empty or unrecognized input.
    ///
    /// # Example
    /// ```
    /// use heartlink::Command;
    ///
    /// assert_eq!(Command::parse("  REQUEST_shutdown\r\n"), Some(Command::RequestShutdown));
    /// assert_eq!(Command::parse("hello"), None);
    /// ```
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        [Command::RequestShutdown, Command::CancelShutdown]
            .into_iter()
            .find(|cmd| line.eq_ignore_ascii_case(cmd.as_str()))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
