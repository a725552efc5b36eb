//! OS shutdown primitive.
//!
//! [`PowerControl`] is the seam between the shutdown workflow and the host.
//! [`SystemPower`] launches the platform's shutdown command as a detached
//! child process: no shell, no console window, not awaited.

use std::process::{Command, Stdio};

use crate::error::ShutdownError;

/// Powers the host off.
pub trait PowerControl: Send + Sync + 'static {
    /// Starts the host shutdown. Must return promptly (fire-and-forget).
    fn power_off(&self) -> Result<(), ShutdownError>;
}

/// Launches the operating system's shutdown command.
///
/// - Windows: `shutdown /s /t 0`, created without a console window.
/// - Elsewhere: `shutdown -h now`.
#[derive(Debug, Clone)]
pub struct SystemPower {
    program: String,
    args: Vec<String>,
}

impl Default for SystemPower {
    #[cfg(windows)]
    fn default() -> Self {
        Self::with_command("shutdown", ["/s", "/t", "0"])
    }

    #[cfg(not(windows))]
    fn default() -> Self {
        Self::with_command("shutdown", ["-h", "now"])
    }
}

impl SystemPower {
    /// Uses a custom program instead of the platform default.
    pub fn with_command<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Program that will be launched.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments passed to the program.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            const CREATE_NO_WINDOW: u32 = 0x0800_0000;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }
        cmd
    }
}

impl PowerControl for SystemPower {
    fn power_off(&self) -> Result<(), ShutdownError> {
        // The child is intentionally not waited on.
        self.command()
            .spawn()
            .map(drop)
            .map_err(|e| ShutdownError::LaunchFailure {
                program: self.program.clone(),
                error: e.to_string(),
            })
    }
}
