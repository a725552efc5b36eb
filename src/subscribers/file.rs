//! # FileSink: durable log file
//!
//! Appends one timestamped line per [`Event`] to a file:
//!
//! ```text
//! 2026-10-19 14:03:11 - Serial port COM5 opened.
//! 2026-10-19 14:03:11 - Sent: on
//! ```
//!
//! The file is opened in append mode for every line so it can be rotated or
//! deleted while the agent runs. Any failure (locked file, missing directory,
//! full disk) is swallowed: logging never crashes the agent.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Local};
use tokio::io::AsyncWriteExt;

use crate::events::Event;
use crate::subscribers::Subscribe;

/// Timestamp layout of every line.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Append-only file subscriber.
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    /// Creates a sink appending to `path`. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Target file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Formats the line written for `ev` (including the trailing newline).
    pub fn format_line(ev: &Event) -> String {
        let at: DateTime<Local> = ev.at.into();
        format!("{} - {}\n", at.format(TIMESTAMP_FORMAT), ev.message())
    }

    async fn append(&self, line: &str) -> std::io::Result<()> {
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await
    }
}

#[async_trait]
impl Subscribe for FileSink {
    async fn on_event(&self, ev: &Event) {
        let _ = self.append(&Self::format_line(ev)).await;
    }

    fn name(&self) -> &'static str {
        "FileSink"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[tokio::test]
    async fn appends_timestamped_lines() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path().join("agent.log"));

        sink.on_event(&Event::new(EventKind::AgentStarting)).await;
        sink.on_event(&Event::new(EventKind::PortOpened).with_port("COM5"))
            .await;

        let content = std::fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" - Service starting..."));
        assert!(lines[1].ends_with(" - Serial port COM5 opened."));
        // "YYYY-MM-DD HH:MM:SS" prefix
        assert_eq!(lines[0].find(" - "), Some(19));
    }

    #[tokio::test]
    async fn unwritable_path_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path().join("missing").join("agent.log"));
        sink.on_event(&Event::new(EventKind::AgentStarting)).await;
        assert!(!sink.path().exists());
    }
}
