//! `heartlink` binary: runs the agent until the process is asked to terminate.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use heartlink::{Agent, Config, Connector, LogWriter, SerialConnector, Subscribe};

/// Keeps a heartbeat link to a serial device and acts on its shutdown commands
#[derive(Parser, Debug)]
#[command(name = "heartlink")]
#[command(version)]
#[command(about = "Serial heartbeat agent with device-driven shutdown", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Override the serial port (e.g. COM5, /dev/ttyUSB0)
    #[arg(long, short = 'p')]
    port: Option<String>,

    /// Override the baud rate
    #[arg(long, short = 'b')]
    baud: Option<u32>,

    /// Append log lines to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Do not print events to stdout
    #[arg(long, short = 'q')]
    quiet: bool,

    /// Print the available serial ports and exit
    #[arg(long)]
    list_ports: bool,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<(Config, bool)> {
        let mut cfg = match &self.config {
            Some(path) => Config::load(path)
                .with_context(|| format!("loading configuration from {}", path.display()))?,
            None => Config::default(),
        };
        if let Some(port) = self.port {
            cfg.port = port;
        }
        if let Some(baud) = self.baud {
            cfg.baud = baud;
        }
        if self.log_file.is_some() {
            cfg.log_file = self.log_file;
        }
        cfg.validate().context("invalid configuration")?;
        Ok((cfg, self.quiet))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.list_ports {
        for port in SerialConnector::new().available_ports().await? {
            println!("{port}");
        }
        return Ok(());
    }

    let (cfg, quiet) = cli.into_config()?;
    let mut subscribers: Vec<Arc<dyn Subscribe>> = Vec::new();
    if !quiet {
        subscribers.push(Arc::new(LogWriter::new()));
    }

    let mut agent = Agent::builder(cfg).with_subscribers(subscribers).build()?;
    agent.start()?;

    heartlink::wait_for_shutdown_signal()
        .await
        .context("installing signal handlers")?;

    agent.stop().await?;
    Ok(())
}
