use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use heartlink::channel::mock::MockConnector;
use heartlink::{Agent, Config, JitterPolicy, RepeatPolicy};

#[test]
fn loads_every_recognized_key_from_a_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
port = "/dev/ttyACM0"
baud = 57600
heartbeat_interval_s = 3
retry_backoff_s = 10
shutdown_delay_s = 45
io_timeout_ms = 250
backoff_factor = 2.0
backoff_max_s = 120
jitter = "full"
on_repeat_request = "ignore"
log_file = "agent.log"
grace_s = 2
"#
    )
    .unwrap();

    let cfg = Config::load(file.path()).unwrap();
    assert_eq!(cfg.port, "/dev/ttyACM0");
    assert_eq!(cfg.baud, 57_600);
    assert_eq!(cfg.heartbeat_interval, Duration::from_secs(3));
    assert_eq!(cfg.retry_backoff, Duration::from_secs(10));
    assert_eq!(cfg.shutdown_delay, Duration::from_secs(45));
    assert_eq!(cfg.shutdown_steps(), 45);
    assert_eq!(cfg.io_timeout, Duration::from_millis(250));
    assert_eq!(cfg.backoff().max, Duration::from_secs(120));
    assert_eq!(cfg.jitter, JitterPolicy::Full);
    assert_eq!(cfg.on_repeat_request, RepeatPolicy::Ignore);
    assert_eq!(cfg.log_file.as_deref(), Some(std::path::Path::new("agent.log")));
    assert_eq!(cfg.grace, Duration::from_secs(2));
}

#[test]
fn empty_file_means_defaults() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let cfg = Config::load(file.path()).unwrap();
    assert_eq!(cfg.baud, Config::default().baud);
    assert_eq!(cfg.port, heartlink::DEFAULT_PORT);
}

#[test]
fn missing_file_is_a_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Config::load(dir.path().join("absent.toml")).unwrap_err();
    assert_eq!(err.as_label(), "config_read");
}

#[tokio::test]
async fn log_file_receives_timestamped_lines() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("heartlink.log");
    let cfg = Config {
        port: "COM5".into(),
        log_file: Some(log.clone()),
        ..Config::default()
    };

    let mock = MockConnector::new("COM5").with_device();
    let mut agent = Agent::builder(cfg)
        .with_connector(Arc::new(mock))
        .build()
        .unwrap();
    agent.start().unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    agent.stop().await.unwrap();

    let content = std::fs::read_to_string(&log).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert!(lines.iter().any(|l| l.ends_with(" - Serial port COM5 opened.")));
    assert!(lines.iter().any(|l| l.ends_with(" - Sent: on")));
    assert!(lines.last().unwrap().ends_with(" - Service stopped cleanly."));

    // "YYYY-MM-DD HH:MM:SS - "
    let first = lines[0];
    assert_eq!(&first[4..5], "-");
    assert_eq!(&first[10..11], " ");
    assert_eq!(&first[19..22], " - ");
}

#[test]
fn shipped_example_config_is_valid() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("heartlink.example.toml");
    let cfg = Config::load(path).unwrap();
    assert_eq!(cfg.port, "COM5");
    assert_eq!(cfg.heartbeat_interval, Duration::from_secs(5));
    assert_eq!(cfg.retry_backoff, Duration::from_secs(30));
    assert_eq!(cfg.shutdown_delay, Duration::from_secs(30));
}
