use std::io::Write;
use std::time::Duration;

use tempfile::NamedTempFile;

use daemon_link::config::Config;
use daemon_link::error::{ConfigError, Error};

fn write_temp_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp config");
    file.write_all(contents.as_bytes()).expect("write temp config");
    file
}

#[test]
fn full_config_loads() {
    let file = write_temp_config(
        r#"
[server]
url = "wss://daemon.example.com/ws"
connect_timeout_ms = 5000

[reconnection]
initial_delay_ms = 500
max_delay_ms = 8000
backoff_multiplier = 1.5
jitter_ratio = 0.2
max_attempts = 10

[latency]
ping_interval_ms = 2000
ema_alpha = 0.3
healthy_below_ms = 50
degraded_below_ms = 250
max_missed_pongs = 3

[dedup]
window_ms = 10000
capacity = 200

[queue]
capacity = 50

[logging]
level = "debug"
format = "json"
"#,
    );

    let config = Config::load(file.path()).unwrap();

    assert_eq!(config.server.url, "wss://daemon.example.com/ws");
    assert_eq!(config.reconnection.max_attempts, 10);
    assert_eq!(config.latency.max_missed_pongs, Some(3));
    assert_eq!(config.dedup.capacity, 200);
    assert_eq!(config.logging.format, "json");

    let client = config.client_config();
    assert_eq!(client.connect_timeout, Duration::from_millis(5000));
    assert_eq!(client.queue.capacity, 50);
    assert_eq!(client.latency.ping_interval(), Duration::from_secs(2));
}

#[test]
fn missing_sections_fall_back_to_defaults() {
    let file = write_temp_config("[queue]\ncapacity = 7\n");

    let config = Config::load(file.path()).unwrap();

    assert_eq!(config.queue.capacity, 7);
    assert_eq!(config.reconnection.initial_delay_ms, 1000);
    assert_eq!(config.reconnection.max_delay_ms, 5000);
    assert_eq!(config.reconnection.max_attempts, 5);
    assert_eq!(config.latency.ping_interval_ms, 5000);
    assert_eq!(config.dedup.window_ms, 30_000);
    assert_eq!(config.dedup.capacity, 1000);
    assert_eq!(config.latency.max_missed_pongs, None);
}

#[test]
fn missing_file_is_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = Config::load(dir.path().join("absent.toml"));

    assert!(
        matches!(result, Err(Error::Config(ConfigError::ReadFile(_)))),
        "unexpected result: {result:?}"
    );
}

#[test]
fn malformed_toml_is_parse_error() {
    let file = write_temp_config("[server\nurl = ");
    let result = Config::load(file.path());

    assert!(
        matches!(result, Err(Error::Config(ConfigError::Parse(_)))),
        "unexpected result: {result:?}"
    );
}

#[test]
fn empty_url_is_missing_field() {
    let file = write_temp_config("[server]\nurl = \"\"\n");
    let result = Config::load(file.path());

    assert!(
        matches!(
            result,
            Err(Error::Config(ConfigError::MissingField { field: "url" }))
        ),
        "unexpected result: {result:?}"
    );
}

#[test]
fn invalid_values_name_the_field() {
    let cases = [
        ("[server]\nurl = \"http://localhost\"\n", "url"),
        ("[server]\nconnect_timeout_ms = 0\n", "connect_timeout_ms"),
        ("[reconnection]\nbackoff_multiplier = 0.5\n", "backoff_multiplier"),
        ("[reconnection]\njitter_ratio = 1.5\n", "jitter_ratio"),
        (
            "[reconnection]\ninitial_delay_ms = 9000\nmax_delay_ms = 1000\n",
            "initial_delay_ms",
        ),
        ("[latency]\nema_alpha = 0.0\n", "ema_alpha"),
        ("[latency]\nmax_missed_pongs = 0\n", "max_missed_pongs"),
        ("[dedup]\ncapacity = 0\n", "dedup.capacity"),
    ];

    for (toml, expected) in cases {
        let file = write_temp_config(toml);
        match Config::load(file.path()) {
            Err(Error::Config(ConfigError::InvalidValue { field, .. })) => {
                assert_eq!(field, expected, "for config:\n{toml}");
            }
            other => panic!("expected invalid {expected}, got {other:?}"),
        }
    }
}
