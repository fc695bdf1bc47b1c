use std::io::Write;

use brewflow::config::Config;
use brewflow::error::{ConfigError, Error};
use tempfile::NamedTempFile;

fn write_temp_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp config");
    file.write_all(contents.as_bytes()).expect("write temp config");
    file
}

#[test]
fn loads_full_config() {
    let toml = r#"
[telemetry]
bind_addr = "127.0.0.1:9999"

[upstream]
api_url = "http://localhost:5000/api"
reference_ttl_secs = 60
recompute_interval_secs = 30

[forecast]
horizon_hours = 48
threshold = 0.75
at_risk_horizon_hours = 6.0

[scheduling]
window_hours = 12.0
dwell_minutes = 10.0
day_start_hour = 7
default_courier_capacity = 500.0
fallback_speed_kmh = 40.0
split_fractions = [0.6, 0.4]

[logging]
level = "debug"
format = "json"
"#;

    let file = write_temp_config(toml);
    let config = Config::load(file.path()).expect("config should load");

    assert_eq!(config.telemetry.bind_addr, "127.0.0.1:9999");
    assert_eq!(config.upstream.reference_ttl_secs, 60);
    assert_eq!(config.forecast.threshold, 0.75);
    assert_eq!(config.scheduling.day_start_hour, 7);
    assert_eq!(config.scheduling.split_fractions, vec![0.6, 0.4]);
    assert_eq!(config.logging.format, "json");
}

#[test]
fn missing_sections_fall_back_to_defaults() {
    let file = write_temp_config("[logging]\nlevel = \"warn\"\n");
    let config = Config::load(file.path()).expect("partial config should load");

    assert_eq!(config.logging.level, "warn");
    assert_eq!(config.telemetry.bind_addr, "0.0.0.0:8888");
    assert_eq!(config.forecast.threshold, 0.8);
    assert_eq!(config.scheduling.fallback_speed_kmh, 30.0);
}

#[test]
fn config_rejects_out_of_range_threshold() {
    let file = write_temp_config("[forecast]\nthreshold = 1.5\n");
    match Config::load(file.path()) {
        Err(Error::Config(ConfigError::InvalidValue {
            field: "threshold", ..
        })) => {}
        Err(err) => panic!("expected invalid threshold error, got {err}"),
        Ok(config) => panic!(
            "expected threshold to be rejected, got {}",
            config.forecast.threshold
        ),
    }
}

#[test]
fn config_rejects_bad_day_start_hour() {
    let file = write_temp_config("[scheduling]\nday_start_hour = 24\n");
    match Config::load(file.path()) {
        Err(Error::Config(ConfigError::InvalidValue {
            field: "day_start_hour",
            ..
        })) => {}
        other => panic!("expected invalid day_start_hour error, got {other:?}"),
    }
}

#[test]
fn config_rejects_fractions_that_do_not_sum_to_one() {
    let file = write_temp_config("[scheduling]\nsplit_fractions = [0.5, 0.2]\n");
    match Config::load(file.path()) {
        Err(Error::Config(ConfigError::InvalidValue {
            field: "split_fractions",
            ..
        })) => {}
        other => panic!("expected invalid split_fractions error, got {other:?}"),
    }
}

#[test]
fn config_rejects_empty_api_url() {
    let file = write_temp_config("[upstream]\napi_url = \"\"\n");
    match Config::load(file.path()) {
        Err(Error::Config(ConfigError::MissingField { field: "api_url" })) => {}
        other => panic!("expected missing api_url error, got {other:?}"),
    }
}

#[test]
fn config_rejects_unparseable_toml() {
    let file = write_temp_config("this is not toml [");
    assert!(matches!(
        Config::load(file.path()),
        Err(Error::Config(ConfigError::Parse(_)))
    ));
}
