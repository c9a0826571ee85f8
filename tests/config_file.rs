//! Checks the configuration file shipped at the repository root.
//!
//! The checked-in compmon.toml documents the deployed values; it should
//! parse, validate, and agree with the built-in defaults so that running
//! without a config file behaves the same as running with it.

use std::path::Path;

use compmon_service::config::ServiceConfig;
use compmon_service::model::{SensorThresholds, VerificationPolicy};
use compmon_service::serials::RegisteredSerials;

fn shipped_config_path() -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("compmon.toml")
}

#[test]
fn test_shipped_config_loads() {
    let result = ServiceConfig::load(&shipped_config_path());
    assert!(result.is_ok(), "compmon.toml should load: {:?}", result.err());
}

#[test]
fn test_shipped_config_matches_defaults() {
    let config = ServiceConfig::load(&shipped_config_path()).expect("compmon.toml should load");
    assert_eq!(config.verification, VerificationPolicy::default());
    assert_eq!(config.sensors, SensorThresholds::default());
    assert_eq!(config.registered_serials, RegisteredSerials::default());
}

#[test]
fn test_shipped_config_has_no_secrets() {
    let config = ServiceConfig::load(&shipped_config_path()).expect("compmon.toml should load");
    assert!(config.extractor.gemini_api_key.is_none(), "API keys belong in the environment");
    assert!(config.sink.report_webhook_url.is_none());
    assert!(config.sink.alert_webhook_url.is_none());
}
