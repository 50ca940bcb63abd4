// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Courier configuration system.

use courier_config::diagnostic::ConfigError;
use courier_config::model::{CourierConfig, StoreBackend};
use courier_config::{load_and_validate_str, load_config_from_str};

#[test]
fn valid_toml_deserializes_into_courier_config() {
    let toml = r#"
[service]
log_level = "debug"

[server]
host = "0.0.0.0"
port = 9090

[store]
backend = "redis"
redis_url = "redis://127.0.0.1:6379/0"
key_prefix = "wa"

[gateway]
base_url = "http://waha:3000"
api_key = "secret"

[start_queue]
max_concurrent_starts = 5
drain_debounce_ms = 500

[coalescer]
stability_window_ms = 1500

[qr_guard]
threshold = 3
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.service.log_level, "debug");
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 9090);
    assert_eq!(config.store.backend, StoreBackend::Redis);
    assert_eq!(config.store.redis_url.as_deref(), Some("redis://127.0.0.1:6379/0"));
    assert_eq!(config.store.key_prefix, "wa");
    assert_eq!(config.gateway.api_key.as_deref(), Some("secret"));
    assert_eq!(config.start_queue.max_concurrent_starts, 5);
    assert_eq!(config.start_queue.drain_debounce_ms, 500);
    // Unspecified keys keep their defaults.
    assert_eq!(config.start_queue.follow_up_delay_ms, 1_000);
    assert_eq!(config.coalescer.stability_window_ms, 1_500);
    assert_eq!(config.coalescer.buffer_ttl_secs, 3_600);
    assert_eq!(config.qr_guard.threshold, 3);
    assert_eq!(config.qr_guard.counter_ttl_secs, 600);
}

#[test]
fn defaults_match_documented_policy() {
    let config = CourierConfig::default();
    assert_eq!(config.start_queue.max_concurrent_starts, 3);
    assert_eq!(config.start_queue.drain_debounce().as_millis(), 2_000);
    assert_eq!(config.start_queue.follow_up_delay().as_millis(), 1_000);
    assert_eq!(config.coalescer.stability_window().as_millis(), 3_000);
    assert_eq!(config.coalescer.buffer_ttl().as_secs(), 3_600);
    assert_eq!(config.qr_guard.threshold, 5);
    assert_eq!(config.qr_guard.counter_ttl().as_secs(), 600);
    assert_eq!(config.store.backend, StoreBackend::Memory);
}

#[test]
fn empty_toml_loads_defaults() {
    let config = load_and_validate_str("").expect("defaults should validate");
    assert_eq!(config.server.port, 8080);
}

#[test]
fn unknown_field_is_rejected() {
    let toml = r#"
[qr_guard]
treshold = 4
"#;
    let err = load_config_from_str(toml).expect_err("should reject unknown field");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("treshold"),
        "error should mention the bad key, got: {err_str}"
    );
}

#[test]
fn unknown_field_produces_suggestion() {
    let toml = r#"
[qr_guard]
treshold = 4
"#;
    let errors = load_and_validate_str(toml).expect_err("should fail");
    let suggestion = errors.iter().find_map(|e| match e {
        ConfigError::UnknownKey { suggestion, .. } => suggestion.clone(),
        _ => None,
    });
    assert_eq!(suggestion.as_deref(), Some("threshold"));
}

#[test]
fn unknown_section_is_rejected() {
    let toml = r#"
[telegram]
bot_token = "abc"
"#;
    assert!(load_config_from_str(toml).is_err());
}

#[test]
fn wrong_type_produces_invalid_type() {
    let toml = r#"
[server]
port = "eighty"
"#;
    let errors = load_and_validate_str(toml).expect_err("should fail");
    assert!(errors.iter().any(|e| matches!(e, ConfigError::InvalidType { .. })));
}

#[test]
fn unknown_backend_is_rejected() {
    let toml = r#"
[store]
backend = "memcached"
"#;
    assert!(load_config_from_str(toml).is_err());
}

#[test]
fn semantic_errors_surface_through_load() {
    let toml = r#"
[store]
backend = "redis"
"#;
    let errors = load_and_validate_str(toml).expect_err("redis without url");
    assert!(errors.iter().any(|e| matches!(e, ConfigError::Validation { .. })));
}
