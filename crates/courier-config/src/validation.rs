// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.

use crate::diagnostic::ConfigError;
use crate::model::{CourierConfig, StoreBackend};

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every violation instead of failing fast.
pub fn validate_config(config: &CourierConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    let host = config.server.host.trim();
    if host.is_empty() {
        fail("server.host must not be empty".to_string());
    } else if host.parse::<std::net::IpAddr>().is_err()
        && !host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':')
    {
        fail(format!("server.host `{host}` is not a valid IP address or hostname"));
    }

    if config.store.backend == StoreBackend::Redis {
        match config.store.redis_url.as_deref().map(str::trim) {
            None | Some("") => {
                fail("store.redis_url is required when store.backend = \"redis\"".to_string())
            }
            Some(url) if !url.starts_with("redis://") && !url.starts_with("rediss://") => {
                fail(format!("store.redis_url `{url}` must use redis:// or rediss://"))
            }
            Some(_) => {}
        }
    }

    if config.store.key_prefix.contains(char::is_whitespace) {
        fail("store.key_prefix must not contain whitespace".to_string());
    }

    if config.database.path.trim().is_empty() {
        fail("database.path must not be empty".to_string());
    }

    for (name, url) in [
        ("gateway.base_url", &config.gateway.base_url),
        ("jobs.base_url", &config.jobs.base_url),
        ("agent.endpoint", &config.agent.endpoint),
    ] {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            fail(format!("{name} `{url}` must be an http(s) URL"));
        }
    }

    let sq = &config.start_queue;
    if sq.max_concurrent_starts == 0 {
        fail("start_queue.max_concurrent_starts must be at least 1".to_string());
    }
    if sq.slot_lease_secs == 0 {
        fail("start_queue.slot_lease_secs must be greater than 0".to_string());
    }

    let co = &config.coalescer;
    if co.stability_window_ms == 0 {
        fail("coalescer.stability_window_ms must be greater than 0".to_string());
    }
    if co.buffer_ttl_secs == 0 {
        fail("coalescer.buffer_ttl_secs must be greater than 0".to_string());
    }
    if co.lock_lease() <= co.stability_window() {
        fail(format!(
            "coalescer.lock_lease_secs ({}s) must exceed the stability window ({}ms)",
            co.lock_lease_secs, co.stability_window_ms
        ));
    }
    if co.lock_lease_secs <= config.agent.timeout_secs {
        fail(format!(
            "coalescer.lock_lease_secs ({}s) must exceed agent.timeout_secs ({}s)",
            co.lock_lease_secs, config.agent.timeout_secs
        ));
    }

    if config.qr_guard.threshold == 0 {
        fail("qr_guard.threshold must be at least 1".to_string());
    }
    if config.qr_guard.counter_ttl_secs == 0 {
        fail("qr_guard.counter_ttl_secs must be greater than 0".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has_error(errors: &[ConfigError], needle: &str) -> bool {
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains(needle)))
    }

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&CourierConfig::default()).is_ok());
    }

    #[test]
    fn redis_backend_requires_url() {
        let mut config = CourierConfig::default();
        config.store.backend = StoreBackend::Redis;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "store.redis_url is required"));
    }

    #[test]
    fn redis_url_scheme_is_checked() {
        let mut config = CourierConfig::default();
        config.store.backend = StoreBackend::Redis;
        config.store.redis_url = Some("http://localhost:6379".into());
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "redis://"));
    }

    #[test]
    fn zero_concurrency_fails_validation() {
        let mut config = CourierConfig::default();
        config.start_queue.max_concurrent_starts = 0;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "max_concurrent_starts"));
    }

    #[test]
    fn lock_lease_must_outlast_stability_window() {
        let mut config = CourierConfig::default();
        config.coalescer.lock_lease_secs = 2;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "lock_lease_secs"));
    }

    #[test]
    fn lock_lease_must_outlast_agent_timeout() {
        let mut config = CourierConfig::default();
        config.agent.timeout_secs = 300;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "must exceed agent.timeout_secs"));

        config.coalescer.lock_lease_secs = 301;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn all_errors_are_collected() {
        let mut config = CourierConfig::default();
        config.server.host = String::new();
        config.qr_guard.threshold = 0;
        config.agent.endpoint = "ftp://agent".into();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }
}
