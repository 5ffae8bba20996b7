// SPDX-FileCopyrightText: 2026 Omnidesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as bindable hosts, absolute URLs, and non-zero socket limits.

use crate::diagnostic::ConfigError;
use crate::model::OmnideskConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &OmnideskConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    let host = config.server.host.trim();
    if host.is_empty() {
        fail("server.host must not be empty".to_string());
    } else if host.parse::<std::net::IpAddr>().is_err()
        && !host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        fail(format!(
            "server.host `{host}` is not a valid IP address or hostname"
        ));
    }

    if !LOG_LEVELS.contains(&config.server.log_level.as_str()) {
        fail(format!(
            "server.log_level must be one of {}, got `{}`",
            LOG_LEVELS.join(", "),
            config.server.log_level
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    for (key, url, schemes) in [
        ("meta.graph_base_url", &config.meta.graph_base_url, &["http://", "https://"][..]),
        ("crm.base_url", &config.crm.base_url, &["http://", "https://"][..]),
        ("gmail.api_base_url", &config.gmail.api_base_url, &["http://", "https://"][..]),
        ("gmail.token_url", &config.gmail.token_url, &["http://", "https://"][..]),
        ("realtime.public_url", &config.realtime.public_url, &["ws://", "wss://"][..]),
    ] {
        if !schemes.iter().any(|scheme| url.starts_with(scheme)) {
            fail(format!(
                "{key} `{url}` must start with one of {}",
                schemes.join(", ")
            ));
        }
    }

    if config.gmail.enabled {
        for (key, value) in [
            ("gmail.client_id", &config.gmail.client_id),
            ("gmail.client_secret", &config.gmail.client_secret),
            ("gmail.refresh_token", &config.gmail.refresh_token),
        ] {
            if value.as_deref().is_none_or(|v| v.trim().is_empty()) {
                fail(format!("{key} is required when gmail.enabled = true"));
            }
        }
    }

    let rt = &config.realtime;
    for (key, value) in [
        ("realtime.write_wait_secs", rt.write_wait_secs),
        ("realtime.pong_wait_secs", rt.pong_wait_secs),
        ("realtime.max_message_size", rt.max_message_size as u64),
        ("realtime.send_buffer", rt.send_buffer as u64),
        ("realtime.notifier_queue", rt.notifier_queue as u64),
        ("realtime.notifier_retry_interval_ms", rt.notifier_retry_interval_ms),
    ] {
        if value == 0 {
            fail(format!("{key} must be greater than zero"));
        }
    }

    // Pings go out at 9/10 of the pong wait and must fit a write deadline.
    if rt.pong_wait_secs <= rt.write_wait_secs {
        fail(format!(
            "realtime.pong_wait_secs ({}) must exceed realtime.write_wait_secs ({})",
            rt.pong_wait_secs, rt.write_wait_secs
        ));
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

    fn messages(config: &OmnideskConfig) -> Vec<String> {
        validate_config(config)
            .unwrap_err()
            .into_iter()
            .map(|e| e.to_string())
            .collect()
    }

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&OmnideskConfig::default()).is_ok());
    }

    #[test]
    fn empty_database_path_fails_validation() {
        let mut config = OmnideskConfig::default();
        config.storage.database_path = " ".to_string();
        assert!(messages(&config).iter().any(|m| m.contains("database_path")));
    }

    #[test]
    fn public_url_must_be_a_socket_url() {
        let mut config = OmnideskConfig::default();
        config.realtime.public_url = "http://localhost:8080".to_string();
        assert!(messages(&config).iter().any(|m| m.contains("realtime.public_url")));
    }

    #[test]
    fn enabled_gmail_requires_credentials() {
        let mut config = OmnideskConfig::default();
        config.gmail.enabled = true;
        config.gmail.client_id = Some("id".to_string());
        let msgs = messages(&config);
        assert_eq!(msgs.len(), 2);
        assert!(msgs.iter().any(|m| m.contains("gmail.client_secret")));
        assert!(msgs.iter().any(|m| m.contains("gmail.refresh_token")));
    }

    #[test]
    fn collects_all_errors() {
        let mut config = OmnideskConfig::default();
        config.server.log_level = "loud".to_string();
        config.realtime.send_buffer = 0;
        config.crm.base_url = "crm.internal".to_string();
        assert_eq!(messages(&config).len(), 3);
    }

    #[test]
    fn pong_wait_must_exceed_write_wait() {
        let mut config = OmnideskConfig::default();
        config.realtime.pong_wait_secs = 10;
        assert!(messages(&config).iter().any(|m| m.contains("must exceed")));
    }
}
