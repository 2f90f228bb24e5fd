// SPDX-FileCopyrightText: 2026 Tandem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic validation that serde attributes cannot express.

use crate::diagnostic::ConfigError;
use crate::model::TandemConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration, collecting every failure instead
/// of stopping at the first.
pub fn validate_config(config: &TandemConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    let host = config.server.host.trim();
    if host.is_empty() {
        fail("server.host must not be empty".to_string());
    } else if host.parse::<std::net::IpAddr>().is_err()
        && !host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
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

    if config.auth.token_ttl_hours == 0 {
        fail("auth.token_ttl_hours must be at least 1".to_string());
    }

    if config.realtime.auth_timeout_secs == 0 {
        fail("realtime.auth_timeout_secs must be at least 1".to_string());
    }

    if config.realtime.send_buffer == 0 {
        fail("realtime.send_buffer must be at least 1".to_string());
    }

    if config.realtime.ping_interval_secs == 0 {
        fail("realtime.ping_interval_secs must be at least 1".to_string());
    }

    if config.realtime.max_connections_per_user == 0 {
        fail("realtime.max_connections_per_user must be at least 1".to_string());
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&TandemConfig::default()).is_ok());
    }

    #[test]
    fn collects_all_errors() {
        let mut config = TandemConfig::default();
        config.storage.database_path = " ".to_string();
        config.realtime.send_buffer = 0;
        config.server.log_level = "loud".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn rejects_bad_host() {
        let mut config = TandemConfig::default();
        config.server.host = "not a host!".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors[0].to_string().contains("server.host"));
    }
}
