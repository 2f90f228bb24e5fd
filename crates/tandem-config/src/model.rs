// SPDX-FileCopyrightText: 2026 Tandem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` so a misspelled key fails
//! at startup instead of silently falling back to a default.

use serde::{Deserialize, Serialize};

/// Top-level Tandem configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TandemConfig {
    /// HTTP/WebSocket listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// SQLite identity store settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Bearer token and registration settings.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Real-time connection settings.
    #[serde(default)]
    pub realtime: RealtimeConfig,
}

/// HTTP/WebSocket listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8420
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL mode.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("tandem").join("tandem.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("tandem.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Bearer token configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Lifetime of issued bearer tokens, in hours.
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: u64,

    /// Whether `POST /v1/auth/register` accepts new accounts.
    #[serde(default = "default_allow_registration")]
    pub allow_registration: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_ttl_hours: default_token_ttl_hours(),
            allow_registration: default_allow_registration(),
        }
    }
}

impl AuthConfig {
    pub fn token_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.token_ttl_hours * 3600)
    }
}

fn default_token_ttl_hours() -> u64 {
    24 * 30
}

fn default_allow_registration() -> bool {
    true
}

/// Real-time connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RealtimeConfig {
    /// Seconds a connection may stay in the authenticating state.
    #[serde(default = "default_auth_timeout_secs")]
    pub auth_timeout_secs: u64,

    /// Per-connection outbound buffer. Events beyond it are dropped.
    #[serde(default = "default_send_buffer")]
    pub send_buffer: usize,

    /// Interval between server keep-alive pings.
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,

    /// Maximum simultaneous connections (devices/tabs) per user.
    #[serde(default = "default_max_connections_per_user")]
    pub max_connections_per_user: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            auth_timeout_secs: default_auth_timeout_secs(),
            send_buffer: default_send_buffer(),
            ping_interval_secs: default_ping_interval_secs(),
            max_connections_per_user: default_max_connections_per_user(),
        }
    }
}

impl RealtimeConfig {
    pub fn auth_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.auth_timeout_secs)
    }

    pub fn ping_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.ping_interval_secs)
    }
}

fn default_auth_timeout_secs() -> u64 {
    5
}

fn default_send_buffer() -> usize {
    64
}

fn default_ping_interval_secs() -> u64 {
    30
}

fn default_max_connections_per_user() -> usize {
    8
}
